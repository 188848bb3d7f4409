// Conditional show/hide for "please specify" fields and dependent sub-sections.
// Rules are pure functions of the current selections; hidden dependents are cleared.

use crate::form::{names, FormSource};

/// Sentinel labels, matched exactly.
pub const RACE_OTHER_SENTINEL: &str = "Other (please specify)";
pub const MAJOR_OTHER_SENTINEL: &str = "Other (Please specify)";
pub const NON_ENGLISH_SENTINEL: &str = "I grew up speaking language(s) other than English";

/// Container of the non-English language details.
pub const NON_ENGLISH_SECTION: &str = "nonEnglishGroup";

/// The selection that decides a dependent's visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Single-choice group whose one checked value equals the sentinel.
    Choice {
        group: &'static str,
        sentinel: &'static str,
    },
    /// Multi-choice group with the sentinel among its checked values.
    AnyOf {
        group: &'static str,
        sentinel: &'static str,
    },
}

impl Trigger {
    pub fn is_met(&self, form: &dyn FormSource) -> bool {
        match self {
            Trigger::Choice { group, sentinel } => form.single_choice(group) == *sentinel,
            Trigger::AnyOf { group, sentinel } => form
                .checked_values(group)
                .iter()
                .any(|value| value == sentinel),
        }
    }
}

/// What gets shown or hidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependent {
    /// A single free-text input, addressed by name.
    Field(&'static str),
    /// A container element; every input inside it is cleared on hide.
    Section {
        id: &'static str,
        fields: &'static [&'static str],
    },
}

impl Dependent {
    /// Identifier used by the page (input name or container id).
    pub fn key(&self) -> &'static str {
        match *self {
            Dependent::Field(name) => name,
            Dependent::Section { id, .. } => id,
        }
    }

    /// Named fields whose values must be emptied when hidden.
    pub fn fields(&self) -> &[&'static str] {
        match self {
            Dependent::Field(name) => std::slice::from_ref(name),
            Dependent::Section { fields, .. } => fields,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConditionalRule {
    pub trigger: Trigger,
    pub dependent: Dependent,
}

/// Conditional fields of the demographic survey.
pub const SURVEY_RULES: &[ConditionalRule] = &[
    ConditionalRule {
        trigger: Trigger::AnyOf {
            group: names::RACE_LIST,
            sentinel: RACE_OTHER_SENTINEL,
        },
        dependent: Dependent::Field(names::RACE_OTHER_SPECIFY),
    },
    ConditionalRule {
        trigger: Trigger::Choice {
            group: names::MAJOR_CATEGORY,
            sentinel: MAJOR_OTHER_SENTINEL,
        },
        dependent: Dependent::Field(names::MAJOR_CATEGORY_SPECIFY),
    },
    ConditionalRule {
        trigger: Trigger::Choice {
            group: names::LANGUAGE_BACKGROUND,
            sentinel: NON_ENGLISH_SENTINEL,
        },
        dependent: Dependent::Section {
            id: NON_ENGLISH_SECTION,
            fields: &[
                names::NATIVE_LANGUAGE,
                names::YEARS_STUDIED_ENGLISH,
                names::YEARS_IN_US,
            ],
        },
    },
];

/// Where visibility decisions land (the DOM, or an in-memory form).
pub trait VisibilityTarget {
    fn set_visible(&self, dependent: &Dependent, visible: bool);
    /// Empty every value under the dependent. Must be a no-op if already empty.
    fn clear(&self, dependent: &Dependent);
}

/// Visibility decision for every rule, in rule order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityPlan {
    pub entries: Vec<(Dependent, bool)>,
}

impl VisibilityPlan {
    pub fn is_visible(&self, key: &str) -> Option<bool> {
        self.entries
            .iter()
            .find(|(dependent, _)| dependent.key() == key)
            .map(|(_, visible)| *visible)
    }

    /// Show or hide each dependent, clearing the hidden ones.
    pub fn apply(&self, target: &dyn VisibilityTarget) {
        for (dependent, visible) in &self.entries {
            target.set_visible(dependent, *visible);
            if !visible {
                target.clear(dependent);
            }
        }
    }
}

/// Evaluates a rule table against the current selections.
pub struct VisibilityRules {
    rules: &'static [ConditionalRule],
}

impl VisibilityRules {
    pub fn new(rules: &'static [ConditionalRule]) -> Self {
        VisibilityRules { rules }
    }

    pub fn survey() -> Self {
        Self::new(SURVEY_RULES)
    }

    pub fn evaluate(&self, form: &dyn FormSource) -> VisibilityPlan {
        VisibilityPlan {
            entries: self
                .rules
                .iter()
                .map(|rule| (rule.dependent, rule.trigger.is_met(form)))
                .collect(),
        }
    }
}

impl Default for VisibilityRules {
    fn default() -> Self {
        Self::survey()
    }
}

impl crate::form::FormSnapshot {
    /// Apply a plan to this snapshot: track hidden keys and empty hidden fields.
    pub fn apply_visibility(&mut self, plan: &VisibilityPlan) {
        for (dependent, visible) in &plan.entries {
            if *visible {
                self.hidden.remove(dependent.key());
            } else {
                self.hidden.insert(dependent.key().to_string());
                for field in dependent.fields() {
                    if let Some(value) = self.fields.get_mut(*field) {
                        value.clear();
                    }
                }
            }
        }
    }
}
