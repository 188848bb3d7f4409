// Reads survey form state into a DemographicRecord. Pure: no I/O, no screen logic.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeInclusive;

use crate::types::DemographicRecord;

/// Ages offered by the age selector.
pub const AGE_RANGE: RangeInclusive<u32> = 18..=100;

/// Form field and group names shared with the page markup.
pub mod names {
    pub const EMAIL: &str = "ASU_Email";
    pub const PROGRAM_USE_ONLY: &str = "program_use_only";
    pub const GENDER: &str = "Gender";
    pub const AGE: &str = "Age";
    pub const HISPANIC_ORIGIN: &str = "Hispanic_Origin";
    pub const RACE_LIST: &str = "Race_List";
    pub const RACE_OTHER_SPECIFY: &str = "Race_Other_Specify";
    pub const MAJOR: &str = "Major";
    pub const MAJOR_CATEGORY: &str = "Major_Category";
    pub const MAJOR_CATEGORY_SPECIFY: &str = "Major_Category_Specify";
    pub const LANGUAGE_BACKGROUND: &str = "Language_Background";
    pub const NATIVE_LANGUAGE: &str = "Native_Language";
    pub const YEARS_STUDIED_ENGLISH: &str = "Years_Studied_English";
    pub const YEARS_IN_US: &str = "Years_in_US";
}

/// Read access to the current form state.
pub trait FormSource {
    /// Values of every checked input in the named group, in document order.
    fn checked_values(&self, group: &str) -> Vec<String>;

    /// Raw value of a named text/select field. `None` if the field is absent.
    fn field_value(&self, name: &str) -> Option<String>;

    /// Whether a standalone named checkbox is checked.
    fn is_checked(&self, name: &str) -> bool;

    /// Exactly one checked input in the group, else empty.
    fn single_choice(&self, group: &str) -> String {
        let mut values = self.checked_values(group);
        if values.len() == 1 {
            values.pop().unwrap_or_default()
        } else {
            String::new()
        }
    }

    /// Trimmed field value, empty when the field is absent.
    fn text(&self, name: &str) -> String {
        self.field_value(name)
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    }
}

/// In-memory form state, for hosts without a DOM.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormSnapshot {
    /// Checked values per radio/checkbox group.
    pub choices: BTreeMap<String, Vec<String>>,
    /// Text and select field values.
    pub fields: BTreeMap<String, String>,
    /// Standalone checkboxes that are checked.
    pub flags: BTreeSet<String>,
    /// Dependent fields or sections currently hidden.
    pub hidden: BTreeSet<String>,
}

impl FormSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: &str, value: &str) -> Self {
        self.fields.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_choice(mut self, group: &str, value: &str) -> Self {
        self.choices
            .entry(group.to_string())
            .or_default()
            .push(value.to_string());
        self
    }

    pub fn with_flag(mut self, name: &str) -> Self {
        self.flags.insert(name.to_string());
        self
    }

    /// Replace a group's selection, as clicking a radio does.
    pub fn select(&mut self, group: &str, value: &str) {
        self.choices
            .insert(group.to_string(), vec![value.to_string()]);
    }

    /// Toggle one checkbox in a multi-choice group.
    pub fn toggle(&mut self, group: &str, value: &str) {
        let values = self.choices.entry(group.to_string()).or_default();
        if let Some(pos) = values.iter().position(|v| v == value) {
            values.remove(pos);
        } else {
            values.push(value.to_string());
        }
    }

    pub fn set_field(&mut self, name: &str, value: &str) {
        self.fields.insert(name.to_string(), value.to_string());
    }

    pub fn is_hidden(&self, key: &str) -> bool {
        self.hidden.contains(key)
    }
}

impl FormSource for FormSnapshot {
    fn checked_values(&self, group: &str) -> Vec<String> {
        self.choices.get(group).cloned().unwrap_or_default()
    }

    fn field_value(&self, name: &str) -> Option<String> {
        self.fields.get(name).cloned()
    }

    fn is_checked(&self, name: &str) -> bool {
        self.flags.contains(name)
    }
}

/// Builds the demographic payload from whatever form is mounted.
pub struct FormCollector;

impl FormCollector {
    /// Read the form into a record. Absent fields become empty strings.
    pub fn collect(form: &dyn FormSource) -> DemographicRecord {
        let races = form.checked_values(names::RACE_LIST);

        DemographicRecord {
            program_use_only: form.is_checked(names::PROGRAM_USE_ONLY),
            asurite: derive_asurite(&form.field_value(names::EMAIL).unwrap_or_default()),
            gender: form.single_choice(names::GENDER),
            age: form.text(names::AGE),
            race_ethnicity: pack_race_ethnicity(
                &form.single_choice(names::HISPANIC_ORIGIN),
                &races,
            ),
            race_ethnicity_specify: form.text(names::RACE_OTHER_SPECIFY),
            major: form.text(names::MAJOR),
            major_category: form.single_choice(names::MAJOR_CATEGORY),
            major_category_specify: form.text(names::MAJOR_CATEGORY_SPECIFY),
            language_background: form.single_choice(names::LANGUAGE_BACKGROUND),
            native_language: form.text(names::NATIVE_LANGUAGE),
            years_studied_english: form.text(names::YEARS_STUDIED_ENGLISH),
            years_in_us: form.text(names::YEARS_IN_US),
        }
    }
}

/// Local part of an email-like value, trimmed and lower-cased.
/// Advisory only: the service returns the canonical identifier.
pub fn derive_asurite(email: &str) -> String {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, _)) => local.to_string(),
        None => email,
    }
}

/// Wire format expected by the service's `Race_Ethnicity` column.
pub fn pack_race_ethnicity(hispanic_origin: &str, races: &[String]) -> String {
    format!("Hispanic_Origin={}; Race={}", hispanic_origin, races.join(", "))
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn filled_form() -> FormSnapshot {
        FormSnapshot::new()
            .with_field(names::EMAIL, "  JDoe@Example.edu ")
            .with_choice(names::GENDER, "Female")
            .with_field(names::AGE, "21")
            .with_choice(names::HISPANIC_ORIGIN, "No")
            .with_choice(names::RACE_LIST, "Asian")
            .with_choice(names::RACE_LIST, "White")
            .with_field(names::MAJOR, " Biology ")
            .with_choice(names::MAJOR_CATEGORY, "STEM")
            .with_choice(names::LANGUAGE_BACKGROUND, "I grew up speaking English only")
    }

    #[test]
    fn email_local_part_becomes_asurite() {
        assert_eq!(derive_asurite("jdoe@example.edu"), "jdoe");
        assert_eq!(derive_asurite("  JDoe@Example.edu "), "jdoe");
        assert_eq!(derive_asurite("JDOE"), "jdoe");
        assert_eq!(derive_asurite("a@b@c"), "a");
        assert_eq!(derive_asurite(""), "");
    }

    #[test]
    fn race_is_packed_into_one_string() {
        let races = vec!["Asian".to_string(), "White".to_string()];
        assert_eq!(
            pack_race_ethnicity("No", &races),
            "Hispanic_Origin=No; Race=Asian, White"
        );
        assert_eq!(pack_race_ethnicity("", &[]), "Hispanic_Origin=; Race=");
    }

    #[test]
    fn collect_reads_every_field() {
        let record = FormCollector::collect(&filled_form());
        assert_eq!(record.asurite, "jdoe");
        assert_eq!(record.gender, "Female");
        assert_eq!(record.age, "21");
        assert_eq!(record.race_ethnicity, "Hispanic_Origin=No; Race=Asian, White");
        assert_eq!(record.major, "Biology");
        assert_eq!(record.major_category, "STEM");
        assert!(!record.program_use_only);
    }

    #[test]
    fn absent_fields_default_to_empty() {
        let record = FormCollector::collect(&FormSnapshot::new());
        assert_eq!(record.asurite, "");
        assert_eq!(record.gender, "");
        assert_eq!(record.native_language, "");
        assert_eq!(record.years_in_us, "");
        assert_eq!(record.race_ethnicity, "Hispanic_Origin=; Race=");
    }

    #[test]
    fn ambiguous_single_choice_is_empty() {
        let form = FormSnapshot::new()
            .with_choice(names::GENDER, "Female")
            .with_choice(names::GENDER, "Male");
        assert_eq!(FormCollector::collect(&form).gender, "");
    }

    #[test]
    fn consent_checkbox_feeds_program_use_only() {
        let form = filled_form().with_flag(names::PROGRAM_USE_ONLY);
        assert!(FormCollector::collect(&form).program_use_only);
    }

    #[test]
    fn snapshot_toggle_adds_and_removes() {
        let mut form = FormSnapshot::new();
        form.toggle(names::RACE_LIST, "Asian");
        form.toggle(names::RACE_LIST, "White");
        form.toggle(names::RACE_LIST, "Asian");
        assert_eq!(form.checked_values(names::RACE_LIST), vec!["White".to_string()]);
    }

    #[test]
    fn age_range_is_inclusive() {
        assert_eq!(AGE_RANGE.clone().count(), 83);
        assert_eq!(*AGE_RANGE.start(), 18);
        assert_eq!(*AGE_RANGE.end(), 100);
    }

    proptest! {
        #[test]
        fn derived_asurite_is_lowercase_local_part(
            local in "[A-Za-z0-9._]{1,16}",
            domain in "[A-Za-z0-9.]{1,16}",
            pad in " {0,3}",
        ) {
            let email = format!("{pad}{local}@{domain}{pad}");
            prop_assert_eq!(derive_asurite(&email), local.to_lowercase());
        }

        #[test]
        fn derived_asurite_never_contains_at(input in ".{0,32}") {
            prop_assert!(!derive_asurite(&input).contains('@'));
        }
    }
}
