// Strong typing over strings. Newtypes for identifiers and client timestamps,
// plain data for the screens, controls, configuration and wire bodies.

use std::fmt;

use chrono::{DateTime, SecondsFormat};
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Client wall-clock instant in milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn from_millis(ms: i64) -> Self {
        Timestamp(ms)
    }

    /// ISO-8601 UTC with millisecond precision, e.g. `2025-03-01T14:05:09.120Z`.
    /// `None` if the instant is outside the representable range.
    pub fn to_iso8601(&self) -> Option<String> {
        DateTime::from_timestamp_millis(self.0)
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

/// Participant identifier. Canonical once the service has returned it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Asurite(String);

impl Asurite {
    pub fn new(value: impl Into<String>) -> Self {
        Asurite(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Asurite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Server-issued writing session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(value: impl Into<String>) -> Self {
        SessionId(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Screens of the study flow, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    Consent,
    Demographics,
    Instructions,
    Writing,
    /// Terminal.
    Thanks,
}

impl Screen {
    pub fn as_str(&self) -> &'static str {
        match self {
            Screen::Consent => "consent",
            Screen::Demographics => "demographics",
            Screen::Instructions => "instructions",
            Screen::Writing => "writing",
            Screen::Thanks => "thanks",
        }
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action controls the participant can press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Control {
    ConsentAgree,
    ConsentNext,
    DemographicsSubmit,
    InstructionsAgree,
    StartWriting,
    BackToWriting,
    BackToInstructions,
    SubmitEssay,
}

/// Which of the two flow shapes the page runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FlowVariant {
    /// Consent, Demographics, Instructions, Writing, Thanks.
    #[default]
    WithInstructions,
    /// Demographics (with a consent checkbox), Writing, Thanks.
    Simplified,
}

impl FlowVariant {
    pub fn initial_screen(&self) -> Screen {
        match self {
            FlowVariant::WithInstructions => Screen::Consent,
            FlowVariant::Simplified => Screen::Demographics,
        }
    }

    pub fn has_instructions(&self) -> bool {
        matches!(self, FlowVariant::WithInstructions)
    }
}

/// Client configuration passed from JS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default)]
    pub flow: FlowVariant,
    /// Send `client_start_time` with the essay so the service can time the attempt.
    #[serde(default = "default_true")]
    pub report_client_start_time: bool,
}

fn default_api_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_true() -> bool {
    true
}

impl StudyConfig {
    /// Parse the JSON configuration handed over by the host page.
    pub fn from_json(json: &str) -> Result<Self, ClientError> {
        serde_json::from_str(json).map_err(|e| ClientError::InvalidConfig(e.to_string()))
    }
}

impl Default for StudyConfig {
    fn default() -> Self {
        StudyConfig {
            api_base_url: default_api_base_url(),
            flow: FlowVariant::default(),
            report_client_start_time: true,
        }
    }
}

/// Demographic survey answers as the service expects them.
///
/// Every text field is present, trimmed, and empty when unanswered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DemographicRecord {
    pub program_use_only: bool,
    #[serde(rename = "ASURite")]
    pub asurite: String,
    #[serde(rename = "Gender")]
    pub gender: String,
    #[serde(rename = "Age")]
    pub age: String,
    /// Packed as `Hispanic_Origin=<v>; Race=<a, b>`.
    #[serde(rename = "Race_Ethnicity")]
    pub race_ethnicity: String,
    #[serde(rename = "Race_Ethnicity_Specify")]
    pub race_ethnicity_specify: String,
    #[serde(rename = "Major")]
    pub major: String,
    #[serde(rename = "Major_Category")]
    pub major_category: String,
    #[serde(rename = "Major_Category_Specify")]
    pub major_category_specify: String,
    #[serde(rename = "Language_Background")]
    pub language_background: String,
    #[serde(rename = "Native_Language")]
    pub native_language: String,
    #[serde(rename = "Years_Studied_English")]
    pub years_studied_english: String,
    #[serde(rename = "Years_in_US")]
    pub years_in_us: String,
}

/// Success body of `POST /api/demographics`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DemographicsSaved {
    pub asurite: Asurite,
    #[serde(default)]
    pub saved: bool,
}

/// Body of `POST /api/writing-session/start`.
#[derive(Debug, Clone, Serialize)]
pub struct StartSessionRequest<'a> {
    pub asurite: &'a Asurite,
}

/// Success body of `POST /api/writing-session/start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStarted {
    pub session_id: SessionId,
    #[serde(default)]
    pub started_at: Option<String>,
}

/// Body of `POST /api/essay/submit`.
#[derive(Debug, Clone, Serialize)]
pub struct EssaySubmission<'a> {
    pub session_id: &'a SessionId,
    pub essay_text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_start_time: Option<String>,
}

/// Acknowledgement returned once the essay is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EssayReceipt {
    #[serde(default)]
    pub session_id: Option<SessionId>,
    #[serde(default)]
    pub submitted_at: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<i64>,
    #[serde(default)]
    pub word_count: Option<u64>,
    #[serde(default)]
    pub char_count: Option<u64>,
}

/// Which forward controls the Instructions screen offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionAffordances {
    pub agree: bool,
    pub start_writing: bool,
    pub back_to_writing: bool,
}

impl InstructionAffordances {
    /// Once a writing session exists, "back to writing" is the only way forward.
    pub fn for_state(has_agreed: bool, session_present: bool) -> Self {
        if session_present {
            InstructionAffordances {
                agree: false,
                start_writing: false,
                back_to_writing: true,
            }
        } else {
            InstructionAffordances {
                agree: !has_agreed,
                start_writing: has_agreed,
                back_to_writing: false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_formats_like_js_iso_string() {
        let ts = Timestamp::from_millis(1_700_000_000_123);
        assert_eq!(ts.to_iso8601().as_deref(), Some("2023-11-14T22:13:20.123Z"));
    }

    #[test]
    fn config_defaults_from_empty_json() {
        let config: StudyConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, StudyConfig::default());
        assert_eq!(config.flow.initial_screen(), Screen::Consent);
    }

    #[test]
    fn invalid_config_rejected() {
        let err = StudyConfig::from_json(r#"{"flow":"sideways"}"#).unwrap_err();
        assert!(matches!(err, ClientError::InvalidConfig(_)));
        assert!(StudyConfig::from_json("not json").is_err());
    }

    #[test]
    fn simplified_flow_parses() {
        let config: StudyConfig =
            serde_json::from_str(r#"{"flow":"simplified","report_client_start_time":false}"#)
                .unwrap();
        assert_eq!(config.flow, FlowVariant::Simplified);
        assert!(!config.flow.has_instructions());
        assert!(!config.report_client_start_time);
    }

    #[test]
    fn demographic_record_uses_service_keys() {
        let value = serde_json::to_value(DemographicRecord::default()).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 13);
        assert_eq!(object["program_use_only"], false);
        assert_eq!(object["ASURite"], "");
        assert_eq!(object["Years_in_US"], "");
    }

    #[test]
    fn essay_submission_omits_unknown_start_time() {
        let id = SessionId::new("abc");
        let body = EssaySubmission {
            session_id: &id,
            essay_text: "hello",
            client_start_time: None,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(json, r#"{"session_id":"abc","essay_text":"hello"}"#);
    }

    #[test]
    fn affordances_follow_agreement_and_session() {
        let before = InstructionAffordances::for_state(false, false);
        assert!(before.agree && !before.start_writing && !before.back_to_writing);

        let agreed = InstructionAffordances::for_state(true, false);
        assert!(!agreed.agree && agreed.start_writing && !agreed.back_to_writing);

        for has_agreed in [false, true] {
            let revisit = InstructionAffordances::for_state(has_agreed, true);
            assert!(!revisit.agree && !revisit.start_writing && revisit.back_to_writing);
        }
    }
}
