// Typed errors with thiserror. Display text is what the participant sees.

use thiserror::Error;

/// Client error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Required identity missing before a transition.
    #[error("{0}")]
    Validation(ValidationGap),

    /// Non-success response from the study service.
    #[error("{message}")]
    Remote { status: u16, message: String },

    /// The service could not be reached.
    #[error("{0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Required page element or browser API unavailable.
    #[error("Page error: {0}")]
    Page(String),
}

/// Identity missing when a transition needs it.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationGap {
    #[error("Missing participant info. Please complete the demographic survey first.")]
    MissingParticipant,

    #[error("Missing writing session. Please start writing from the instructions page.")]
    MissingWritingSession,
}

impl From<ValidationGap> for ClientError {
    fn from(gap: ValidationGap) -> Self {
        ClientError::Validation(gap)
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}

impl From<ClientError> for wasm_bindgen::JsValue {
    fn from(err: ClientError) -> Self {
        js_sys::Error::new(&err.to_string()).into()
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
