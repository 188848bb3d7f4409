// HTTP client for the study service.
//
// Three calls, no retries: a failure is returned to the caller as-is and the
// participant retries by pressing the control again.

use async_trait::async_trait;
use reqwest::{header, Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{ClientError, Result};
use crate::types::*;

/// Remote operations the screen flow depends on.
#[async_trait(?Send)]
pub trait StudyApi {
    /// Store the survey answers. Returns the canonical participant identifier.
    async fn save_demographics(&self, record: &DemographicRecord) -> Result<DemographicsSaved>;

    /// Open a writing session. Callers must not call this twice for one participant.
    async fn start_session(&self, asurite: &Asurite) -> Result<SessionStarted>;

    /// Submit the essay, optionally with the client-side start instant (ISO-8601).
    async fn submit_essay(
        &self,
        session_id: &SessionId,
        essay_text: &str,
        client_start_time: Option<String>,
    ) -> Result<EssayReceipt>;
}

/// `StudyApi` over JSON/HTTP.
///
/// # Example
///
/// ```rust,no_run
/// use study_client::{HttpStudyApi, StudyApi, StudyConfig, Asurite};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let api = HttpStudyApi::new(&StudyConfig::default());
/// let started = api.start_session(&Asurite::new("jdoe")).await?;
/// println!("session {}", started.session_id);
/// # Ok(())
/// # }
/// ```
pub struct HttpStudyApi {
    base_url: String,
    client: Client,
}

impl HttpStudyApi {
    pub fn new(config: &StudyConfig) -> Self {
        Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: serde::Serialize + ?Sized,
        T: serde::de::DeserializeOwned,
    {
        let response = self
            .client
            .post(self.url(path))
            .header(header::CONTENT_TYPE, "application/json")
            .json(body)
            .send()
            .await?;

        handle_response(path, response).await
    }
}

async fn handle_response<T: serde::de::DeserializeOwned>(
    path: &str,
    response: Response,
) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        let text = response.text().await?;
        return Ok(serde_json::from_str(&text)?);
    }

    // Body is best effort; a failed read still yields the status text.
    let body = response.text().await.unwrap_or_default();
    let message = error_message(status, &body);
    warn!(path, status = status.as_u16(), "study service rejected request");
    Err(ClientError::Remote {
        status: status.as_u16(),
        message,
    })
}

#[async_trait(?Send)]
impl StudyApi for HttpStudyApi {
    async fn save_demographics(&self, record: &DemographicRecord) -> Result<DemographicsSaved> {
        let saved: DemographicsSaved = self.post("/api/demographics", record).await?;
        info!(asurite = %saved.asurite, "demographics saved");
        Ok(saved)
    }

    async fn start_session(&self, asurite: &Asurite) -> Result<SessionStarted> {
        let started: SessionStarted = self
            .post("/api/writing-session/start", &StartSessionRequest { asurite })
            .await?;
        info!(%asurite, session_id = %started.session_id, "writing session started");
        Ok(started)
    }

    async fn submit_essay(
        &self,
        session_id: &SessionId,
        essay_text: &str,
        client_start_time: Option<String>,
    ) -> Result<EssayReceipt> {
        let body = EssaySubmission {
            session_id,
            essay_text,
            client_start_time,
        };
        let receipt: EssayReceipt = self.post("/api/essay/submit", &body).await?;
        info!(
            %session_id,
            duration_seconds = ?receipt.duration_seconds,
            word_count = ?receipt.word_count,
            "essay submitted"
        );
        Ok(receipt)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<Value>,
}

/// Human-readable message from an error response.
///
/// Prefers the `detail` field: a string is used as-is, an array is joined with
/// newlines (objects contribute their `msg`). Otherwise the status reason.
pub fn error_message(status: StatusCode, body: &str) -> String {
    let detail = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.detail)
        .and_then(|d| detail_text(&d));

    match detail {
        Some(text) if !text.is_empty() => text,
        _ => status
            .canonical_reason()
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
    }
}

fn detail_text(detail: &Value) -> Option<String> {
    match detail {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Object(obj) => {
                        obj.get("msg").and_then(Value::as_str).map(str::to_string)
                    }
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}
