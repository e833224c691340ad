/// AI service client: the single point of entry for calls to the external
/// question-answering service.
///
/// No other module talks to the AI service directly; everything goes through
/// the `AiGateway` trait so the assistant flow can be exercised without a network.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

pub mod invalidation;

pub use invalidation::CacheInvalidator;

/// Health probes never need the full query budget.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Error, PartialEq)]
pub enum AiServiceError {
    #[error("request to AI service timed out")]
    Timeout,

    #[error("AI service unreachable: {0}")]
    Unreachable(String),

    #[error("AI service returned status {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("failed to decode AI service response: {0}")]
    Decode(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

impl From<reqwest::Error> for AiServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AiServiceError::Timeout
        } else if e.is_connect() {
            AiServiceError::Unreachable(e.to_string())
        } else if e.is_decode() {
            AiServiceError::Decode(e.to_string())
        } else {
            AiServiceError::Http(e.to_string())
        }
    }
}

/// Body of `POST /query`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QueryRequest {
    pub class_id: Uuid,
    pub question: String,
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceCitation {
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
}

/// Successful `/query` payload. Trusted as-is beyond transport success.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AiAnswer {
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<SourceCitation>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Seam between the assistant flow and the AI service.
#[async_trait]
pub trait AiGateway: Send + Sync {
    async fn query(&self, request: &QueryRequest) -> Result<AiAnswer, AiServiceError>;

    /// Tells the service to drop cached indexing state for a class.
    async fn invalidate_cache(&self, class_id: Uuid) -> Result<(), AiServiceError>;

    async fn health(&self) -> Result<Value, AiServiceError>;

    fn base_url(&self) -> &str;
}

/// reqwest-backed `AiGateway`.
#[derive(Clone)]
pub struct AiServiceClient {
    client: Client,
    base_url: String,
}

impl AiServiceClient {
    pub fn new(base_url: &str, query_timeout: Duration) -> Result<Self, AiServiceError> {
        let client = Client::builder().timeout(query_timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl AiGateway for AiServiceClient {
    async fn query(&self, request: &QueryRequest) -> Result<AiAnswer, AiServiceError> {
        debug!(
            "Querying AI service: class_id={}, question_len={}",
            request.class_id,
            request.question.len()
        );

        let response = self
            .client
            .post(self.url("/query"))
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("AI service returned {}: {}", status, body);
            return Err(AiServiceError::Status {
                status: status.as_u16(),
                detail: error_detail(&body),
            });
        }

        let answer: AiAnswer = response.json().await?;

        debug!(
            "AI service answered: answer_len={}, sources={}, confidence={:?}",
            answer.answer.len(),
            answer.sources.len(),
            answer.confidence
        );

        Ok(answer)
    }

    async fn invalidate_cache(&self, class_id: Uuid) -> Result<(), AiServiceError> {
        let response = self
            .client
            .post(self.url(&format!("/invalidate-cache/{class_id}")))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiServiceError::Status {
                status: status.as_u16(),
                detail: error_detail(&body),
            });
        }
        Ok(())
    }

    async fn health(&self) -> Result<Value, AiServiceError> {
        let response = self
            .client
            .get(self.url("/health"))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AiServiceError::Status {
                status: status.as_u16(),
                detail: error_detail(&body),
            });
        }
        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Error bodies are free text or JSON with a `detail` field.
fn error_detail(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => match map.get("detail") {
            Some(Value::String(detail)) => detail.clone(),
            Some(other) => other.to_string(),
            None => body.to_string(),
        },
        _ => body.to_string(),
    }
}
