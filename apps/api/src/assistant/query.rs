//! Class-scoped question answering.
//!
//! Every outcome becomes an `AiQueryResult` value: preconditions, transport
//! failures and remote errors alike. Nothing is retried here; the user
//! resubmits from the chat surface.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::ai_client::{AiAnswer, AiServiceError, QueryRequest, SourceCitation};
use crate::errors::AppError;
use crate::state::AppState;

pub const MAX_QUESTION_CHARS: usize = 4000;
/// How much of a remote error detail is echoed back to the user.
pub const ERROR_DETAIL_CHARS: usize = 100;

pub const NO_DOCUMENTS_MESSAGE: &str =
    "No documents found for this class. Please upload some study materials first.";
pub const CLASS_NOT_FOUND_MESSAGE: &str = "Class not found or you do not have access to it";
pub const INDEXING_TIMEOUT_MESSAGE: &str = "The AI is taking longer than expected to process \
    your documents. This usually happens on the first query when documents are being indexed. \
    Please wait a moment and try again - subsequent queries will be much faster.";
pub const UNREACHABLE_MESSAGE: &str =
    "Unable to connect to AI service. Please make sure the AI service is running.";
pub const INDEX_MISSING_MESSAGE: &str = "No documents found in the AI index. This might be the \
    first query - please wait while we index your documents and try again.";
pub const INVALID_CLASS_MESSAGE: &str = "Invalid class ID. Please try refreshing the page.";

/// Normalized envelope returned for every question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AiQueryResult {
    pub success: bool,
    pub answer: String,
    pub sources: Vec<SourceCitation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AiQueryResult {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            answer: String::new(),
            sources: Vec::new(),
            confidence: None,
            class_name: None,
            error: Some(message.into()),
        }
    }

    pub fn answered(answer: AiAnswer, class_name: Option<String>) -> Self {
        Self {
            success: true,
            answer: answer.answer,
            sources: answer.sources,
            confidence: answer.confidence,
            class_name,
            error: None,
        }
    }
}

/// Maps a gateway failure to the advisory text shown to the user.
pub fn classify_failure(error: &AiServiceError) -> String {
    match error {
        AiServiceError::Timeout => INDEXING_TIMEOUT_MESSAGE.to_string(),
        AiServiceError::Unreachable(_) => UNREACHABLE_MESSAGE.to_string(),
        AiServiceError::Status { status: 404, .. } => INDEX_MISSING_MESSAGE.to_string(),
        AiServiceError::Status {
            status: 500,
            detail,
        } => {
            if detail.contains("no rows returned") {
                NO_DOCUMENTS_MESSAGE.to_string()
            } else if detail.contains("invalid input syntax") || detail.contains("uuid") {
                INVALID_CLASS_MESSAGE.to_string()
            } else {
                format!("AI service error: {}", truncate(detail, ERROR_DETAIL_CHARS))
            }
        }
        AiServiceError::Status { status, detail } => format!(
            "Unexpected error ({status}): {}",
            truncate(detail, ERROR_DETAIL_CHARS)
        ),
        AiServiceError::Decode(msg) | AiServiceError::Http(msg) => {
            format!("An unexpected error occurred: {msg}")
        }
    }
}

/// Blank or oversized questions never leave the service.
pub fn validate_question(question: &str) -> Result<&str, String> {
    let question = question.trim();
    if question.is_empty() {
        return Err("Please enter a question.".to_string());
    }
    if question.chars().count() > MAX_QUESTION_CHARS {
        return Err(format!(
            "Questions must be at most {MAX_QUESTION_CHARS} characters."
        ));
    }
    Ok(question)
}

pub async fn ask_class(
    state: &AppState,
    user_id: Uuid,
    class_id: Uuid,
    question: &str,
) -> Result<AiQueryResult, AppError> {
    let question = match validate_question(question) {
        Ok(q) => q,
        Err(message) => return Ok(AiQueryResult::failure(message)),
    };

    let Some(class) = state.classes.find_class(class_id).await? else {
        return Ok(AiQueryResult::failure(CLASS_NOT_FOUND_MESSAGE));
    };

    if state.documents.count_class_documents(class_id).await? == 0 {
        info!("Class {class_id} has no documents, skipping AI query");
        return Ok(AiQueryResult::failure(NO_DOCUMENTS_MESSAGE));
    }

    let request = QueryRequest {
        class_id,
        question: question.to_string(),
        user_id,
    };

    match state.ai.query(&request).await {
        Ok(answer) => {
            info!(
                "AI answered for class {class_id}: sources={}, confidence={:?}",
                answer.sources.len(),
                answer.confidence
            );
            Ok(AiQueryResult::answered(answer, Some(class.name)))
        }
        Err(e) => {
            warn!("AI query for class {class_id} failed: {e}");
            Ok(AiQueryResult::failure(classify_failure(&e)))
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeAiGateway, TestHarness};

    fn status(status: u16, detail: &str) -> AiServiceError {
        AiServiceError::Status {
            status,
            detail: detail.to_string(),
        }
    }

    #[test]
    fn test_timeout_maps_to_indexing_advisory() {
        assert_eq!(
            classify_failure(&AiServiceError::Timeout),
            INDEXING_TIMEOUT_MESSAGE
        );
    }

    #[test]
    fn test_unreachable_maps_to_service_down() {
        assert_eq!(
            classify_failure(&AiServiceError::Unreachable("refused".into())),
            UNREACHABLE_MESSAGE
        );
    }

    #[test]
    fn test_404_maps_to_index_missing() {
        assert_eq!(classify_failure(&status(404, "")), INDEX_MISSING_MESSAGE);
    }

    #[test]
    fn test_500_no_rows() {
        assert_eq!(
            classify_failure(&status(500, "query failed: no rows returned")),
            NO_DOCUMENTS_MESSAGE
        );
    }

    #[test]
    fn test_500_uuid() {
        assert_eq!(
            classify_failure(&status(500, "bad uuid: c1")),
            INVALID_CLASS_MESSAGE
        );
        assert_eq!(
            classify_failure(&status(500, "invalid input syntax for type")),
            INVALID_CLASS_MESSAGE
        );
    }

    #[test]
    fn test_other_500_is_truncated() {
        let detail = "e".repeat(250);
        let message = classify_failure(&status(500, &detail));
        assert_eq!(message, format!("AI service error: {}", "e".repeat(100)));
    }

    #[test]
    fn test_other_status_is_generic() {
        let message = classify_failure(&status(503, "overloaded"));
        assert_eq!(message, "Unexpected error (503): overloaded");
    }

    #[test]
    fn test_truncate_counts_chars_not_bytes() {
        assert_eq!(truncate("ééé", 2), "éé");
    }

    #[test]
    fn test_validate_question() {
        assert!(validate_question("   ").is_err());
        assert!(validate_question(&"q".repeat(MAX_QUESTION_CHARS + 1)).is_err());
        assert_eq!(validate_question("  why?  ").unwrap(), "why?");
    }

    #[tokio::test]
    async fn test_zero_documents_skips_network_call() {
        let h = TestHarness::new();
        let professor = h.store.add_profile("professor");
        let class = h.store.add_class(professor, "Empty", "EMPTY1");

        let result = ask_class(&h.state, professor, class.id, "Anything?")
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some(NO_DOCUMENTS_MESSAGE));
        assert_eq!(h.ai.query_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_class_skips_network_call() {
        let h = TestHarness::new();
        let user = h.store.add_profile("student");

        let result = ask_class(&h.state, user, Uuid::new_v4(), "Anything?")
            .await
            .unwrap();

        assert_eq!(result.error.as_deref(), Some(CLASS_NOT_FOUND_MESSAGE));
        assert_eq!(h.ai.query_count(), 0);
    }

    #[tokio::test]
    async fn test_timeout_result_has_empty_answer() {
        let h = TestHarness::with_gateway(FakeAiGateway::failing(AiServiceError::Timeout));
        let professor = h.store.add_profile("professor");
        let class = h.store.add_class(professor, "Algorithms", "ALG101");
        h.store.add_document(class.id, professor, "notes");

        let result = ask_class(&h.state, professor, class.id, "What is recursion?")
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.answer.is_empty());
        assert!(result.sources.is_empty());
        assert_eq!(result.error.as_deref(), Some(INDEXING_TIMEOUT_MESSAGE));
        assert_eq!(h.ai.query_count(), 1);
    }

    #[tokio::test]
    async fn test_success_passes_answer_through() {
        let h = TestHarness::with_gateway(FakeAiGateway::replying(Ok(AiAnswer {
            answer: "Recursion is...".to_string(),
            sources: vec![SourceCitation {
                file_name: "notes.pdf".to_string(),
                page: Some(3),
                relevance_score: None,
            }],
            confidence: Some(0.82),
        })));
        let professor = h.store.add_profile("professor");
        let class = h.store.add_class(professor, "Algorithms", "ALG102");
        h.store.add_document(class.id, professor, "notes");

        let result = ask_class(&h.state, professor, class.id, "  What is recursion?  ")
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.answer, "Recursion is...");
        assert_eq!(result.sources.len(), 1);
        assert_eq!(result.confidence, Some(0.82));
        assert_eq!(result.class_name.as_deref(), Some("Algorithms"));

        let sent = h.ai.queries();
        assert_eq!(sent[0].question, "What is recursion?");
        assert_eq!(sent[0].class_id, class.id);
        assert_eq!(sent[0].user_id, professor);
    }
}
