//! Chat surface state machine.
//!
//! One `ChatSession` per open assistant panel. A turn is two explicit steps:
//! `begin` appends the user's message and hands out a `PendingTurn`, and
//! `resolve` consumes that token to append exactly one reply. Because the
//! token cannot be cloned and `begin` refuses while a turn is pending, a
//! session never has two questions in flight and every question gets one
//! answer. The log is append-only; only `clear` empties it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::ai_client::SourceCitation;
use crate::assistant::query::AiQueryResult;

/// Marker prepended to assistant messages that report a failure.
pub const ERROR_MARKER: &str = "❌";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatState {
    Idle,
    Loading,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: ChatRole,
    pub content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceCitation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub is_error: bool,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    fn new(role: ChatRole, content: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content,
            sources: Vec::new(),
            confidence: None,
            is_error: false,
            created_at: Utc::now(),
        }
    }

    /// Confidence as a whole percentage, e.g. `82%`.
    pub fn confidence_label(&self) -> Option<String> {
        self.confidence.map(|c| format!("{:.0}%", c * 100.0))
    }

    /// Sources as flat annotations: `notes.pdf (p. 3)`.
    pub fn source_annotations(&self) -> Vec<String> {
        self.sources
            .iter()
            .map(|s| match s.page {
                Some(page) => format!("{} (p. {page})", s.file_name),
                None => s.file_name.clone(),
            })
            .collect()
    }
}

/// Proof that a question is outstanding. Consumed by `ChatSession::resolve`.
#[derive(Debug)]
#[must_use = "a pending turn must be resolved to return the session to idle"]
pub struct PendingTurn {
    session_id: Uuid,
    class_id: Uuid,
    question: String,
}

impl PendingTurn {
    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn class_id(&self) -> Uuid {
        self.class_id
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatSession {
    id: Uuid,
    class_id: Uuid,
    owner_id: Uuid,
    class_name: Option<String>,
    state: ChatState,
    messages: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new(class_id: Uuid, owner_id: Uuid, class_name: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            class_id,
            owner_id,
            class_name,
            state: ChatState::Idle,
            messages: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn owner_id(&self) -> Uuid {
        self.owner_id
    }

    pub fn state(&self) -> ChatState {
        self.state
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Appends the user's message and enters `Loading`. Returns `None`, leaving
    /// the log untouched, for blank input or while another turn is pending.
    pub fn begin(&mut self, question: &str) -> Option<PendingTurn> {
        let question = question.trim();
        if question.is_empty() || self.state == ChatState::Loading {
            return None;
        }

        self.messages
            .push(ChatMessage::new(ChatRole::User, question.to_string()));
        self.state = ChatState::Loading;

        Some(PendingTurn {
            session_id: self.id,
            class_id: self.class_id,
            question: question.to_string(),
        })
    }

    /// Appends the single reply for `turn` and returns to `Idle`.
    /// Returns `None` if the token belongs to another session.
    pub fn resolve(&mut self, turn: PendingTurn, result: AiQueryResult) -> Option<&ChatMessage> {
        if turn.session_id != self.id || self.state != ChatState::Loading {
            return None;
        }

        let message = if result.success {
            let mut message = ChatMessage::new(ChatRole::Assistant, result.answer);
            message.sources = result.sources;
            message.confidence = result.confidence;
            message
        } else {
            let reason = result
                .error
                .unwrap_or_else(|| "The AI service returned no answer.".to_string());
            let mut message =
                ChatMessage::new(ChatRole::Assistant, format!("{ERROR_MARKER} {reason}"));
            message.is_error = true;
            message
        };

        self.messages.push(message);
        self.state = ChatState::Idle;
        self.messages.last()
    }

    /// Empties the log. Refused while a turn is pending so its reply cannot
    /// land in a fresh conversation.
    pub fn clear(&mut self) -> bool {
        if self.state == ChatState::Loading {
            return false;
        }
        self.messages.clear();
        true
    }
}
