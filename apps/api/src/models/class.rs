use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Maximum length, in characters, of a class's custom instruction text.
pub const MAX_SYSTEM_PROMPT_CHARS: usize = 2000;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ClassRow {
    pub id: Uuid,
    pub name: String,
    pub code: Option<String>,
    pub owner_id: Uuid,
    pub system_prompt: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A class as shown in listings, with its dependent-record counts.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ClassSummary {
    pub id: Uuid,
    pub name: String,
    pub code: Option<String>,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub document_count: i64,
    pub enrollment_count: i64,
}

#[derive(Debug, Clone)]
pub struct NewClass {
    pub name: String,
    pub code: String,
    pub owner_id: Uuid,
}
