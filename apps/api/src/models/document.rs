use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DocumentRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub file_type: String,
    pub file_size: i64,
    pub storage_path: String,
    pub class_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A document joined with its class name and owner display fields, for feeds.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DocumentDetails {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub file_type: String,
    pub file_size: i64,
    pub storage_path: String,
    pub class_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub class_name: Option<String>,
    pub owner_name: Option<String>,
    pub owner_username: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewDocument {
    pub user_id: Uuid,
    pub title: String,
    pub file_type: String,
    pub file_size: i64,
    pub storage_path: String,
    pub class_id: Uuid,
}
