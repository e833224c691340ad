//! Document upload, listing and deletion.
//!
//! A document row only exists alongside its stored bytes: the bytes go to
//! object storage first, and if the row insert then fails the stored object is
//! removed again. Deletion is not atomic: a storage failure is logged and the
//! row is deleted anyway.

use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::classes::service::find_class;
use crate::errors::AppError;
use crate::models::document::{DocumentDetails, NewDocument};
use crate::state::AppState;

pub const ALLOWED_FILE_TYPES: &[&str] = &["pdf", "pptx", "docx", "png", "jpg", "jpeg", "xlsx"];

pub const DOWNLOAD_URL_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Default)]
pub struct UploadRequest {
    pub class_id: Option<Uuid>,
    pub title: Option<String>,
    pub file_name: Option<String>,
    pub bytes: Bytes,
}

#[derive(Debug, Serialize)]
pub struct UploadedDocument {
    pub id: Uuid,
    pub title: String,
    pub file_type: String,
    pub storage_path: String,
}

/// Lower-cased text after the last `.`; a name without a dot yields itself.
pub fn file_extension(file_name: &str) -> String {
    file_name
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// Replaces every character outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_file_name(file_name: &str) -> String {
    file_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `{user_id}/{class_id}/{unix_millis}_{sanitized_filename}`
pub fn storage_path(user_id: Uuid, class_id: Uuid, unix_millis: i64, file_name: &str) -> String {
    format!(
        "{user_id}/{class_id}/{unix_millis}_{}",
        sanitize_file_name(file_name)
    )
}

pub fn content_type_for(file_type: &str) -> &'static str {
    match file_type {
        "pdf" => "application/pdf",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
}

pub async fn upload_document(
    state: &AppState,
    user_id: Uuid,
    request: UploadRequest,
) -> Result<UploadedDocument, AppError> {
    let file_name = request
        .file_name
        .filter(|n| !n.is_empty() && !request.bytes.is_empty())
        .ok_or_else(|| AppError::Validation("No file provided".to_string()))?;
    let title = request
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Validation("Title is required".to_string()))?;
    let class_id = request
        .class_id
        .ok_or_else(|| AppError::Validation("Class ID is required".to_string()))?;

    let file_type = file_extension(&file_name);
    if !ALLOWED_FILE_TYPES.contains(&file_type.as_str()) {
        return Err(AppError::Validation(format!(
            "File type .{file_type} not allowed. Allowed types: {}",
            ALLOWED_FILE_TYPES.join(", ")
        )));
    }

    find_class(state, class_id).await?;

    let path = storage_path(user_id, class_id, Utc::now().timestamp_millis(), &file_name);
    let file_size = request.bytes.len() as i64;

    state
        .blobs
        .put(&path, request.bytes, content_type_for(&file_type))
        .await
        .map_err(|e| {
            error!("Storage upload failed for {path}: {e}");
            AppError::Storage(format!("Upload failed: {}", e.user_message()))
        })?;

    let inserted = state
        .documents
        .insert_document(NewDocument {
            user_id,
            title,
            file_type,
            file_size,
            storage_path: path.clone(),
            class_id,
        })
        .await;

    let document = match inserted {
        Ok(document) => document,
        Err(e) => {
            // Compensate: the row never landed, so the bytes must not linger.
            if let Err(cleanup) = state.blobs.remove(&path).await {
                error!("Failed to roll back stored object {path}: {cleanup}");
            }
            error!("Document insert failed, upload rolled back: {e}");
            return Err(e);
        }
    };

    info!(
        "Document {} uploaded by {} to class {}",
        document.id, user_id, class_id
    );
    state.invalidator.notify(class_id);

    Ok(UploadedDocument {
        id: document.id,
        title: document.title,
        file_type: document.file_type,
        storage_path: document.storage_path,
    })
}

pub async fn delete_document(
    state: &AppState,
    user_id: Uuid,
    document_id: Uuid,
) -> Result<(), AppError> {
    let document = state
        .documents
        .find_document(document_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Document not found".to_string()))?;

    if document.user_id != user_id {
        return Err(AppError::Forbidden(
            "Not authorized to delete this document".to_string(),
        ));
    }

    if let Err(e) = state.blobs.remove(&document.storage_path).await {
        warn!(
            "Storage delete failed for {}, removing row anyway: {e}",
            document.storage_path
        );
    }

    state.documents.delete_document(document_id).await?;
    info!("Document {document_id} deleted by {user_id}");

    if let Some(class_id) = document.class_id {
        state.invalidator.notify(class_id);
    }
    Ok(())
}

pub async fn list_class_documents(
    state: &AppState,
    class_id: Uuid,
) -> Result<Vec<DocumentDetails>, AppError> {
    state.documents.list_class_documents(class_id).await
}

pub async fn list_my_documents(
    state: &AppState,
    user_id: Uuid,
) -> Result<Vec<DocumentDetails>, AppError> {
    state.documents.list_user_documents(user_id).await
}

pub async fn download_url(state: &AppState, document_id: Uuid) -> Result<String, AppError> {
    let document = state
        .documents
        .find_document(document_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Document not found".to_string()))?;
    state
        .blobs
        .presigned_url(&document.storage_path, DOWNLOAD_URL_TTL)
        .await
}
