use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::documents::service::{self, UploadRequest, UploadedDocument};
use crate::errors::AppError;
use crate::models::document::DocumentDetails;
use crate::state::AppState;

/// Upper bound on a multipart upload body.
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub document: UploadedDocument,
}

#[derive(Debug, Serialize)]
pub struct DownloadUrlResponse {
    pub url: String,
    pub expires_in_secs: u64,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
}

/// POST /api/v1/documents (multipart: `file`, `title`, `class_id`)
pub async fn handle_upload(
    State(state): State<AppState>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut request = UploadRequest::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed upload: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                request.file_name = field.file_name().map(str::to_string);
                request.bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read file: {e}")))?;
            }
            Some("title") => {
                request.title = Some(read_text(field).await?);
            }
            Some("class_id") | Some("classId") => {
                let raw = read_text(field).await?;
                let class_id = Uuid::parse_str(raw.trim())
                    .map_err(|_| AppError::Validation("Invalid class ID".to_string()))?;
                request.class_id = Some(class_id);
            }
            _ => {}
        }
    }

    let document = service::upload_document(&state, user.id, request).await?;
    Ok(Json(UploadResponse {
        success: true,
        document,
    }))
}

/// GET /api/v1/documents
pub async fn handle_list_my_documents(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<DocumentDetails>>, AppError> {
    Ok(Json(service::list_my_documents(&state, user.id).await?))
}

/// GET /api/v1/classes/:id/documents
pub async fn handle_list_class_documents(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(class_id): Path<Uuid>,
) -> Result<Json<Vec<DocumentDetails>>, AppError> {
    Ok(Json(service::list_class_documents(&state, class_id).await?))
}

/// GET /api/v1/documents/:id/download
pub async fn handle_download_url(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(document_id): Path<Uuid>,
) -> Result<Json<DownloadUrlResponse>, AppError> {
    let url = service::download_url(&state, document_id).await?;
    Ok(Json(DownloadUrlResponse {
        url,
        expires_in_secs: service::DOWNLOAD_URL_TTL.as_secs(),
    }))
}

/// DELETE /api/v1/documents/:id
pub async fn handle_delete_document(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(document_id): Path<Uuid>,
) -> Result<Json<DeleteResponse>, AppError> {
    service::delete_document(&state, user.id, document_id).await?;
    Ok(Json(DeleteResponse { success: true }))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed upload field: {e}")))
}
