use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::classes::service::{self, ClassDetail};
use crate::errors::AppError;
use crate::models::class::{ClassRow, ClassSummary};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateClassRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct CreateClassResponse {
    pub success: bool,
    pub class: ClassRow,
}

#[derive(Debug, Deserialize)]
pub struct SystemPromptRequest {
    pub system_prompt: String,
}

#[derive(Debug, Serialize)]
pub struct SystemPromptResponse {
    pub success: bool,
    pub system_prompt: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Ack {
    pub success: bool,
}

/// POST /api/v1/classes
pub async fn handle_create_class(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreateClassRequest>,
) -> Result<Json<CreateClassResponse>, AppError> {
    let class = service::create_class(&state, user.id, &req.name).await?;
    Ok(Json(CreateClassResponse {
        success: true,
        class,
    }))
}

/// GET /api/v1/classes
pub async fn handle_list_classes(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<ClassSummary>>, AppError> {
    Ok(Json(service::list_classes(&state, user.id).await?))
}

/// GET /api/v1/classes/:id
pub async fn handle_get_class(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(class_id): Path<Uuid>,
) -> Result<Json<ClassDetail>, AppError> {
    Ok(Json(service::get_class(&state, class_id).await?))
}

/// DELETE /api/v1/classes/:id
pub async fn handle_delete_class(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(class_id): Path<Uuid>,
) -> Result<Json<Ack>, AppError> {
    service::delete_class(&state, user.id, class_id).await?;
    Ok(Json(Ack { success: true }))
}

/// GET /api/v1/classes/:id/system-prompt
pub async fn handle_get_system_prompt(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(class_id): Path<Uuid>,
) -> Result<Json<SystemPromptResponse>, AppError> {
    let system_prompt = service::get_system_prompt(&state, user.id, class_id).await?;
    Ok(Json(SystemPromptResponse {
        success: true,
        system_prompt,
    }))
}

/// PUT /api/v1/classes/:id/system-prompt
pub async fn handle_update_system_prompt(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(class_id): Path<Uuid>,
    Json(req): Json<SystemPromptRequest>,
) -> Result<Json<SystemPromptResponse>, AppError> {
    let system_prompt =
        service::update_system_prompt(&state, user.id, class_id, &req.system_prompt).await?;
    Ok(Json(SystemPromptResponse {
        success: true,
        system_prompt,
    }))
}
