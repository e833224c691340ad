use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::assistant::chat::ChatSession;
use crate::assistant::query::{self, AiQueryResult};
use crate::auth::CurrentUser;
use crate::classes::service::find_class;
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct Ack {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct AiHealthResponse {
    pub reachable: bool,
    pub service_url: String,
    pub query_timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// POST /api/v1/classes/:id/ask
/// Always answers 200 with an `AiQueryResult`; failures are carried in the body.
pub async fn handle_ask(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(class_id): Path<Uuid>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AiQueryResult>, AppError> {
    let result = match query::ask_class(&state, user.id, class_id, &req.question).await {
        Ok(result) => result,
        Err(e) => {
            warn!("Question for class {class_id} failed before reaching the AI service: {e}");
            AiQueryResult::failure(format!("Failed to get AI response: {}", e.user_message()))
        }
    };
    Ok(Json(result))
}

/// POST /api/v1/classes/:id/reindex
pub async fn handle_reindex(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(class_id): Path<Uuid>,
) -> Result<Json<Ack>, AppError> {
    find_class(&state, class_id).await?;
    let success = state.invalidator.invalidate(class_id).await.is_ok();
    Ok(Json(Ack { success }))
}

/// POST /api/v1/classes/:id/chat
pub async fn handle_open_chat(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(class_id): Path<Uuid>,
) -> Result<Json<ChatSession>, AppError> {
    Ok(Json(state.chats.create(&state, user.id, class_id).await?))
}

/// GET /api/v1/chat
pub async fn handle_list_chats(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Json<Vec<ChatSession>> {
    Json(state.chats.list(user.id).await)
}

/// GET /api/v1/chat/:id
pub async fn handle_get_chat(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(session_id): Path<Uuid>,
) -> Result<Json<ChatSession>, AppError> {
    Ok(Json(state.chats.snapshot(session_id, user.id).await?))
}

/// POST /api/v1/chat/:id/messages
pub async fn handle_send_message(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(session_id): Path<Uuid>,
    Json(req): Json<AskRequest>,
) -> Result<Json<ChatSession>, AppError> {
    let session = state
        .chats
        .ask(&state, session_id, user.id, &req.question)
        .await?;
    Ok(Json(session))
}

/// DELETE /api/v1/chat/:id/messages
pub async fn handle_clear_chat(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(session_id): Path<Uuid>,
) -> Result<Json<ChatSession>, AppError> {
    Ok(Json(state.chats.clear(session_id, user.id).await?))
}

/// DELETE /api/v1/chat/:id
pub async fn handle_close_chat(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Ack>, AppError> {
    state.chats.remove(session_id, user.id).await?;
    Ok(Json(Ack { success: true }))
}

/// GET /api/v1/ai/health
pub async fn handle_ai_health(State(state): State<AppState>) -> Json<AiHealthResponse> {
    let service_url = state.ai.base_url().to_string();
    let query_timeout_secs = state.config.ai_query_timeout.as_secs();
    let response = match state.ai.health().await {
        Ok(details) => AiHealthResponse {
            reachable: true,
            service_url,
            query_timeout_secs,
            details: Some(details),
            error: None,
        },
        Err(e) => AiHealthResponse {
            reachable: false,
            service_url,
            query_timeout_secs,
            details: None,
            error: Some(e.to_string()),
        },
    };
    Json(response)
}
