use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::enrollments::service;
use crate::errors::AppError;
use crate::models::enrollment::RosterEntry;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct JoinByCodeRequest {
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct JoinResponse {
    pub success: bool,
    pub class_id: Uuid,
    pub class_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EnrollmentStatus {
    pub enrolled: bool,
    pub enrollment_count: i64,
}

/// POST /api/v1/classes/:id/enroll
pub async fn handle_enroll(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(class_id): Path<Uuid>,
) -> Result<Json<JoinResponse>, AppError> {
    let row = service::enroll(&state, user.id, class_id).await?;
    Ok(Json(JoinResponse {
        success: true,
        class_id: row.class_id,
        class_name: None,
    }))
}

/// POST /api/v1/classes/join
pub async fn handle_join_by_code(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<JoinByCodeRequest>,
) -> Result<Json<JoinResponse>, AppError> {
    let joined = service::enroll_by_code(&state, user.id, &req.code).await?;
    Ok(Json(JoinResponse {
        success: true,
        class_id: joined.class_id,
        class_name: Some(joined.class_name),
    }))
}

/// GET /api/v1/classes/:id/students
pub async fn handle_list_students(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(class_id): Path<Uuid>,
) -> Result<Json<Vec<RosterEntry>>, AppError> {
    Ok(Json(service::list_students(&state, user.id, class_id).await?))
}

/// GET /api/v1/classes/:id/enrollment
pub async fn handle_enrollment_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(class_id): Path<Uuid>,
) -> Result<Json<EnrollmentStatus>, AppError> {
    let enrolled = service::is_enrolled(&state, user.id, class_id).await?;
    let enrollment_count = service::enrollment_count(&state, class_id).await?;
    Ok(Json(EnrollmentStatus {
        enrolled,
        enrollment_count,
    }))
}
