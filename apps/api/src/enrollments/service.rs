//! Self-service enrollment, either directly by class id or by presenting a join code.
//!
//! Both paths check for an existing (class, user) row first so the common case
//! gets a friendly message. The table's primary key is what actually prevents
//! duplicates: a concurrent join that slips past the check surfaces as the same
//! conflict from `EnrollmentStore::insert_enrollment`.

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::role_of;
use crate::classes::service::{find_class, normalize_class_code};
use crate::errors::AppError;
use crate::models::enrollment::{EnrollmentRow, RosterEntry};
use crate::models::profile::Role;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct JoinedClass {
    pub class_id: Uuid,
    pub class_name: String,
}

pub async fn enroll(
    state: &AppState,
    user_id: Uuid,
    class_id: Uuid,
) -> Result<EnrollmentRow, AppError> {
    find_class(state, class_id).await?;
    insert_once(state, class_id, user_id, "Already enrolled in this class").await
}

pub async fn enroll_by_code(
    state: &AppState,
    user_id: Uuid,
    code: &str,
) -> Result<JoinedClass, AppError> {
    let code = normalize_class_code(code);
    if code.is_empty() {
        return Err(AppError::Validation("Invalid class code".to_string()));
    }

    let class = state
        .classes
        .find_class_by_code(&code)
        .await?
        .ok_or_else(|| AppError::NotFound("Invalid class code".to_string()))?;

    insert_once(
        state,
        class.id,
        user_id,
        "You are already enrolled in this class",
    )
    .await?;

    Ok(JoinedClass {
        class_id: class.id,
        class_name: class.name,
    })
}

/// Professors only; everyone else gets an empty roster.
pub async fn list_students(
    state: &AppState,
    user_id: Uuid,
    class_id: Uuid,
) -> Result<Vec<RosterEntry>, AppError> {
    if role_of(state, user_id).await? != Role::Professor {
        return Ok(Vec::new());
    }
    state.enrollments.list_roster(class_id).await
}

pub async fn enrollment_count(state: &AppState, class_id: Uuid) -> Result<i64, AppError> {
    state.enrollments.count_enrollments(class_id).await
}

pub async fn is_enrolled(state: &AppState, user_id: Uuid, class_id: Uuid) -> Result<bool, AppError> {
    Ok(state
        .enrollments
        .find_enrollment(class_id, user_id)
        .await?
        .is_some())
}

async fn insert_once(
    state: &AppState,
    class_id: Uuid,
    user_id: Uuid,
    already_enrolled: &str,
) -> Result<EnrollmentRow, AppError> {
    if state
        .enrollments
        .find_enrollment(class_id, user_id)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict(already_enrolled.to_string()));
    }

    let row = state
        .enrollments
        .insert_enrollment(class_id, user_id)
        .await
        .map_err(|e| match e {
            AppError::Conflict(_) => AppError::Conflict(already_enrolled.to_string()),
            other => other,
        })?;

    info!("User {user_id} enrolled in class {class_id}");
    Ok(row)
}
