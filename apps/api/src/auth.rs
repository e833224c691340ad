use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::profile::Role;
use crate::state::AppState;

/// Header set by the upstream auth gateway once the session is verified.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller. Rejects the request with 401 before any work if
/// the identity header is missing or malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: Uuid,
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .map(|id| CurrentUser { id })
            .ok_or(AppError::Unauthorized)
    }
}

/// Looks up the caller's role. Users without a profile row are students.
pub async fn role_of(state: &AppState, user_id: Uuid) -> Result<Role, AppError> {
    Ok(state
        .profiles
        .find_profile(user_id)
        .await?
        .map(|p| p.role())
        .unwrap_or(Role::Student))
}
