use axum::{extract::State, Json};

use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::state::AppState;
use crate::ui_state::{UiAction, UiPreferences};

/// GET /api/v1/ui/preferences
pub async fn handle_get_preferences(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<UiPreferences>, AppError> {
    Ok(Json(state.ui.preferences(user.id).await))
}

/// POST /api/v1/ui/actions
pub async fn handle_dispatch(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(action): Json<UiAction>,
) -> Result<Json<UiPreferences>, AppError> {
    Ok(Json(state.ui.dispatch(user.id, action).await))
}
