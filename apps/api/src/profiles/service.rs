use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::profile::Profile;
use crate::state::AppState;

/// The caller's profile. Users who never saved one get an empty profile
/// carrying just their id, which reads as a student.
pub async fn get_current_profile(state: &AppState, user_id: Uuid) -> Result<Profile, AppError> {
    let profile = state.profiles.find_profile(user_id).await?;
    Ok(profile.unwrap_or(Profile {
        id: user_id,
        full_name: None,
        username: None,
        email: None,
        role: None,
    }))
}

pub async fn update_profile(
    state: &AppState,
    user_id: Uuid,
    username: &str,
    full_name: &str,
) -> Result<Profile, AppError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AppError::Validation("Username is required".to_string()));
    }
    let full_name = full_name.trim();
    if full_name.is_empty() {
        return Err(AppError::Validation("Full name is required".to_string()));
    }

    let profile = state
        .profiles
        .upsert_profile(user_id, username, full_name)
        .await?;
    info!("User {user_id} updated their profile");
    Ok(profile)
}
