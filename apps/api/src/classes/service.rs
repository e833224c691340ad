use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::role_of;
use crate::errors::AppError;
use crate::models::class::{ClassRow, ClassSummary, NewClass, MAX_SYSTEM_PROMPT_CHARS};
use crate::models::profile::Role;
use crate::state::AppState;

pub const CLASS_CODE_LEN: usize = 6;
const CODE_ATTEMPTS: usize = 3;

#[derive(Debug, Serialize)]
pub struct ClassDetail {
    #[serde(flatten)]
    pub class: ClassRow,
    pub document_count: i64,
}

/// Short, human-shareable join code: upper-case hex from a fresh UUID.
pub fn generate_class_code() -> String {
    Uuid::new_v4().simple().to_string()[..CLASS_CODE_LEN].to_uppercase()
}

/// Join codes are matched exactly after trimming and upper-casing.
pub fn normalize_class_code(code: &str) -> String {
    code.trim().to_uppercase()
}

pub async fn create_class(
    state: &AppState,
    user_id: Uuid,
    name: &str,
) -> Result<ClassRow, AppError> {
    if role_of(state, user_id).await? != Role::Professor {
        return Err(AppError::Forbidden(
            "Only professors can create classes".to_string(),
        ));
    }

    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Class name is required".to_string()));
    }

    let mut last_error = None;
    for _ in 0..CODE_ATTEMPTS {
        let new_class = NewClass {
            name: name.to_string(),
            code: generate_class_code(),
            owner_id: user_id,
        };
        match state.classes.insert_class(new_class).await {
            Ok(row) => return Ok(row),
            Err(AppError::Conflict(msg)) => {
                warn!("Class code collision for {name:?}, regenerating");
                last_error = Some(AppError::Conflict(msg));
            }
            Err(other) => return Err(other),
        }
    }
    Err(last_error.unwrap_or_else(|| AppError::Conflict("Could not allocate a class code".into())))
}

/// Students see the classes they are enrolled in; professors see every class.
pub async fn list_classes(state: &AppState, user_id: Uuid) -> Result<Vec<ClassSummary>, AppError> {
    match role_of(state, user_id).await? {
        Role::Student => state.classes.list_enrolled_classes(user_id).await,
        Role::Professor => state.classes.list_classes().await,
    }
}

pub async fn get_class(state: &AppState, class_id: Uuid) -> Result<ClassDetail, AppError> {
    let class = find_class(state, class_id).await?;
    let document_count = state.documents.count_class_documents(class_id).await?;
    Ok(ClassDetail {
        class,
        document_count,
    })
}

pub async fn delete_class(state: &AppState, user_id: Uuid, class_id: Uuid) -> Result<(), AppError> {
    require_owner(state, user_id, class_id, "Only the class owner can delete this class").await?;
    state.classes.delete_class(class_id).await?;
    info!("Class {class_id} deleted by {user_id}");
    Ok(())
}

pub async fn get_system_prompt(
    state: &AppState,
    user_id: Uuid,
    class_id: Uuid,
) -> Result<Option<String>, AppError> {
    let class = require_owner(
        state,
        user_id,
        class_id,
        "Only the class owner can view the system prompt",
    )
    .await?;
    Ok(class.system_prompt)
}

/// Empty (or whitespace-only) text clears the prompt.
pub async fn update_system_prompt(
    state: &AppState,
    user_id: Uuid,
    class_id: Uuid,
    system_prompt: &str,
) -> Result<Option<String>, AppError> {
    if system_prompt.chars().count() > MAX_SYSTEM_PROMPT_CHARS {
        return Err(AppError::Validation(format!(
            "System prompt must be at most {MAX_SYSTEM_PROMPT_CHARS} characters"
        )));
    }

    require_owner(
        state,
        user_id,
        class_id,
        "Only the class owner can update the system prompt",
    )
    .await?;

    let value = Some(system_prompt.trim()).filter(|s| !s.is_empty());
    state.classes.update_system_prompt(class_id, value).await?;
    info!("Updated system prompt for class {class_id}");
    Ok(value.map(str::to_string))
}

pub async fn find_class(state: &AppState, class_id: Uuid) -> Result<ClassRow, AppError> {
    state
        .classes
        .find_class(class_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Class {class_id} not found")))
}

async fn require_owner(
    state: &AppState,
    user_id: Uuid,
    class_id: Uuid,
    denial: &str,
) -> Result<ClassRow, AppError> {
    let class = find_class(state, class_id).await?;
    if class.owner_id != user_id {
        return Err(AppError::Forbidden(denial.to_string()));
    }
    Ok(class)
}
