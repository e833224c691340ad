pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::assistant::handlers as assistant;
use crate::classes::handlers as classes;
use crate::documents::handlers as documents;
use crate::enrollments::handlers as enrollments;
use crate::profiles::handlers as profiles;
use crate::state::AppState;
use crate::ui_state::handlers as ui;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Profile
        .route(
            "/api/v1/profile",
            get(profiles::handle_get_profile).put(profiles::handle_update_profile),
        )
        // Classes
        .route(
            "/api/v1/classes",
            get(classes::handle_list_classes).post(classes::handle_create_class),
        )
        .route("/api/v1/classes/join", post(enrollments::handle_join_by_code))
        .route(
            "/api/v1/classes/:id",
            get(classes::handle_get_class).delete(classes::handle_delete_class),
        )
        .route(
            "/api/v1/classes/:id/system-prompt",
            get(classes::handle_get_system_prompt).put(classes::handle_update_system_prompt),
        )
        // Enrollment
        .route("/api/v1/classes/:id/enroll", post(enrollments::handle_enroll))
        .route(
            "/api/v1/classes/:id/enrollment",
            get(enrollments::handle_enrollment_status),
        )
        .route(
            "/api/v1/classes/:id/students",
            get(enrollments::handle_list_students),
        )
        // Documents
        .route(
            "/api/v1/documents",
            get(documents::handle_list_my_documents)
                .post(documents::handle_upload)
                .layer(DefaultBodyLimit::max(documents::MAX_UPLOAD_BYTES)),
        )
        .route(
            "/api/v1/documents/:id",
            axum::routing::delete(documents::handle_delete_document),
        )
        .route(
            "/api/v1/documents/:id/download",
            get(documents::handle_download_url),
        )
        .route(
            "/api/v1/classes/:id/documents",
            get(documents::handle_list_class_documents),
        )
        // AI assistant
        .route("/api/v1/classes/:id/ask", post(assistant::handle_ask))
        .route("/api/v1/classes/:id/reindex", post(assistant::handle_reindex))
        .route("/api/v1/classes/:id/chat", post(assistant::handle_open_chat))
        .route("/api/v1/chat", get(assistant::handle_list_chats))
        .route(
            "/api/v1/chat/:id",
            get(assistant::handle_get_chat).delete(assistant::handle_close_chat),
        )
        .route(
            "/api/v1/chat/:id/messages",
            post(assistant::handle_send_message).delete(assistant::handle_clear_chat),
        )
        .route("/api/v1/ai/health", get(assistant::handle_ai_health))
        // UI preferences
        .route("/api/v1/ui/preferences", get(ui::handle_get_preferences))
        .route("/api/v1/ui/actions", post(ui::handle_dispatch))
        .with_state(state)
}
