use std::sync::Arc;

use crate::ai_client::{AiGateway, CacheInvalidator};
use crate::assistant::registry::ChatRegistry;
use crate::config::Config;
use crate::store::{BlobStore, ClassStore, DocumentStore, EnrollmentStore, ProfileStore};
use crate::ui_state::UiStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub profiles: Arc<dyn ProfileStore>,
    pub classes: Arc<dyn ClassStore>,
    pub enrollments: Arc<dyn EnrollmentStore>,
    pub documents: Arc<dyn DocumentStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub ai: Arc<dyn AiGateway>,
    /// Detached cache-invalidation notifier, fed by document writes.
    pub invalidator: CacheInvalidator,
    /// In-memory chat surfaces, one per open assistant panel.
    pub chats: ChatRegistry,
    pub ui: UiStore,
    pub config: Config,
}
