//! Best-effort cache invalidation.
//!
//! After a class's materials change, the AI service is told to drop its cached
//! index for that class. The call runs as a detached task: the triggering
//! request never waits on it and never sees its outcome. Failures are logged
//! and published on a dedicated broadcast channel; the next successful query
//! rebuilds the index anyway.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::ai_client::{AiGateway, AiServiceError};

const FAILURE_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum InvalidationError {
    #[error("cache invalidation for class {class_id} failed: {source}")]
    Gateway {
        class_id: Uuid,
        #[source]
        source: AiServiceError,
    },
}

#[derive(Debug, Clone)]
pub struct InvalidationFailure {
    pub class_id: Uuid,
    pub error: InvalidationError,
}

#[derive(Clone)]
pub struct CacheInvalidator {
    gateway: Arc<dyn AiGateway>,
    failures: broadcast::Sender<InvalidationFailure>,
}

impl CacheInvalidator {
    pub fn new(gateway: Arc<dyn AiGateway>) -> Self {
        let (failures, _) = broadcast::channel(FAILURE_CHANNEL_CAPACITY);
        Self { gateway, failures }
    }

    /// Fire-and-forget. The handle is only for callers that want to observe
    /// completion (tests); production callers drop it.
    pub fn notify(&self, class_id: Uuid) -> JoinHandle<()> {
        let invalidator = self.clone();
        tokio::spawn(async move {
            if let Err(error) = invalidator.invalidate(class_id).await {
                warn!("{error}");
                // No subscribers is fine.
                let _ = invalidator
                    .failures
                    .send(InvalidationFailure { class_id, error });
            }
        })
    }

    /// Awaited invalidation, used by the explicit reindex action.
    pub async fn invalidate(&self, class_id: Uuid) -> Result<(), InvalidationError> {
        self.gateway
            .invalidate_cache(class_id)
            .await
            .map_err(|source| InvalidationError::Gateway { class_id, source })?;
        info!("Invalidated AI cache for class {class_id}");
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<InvalidationFailure> {
        self.failures.subscribe()
    }
}
