mod ai_client;
mod assistant;
mod auth;
mod classes;
mod config;
mod db;
mod documents;
mod enrollments;
mod errors;
mod models;
mod profiles;
mod routes;
mod state;
mod store;
mod ui_state;

#[cfg(test)]
mod test_support;

use anyhow::{Context, Result};
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::ai_client::{AiServiceClient, CacheInvalidator};
use crate::assistant::registry::ChatRegistry;
use crate::config::Config;
use crate::db::create_pool;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{PgStore, S3BlobStore};
use crate::ui_state::UiStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Study Group API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    let store = Arc::new(PgStore::new(db));

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    let blobs = Arc::new(S3BlobStore::new(s3, config.s3_bucket.clone()));
    info!("S3 client initialized (bucket: {})", config.s3_bucket);

    // Initialize AI service client
    let ai = Arc::new(
        AiServiceClient::new(&config.ai_service_url, config.ai_query_timeout)
            .context("building AI service client")?,
    );
    info!(
        "AI service client initialized ({}, timeout {:?})",
        config.ai_service_url, config.ai_query_timeout
    );

    let invalidator = CacheInvalidator::new(ai.clone());
    spawn_invalidation_monitor(&invalidator);

    let ui = UiStore::load(&config.ui_state_path).await;

    // Build app state
    let state = AppState {
        profiles: store.clone(),
        classes: store.clone(),
        enrollments: store.clone(),
        documents: store,
        blobs,
        ai,
        invalidator,
        chats: ChatRegistry::default(),
        ui,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins to the dashboard host

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Records classes whose AI cache may be stale after a failed invalidation.
fn spawn_invalidation_monitor(invalidator: &CacheInvalidator) {
    let mut failures = invalidator.subscribe();
    tokio::spawn(async move {
        loop {
            match failures.recv().await {
                Ok(failure) => info!(
                    "Class {} may serve stale answers until its next invalidation",
                    failure.class_id
                ),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Invalidation monitor skipped {skipped} failures")
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "study-group-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    let s3_config = aws_sdk_s3::config::Builder::from(&s3_config)
        .force_path_style(true)
        .build();

    aws_sdk_s3::Client::from_conf(s3_config)
}
