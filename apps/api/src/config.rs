use std::time::Duration;

use anyhow::{Context, Result};

pub const DEFAULT_AI_SERVICE_URL: &str = "http://localhost:8000";

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    /// Base URL of the external question-answering service.
    pub ai_service_url: String,
    /// Upper bound on a single `/query` call. First-time indexing on the
    /// AI service is slow, so this stays generous.
    pub ai_query_timeout: Duration,
    pub ui_state_path: String,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let ai_query_timeout_secs = std::env::var("AI_QUERY_TIMEOUT_SECS")
            .unwrap_or_else(|_| "120".to_string())
            .parse::<u64>()
            .context("AI_QUERY_TIMEOUT_SECS must be a whole number of seconds")?;

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            ai_service_url: std::env::var("AI_SERVICE_URL")
                .unwrap_or_else(|_| DEFAULT_AI_SERVICE_URL.to_string()),
            ai_query_timeout: Duration::from_secs(ai_query_timeout_secs),
            ui_state_path: std::env::var("UI_STATE_PATH")
                .unwrap_or_else(|_| "study-group-ui.json".to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
