use anyhow::{Context, Result};

use crate::llm_client::{DEFAULT_BASE_URL, DEFAULT_MODEL};

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    /// Talent database: draft staging schema and production résumés.
    pub database_url: String,
    /// Recruiting pipeline database. Defaults to `database_url`.
    pub pipeline_database_url: String,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub llm_api_key: String,
    pub llm_base_url: String,
    pub llm_model: String,
    pub poll_interval_secs: u64,
    pub poll_attempts: u32,
    pub extraction_attempts: u32,
    pub correlation_namespace: String,
    pub correlation_ttl_secs: u64,
    /// Redis list the sourcing agent reads trigger tasks from.
    pub trigger_queue: String,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let database_url = require_env("DATABASE_URL")?;

        Ok(Config {
            pipeline_database_url: env_or("PIPELINE_DATABASE_URL", &database_url),
            database_url,
            redis_url: require_env("REDIS_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            llm_api_key: require_env("LLM_API_KEY")?,
            llm_base_url: env_or("LLM_BASE_URL", DEFAULT_BASE_URL),
            llm_model: env_or("LLM_MODEL", DEFAULT_MODEL),
            poll_interval_secs: parse_env("POLL_INTERVAL_SECS", 15)?,
            poll_attempts: parse_env("POLL_ATTEMPTS", 3)?,
            extraction_attempts: parse_env("EXTRACTION_ATTEMPTS", 3)?,
            correlation_namespace: env_or("CORRELATION_NAMESPACE", "position_selection"),
            correlation_ttl_secs: parse_env("CORRELATION_TTL_SECS", 3600)?,
            trigger_queue: env_or("TRIGGER_QUEUE", "trigger_queue"),
            port: parse_env("PORT", 8080).context("PORT must be a valid port number")?,
            rust_log: env_or("RUST_LOG", "info"),
        })
    }

    /// Configuration pointing at nothing, for router tests that never touch
    /// the real backends.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Config {
            database_url: "postgres://localhost/talent_test".to_string(),
            pipeline_database_url: "postgres://localhost/talent_test".to_string(),
            redis_url: "redis://localhost:6379".to_string(),
            s3_bucket: "intake-test".to_string(),
            s3_endpoint: "http://localhost:9000".to_string(),
            aws_access_key_id: "test".to_string(),
            aws_secret_access_key: "test".to_string(),
            llm_api_key: "test".to_string(),
            llm_base_url: DEFAULT_BASE_URL.to_string(),
            llm_model: DEFAULT_MODEL.to_string(),
            poll_interval_secs: 15,
            poll_attempts: 3,
            extraction_attempts: 3,
            correlation_namespace: "position_selection".to_string(),
            correlation_ttl_secs: 3600,
            trigger_queue: "trigger_queue".to_string(),
            port: 8080,
            rust_log: "info".to_string(),
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}
