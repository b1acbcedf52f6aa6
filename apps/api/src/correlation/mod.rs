//! Correlation Cache: pairs a pipeline selection made in the review UI with
//! a document delivered later by an automation agent, keyed by an opaque
//! task token.
//!
//! Entries expire after the configured TTL and are read at most once.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;
use crate::models::draft::PipelineLinkage;

pub mod handlers;
#[cfg(test)]
pub(crate) mod memory;
pub mod redis_cache;

pub use redis_cache::RedisCorrelationCache;

#[derive(Debug, Error)]
pub enum CorrelationError {
    #[error("no pipeline selection stored for task token {0}")]
    NotFound(String),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("could not encode selection: {0}")]
    Codec(#[from] serde_json::Error),
}

/// What the reviewer picked for a task: who will own the resulting draft and
/// which position it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSelection {
    pub owner_id: Uuid,
    pub linkage: PipelineLinkage,
}

#[derive(Debug, Clone)]
pub struct CorrelationConfig {
    pub namespace: String,
    pub ttl: Duration,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            namespace: "position_selection".to_string(),
            ttl: Duration::from_secs(3600),
        }
    }
}

impl From<&Config> for CorrelationConfig {
    fn from(config: &Config) -> Self {
        Self {
            namespace: config.correlation_namespace.clone(),
            ttl: Duration::from_secs(config.correlation_ttl_secs),
        }
    }
}

impl CorrelationConfig {
    pub fn key(&self, token: &str) -> String {
        format!("{}:{token}", self.namespace)
    }
}

/// A fresh opaque task token (32 hex characters).
pub fn new_task_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Carried in `AppState` as `Arc<dyn CorrelationCache>`.
#[async_trait]
pub trait CorrelationCache: Send + Sync {
    /// Stores the selection for `token`, replacing any earlier one and
    /// restarting its expiry.
    async fn put(&self, token: &str, selection: &PositionSelection) -> Result<(), CorrelationError>;

    /// Atomically reads and removes the selection for `token`.
    async fn take(&self, token: &str) -> Result<PositionSelection, CorrelationError>;

    /// Reads the selection for `token` without consuming it.
    async fn peek(&self, token: &str) -> Result<Option<PositionSelection>, CorrelationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_format() {
        let config = CorrelationConfig::default();
        assert_eq!(config.key("abc"), "position_selection:abc");
        assert_eq!(config.ttl, Duration::from_secs(3600));
    }

    #[test]
    fn test_task_tokens_are_opaque_hex() {
        let a = new_task_token();
        let b = new_task_token();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
