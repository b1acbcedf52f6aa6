//! Agent trigger queue: search jobs for the sourcing agent, pushed by the
//! review UI and consumed in order by the agent. A job may carry a task
//! token whose pipeline selection sits in the Correlation Cache.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::correlation::PositionSelection;

pub mod handlers;
#[cfg(test)]
pub(crate) mod memory;
pub mod redis_queue;

pub use redis_queue::RedisTriggerQueue;

#[derive(Debug, Error)]
pub enum TriggerQueueError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("could not encode trigger task: {0}")]
    Codec(#[from] serde_json::Error),
}

/// One queued search job. Field names are the agent's wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerTask {
    #[serde(rename = "main")]
    pub keywords_main: String,
    #[serde(rename = "position")]
    pub keywords_position: String,
    #[serde(rename = "company")]
    pub keywords_company: String,
    #[serde(rename = "task_id", default, skip_serializing_if = "Option::is_none")]
    pub task_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_name: Option<String>,
    #[serde(rename = "timestamp")]
    pub queued_at: DateTime<Utc>,
}

/// A queue entry as shown to the review UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueuedTask {
    Task {
        #[serde(flatten)]
        task: TriggerTask,
        /// Selection cached under the task token, if still present.
        #[serde(skip_serializing_if = "Option::is_none")]
        position_info: Option<PositionSelection>,
    },
    Unreadable {
        error: String,
        raw: String,
    },
}

/// Decodes a raw queue entry; entries that do not decode are kept visible.
pub fn decode_entry(raw: String) -> Result<TriggerTask, QueuedTask> {
    serde_json::from_str(&raw).map_err(|e| QueuedTask::Unreadable {
        error: format!("could not decode trigger task: {e}"),
        raw,
    })
}

/// FIFO of trigger tasks. Carried in `AppState` as `Arc<dyn TriggerQueue>`.
#[async_trait]
pub trait TriggerQueue: Send + Sync {
    fn name(&self) -> &str;

    /// Appends a task and returns the new queue length.
    async fn push(&self, task: &TriggerTask) -> Result<u64, TriggerQueueError>;

    /// Raw entries, oldest first, without removing them.
    async fn entries(&self) -> Result<Vec<String>, TriggerQueueError>;

    /// Drops every entry and returns how many there were.
    async fn clear(&self) -> Result<u64, TriggerQueueError>;
}
