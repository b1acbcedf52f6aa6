use async_trait::async_trait;
use redis::Client as RedisClient;
use tracing::info;

use crate::triggers::{TriggerQueue, TriggerQueueError, TriggerTask};

/// Redis list: `RPUSH` to enqueue, `LRANGE 0 -1` to inspect, `LLEN` + `DEL`
/// in one transaction to clear.
#[derive(Clone)]
pub struct RedisTriggerQueue {
    client: RedisClient,
    name: String,
}

impl RedisTriggerQueue {
    pub fn new(client: RedisClient, name: impl Into<String>) -> Self {
        Self {
            client,
            name: name.into(),
        }
    }
}

#[async_trait]
impl TriggerQueue for RedisTriggerQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn push(&self, task: &TriggerTask) -> Result<u64, TriggerQueueError> {
        let payload = serde_json::to_string(task)?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let length: u64 = redis::cmd("RPUSH")
            .arg(&self.name)
            .arg(payload)
            .query_async(&mut conn)
            .await?;

        info!(
            "Queued trigger task {} on {} (length {length})",
            task.task_token.as_deref().unwrap_or("-"),
            self.name
        );
        Ok(length)
    }

    async fn entries(&self) -> Result<Vec<String>, TriggerQueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let entries: Vec<String> = redis::cmd("LRANGE")
            .arg(&self.name)
            .arg(0)
            .arg(-1)
            .query_async(&mut conn)
            .await?;
        Ok(entries)
    }

    async fn clear(&self) -> Result<u64, TriggerQueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let (length, _deleted): (u64, u64) = redis::pipe()
            .atomic()
            .cmd("LLEN")
            .arg(&self.name)
            .cmd("DEL")
            .arg(&self.name)
            .query_async(&mut conn)
            .await?;

        info!("Cleared {length} trigger tasks from {}", self.name);
        Ok(length)
    }
}
