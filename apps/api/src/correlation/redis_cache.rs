use async_trait::async_trait;
use redis::Client as RedisClient;
use tracing::{debug, info};

use crate::correlation::{CorrelationCache, CorrelationConfig, CorrelationError, PositionSelection};

/// Redis-backed Correlation Cache: `SET key value EX ttl` to store,
/// `GETDEL` to take, so two consumers can never both receive an entry.
/// `GET` peeks without consuming.
#[derive(Clone)]
pub struct RedisCorrelationCache {
    client: RedisClient,
    config: CorrelationConfig,
}

impl RedisCorrelationCache {
    pub fn new(client: RedisClient, config: CorrelationConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl CorrelationCache for RedisCorrelationCache {
    async fn put(&self, token: &str, selection: &PositionSelection) -> Result<(), CorrelationError> {
        let key = self.config.key(token);
        let payload = serde_json::to_string(selection)?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        redis::cmd("SET")
            .arg(&key)
            .arg(payload)
            .arg("EX")
            .arg(self.config.ttl.as_secs())
            .query_async::<_, ()>(&mut conn)
            .await?;

        info!(
            "Cached selection of position {} for task {token} ({}s)",
            selection.linkage.position_id,
            self.config.ttl.as_secs()
        );
        Ok(())
    }

    async fn take(&self, token: &str) -> Result<PositionSelection, CorrelationError> {
        let key = self.config.key(token);
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let payload: Option<String> = redis::cmd("GETDEL")
            .arg(&key)
            .query_async(&mut conn)
            .await?;

        let payload = payload.ok_or_else(|| CorrelationError::NotFound(token.to_string()))?;
        debug!("Took selection for task {token}");
        Ok(serde_json::from_str(&payload)?)
    }

    async fn peek(&self, token: &str) -> Result<Option<PositionSelection>, CorrelationError> {
        let key = self.config.key(token);
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let payload: Option<String> = redis::cmd("GET").arg(&key).query_async(&mut conn).await?;
        payload
            .map(|payload| serde_json::from_str(&payload))
            .transpose()
            .map_err(CorrelationError::from)
    }
}
