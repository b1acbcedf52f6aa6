use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::time::Instant;

use crate::correlation::{CorrelationCache, CorrelationConfig, CorrelationError, PositionSelection};

/// In-memory Correlation Cache. Expiry follows the tokio clock, so paused
/// tests can step past the TTL.
#[derive(Clone, Default)]
pub struct MemoryCorrelationCache {
    config: CorrelationConfig,
    entries: Arc<Mutex<HashMap<String, (Instant, PositionSelection)>>>,
}

#[async_trait]
impl CorrelationCache for MemoryCorrelationCache {
    async fn put(&self, token: &str, selection: &PositionSelection) -> Result<(), CorrelationError> {
        let expires = Instant::now() + self.config.ttl;
        self.entries
            .lock()
            .expect("correlation mutex poisoned")
            .insert(self.config.key(token), (expires, selection.clone()));
        Ok(())
    }

    async fn take(&self, token: &str) -> Result<PositionSelection, CorrelationError> {
        let entry = self
            .entries
            .lock()
            .expect("correlation mutex poisoned")
            .remove(&self.config.key(token));
        match entry {
            Some((expires, selection)) if Instant::now() < expires => Ok(selection),
            _ => Err(CorrelationError::NotFound(token.to_string())),
        }
    }

    async fn peek(&self, token: &str) -> Result<Option<PositionSelection>, CorrelationError> {
        let entries = self.entries.lock().expect("correlation mutex poisoned");
        Ok(entries
            .get(&self.config.key(token))
            .filter(|(expires, _)| Instant::now() < *expires)
            .map(|(_, selection)| selection.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::draft::PipelineLinkage;
    use std::time::Duration;
    use uuid::Uuid;

    fn selection(position_id: i64) -> PositionSelection {
        PositionSelection {
            owner_id: Uuid::new_v4(),
            linkage: PipelineLinkage {
                position_id,
                position_name: Some("数据工程师".to_string()),
                project_id: Some(2),
                project_name: Some("数据平台".to_string()),
                company_id: Some(1),
                company_name: Some("某科技".to_string()),
            },
        }
    }

    #[tokio::test]
    async fn test_take_is_read_once() {
        let cache = MemoryCorrelationCache::default();
        let stored = selection(5);
        cache.put("t1", &stored).await.unwrap();

        assert_eq!(cache.take("t1").await.unwrap(), stored);
        assert!(matches!(
            cache.take("t1").await,
            Err(CorrelationError::NotFound(token)) if token == "t1"
        ));
    }

    #[tokio::test]
    async fn test_peek_leaves_selection_in_place() {
        let cache = MemoryCorrelationCache::default();
        assert_eq!(cache.peek("t1").await.unwrap(), None);

        let stored = selection(5);
        cache.put("t1", &stored).await.unwrap();
        assert_eq!(cache.peek("t1").await.unwrap(), Some(stored.clone()));
        assert_eq!(cache.take("t1").await.unwrap(), stored);
    }

    #[tokio::test]
    async fn test_put_overwrites_previous_selection() {
        let cache = MemoryCorrelationCache::default();
        cache.put("t1", &selection(5)).await.unwrap();
        cache.put("t1", &selection(6)).await.unwrap();

        assert_eq!(cache.take("t1").await.unwrap().linkage.position_id, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache = MemoryCorrelationCache::default();
        cache.put("t1", &selection(5)).await.unwrap();
        cache.put("t2", &selection(5)).await.unwrap();

        tokio::time::advance(Duration::from_secs(3599)).await;
        assert!(cache.take("t1").await.is_ok());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(matches!(cache.take("t2").await, Err(CorrelationError::NotFound(_))));
    }

    #[test]
    fn test_selection_wire_format() {
        let value = serde_json::to_value(selection(5)).unwrap();
        assert_eq!(value["linkage"]["position_id"], 5);
        assert_eq!(value["linkage"]["company_name"], "某科技");
        assert!(value["owner_id"].is_string());
    }
}
