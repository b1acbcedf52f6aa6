use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::triggers::{TriggerQueue, TriggerQueueError, TriggerTask};

/// In-memory trigger queue holding encoded entries like the Redis list.
#[derive(Clone, Default)]
pub struct MemoryTriggerQueue {
    entries: Arc<Mutex<Vec<String>>>,
}

impl MemoryTriggerQueue {
    /// Appends an entry as-is, bypassing encoding.
    pub fn push_raw(&self, raw: &str) {
        self.entries
            .lock()
            .expect("trigger mutex poisoned")
            .push(raw.to_string());
    }
}

#[async_trait]
impl TriggerQueue for MemoryTriggerQueue {
    fn name(&self) -> &str {
        "trigger_queue"
    }

    async fn push(&self, task: &TriggerTask) -> Result<u64, TriggerQueueError> {
        let payload = serde_json::to_string(task)?;
        let mut entries = self.entries.lock().expect("trigger mutex poisoned");
        entries.push(payload);
        Ok(entries.len() as u64)
    }

    async fn entries(&self) -> Result<Vec<String>, TriggerQueueError> {
        Ok(self.entries.lock().expect("trigger mutex poisoned").clone())
    }

    async fn clear(&self) -> Result<u64, TriggerQueueError> {
        let mut entries = self.entries.lock().expect("trigger mutex poisoned");
        let length = entries.len() as u64;
        entries.clear();
        Ok(length)
    }
}
