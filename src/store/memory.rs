use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use anyhow::Result;
use tokio::sync::broadcast;

use super::{CheckpointStore, SUBSCRIBER_BUFFER};

/// In-process store for tests and embedding.
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    updates: broadcast::Sender<String>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(SUBSCRIBER_BUFFER);
        Self {
            entries: Mutex::new(HashMap::new()),
            updates,
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn notify(&self, key: &str) {
        // No subscribers is fine.
        let _ = self.updates.send(key.to_string());
    }
}

impl CheckpointStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, blob: &[u8]) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), blob.to_vec());
        self.notify(key);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let existed = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some();
        if existed {
            self.notify(key);
        }
        Ok(existed)
    }

    fn subscribe(&self) -> broadcast::Receiver<String> {
        self.updates.subscribe()
    }
}
