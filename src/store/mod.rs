//! Key-value persistence for session checkpoints.

mod memory;
mod migrations;
mod sqlite;

use anyhow::Result;
use tokio::sync::broadcast;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Buffered key notifications per subscriber before old ones are dropped.
pub(crate) const SUBSCRIBER_BUFFER: usize = 64;

/// External key-value store holding opaque checkpoint blobs.
///
/// Calls may block; async callers go through `spawn_blocking`.
pub trait CheckpointStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    fn set(&self, key: &str, blob: &[u8]) -> Result<()>;

    /// Returns whether the key existed.
    fn remove(&self, key: &str) -> Result<bool>;

    /// Receives every key written or removed after this call.
    fn subscribe(&self) -> broadcast::Receiver<String>;
}

pub fn checkpoint_key(session_id: &str) -> String {
    format!("session:{session_id}:checkpoint")
}
