use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use log::{error, info};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::{broadcast, oneshot};

use super::migrations::prepare_store;
use super::{CheckpointStore, SUBSCRIBER_BUFFER};

type StoreTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum StoreCommand {
    Execute(StoreTask),
    Shutdown,
}

struct StoreInner {
    sender: mpsc::Sender<StoreCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(StoreCommand::Shutdown) {
                error!("Failed to send shutdown to checkpoint store thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join checkpoint store thread: {join_err:?}");
            }
        }
    }
}

/// SQLite-backed checkpoint store. One connection lives on a dedicated
/// thread; callers block until their command has run.
#[derive(Clone)]
pub struct SqliteStore {
    inner: Arc<StoreInner>,
    db_path: Arc<PathBuf>,
    updates: broadcast::Sender<String>,
}

impl SqliteStore {
    pub fn open(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create checkpoint directory {}", parent.display())
            })?;
        }

        let (command_tx, command_rx) = mpsc::channel::<StoreCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("cortexflow-store".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(anyhow::Error::new(err)
                            .context("failed to open SQLite checkpoint store")));
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }

                let init_result =
                    prepare_store(&mut conn).context("failed to prepare checkpoint store");
                if ready_tx.send(init_result).is_err() {
                    error!("Checkpoint store initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        StoreCommand::Execute(task) => task(&mut conn),
                        StoreCommand::Shutdown => break,
                    }
                }

                info!("Checkpoint store thread shutting down");
            })
            .with_context(|| "failed to spawn checkpoint store worker thread")?;

        ready_rx
            .recv()
            .context("checkpoint store worker exited before signaling readiness")??;

        info!("Checkpoint store opened at {}", db_path.display());

        let (updates, _) = broadcast::channel(SUBSCRIBER_BUFFER);
        Ok(Self {
            inner: Arc::new(StoreInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
            updates,
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    /// Run `task` on the store thread and wait for its result. Must not be
    /// called from inside an async task; use `spawn_blocking`.
    pub fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = StoreCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("Checkpoint store caller dropped before receiving result");
            }
        }));

        self.inner
            .sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to checkpoint store thread: {err}"))?;

        reply_rx
            .blocking_recv()
            .map_err(|_| anyhow!("checkpoint store thread terminated unexpectedly"))?
    }

    fn notify(&self, key: &str) {
        let _ = self.updates.send(key.to_string());
    }
}

impl CheckpointStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let key = key.to_string();
        self.execute(move |conn| {
            conn.query_row(
                "SELECT blob FROM checkpoints WHERE key = ?1",
                params![key],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()
            .with_context(|| format!("failed to read checkpoint '{key}'"))
        })
    }

    fn set(&self, key: &str, blob: &[u8]) -> Result<()> {
        let owned_key = key.to_string();
        let blob = blob.to_vec();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO checkpoints (key, blob, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                     blob = excluded.blob,
                     updated_at = excluded.updated_at",
                params![owned_key, blob, Utc::now().to_rfc3339()],
            )
            .with_context(|| format!("failed to write checkpoint '{owned_key}'"))?;
            Ok(())
        })?;
        self.notify(key);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let owned_key = key.to_string();
        let removed = self.execute(move |conn| {
            let count = conn
                .execute("DELETE FROM checkpoints WHERE key = ?1", params![owned_key])
                .with_context(|| format!("failed to delete checkpoint '{owned_key}'"))?;
            Ok(count > 0)
        })?;
        if removed {
            self.notify(key);
        }
        Ok(removed)
    }

    fn subscribe(&self) -> broadcast::Receiver<String> {
        self.updates.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_db() -> PathBuf {
        std::env::temp_dir()
            .join(format!("cortexflow-store-{}", uuid::Uuid::new_v4()))
            .join("checkpoints.db")
    }

    #[test]
    fn round_trips_blobs_and_survives_reopen() {
        let path = temp_db();
        {
            let store = SqliteStore::open(path.clone()).unwrap();
            let mut updates = store.subscribe();
            store.set("session:a:checkpoint", b"first").unwrap();
            store.set("session:a:checkpoint", b"second").unwrap();
            assert_eq!(updates.try_recv().unwrap(), "session:a:checkpoint");
            assert_eq!(
                store.get("session:a:checkpoint").unwrap().as_deref(),
                Some(&b"second"[..])
            );
            assert_eq!(store.get("missing").unwrap(), None);
        }

        let reopened = SqliteStore::open(path.clone()).unwrap();
        assert_eq!(
            reopened.get("session:a:checkpoint").unwrap().as_deref(),
            Some(&b"second"[..])
        );
        assert!(reopened.remove("session:a:checkpoint").unwrap());
        assert!(!reopened.remove("session:a:checkpoint").unwrap());
        drop(reopened);

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }
}
