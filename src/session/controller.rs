use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use log::info;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::models::{FeatureRecord, TaskType};
use crate::scoring::ModelFactory;
use crate::session::clock::{Clock, SystemClock};
use crate::session::engine::{SessionEngine, SessionReport};
use crate::session::loop_worker::{
    session_loop, write_checkpoint, SessionCommand, SessionEvent, WorkerContext,
};
use crate::session::sampler::{sampler_loop, TelemetrySampler};
use crate::settings::EngineConfig;
use crate::snapshot::Restored;
use crate::store::{checkpoint_key, CheckpointStore};

/// Caller's end of a running session.
pub struct SessionHandle {
    pub id: String,
    /// Closes once the session has ended.
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
}

struct ActiveSession {
    commands: mpsc::UnboundedSender<SessionCommand>,
    handle: JoinHandle<SessionEngine>,
    cancel_token: CancellationToken,
    sampler: Option<JoinHandle<()>>,
}

/// Runs each session on its own tokio task. Sessions share nothing but the
/// checkpoint store.
pub struct SessionController {
    config: EngineConfig,
    factory: ModelFactory,
    store: Option<Arc<dyn CheckpointStore>>,
    clock: Arc<dyn Clock>,
    sessions: HashMap<String, ActiveSession>,
}

impl SessionController {
    pub fn new(config: EngineConfig, factory: ModelFactory) -> Self {
        Self {
            config,
            factory,
            store: None,
            clock: Arc::new(SystemClock),
            sessions: HashMap::new(),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub async fn start_session(&mut self, task_type: TaskType) -> Result<SessionHandle> {
        let id = Uuid::new_v4().to_string();
        let engine = SessionEngine::new(
            id,
            task_type,
            self.clock.now(),
            self.config.clone(),
            (self.factory)(),
        );
        self.spawn(engine)
    }

    /// Resume `id` from the store; starts fresh when there is no usable checkpoint.
    pub async fn resume_session(
        &mut self,
        id: &str,
        task_type: TaskType,
    ) -> Result<Restored<SessionHandle>> {
        let blob = match &self.store {
            Some(store) => {
                let store = Arc::clone(store);
                let key = checkpoint_key(id);
                tokio::task::spawn_blocking(move || store.get(&key))
                    .await
                    .context("checkpoint load worker join failed")??
            }
            None => None,
        };

        let restored = SessionEngine::restore(
            blob.as_deref(),
            id,
            task_type,
            self.clock.now(),
            self.config.clone(),
            (self.factory)(),
        );
        let fell_back = restored.fell_back;
        let handle = self.spawn(restored.value)?;
        Ok(if fell_back {
            Restored::fresh(handle)
        } else {
            Restored::resumed(handle)
        })
    }

    fn spawn(&mut self, engine: SessionEngine) -> Result<SessionHandle> {
        let id = engine.id().to_string();
        if self.sessions.contains_key(&id) {
            bail!("session {id} already active");
        }

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let cancel_token = CancellationToken::new();
        let context = WorkerContext {
            store: self.store.clone(),
            clock: Arc::clone(&self.clock),
            checkpoint_every_ticks: self.config.checkpoint_every_ticks,
        };

        let handle = tokio::spawn(session_loop(
            engine,
            command_rx,
            event_tx,
            context,
            cancel_token.clone(),
        ));

        info!("session {id} worker started");
        self.sessions.insert(
            id.clone(),
            ActiveSession {
                commands: command_tx,
                handle,
                cancel_token,
                sampler: None,
            },
        );

        Ok(SessionHandle {
            id,
            events: event_rx,
        })
    }

    pub fn send(&self, id: &str, command: SessionCommand) -> Result<()> {
        let session = self
            .sessions
            .get(id)
            .ok_or_else(|| anyhow!("no active session {id}"))?;
        session
            .commands
            .send(command)
            .map_err(|_| anyhow!("session {id} worker has stopped"))
    }

    pub fn submit(&self, id: &str, record: FeatureRecord) -> Result<()> {
        self.send(id, SessionCommand::Telemetry(record))
    }

    /// Poll `sampler` every interval for this session until it ends.
    pub fn attach_sampler<S: TelemetrySampler>(&mut self, id: &str, sampler: S) -> Result<()> {
        let interval_secs = self.config.interval_secs;
        let session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| anyhow!("no active session {id}"))?;
        if session.sampler.is_some() {
            bail!("session {id} already has a sampler");
        }
        session.sampler = Some(tokio::spawn(sampler_loop(
            sampler,
            interval_secs,
            session.commands.clone(),
            session.cancel_token.child_token(),
        )));
        Ok(())
    }

    /// Cancel the worker, wait for it, and write the final checkpoint.
    /// No ticks are produced for this session afterwards.
    pub async fn end_session(&mut self, id: &str) -> Result<SessionReport> {
        let session = self
            .sessions
            .remove(id)
            .ok_or_else(|| anyhow!("no active session {id}"))?;

        session.cancel_token.cancel();
        if let Some(sampler) = session.sampler {
            sampler.await.context("sampler task failed to join")?;
        }
        let mut engine = session
            .handle
            .await
            .context("session worker failed to join")?;

        let report = engine.end(self.clock.now());
        if let Some(store) = &self.store {
            let blob = engine.checkpoint()?;
            write_checkpoint(Arc::clone(store), id, blob)
                .await
                .with_context(|| format!("failed to write final checkpoint for session {id}"))?;
        }
        info!("session {id} ended after {} ticks", report.ticks);
        Ok(report)
    }

    pub fn active_sessions(&self) -> Vec<String> {
        self.sessions.keys().cloned().collect()
    }

    pub async fn shutdown(&mut self) -> Result<Vec<SessionReport>> {
        let ids = self.active_sessions();
        let mut reports = Vec::with_capacity(ids.len());
        for id in ids {
            reports.push(self.end_session(&id).await?);
        }
        Ok(reports)
    }
}
