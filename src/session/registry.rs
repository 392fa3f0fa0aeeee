use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{FeatureRecord, TaskType};
use crate::scoring::ModelFactory;
use crate::session::engine::{SessionEngine, SessionReport, Tick};
use crate::settings::EngineConfig;
use crate::snapshot::Restored;
use crate::store::{checkpoint_key, CheckpointStore};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Isolated sessions keyed by id. Each session gets its own engine and its
/// own model instance from the factory.
pub struct SessionRegistry {
    config: EngineConfig,
    factory: ModelFactory,
    sessions: HashMap<String, SessionEngine>,
}

impl SessionRegistry {
    pub fn new(config: EngineConfig, factory: ModelFactory) -> Self {
        Self {
            config,
            factory,
            sessions: HashMap::new(),
        }
    }

    pub fn start(&mut self, task_type: TaskType, now: DateTime<Utc>) -> String {
        let id = Uuid::new_v4().to_string();
        let engine = SessionEngine::new(
            id.clone(),
            task_type,
            now,
            self.config.clone(),
            (self.factory)(),
        );
        self.sessions.insert(id.clone(), engine);
        log_info!("session {} started ({})", id, task_type);
        id
    }

    pub fn get(&self, id: &str) -> Option<&SessionEngine> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut SessionEngine> {
        self.sessions.get_mut(id)
    }

    fn engine_mut(&mut self, id: &str) -> Result<&mut SessionEngine> {
        self.sessions
            .get_mut(id)
            .ok_or_else(|| anyhow!("unknown session {id}"))
    }

    pub fn process(
        &mut self,
        id: &str,
        record: &FeatureRecord,
        now: DateTime<Utc>,
    ) -> Result<Option<Tick>> {
        Ok(self.engine_mut(id)?.process(record, now))
    }

    pub fn focus_reset(&mut self, id: &str) -> Result<()> {
        self.engine_mut(id)?.focus_reset();
        log_info!("session {} focus reset", id);
        Ok(())
    }

    /// Ground truth for the session's latest interval. `Ok(false)` when it
    /// has not scored an interval yet.
    pub fn record_feedback(&mut self, id: &str, actual_breakdown: bool) -> Result<bool> {
        Ok(self.engine_mut(id)?.record_feedback(actual_breakdown))
    }

    /// Ends and forgets the session.
    pub fn end(&mut self, id: &str, now: DateTime<Utc>) -> Result<SessionReport> {
        let mut engine = self
            .sessions
            .remove(id)
            .ok_or_else(|| anyhow!("unknown session {id}"))?;
        log_info!("session {} ended after {} ticks", id, engine.tick());
        Ok(engine.end(now))
    }

    pub fn checkpoint_to(&self, store: &dyn CheckpointStore, id: &str) -> Result<()> {
        let engine = self
            .sessions
            .get(id)
            .ok_or_else(|| anyhow!("unknown session {id}"))?;
        let blob = engine.checkpoint()?;
        store
            .set(&checkpoint_key(id), &blob)
            .with_context(|| format!("failed to store checkpoint for session {id}"))
    }

    /// Load `id` from the store, replacing any live engine with that id.
    /// A missing or unusable checkpoint starts the session fresh.
    pub fn resume_from(
        &mut self,
        store: &dyn CheckpointStore,
        id: &str,
        task_type: TaskType,
        now: DateTime<Utc>,
    ) -> Result<Restored<String>> {
        let blob = store
            .get(&checkpoint_key(id))
            .with_context(|| format!("failed to load checkpoint for session {id}"))?;
        let restored = SessionEngine::restore(
            blob.as_deref(),
            id,
            task_type,
            now,
            self.config.clone(),
            (self.factory)(),
        );
        if restored.fell_back {
            log_warn!("session {} had no usable checkpoint; starting fresh", id);
        } else {
            log_info!("session {} resumed at tick {}", id, restored.value.tick());
        }
        let id = id.to_string();
        Ok(restored.map(|engine| {
            self.sessions.insert(id.clone(), engine);
            id
        }))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.sessions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
