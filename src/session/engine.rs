use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::aggregation::{BrainMap, RollingWindow, SessionTotals, WindowSummary};
use crate::conflict::ConflictAccumulator;
use crate::dynamics::NetworkSimulator;
use crate::estimation::LatentEstimator;
use crate::intervention::{self, Effect, InterventionState};
use crate::models::{
    FeatureRecord, InferenceResult, LatentState, NetworkState, SessionStatus, TaskType,
};
use crate::scoring::{RiskModel, RiskScorer};
use crate::settings::EngineConfig;
use crate::snapshot::Restored;

pub const CHECKPOINT_VERSION: u32 = 1;

/// One processed interval: the inference result and what the UI should do.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tick {
    pub session_id: String,
    pub result: InferenceResult,
    pub effects: Vec<Effect>,
}

/// Final view of a session, produced when it ends.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub session_id: String,
    pub task_type: TaskType,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub ticks: u64,
    pub summary: WindowSummary,
    pub totals: SessionTotals,
    pub brain_map: BrainMap,
}

/// Everything needed to resume a session mid-stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionCheckpoint {
    version: u32,
    session_id: String,
    task_type: TaskType,
    started_at: DateTime<Utc>,
    tick: u64,
    latent: LatentState,
    network: NetworkState,
    accumulator: ConflictAccumulator,
    last_risk: f64,
    window: RollingWindow,
    totals: SessionTotals,
    intervention: InterventionState,
}

/// Owns all per-session state and runs the pipeline one interval at a time:
/// estimator, network, accumulator, scorer, then aggregation and dispatch.
pub struct SessionEngine {
    id: String,
    task_type: TaskType,
    started_at: DateTime<Utc>,
    status: SessionStatus,
    tick: u64,
    config: EngineConfig,
    estimator: LatentEstimator,
    simulator: NetworkSimulator,
    latent: LatentState,
    network: NetworkState,
    accumulator: ConflictAccumulator,
    scorer: RiskScorer,
    window: RollingWindow,
    totals: SessionTotals,
    intervention: InterventionState,
}

impl SessionEngine {
    pub fn new(
        id: impl Into<String>,
        task_type: TaskType,
        started_at: DateTime<Utc>,
        config: EngineConfig,
        model: Box<dyn RiskModel>,
    ) -> Self {
        Self {
            id: id.into(),
            task_type,
            started_at,
            status: SessionStatus::Running,
            tick: 0,
            estimator: LatentEstimator::new(config.estimator.clone()),
            simulator: NetworkSimulator::new(config.dynamics.clone()),
            latent: LatentState::default(),
            network: NetworkState::default(),
            accumulator: ConflictAccumulator::new(),
            scorer: RiskScorer::new(model),
            window: RollingWindow::new(config.aggregation.window_capacity),
            totals: SessionTotals::default(),
            intervention: InterventionState::default(),
            config,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn task_type(&self) -> TaskType {
        self.task_type
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn latent(&self) -> LatentState {
        self.latent
    }

    pub fn network(&self) -> NetworkState {
        self.network
    }

    pub fn accumulator(&self) -> &ConflictAccumulator {
        &self.accumulator
    }

    pub fn intervention(&self) -> &InterventionState {
        &self.intervention
    }

    pub fn window(&self) -> &RollingWindow {
        &self.window
    }

    pub fn totals(&self) -> &SessionTotals {
        &self.totals
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one interval. Returns `None` once the session has ended.
    pub fn process(&mut self, record: &FeatureRecord, now: DateTime<Utc>) -> Option<Tick> {
        if self.status == SessionStatus::Ended {
            return None;
        }

        let dt = self.config.interval_secs as f64;
        let elapsed = self.tick as f64 * dt;
        let task_type = record.task_type().unwrap_or(self.task_type);

        let previous = self.latent;
        let latent = self.estimator.estimate(record, &previous, elapsed, dt);
        let network = self.simulator.next(&self.network, &latent, &previous);
        let conflict = self
            .accumulator
            .update(&network, &latent, &self.config.conflict);
        let score = self
            .scorer
            .score(&latent, &previous, &network, conflict.value);

        self.tick += 1;
        self.latent = latent;
        self.network = network;

        let result = InferenceResult {
            tick: self.tick,
            timestamp: now,
            task_type,
            risk: score.risk,
            instability: latent.instability,
            drift: latent.drift,
            fatigue: latent.fatigue,
            accumulated_conflict: conflict.value,
            breakdown_imminent: conflict.breakdown_imminent,
            breakdown_active: conflict.breakdown_active,
            attribution: score.attribution,
            network,
            degraded: score.degraded,
        };

        self.window.push(result.clone());
        self.totals
            .record(&result, self.config.aggregation.deep_work_instability);

        let (intervention, effects) =
            intervention::evaluate(&self.intervention, &result, now, &self.config.intervention);
        self.intervention = intervention;

        Some(Tick {
            session_id: self.id.clone(),
            result,
            effects,
        })
    }

    pub fn summary(&self) -> WindowSummary {
        self.window.summarize(self.config.aggregation.trend_epsilon)
    }

    pub fn brain_map(&self) -> BrainMap {
        BrainMap::from_window(&self.window)
    }

    pub fn dismiss_banner(&mut self, now: DateTime<Utc>) -> Vec<Effect> {
        let (next, effects) =
            intervention::dismiss_banner(&self.intervention, now, &self.config.intervention);
        self.intervention = next;
        effects
    }

    /// End of a focus-reset exercise: clears the rolling window and the
    /// dispatcher state and resets fatigue. Totals and the accumulator stay.
    pub fn focus_reset(&mut self) {
        self.window.reset();
        self.intervention = InterventionState::default();
        self.latent = self.latent.with_fatigue_reset();
    }

    pub fn record_feedback(&mut self, actual_breakdown: bool) -> bool {
        self.scorer.record_feedback(actual_breakdown)
    }

    /// Stop the session. Later `process` calls produce nothing.
    pub fn end(&mut self, now: DateTime<Utc>) -> SessionReport {
        self.status = SessionStatus::Ended;
        SessionReport {
            session_id: self.id.clone(),
            task_type: self.task_type,
            started_at: self.started_at,
            ended_at: now,
            ticks: self.tick,
            summary: self.summary(),
            totals: self.totals.clone(),
            brain_map: self.brain_map(),
        }
    }

    pub fn checkpoint(&self) -> Result<Vec<u8>> {
        let checkpoint = SessionCheckpoint {
            version: CHECKPOINT_VERSION,
            session_id: self.id.clone(),
            task_type: self.task_type,
            started_at: self.started_at,
            tick: self.tick,
            latent: self.latent,
            network: self.network,
            accumulator: self.accumulator.clone(),
            last_risk: self.scorer.last_risk(),
            window: self.window.clone(),
            totals: self.totals.clone(),
            intervention: self.intervention.clone(),
        };
        serde_json::to_vec(&checkpoint)
            .with_context(|| format!("failed to serialize checkpoint for session {}", self.id))
    }

    /// Resume `id` from `blob`, or start it fresh when the blob is missing,
    /// unreadable, from another version, or from another session.
    pub fn restore(
        blob: Option<&[u8]>,
        id: &str,
        task_type: TaskType,
        now: DateTime<Utc>,
        config: EngineConfig,
        model: Box<dyn RiskModel>,
    ) -> Restored<SessionEngine> {
        let Some(bytes) = blob else {
            return Restored::fresh(Self::new(id, task_type, now, config, model));
        };

        match decode_checkpoint(bytes, id) {
            Ok(checkpoint) => {
                let mut window = checkpoint.window;
                window.resize(config.aggregation.window_capacity);
                Restored::resumed(Self {
                    id: checkpoint.session_id,
                    task_type: checkpoint.task_type,
                    started_at: checkpoint.started_at,
                    status: SessionStatus::Running,
                    tick: checkpoint.tick,
                    estimator: LatentEstimator::new(config.estimator.clone()),
                    simulator: NetworkSimulator::new(config.dynamics.clone()),
                    latent: checkpoint.latent,
                    network: checkpoint.network,
                    accumulator: checkpoint.accumulator,
                    scorer: RiskScorer::new(model).with_last_risk(checkpoint.last_risk),
                    window,
                    totals: checkpoint.totals,
                    intervention: checkpoint.intervention,
                    config,
                })
            }
            Err(err) => {
                warn!("starting session {id} fresh: {err:#}");
                Restored::fresh(Self::new(id, task_type, now, config, model))
            }
        }
    }
}

fn decode_checkpoint(bytes: &[u8], id: &str) -> Result<SessionCheckpoint> {
    let checkpoint: SessionCheckpoint =
        serde_json::from_slice(bytes).context("unreadable session checkpoint")?;
    if checkpoint.version != CHECKPOINT_VERSION {
        bail!(
            "unsupported checkpoint version {} (expected {})",
            checkpoint.version,
            CHECKPOINT_VERSION
        );
    }
    if checkpoint.session_id != id {
        bail!(
            "checkpoint belongs to session {}, not {id}",
            checkpoint.session_id
        );
    }
    Ok(checkpoint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::LogisticModel;
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn engine(task_type: TaskType) -> SessionEngine {
        SessionEngine::new(
            "s-1",
            task_type,
            start(),
            EngineConfig::default(),
            Box::new(LogisticModel::baseline()),
        )
    }

    fn busy() -> FeatureRecord {
        FeatureRecord {
            switch_rate: Some(0.8),
            typing_interval_variance: Some(0.6),
            idle_ratio: Some(0.3),
            ..Default::default()
        }
    }

    #[test]
    fn ticks_count_from_one_and_carry_timestamps() {
        let mut engine = engine(TaskType::Coding);
        let now = start() + Duration::seconds(5);
        let tick = engine.process(&FeatureRecord::default(), now).unwrap();
        assert_eq!(tick.result.tick, 1);
        assert_eq!(tick.result.timestamp, now);
        assert_eq!(tick.session_id, "s-1");
        assert_eq!(engine.window().len(), 1);
    }

    #[test]
    fn record_task_type_overrides_session_default() {
        let mut engine = engine(TaskType::Coding);
        let record = FeatureRecord {
            task_type: Some("Video".into()),
            ..Default::default()
        };
        let tick = engine.process(&record, start()).unwrap();
        assert_eq!(tick.result.task_type, TaskType::Video);

        let record = FeatureRecord {
            task_type: Some("podcast".into()),
            ..Default::default()
        };
        let tick = engine.process(&record, start()).unwrap();
        assert_eq!(tick.result.task_type, TaskType::Coding);
    }

    #[test]
    fn focus_reset_clears_window_and_fatigue_only() {
        let mut engine = engine(TaskType::General);
        for i in 0..20 {
            engine.process(&busy(), start() + Duration::seconds(5 * i));
        }
        let conflict_before = engine.accumulator().value();
        assert!(engine.latent().fatigue > 0.0);

        engine.focus_reset();
        assert!(engine.window().is_empty());
        assert_eq!(engine.latent().fatigue, 0.0);
        assert_eq!(engine.intervention(), &InterventionState::default());
        assert_eq!(engine.totals().windows, 20);
        assert_eq!(engine.accumulator().value(), conflict_before);
    }

    #[test]
    fn ended_session_produces_nothing() {
        let mut engine = engine(TaskType::Reading);
        engine.process(&busy(), start());
        let report = engine.end(start() + Duration::seconds(10));
        assert_eq!(report.ticks, 1);
        assert_eq!(engine.status(), SessionStatus::Ended);
        assert!(engine.process(&busy(), start()).is_none());
    }

    #[test]
    fn restore_rejects_other_versions_and_sessions() {
        let mut engine = engine(TaskType::Writing);
        engine.process(&busy(), start());
        let blob = engine.checkpoint().unwrap();

        let other = SessionEngine::restore(
            Some(blob.as_slice()),
            "s-2",
            TaskType::Writing,
            start(),
            EngineConfig::default(),
            Box::new(LogisticModel::baseline()),
        );
        assert!(other.fell_back);
        assert_eq!(other.value.tick(), 0);

        let mut value: serde_json::Value = serde_json::from_slice(&blob).unwrap();
        value["version"] = serde_json::json!(CHECKPOINT_VERSION + 1);
        let future = serde_json::to_vec(&value).unwrap();
        let restored = SessionEngine::restore(
            Some(future.as_slice()),
            "s-1",
            TaskType::Writing,
            start(),
            EngineConfig::default(),
            Box::new(LogisticModel::baseline()),
        );
        assert!(restored.fell_back);
    }
}
