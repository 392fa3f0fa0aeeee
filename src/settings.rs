use anyhow::{ensure, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
};

use crate::aggregation::AggregationConfig;
use crate::conflict::ConflictConfig;
use crate::dynamics::DynamicsConfig;
use crate::estimation::EstimatorConfig;
use crate::intervention::InterventionConfig;
use crate::scoring::AdapterConfig;

/// Every tunable of the engine. All fields default, so a config file only
/// needs the values it overrides.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Telemetry interval length; elapsed session time is `tick * interval_secs`
    pub interval_secs: u64,
    /// The session worker writes a checkpoint every this many ticks (0 disables)
    pub checkpoint_every_ticks: u64,
    pub estimator: EstimatorConfig,
    pub dynamics: DynamicsConfig,
    pub conflict: ConflictConfig,
    pub aggregation: AggregationConfig,
    pub intervention: InterventionConfig,
    pub adapter: AdapterConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            checkpoint_every_ticks: 12,
            estimator: EstimatorConfig::default(),
            dynamics: DynamicsConfig::default(),
            conflict: ConflictConfig::default(),
            aggregation: AggregationConfig::default(),
            intervention: InterventionConfig::default(),
            adapter: AdapterConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(contents: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(contents).context("Failed to parse engine config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read engine config from {}", path.display()))?;
        Self::from_json(&contents).with_context(|| format!("Invalid config in {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.interval_secs > 0, "interval_secs must be positive");
        ensure!(
            self.aggregation.window_capacity > 0,
            "aggregation.window_capacity must be positive"
        );
        ensure!(
            self.aggregation.trend_epsilon >= 0.0,
            "aggregation.trend_epsilon must not be negative"
        );

        let conflict = &self.conflict;
        ensure!(
            conflict.threshold > 0.0,
            "conflict.threshold must be positive"
        );
        ensure!(
            (0.0..=1.0).contains(&conflict.decay)
                && (0.0..=1.0).contains(&conflict.drain_fraction)
                && (0.0..=1.0).contains(&conflict.rearm_ratio),
            "conflict decay, drain_fraction and rearm_ratio must lie in [0, 1]"
        );

        let adapter = &self.adapter;
        ensure!(
            (0.0..=1.0).contains(&adapter.blend_alpha),
            "adapter.blend_alpha must lie in [0, 1]"
        );

        self.intervention
            .validate()
            .context("Invalid intervention config")
    }
}

/// Engine config backed by a JSON file on disk.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<EngineConfig>,
}

impl SettingsStore {
    /// Loads `path` if present. An unreadable or invalid file falls back to
    /// defaults so the engine can still start.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            EngineConfig::from_json(&contents).unwrap_or_else(|err| {
                warn!(
                    "ignoring settings in {}: {err:#}; using defaults",
                    path.display()
                );
                EngineConfig::default()
            })
        } else {
            EngineConfig::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn config(&self) -> EngineConfig {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update(&self, config: EngineConfig) -> Result<()> {
        config.validate()?;
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        self.persist(&config)?;
        *guard = config;
        Ok(())
    }

    fn persist(&self, data: &EngineConfig) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data = EngineConfig::from_json(&contents)?;
        *self.data.write().unwrap_or_else(PoisonError::into_inner) = data;
        Ok(())
    }
}
