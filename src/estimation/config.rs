use serde::{Deserialize, Serialize};

/// Weights and rates for turning telemetry into latent state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Instability weights
    pub switch_weight: f64,
    pub typing_weight: f64,
    pub mouse_weight: f64,

    /// Drift weights
    pub idle_weight: f64,
    pub scroll_weight: f64,
    pub passive_weight: f64,

    /// Fatigue gained per hour at session start; doubles by `expected_duration_min`.
    pub fatigue_rate_per_hour: f64,
    pub expected_duration_min: f64,

    /// An interval this idle and this hidden counts as being away (fatigue holds).
    pub away_idle_ratio: f64,
    pub away_hidden_ratio: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            switch_weight: 0.6,
            typing_weight: 0.2,
            mouse_weight: 0.2,
            idle_weight: 0.5,
            scroll_weight: 0.3,
            passive_weight: 0.2,
            fatigue_rate_per_hour: 0.5,
            expected_duration_min: 60.0,
            away_idle_ratio: 0.95,
            away_hidden_ratio: 0.95,
        }
    }
}
