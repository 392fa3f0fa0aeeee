use serde::{Deserialize, Serialize};

/// Drift-diffusion constants for the breakdown detector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConflictConfig {
    /// Leak applied to the running value every interval
    pub decay: f64,
    pub gain: f64,
    pub salience_weight: f64,
    pub instability_weight: f64,
    /// Evidence below this mix contributes nothing
    pub noise_floor: f64,
    pub threshold: f64,
    /// Fraction drained on crossing; 1.0 is a full reset
    pub drain_fraction: f64,
    /// Re-arm once the value falls below `threshold * rearm_ratio`
    pub rearm_ratio: f64,
}

impl Default for ConflictConfig {
    fn default() -> Self {
        Self {
            decay: 0.9,
            gain: 0.6,
            salience_weight: 0.5,
            instability_weight: 0.5,
            noise_floor: 0.35,
            threshold: 1.0,
            drain_fraction: 0.5,
            rearm_ratio: 0.4,
        }
    }
}
