use serde::{Deserialize, Serialize};

/// Gains and coupling constants for the four leaky integrators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DynamicsConfig {
    /// Integration gains: fraction of the gap to target closed per interval
    pub ecn_gain: f64,
    pub dmn_gain: f64,
    pub salience_gain: f64,
    pub load_gain: f64,

    /// ECN target degradation (asymmetric: instability costs more than drift)
    pub ecn_instability_weight: f64,
    pub ecn_drift_weight: f64,

    /// Mutual inhibition between ECN and DMN
    pub dmn_inhibits_ecn: f64,
    pub ecn_inhibits_dmn: f64,

    /// Extra salience per unit of positive instability change
    pub salience_delta_boost: f64,

    /// Load target mix
    pub load_salience_weight: f64,
    pub load_fatigue_weight: f64,
}

impl Default for DynamicsConfig {
    fn default() -> Self {
        Self {
            ecn_gain: 0.3,
            dmn_gain: 0.25,
            salience_gain: 0.4,
            load_gain: 0.2,
            ecn_instability_weight: 0.6,
            ecn_drift_weight: 0.4,
            dmn_inhibits_ecn: 0.1,
            ecn_inhibits_dmn: 0.2,
            salience_delta_boost: 1.5,
            load_salience_weight: 0.5,
            load_fatigue_weight: 0.5,
        }
    }
}
