use serde::{Deserialize, Serialize};

/// Hidden cognitive variables, each in [0, 1].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct LatentState {
    pub instability: f64,
    pub drift: f64,
    pub fatigue: f64,
}

impl LatentState {
    pub fn new(instability: f64, drift: f64, fatigue: f64) -> Self {
        Self {
            instability,
            drift,
            fatigue,
        }
    }

    /// The explicit reset event that ends a focus-reset exercise.
    /// This is the only way fatigue is allowed to go down.
    pub fn with_fatigue_reset(self) -> Self {
        Self {
            fatigue: 0.0,
            ..self
        }
    }
}

/// Simulated activation of the four coupled networks, each clamped to [0, 1].
/// The values are independent; they do not sum to 1.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct NetworkState {
    /// Executive control.
    pub ecn: f64,
    /// Default mode (mind wandering).
    pub dmn: f64,
    pub salience: f64,
    pub load: f64,
}

impl Default for NetworkState {
    fn default() -> Self {
        Self {
            ecn: 1.0,
            dmn: 0.0,
            salience: 0.0,
            load: 0.0,
        }
    }
}

impl NetworkState {
    pub fn values(&self) -> [f64; 4] {
        [self.ecn, self.dmn, self.salience, self.load]
    }
}
