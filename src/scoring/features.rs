use serde::{Deserialize, Serialize};

use crate::models::{LatentState, NetworkState, Signal, FEATURE_COUNT};
use crate::utils::math::finite_or_zero;

/// Model input in the fixed order of [`Signal::ORDER`]:
/// instability, drift, fatigue, 1 - ECN, accumulated conflict,
/// instability change, drift change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FeatureVector(pub [f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn assemble(
        latent: &LatentState,
        previous: &LatentState,
        network: &NetworkState,
        accumulated_conflict: f64,
    ) -> Self {
        let values = [
            latent.instability,
            latent.drift,
            latent.fatigue,
            1.0 - network.ecn,
            accumulated_conflict,
            latent.instability - previous.instability,
            latent.drift - previous.drift,
        ];
        Self(values.map(finite_or_zero))
    }

    pub fn values(&self) -> &[f64; FEATURE_COUNT] {
        &self.0
    }

    pub fn get(&self, signal: Signal) -> f64 {
        self.0[signal.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_is_fixed() {
        let vector = FeatureVector::assemble(
            &LatentState::new(0.6, 0.4, 0.2),
            &LatentState::new(0.5, 0.5, 0.1),
            &NetworkState {
                ecn: 0.75,
                dmn: 0.1,
                salience: 0.2,
                load: 0.3,
            },
            0.8,
        );
        let expected = [0.6, 0.4, 0.2, 0.25, 0.8, 0.1, -0.1];
        for (got, want) in vector.values().iter().zip(expected) {
            assert!((got - want).abs() < 1e-9);
        }
        assert!((vector.get(Signal::EcnDeficit) - 0.25).abs() < 1e-9);
    }
}
