use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::models::FEATURE_COUNT;
use crate::scoring::features::FeatureVector;

/// Swappable breakdown-probability model. The engine treats it as a black box
/// that may fail; the scorer substitutes a fallback when it does.
pub trait RiskModel: Send {
    /// Probability of an attention breakdown. Out-of-range values are clipped by the caller.
    fn predict(&self, features: &FeatureVector) -> Result<f64>;

    /// Signed per-feature contribution to the prediction, in feature order.
    fn contributions(&self, features: &FeatureVector) -> Result<[f64; FEATURE_COUNT]>;

    /// Ground-truth outcome for `features`. Models that do not adapt ignore it.
    fn record_feedback(&mut self, _features: &FeatureVector, _actual_breakdown: bool) {}

    fn name(&self) -> &str {
        "external"
    }
}

/// Builds one model per session so sessions never share mutable model state.
pub type ModelFactory = Arc<dyn Fn() -> Box<dyn RiskModel> + Send + Sync>;

pub fn baseline_factory() -> ModelFactory {
    Arc::new(|| Box::new(LogisticModel::baseline()) as Box<dyn RiskModel>)
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Linear-logistic model; the default when no trained model is plugged in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogisticModel {
    pub bias: f64,
    pub weights: [f64; FEATURE_COUNT],
}

impl Default for LogisticModel {
    fn default() -> Self {
        Self::baseline()
    }
}

impl LogisticModel {
    /// Every weight on instability, drift, fatigue and ECN deficit is positive,
    /// so risk rises monotonically with each of them.
    pub fn baseline() -> Self {
        Self {
            bias: -3.0,
            weights: [2.5, 2.0, 1.5, 1.5, 1.0, 0.5, 0.3],
        }
    }

    pub fn logit(&self, features: &FeatureVector) -> f64 {
        self.bias
            + self
                .weights
                .iter()
                .zip(features.values())
                .map(|(w, x)| w * x)
                .sum::<f64>()
    }
}

impl RiskModel for LogisticModel {
    fn predict(&self, features: &FeatureVector) -> Result<f64> {
        Ok(sigmoid(self.logit(features)))
    }

    fn contributions(&self, features: &FeatureVector) -> Result<[f64; FEATURE_COUNT]> {
        let mut out = [0.0; FEATURE_COUNT];
        for (slot, (w, x)) in out
            .iter_mut()
            .zip(self.weights.iter().zip(features.values()))
        {
            *slot = w * x;
        }
        Ok(out)
    }

    fn name(&self) -> &str {
        "logistic-baseline"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LatentState, NetworkState};

    fn vector(i: f64, d: f64, f: f64, ecn: f64) -> FeatureVector {
        FeatureVector::assemble(
            &LatentState::new(i, d, f),
            &LatentState::new(i, d, f),
            &NetworkState {
                ecn,
                ..Default::default()
            },
            0.0,
        )
    }

    #[test]
    fn quiet_state_is_low_risk() {
        let model = LogisticModel::baseline();
        let risk = model.predict(&vector(0.0, 0.0, 0.0, 1.0)).unwrap();
        assert!(risk < 0.05);
    }

    #[test]
    fn risk_is_monotonic_in_each_state_signal() {
        let model = LogisticModel::baseline();
        let base = model.predict(&vector(0.3, 0.3, 0.3, 0.7)).unwrap();
        assert!(model.predict(&vector(0.5, 0.3, 0.3, 0.7)).unwrap() > base);
        assert!(model.predict(&vector(0.3, 0.5, 0.3, 0.7)).unwrap() > base);
        assert!(model.predict(&vector(0.3, 0.3, 0.5, 0.7)).unwrap() > base);
        assert!(model.predict(&vector(0.3, 0.3, 0.3, 0.5)).unwrap() > base);
    }

    #[test]
    fn contributions_are_weight_times_value() {
        let model = LogisticModel::baseline();
        let contributions = model.contributions(&vector(0.4, 0.0, 0.2, 1.0)).unwrap();
        assert!((contributions[0] - 1.0).abs() < 1e-9);
        assert_eq!(contributions[1], 0.0);
        assert!((contributions[2] - 0.3).abs() < 1e-9);
    }

    #[test]
    fn factory_builds_independent_models() {
        let factory = baseline_factory();
        let a = factory();
        let b = factory();
        assert_eq!(a.name(), "logistic-baseline");
        assert_eq!(b.name(), "logistic-baseline");
    }
}
