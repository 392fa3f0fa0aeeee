use log::warn;

use crate::models::{Attribution, LatentState, NetworkState};
use crate::scoring::features::FeatureVector;
use crate::scoring::model::{LogisticModel, RiskModel};
use crate::utils::math::clamp01;

#[derive(Debug, Clone, PartialEq)]
pub struct Score {
    pub risk: f64,
    pub attribution: Attribution,
    /// Prediction or attribution failed; `risk` is the previous value.
    pub degraded: bool,
    pub features: FeatureVector,
}

/// Wraps a [`RiskModel`] so that model failures never stop the pipeline.
pub struct RiskScorer {
    model: Box<dyn RiskModel>,
    last_risk: f64,
    last_features: Option<FeatureVector>,
}

impl Default for RiskScorer {
    fn default() -> Self {
        Self::new(Box::new(LogisticModel::baseline()))
    }
}

impl RiskScorer {
    pub fn new(model: Box<dyn RiskModel>) -> Self {
        Self {
            model,
            last_risk: 0.0,
            last_features: None,
        }
    }

    /// Seeds the fallback value, e.g. after resuming from a checkpoint.
    pub fn with_last_risk(mut self, risk: f64) -> Self {
        self.last_risk = clamp01(risk);
        self
    }

    pub fn last_risk(&self) -> f64 {
        self.last_risk
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub fn score(
        &mut self,
        latent: &LatentState,
        previous: &LatentState,
        network: &NetworkState,
        accumulated_conflict: f64,
    ) -> Score {
        let features = FeatureVector::assemble(latent, previous, network, accumulated_conflict);
        self.last_features = Some(features);

        let mut degraded = false;
        let risk = match self.model.predict(&features) {
            Ok(p) if p.is_finite() => clamp01(p),
            Ok(p) => {
                warn!(
                    "{} returned non-finite risk {p}; reusing {:.3}",
                    self.model.name(),
                    self.last_risk
                );
                degraded = true;
                self.last_risk
            }
            Err(err) => {
                warn!(
                    "{} failed: {err:#}; reusing risk {:.3}",
                    self.model.name(),
                    self.last_risk
                );
                degraded = true;
                self.last_risk
            }
        };

        let attribution = match self.model.contributions(&features) {
            Ok(raw) => Attribution::from_contributions(&raw),
            Err(err) => {
                warn!("{} attribution failed: {err:#}", self.model.name());
                degraded = true;
                Attribution::default()
            }
        };

        self.last_risk = risk;
        Score {
            risk,
            attribution,
            degraded,
            features,
        }
    }

    /// Attach a ground-truth outcome to the most recently scored interval.
    /// Returns false when nothing has been scored yet.
    pub fn record_feedback(&mut self, actual_breakdown: bool) -> bool {
        match self.last_features {
            Some(features) => {
                self.model.record_feedback(&features, actual_breakdown);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Signal, FEATURE_COUNT};
    use anyhow::{bail, Result};

    struct Flaky {
        calls: std::cell::Cell<u32>,
        fail_from: u32,
    }

    // Cell is !Sync but RiskModel only requires Send.
    impl RiskModel for Flaky {
        fn predict(&self, _features: &FeatureVector) -> Result<f64> {
            let call = self.calls.get() + 1;
            self.calls.set(call);
            if call >= self.fail_from {
                bail!("model offline");
            }
            Ok(0.42)
        }

        fn contributions(&self, features: &FeatureVector) -> Result<[f64; FEATURE_COUNT]> {
            Ok(*features.values())
        }
    }

    struct Unbounded(f64);

    impl RiskModel for Unbounded {
        fn predict(&self, _features: &FeatureVector) -> Result<f64> {
            Ok(self.0)
        }

        fn contributions(&self, _features: &FeatureVector) -> Result<[f64; FEATURE_COUNT]> {
            bail!("no attribution")
        }
    }

    fn busy() -> LatentState {
        LatentState::new(0.6, 0.2, 0.1)
    }

    #[test]
    fn failure_reuses_last_risk_and_flags_degraded() {
        let mut scorer = RiskScorer::new(Box::new(Flaky {
            calls: Default::default(),
            fail_from: 2,
        }));
        let network = NetworkState::default();

        let first = scorer.score(&busy(), &LatentState::default(), &network, 0.0);
        assert!(!first.degraded);
        assert_eq!(first.risk, 0.42);

        let second = scorer.score(&busy(), &busy(), &network, 0.0);
        assert!(second.degraded);
        assert_eq!(second.risk, 0.42);
        assert_eq!(second.attribution.top(), Some(Signal::Instability));
    }

    #[test]
    fn failure_before_any_score_falls_back_to_zero() {
        let mut scorer = RiskScorer::new(Box::new(Flaky {
            calls: Default::default(),
            fail_from: 1,
        }));
        let score = scorer.score(&busy(), &LatentState::default(), &NetworkState::default(), 0.0);
        assert!(score.degraded);
        assert_eq!(score.risk, 0.0);
    }

    #[test]
    fn out_of_range_probability_is_clipped() {
        let mut scorer = RiskScorer::new(Box::new(Unbounded(1.7)));
        let score = scorer.score(&busy(), &busy(), &NetworkState::default(), 0.0);
        assert_eq!(score.risk, 1.0);
        // Attribution failure alone still marks the interval degraded.
        assert!(score.degraded);
        assert!(score.attribution.entries.is_empty());

        let mut scorer = RiskScorer::new(Box::new(Unbounded(f64::NAN))).with_last_risk(0.3);
        let score = scorer.score(&busy(), &busy(), &NetworkState::default(), 0.0);
        assert_eq!(score.risk, 0.3);
    }

    #[test]
    fn baseline_scores_are_clean() {
        let mut scorer = RiskScorer::default();
        let score = scorer.score(&busy(), &LatentState::default(), &NetworkState::default(), 0.4);
        assert!(!score.degraded);
        assert!(score.risk > 0.0 && score.risk < 1.0);
        assert!((score.attribution.total() - 1.0).abs() < 1e-9);
        assert!(scorer.record_feedback(true));
        assert!(!RiskScorer::default().record_feedback(false));
    }
}
