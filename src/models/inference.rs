use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::{LatentState, NetworkState};
use super::telemetry::TaskType;
use crate::utils::math::finite_or_zero;

pub const FEATURE_COUNT: usize = 7;

/// Inputs of the risk model, in feature-vector order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Instability,
    Drift,
    Fatigue,
    EcnDeficit,
    AccumulatedConflict,
    DeltaInstability,
    DeltaDrift,
}

impl Signal {
    pub const ORDER: [Signal; FEATURE_COUNT] = [
        Signal::Instability,
        Signal::Drift,
        Signal::Fatigue,
        Signal::EcnDeficit,
        Signal::AccumulatedConflict,
        Signal::DeltaInstability,
        Signal::DeltaDrift,
    ];

    pub fn index(&self) -> usize {
        match self {
            Signal::Instability => 0,
            Signal::Drift => 1,
            Signal::Fatigue => 2,
            Signal::EcnDeficit => 3,
            Signal::AccumulatedConflict => 4,
            Signal::DeltaInstability => 5,
            Signal::DeltaDrift => 6,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Signal::Instability => "Instability",
            Signal::Drift => "Drift",
            Signal::Fatigue => "Fatigue",
            Signal::EcnDeficit => "Executive control deficit",
            Signal::AccumulatedConflict => "Accumulated conflict",
            Signal::DeltaInstability => "Instability change",
            Signal::DeltaDrift => "Drift change",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AttributionEntry {
    pub signal: Signal,
    /// Signed contribution to the logit: positive raises risk, negative lowers it.
    #[serde(default)]
    pub contribution: f64,
    /// Share of the total absolute contribution; entries sum to 1 unless all are 0.
    pub share: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Attribution {
    pub entries: Vec<AttributionEntry>,
}

impl Attribution {
    /// Normalise raw per-signal contributions into shares, kept in feature order.
    pub fn from_contributions(raw: &[f64; FEATURE_COUNT]) -> Self {
        let signed: Vec<f64> = raw.iter().map(|v| finite_or_zero(*v)).collect();
        let total: f64 = signed.iter().map(|v| v.abs()).sum();

        let entries = Signal::ORDER
            .iter()
            .zip(signed)
            .map(|(signal, contribution)| AttributionEntry {
                signal: *signal,
                contribution,
                share: if total > 0.0 { contribution.abs() / total } else { 0.0 },
            })
            .collect();

        Self { entries }
    }

    /// Largest share; ties go to the signal that comes first in feature order.
    pub fn top(&self) -> Option<Signal> {
        let mut best: Option<&AttributionEntry> = None;
        for entry in &self.entries {
            match best {
                Some(current) if entry.share <= current.share => {}
                _ => best = Some(entry),
            }
        }
        best.filter(|entry| entry.share > 0.0).map(|entry| entry.signal)
    }

    /// Signal pushing risk up the most; `None` when nothing raises it.
    pub fn top_driver(&self) -> Option<Signal> {
        let mut best: Option<&AttributionEntry> = None;
        for entry in self.entries.iter().filter(|entry| entry.contribution > 0.0) {
            match best {
                Some(current) if entry.contribution <= current.contribution => {}
                _ => best = Some(entry),
            }
        }
        best.map(|entry| entry.signal)
    }

    pub fn contribution(&self, signal: Signal) -> f64 {
        self.entries
            .iter()
            .find(|entry| entry.signal == signal)
            .map(|entry| entry.contribution)
            .unwrap_or(0.0)
    }

    pub fn share(&self, signal: Signal) -> f64 {
        self.entries
            .iter()
            .find(|entry| entry.signal == signal)
            .map(|entry| entry.share)
            .unwrap_or(0.0)
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|entry| entry.share).sum()
    }
}

/// Everything the pipeline learned about one interval. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InferenceResult {
    pub tick: u64,
    pub timestamp: DateTime<Utc>,
    pub task_type: TaskType,
    pub risk: f64,
    pub instability: f64,
    pub drift: f64,
    pub fatigue: f64,
    pub accumulated_conflict: f64,
    /// True only in the interval the accumulator crossed its threshold.
    pub breakdown_imminent: bool,
    /// True while the accumulator sits in its breakdown phase.
    pub breakdown_active: bool,
    pub attribution: Attribution,
    pub network: NetworkState,
    /// The risk model failed this interval and `risk` is a fallback value.
    pub degraded: bool,
}

impl InferenceResult {
    pub fn latent(&self) -> LatentState {
        LatentState::new(self.instability, self.drift, self.fatigue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shares_sum_to_one() {
        let attribution = Attribution::from_contributions(&[0.5, -0.25, 0.25, 0.0, 0.0, 0.0, 0.0]);
        assert!((attribution.total() - 1.0).abs() < 1e-12);
        assert!((attribution.share(Signal::Instability) - 0.5).abs() < 1e-12);
        assert!((attribution.share(Signal::Drift) - 0.25).abs() < 1e-12);
        assert_eq!(attribution.top(), Some(Signal::Instability));
    }

    #[test]
    fn ties_resolve_to_first_in_order() {
        let attribution = Attribution::from_contributions(&[0.0, 0.3, 0.3, 0.0, 0.3, 0.0, 0.0]);
        assert_eq!(attribution.top(), Some(Signal::Drift));
    }

    #[test]
    fn falling_signal_is_a_dampener_not_a_driver() {
        // Instability dropped from 0.9 to 0.1 under the baseline weights.
        let attribution =
            Attribution::from_contributions(&[0.25, 0.0, 0.0, 0.15, 0.0, -0.4, 0.0]);
        assert_eq!(attribution.top(), Some(Signal::DeltaInstability));
        assert!((attribution.contribution(Signal::DeltaInstability) + 0.4).abs() < 1e-12);
        assert!((attribution.share(Signal::DeltaInstability) - 0.5).abs() < 1e-12);
        assert_eq!(attribution.top_driver(), Some(Signal::Instability));
    }

    #[test]
    fn only_dampeners_have_no_driver() {
        let attribution = Attribution::from_contributions(&[0.0, 0.0, 0.0, 0.0, 0.0, -0.2, -0.1]);
        assert_eq!(attribution.top_driver(), None);
        assert_eq!(Attribution::default().top_driver(), None);
    }

    #[test]
    fn all_zero_has_no_top_signal() {
        let attribution = Attribution::from_contributions(&[0.0; FEATURE_COUNT]);
        assert_eq!(attribution.total(), 0.0);
        assert_eq!(attribution.top(), None);
        assert_eq!(Attribution::default().top(), None);
    }

    #[test]
    fn non_finite_contributions_are_ignored() {
        let attribution =
            Attribution::from_contributions(&[f64::NAN, 0.2, 0.0, 0.0, 0.0, 0.0, f64::INFINITY]);
        assert_eq!(attribution.top(), Some(Signal::Drift));
        assert!((attribution.total() - 1.0).abs() < 1e-12);
    }
}
