use serde::{Deserialize, Serialize};

use crate::models::InferenceResult;
use crate::snapshot::Snapshot;

/// Whole-session running means. Survives focus resets.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionTotals {
    pub windows: u64,
    pub deep_work_windows: u64,
    pub mean_risk: f64,
    pub mean_instability: f64,
    pub mean_drift: f64,
    pub mean_fatigue: f64,
    pub peak_risk: f64,
    pub breakdown_episodes: u64,
}

impl SessionTotals {
    pub fn record(&mut self, result: &InferenceResult, deep_work_instability: f64) {
        self.windows += 1;
        let n = self.windows as f64;
        self.mean_risk += (result.risk - self.mean_risk) / n;
        self.mean_instability += (result.instability - self.mean_instability) / n;
        self.mean_drift += (result.drift - self.mean_drift) / n;
        self.mean_fatigue += (result.fatigue - self.mean_fatigue) / n;
        self.peak_risk = self.peak_risk.max(result.risk);

        if result.instability < deep_work_instability {
            self.deep_work_windows += 1;
        }
        if result.breakdown_imminent {
            self.breakdown_episodes += 1;
        }
    }

    /// Fraction of windows spent below the deep-work instability line.
    pub fn deep_work_ratio(&self) -> f64 {
        if self.windows == 0 {
            0.0
        } else {
            self.deep_work_windows as f64 / self.windows as f64
        }
    }
}

impl Snapshot for SessionTotals {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Attribution, NetworkState, TaskType};
    use chrono::Utc;

    fn result(risk: f64, instability: f64, breakdown_imminent: bool) -> InferenceResult {
        InferenceResult {
            tick: 0,
            timestamp: Utc::now(),
            task_type: TaskType::General,
            risk,
            instability,
            drift: 0.2,
            fatigue: 0.1,
            accumulated_conflict: 0.0,
            breakdown_imminent,
            breakdown_active: breakdown_imminent,
            attribution: Attribution::default(),
            network: NetworkState::default(),
            degraded: false,
        }
    }

    #[test]
    fn running_means_and_deep_work_ratio() {
        let mut totals = SessionTotals::default();
        assert_eq!(totals.deep_work_ratio(), 0.0);

        totals.record(&result(0.2, 0.1, false), 0.5);
        totals.record(&result(0.4, 0.3, false), 0.5);
        totals.record(&result(0.9, 0.8, true), 0.5);
        totals.record(&result(0.1, 0.6, false), 0.5);

        assert_eq!(totals.windows, 4);
        assert!((totals.mean_risk - 0.4).abs() < 1e-12);
        assert!((totals.mean_instability - 0.45).abs() < 1e-12);
        assert!((totals.deep_work_ratio() - 0.5).abs() < 1e-12);
        assert_eq!(totals.peak_risk, 0.9);
        assert_eq!(totals.breakdown_episodes, 1);
    }
}
