use crate::estimation::config::EstimatorConfig;
use crate::models::{FeatureRecord, LatentState, TelemetrySignals};
use crate::utils::math::clamp01;

const SECS_PER_HOUR: f64 = 3600.0;

/// Converts one interval of telemetry into instability, drift and fatigue.
#[derive(Debug, Clone, Default)]
pub struct LatentEstimator {
    config: EstimatorConfig,
}

impl LatentEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// `elapsed_secs` is session time before this interval, `dt_secs` its length.
    pub fn estimate(
        &self,
        record: &FeatureRecord,
        previous: &LatentState,
        elapsed_secs: f64,
        dt_secs: f64,
    ) -> LatentState {
        let signals = record.signals();

        let fatigue = if self.is_recovery_interval(&signals) {
            previous.fatigue
        } else {
            clamp01(previous.fatigue + self.fatigue_increment(elapsed_secs, dt_secs))
        };

        LatentState {
            instability: self.instability(&signals),
            drift: self.drift(&signals),
            // Never below the previous value, whatever the config says.
            fatigue: fatigue.max(clamp01(previous.fatigue)),
        }
    }

    pub fn instability(&self, signals: &TelemetrySignals) -> f64 {
        clamp01(
            self.config.switch_weight * signals.switch_rate
                + self.config.typing_weight * signals.typing_interval_variance
                + self.config.mouse_weight * signals.mouse_velocity_variance,
        )
    }

    pub fn drift(&self, signals: &TelemetrySignals) -> f64 {
        clamp01(
            self.config.idle_weight * signals.idle_ratio
                + self.config.scroll_weight * signals.scroll_reversal_ratio
                + self.config.passive_weight * signals.passive_playback,
        )
    }

    /// Non-negative fatigue gain for one interval; grows with session length.
    pub fn fatigue_increment(&self, elapsed_secs: f64, dt_secs: f64) -> f64 {
        let expected_secs = self.config.expected_duration_min * 60.0;
        let progress = if expected_secs > 0.0 {
            elapsed_secs.max(0.0) / expected_secs
        } else {
            0.0
        };
        let rate = self.config.fatigue_rate_per_hour.max(0.0);
        let increment = rate * (dt_secs.max(0.0) / SECS_PER_HOUR) * (1.0 + progress);
        if increment.is_finite() {
            increment
        } else {
            0.0
        }
    }

    /// A detected break, or being idle with the tab hidden, pauses fatigue.
    pub fn is_recovery_interval(&self, signals: &TelemetrySignals) -> bool {
        signals.break_detected
            || (signals.idle_ratio >= self.config.away_idle_ratio
                && signals.tab_hidden_ratio >= self.config.away_hidden_ratio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn record(switch_rate: f64, idle_ratio: f64) -> FeatureRecord {
        FeatureRecord {
            switch_rate: Some(switch_rate),
            idle_ratio: Some(idle_ratio),
            ..Default::default()
        }
    }

    #[test]
    fn first_interval_starts_from_zero() {
        let estimator = LatentEstimator::default();
        let state = estimator.estimate(&FeatureRecord::default(), &LatentState::default(), 0.0, 5.0);
        assert_eq!(state.instability, 0.0);
        assert_eq!(state.drift, 0.0);
        assert!(state.fatigue > 0.0 && state.fatigue < 0.01);
    }

    #[test]
    fn weighted_sums_match_config() {
        let estimator = LatentEstimator::default();
        let record = FeatureRecord {
            switch_rate: Some(0.5),
            typing_interval_variance: Some(0.5),
            mouse_velocity_variance: Some(1.0),
            idle_ratio: Some(0.85),
            scroll_reversal_ratio: Some(0.92),
            passive_playback: Some(0.25),
            ..Default::default()
        };
        let state = estimator.estimate(&record, &LatentState::default(), 0.0, 5.0);
        assert!((state.instability - (0.3 + 0.1 + 0.2)).abs() < 1e-9);
        assert!((state.drift - (0.425 + 0.276 + 0.05)).abs() < 1e-9);
    }

    #[test]
    fn saturated_inputs_clamp_to_one() {
        let estimator = LatentEstimator::new(EstimatorConfig {
            switch_weight: 2.0,
            ..Default::default()
        });
        let state = estimator.estimate(&record(1.0, 0.0), &LatentState::default(), 0.0, 5.0);
        assert_eq!(state.instability, 1.0);
    }

    #[test]
    fn fatigue_accelerates_with_elapsed_time() {
        let estimator = LatentEstimator::default();
        let early = estimator.fatigue_increment(0.0, 5.0);
        let late = estimator.fatigue_increment(3600.0, 5.0);
        assert!((late - 2.0 * early).abs() < 1e-12);
        assert_eq!(estimator.fatigue_increment(100.0, -5.0), 0.0);
    }

    #[test]
    fn breaks_hold_fatigue_instead_of_lowering_it() {
        let estimator = LatentEstimator::default();
        let previous = LatentState::new(0.2, 0.1, 0.4);

        let on_break = FeatureRecord {
            break_detected: Some(true),
            ..Default::default()
        };
        assert_eq!(estimator.estimate(&on_break, &previous, 600.0, 5.0).fatigue, 0.4);

        let away = FeatureRecord {
            idle_ratio: Some(1.0),
            tab_hidden_ratio: Some(1.0),
            ..Default::default()
        };
        assert_eq!(estimator.estimate(&away, &previous, 600.0, 5.0).fatigue, 0.4);
    }

    #[test]
    fn fatigue_is_non_decreasing_except_across_reset() {
        let estimator = LatentEstimator::default();
        let mut rng = StdRng::seed_from_u64(7);
        let mut state = LatentState::default();

        for tick in 0..2_000u64 {
            let record = FeatureRecord {
                switch_rate: Some(rng.gen_range(-0.5..1.5)),
                idle_ratio: Some(rng.gen_range(0.0..1.0)),
                tab_hidden_ratio: Some(rng.gen_range(0.0..1.0)),
                typing_interval_variance: Some(rng.gen_range(0.0..1.0)),
                break_detected: Some(rng.gen_bool(0.05)),
                ..Default::default()
            };
            let next = estimator.estimate(&record, &state, tick as f64 * 5.0, 5.0);
            assert!(next.fatigue >= state.fatigue, "fatigue dropped at tick {tick}");
            assert!((0.0..=1.0).contains(&next.fatigue));

            state = if tick == 1_000 {
                let reset = next.with_fatigue_reset();
                assert_eq!(reset.fatigue, 0.0);
                reset
            } else {
                next
            };
        }
    }
}
