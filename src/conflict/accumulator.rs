use serde::{Deserialize, Serialize};

use crate::conflict::config::ConflictConfig;
use crate::models::{LatentState, NetworkState};
use crate::snapshot::Snapshot;
use crate::utils::math::finite_or_zero;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ConflictPhase {
    Accumulating,
    /// Entered on a threshold crossing; left once the value drains below the re-arm level.
    Breakdown,
}

impl Default for ConflictPhase {
    fn default() -> Self {
        ConflictPhase::Accumulating
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConflictUpdate {
    pub value: f64,
    /// Edge: true only on the interval the crossing fired.
    pub breakdown_imminent: bool,
    /// Level: true for as long as the phase is `Breakdown`.
    pub breakdown_active: bool,
}

/// Running integral of salience/instability evidence.
///
/// Crossing the threshold is edge-triggered and drains the value by
/// `drain_fraction`. A sustained high-conflict stretch fires once and then
/// stays in `Breakdown` until the value decays below the re-arm level.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConflictAccumulator {
    value: f64,
    phase: ConflictPhase,
    episodes: u64,
}

impl ConflictAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn phase(&self) -> ConflictPhase {
        self.phase
    }

    /// Number of crossings so far this session.
    pub fn episodes(&self) -> u64 {
        self.episodes
    }

    /// Evidence added this interval; never negative.
    pub fn contribution(salience: f64, instability: f64, config: &ConflictConfig) -> f64 {
        let mix = config.salience_weight * salience + config.instability_weight * instability;
        finite_or_zero(config.gain * (mix - config.noise_floor).max(0.0))
    }

    pub fn update(
        &mut self,
        network: &NetworkState,
        latent: &LatentState,
        config: &ConflictConfig,
    ) -> ConflictUpdate {
        let contribution = Self::contribution(network.salience, latent.instability, config);
        self.step(contribution, config)
    }

    pub fn step(&mut self, contribution: f64, config: &ConflictConfig) -> ConflictUpdate {
        let leaked = finite_or_zero(self.value) * config.decay;
        self.value = finite_or_zero(leaked + finite_or_zero(contribution)).max(0.0);

        let mut breakdown_imminent = false;
        match self.phase {
            ConflictPhase::Accumulating if self.value >= config.threshold => {
                breakdown_imminent = true;
                self.episodes += 1;
                self.phase = ConflictPhase::Breakdown;
                self.value *= 1.0 - config.drain_fraction.clamp(0.0, 1.0);
            }
            ConflictPhase::Breakdown if self.value < config.threshold * config.rearm_ratio => {
                self.phase = ConflictPhase::Accumulating;
            }
            _ => {}
        }

        ConflictUpdate {
            value: self.value,
            breakdown_imminent,
            breakdown_active: self.phase == ConflictPhase::Breakdown,
        }
    }
}

impl Snapshot for ConflictAccumulator {}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX_CROSSING_INTERVALS: usize = 5;

    #[test]
    fn constant_high_conflict_crosses_within_bound() {
        let config = ConflictConfig::default();
        let contribution = ConflictAccumulator::contribution(1.0, 1.0, &config);
        assert!((contribution - 0.39).abs() < 1e-9);

        let mut acc = ConflictAccumulator::new();
        let fired_at = (1..=MAX_CROSSING_INTERVALS)
            .find(|_| acc.step(contribution, &config).breakdown_imminent);
        assert_eq!(fired_at, Some(3));
        assert_eq!(acc.episodes(), 1);
    }

    #[test]
    fn crossing_drains_by_fixed_fraction() {
        let config = ConflictConfig::default();
        let mut acc = ConflictAccumulator::new();
        acc.step(0.6, &config);
        let update = acc.step(0.6, &config);
        // 0.6 * 0.9 + 0.6 = 1.14, drained by half
        assert!(update.breakdown_imminent);
        assert!((update.value - 0.57).abs() < 1e-9);

        let full_reset = ConflictConfig {
            drain_fraction: 1.0,
            ..Default::default()
        };
        let mut acc = ConflictAccumulator::new();
        let update = acc.step(1.5, &full_reset);
        assert!(update.breakdown_imminent);
        assert_eq!(update.value, 0.0);
    }

    #[test]
    fn sustained_conflict_fires_once_and_stays_active() {
        let config = ConflictConfig::default();
        let mut acc = ConflictAccumulator::new();
        let updates: Vec<_> = (0..12).map(|_| acc.step(0.39, &config)).collect();

        let edges: Vec<usize> = updates
            .iter()
            .enumerate()
            .filter(|(_, u)| u.breakdown_imminent)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(edges, vec![2]);
        assert!(updates[..2].iter().all(|u| !u.breakdown_active));
        assert!(updates[2..].iter().all(|u| u.breakdown_active));
        assert_eq!(acc.phase(), ConflictPhase::Breakdown);
    }

    #[test]
    fn zero_contribution_decays_monotonically_and_rearms() {
        let config = ConflictConfig::default();
        let mut acc = ConflictAccumulator::new();
        for _ in 0..12 {
            acc.step(0.39, &config);
        }

        let mut last = acc.value();
        for _ in 0..60 {
            let update = acc.step(0.0, &config);
            assert!(update.value <= last);
            assert!(update.value >= 0.0);
            assert!(!update.breakdown_imminent);
            last = update.value;
        }
        assert!(last < 0.01);
        assert_eq!(acc.phase(), ConflictPhase::Accumulating);

        // Re-armed: a new crossing fires again.
        let fired = (0..MAX_CROSSING_INTERVALS).any(|_| acc.step(0.39, &config).breakdown_imminent);
        assert!(fired);
        assert_eq!(acc.episodes(), 2);
    }

    #[test]
    fn negative_or_nan_evidence_never_goes_below_zero() {
        let config = ConflictConfig::default();
        let mut acc = ConflictAccumulator::new();
        assert_eq!(acc.step(-3.0, &config).value, 0.0);
        assert_eq!(acc.step(f64::NAN, &config).value, 0.0);
        assert_eq!(ConflictAccumulator::contribution(0.2, 0.2, &config), 0.0);
    }
}
