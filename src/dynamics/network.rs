use crate::dynamics::config::DynamicsConfig;
use crate::models::{LatentState, NetworkState};
use crate::utils::math::clamp01;

/// Steps the ECN / DMN / Salience / Load integrators once per interval.
#[derive(Debug, Clone, Default)]
pub struct NetworkSimulator {
    config: DynamicsConfig,
}

impl NetworkSimulator {
    pub fn new(config: DynamicsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DynamicsConfig {
        &self.config
    }

    /// Deterministic update. `previous` is the latent state of the prior
    /// interval and only feeds the salience rate-of-change boost.
    pub fn next(
        &self,
        network: &NetworkState,
        latent: &LatentState,
        previous: &LatentState,
    ) -> NetworkState {
        let cfg = &self.config;

        let ecn_target = clamp01(
            1.0 - cfg.ecn_instability_weight * latent.instability
                - cfg.ecn_drift_weight * latent.drift
                - cfg.dmn_inhibits_ecn * network.dmn,
        );
        let dmn_target = clamp01(latent.drift * (1.0 - cfg.ecn_inhibits_dmn * network.ecn));

        let rising = (latent.instability - previous.instability).max(0.0);
        let salience_target = clamp01(latent.instability + cfg.salience_delta_boost * rising);
        let salience = integrate(network.salience, salience_target, cfg.salience_gain);

        let load_target = clamp01(
            cfg.load_salience_weight * salience + cfg.load_fatigue_weight * latent.fatigue,
        );

        NetworkState {
            ecn: integrate(network.ecn, ecn_target, cfg.ecn_gain),
            dmn: integrate(network.dmn, dmn_target, cfg.dmn_gain),
            salience,
            load: integrate(network.load, load_target, cfg.load_gain),
        }
    }
}

/// Leaky integrator: close `gain` of the gap to `target`, then clamp.
fn integrate(old: f64, target: f64, gain: f64) -> f64 {
    clamp01(old + gain * (target - old))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_unit(network: &NetworkState) -> bool {
        network.values().iter().all(|v| (0.0..=1.0).contains(v))
    }

    #[test]
    fn channels_stay_clamped_for_extreme_inputs() {
        let extremes = [0.0, 1.0];
        let starts = [
            NetworkState::default(),
            NetworkState {
                ecn: 0.0,
                dmn: 1.0,
                salience: 1.0,
                load: 1.0,
            },
        ];
        let wild = NetworkSimulator::new(DynamicsConfig {
            ecn_gain: 1.8,
            salience_gain: 2.5,
            salience_delta_boost: 10.0,
            ..Default::default()
        });

        for simulator in [NetworkSimulator::default(), wild] {
            for start in starts {
                for &i in &extremes {
                    for &d in &extremes {
                        for &f in &extremes {
                            for &prev_i in &extremes {
                                let latent = LatentState::new(i, d, f);
                                let previous = LatentState::new(prev_i, 0.0, 0.0);
                                let mut network = start;
                                for _ in 0..50 {
                                    network = simulator.next(&network, &latent, &previous);
                                    assert!(in_unit(&network), "{network:?}");
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn instability_raises_salience_and_lowers_ecn() {
        let simulator = NetworkSimulator::default();
        let start = NetworkState {
            ecn: 0.7,
            dmn: 0.3,
            salience: 0.3,
            load: 0.3,
        };
        let previous = LatentState::new(0.2, 0.2, 0.1);
        let low = simulator.next(&start, &LatentState::new(0.2, 0.2, 0.1), &previous);
        let high = simulator.next(&start, &LatentState::new(0.7, 0.2, 0.1), &previous);

        assert!(high.salience > low.salience);
        assert!(high.ecn < low.ecn);
    }

    #[test]
    fn drift_raises_dmn_and_lowers_ecn() {
        let simulator = NetworkSimulator::default();
        let start = NetworkState {
            ecn: 0.7,
            dmn: 0.3,
            salience: 0.3,
            load: 0.3,
        };
        let previous = LatentState::default();
        let low = simulator.next(&start, &LatentState::new(0.1, 0.1, 0.1), &previous);
        let high = simulator.next(&start, &LatentState::new(0.1, 0.8, 0.1), &previous);

        assert!(high.dmn > low.dmn);
        assert!(high.ecn < low.ecn);
    }

    #[test]
    fn sudden_instability_boosts_salience_beyond_level() {
        let simulator = NetworkSimulator::default();
        let start = NetworkState::default();
        let latent = LatentState::new(0.5, 0.0, 0.0);

        let steady = simulator.next(&start, &latent, &LatentState::new(0.5, 0.0, 0.0));
        let jump = simulator.next(&start, &latent, &LatentState::new(0.1, 0.0, 0.0));
        assert!(jump.salience > steady.salience);
    }

    #[test]
    fn update_is_a_leaky_integrator() {
        let simulator = NetworkSimulator::default();
        let next = simulator.next(
            &NetworkState::default(),
            &LatentState::new(0.0, 0.0, 0.0),
            &LatentState::default(),
        );
        // Targets: ECN 1, DMN 0, Salience 0, Load 0; all already there.
        assert_eq!(next, NetworkState::default());

        let next = simulator.next(
            &NetworkState::default(),
            &LatentState::new(1.0, 0.0, 0.0),
            &LatentState::new(1.0, 0.0, 0.0),
        );
        // ECN target 0.4, gain 0.3: 1 + 0.3 * (0.4 - 1) = 0.82
        assert!((next.ecn - 0.82).abs() < 1e-9);
        // Salience target 1, gain 0.4
        assert!((next.salience - 0.4).abs() < 1e-9);
    }
}
