use serde::{Deserialize, Serialize};

use crate::aggregation::window::RollingWindow;
use crate::models::InferenceResult;
use crate::utils::math::{clamp01, mean, variance};

/// Instability variance that maps to full insula activation.
const INSULA_VARIANCE_SCALE: f64 = 0.25;
/// Conflict swing across the window that maps to full basal ganglia activation.
const BASAL_GANGLIA_SWING_SCALE: f64 = 2.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BrainRegion {
    #[serde(rename = "DLPFC")]
    Dlpfc,
    #[serde(rename = "ACC")]
    Acc,
    Insula,
    #[serde(rename = "PCC")]
    Pcc,
    #[serde(rename = "mPFC")]
    Mpfc,
    BasalGanglia,
}

impl BrainRegion {
    pub const ALL: [BrainRegion; 6] = [
        BrainRegion::Dlpfc,
        BrainRegion::Acc,
        BrainRegion::Insula,
        BrainRegion::Pcc,
        BrainRegion::Mpfc,
        BrainRegion::BasalGanglia,
    ];
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegionActivation {
    pub region: BrainRegion,
    pub activation: f64,
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BrainMap {
    pub regions: Vec<RegionActivation>,
    pub data_points: usize,
}

impl BrainMap {
    pub fn from_window(window: &RollingWindow) -> Self {
        let entries: Vec<&InferenceResult> = window.entries().collect();
        let column = |pick: fn(&InferenceResult) -> f64| -> Vec<f64> {
            entries.iter().map(|r| pick(r)).collect()
        };

        let drift = mean(&column(|r| r.drift));
        let fatigue = mean(&column(|r| r.fatigue));
        let conflict_swing = match (entries.first(), entries.last()) {
            (Some(first), Some(last)) if entries.len() > 1 => {
                (last.accumulated_conflict - first.accumulated_conflict).abs()
            }
            (Some(only), _) => only.accumulated_conflict,
            _ => 0.0,
        };

        let regions = BrainRegion::ALL
            .iter()
            .map(|&region| {
                let raw = match region {
                    BrainRegion::Dlpfc => mean(&column(|r| r.network.ecn)),
                    BrainRegion::Acc => mean(&column(|r| r.network.salience)),
                    BrainRegion::Insula => {
                        variance(&column(|r| r.instability)) / INSULA_VARIANCE_SCALE
                    }
                    BrainRegion::Pcc => drift,
                    BrainRegion::Mpfc => (drift * fatigue).max(0.0).sqrt(),
                    BrainRegion::BasalGanglia => conflict_swing / BASAL_GANGLIA_SWING_SCALE,
                };
                let activation = clamp01(raw);
                RegionActivation {
                    region,
                    activation,
                    color: activation_color(activation),
                }
            })
            .collect();

        Self {
            regions,
            data_points: entries.len(),
        }
    }

    pub fn activation(&self, region: BrainRegion) -> f64 {
        self.regions
            .iter()
            .find(|r| r.region == region)
            .map(|r| r.activation)
            .unwrap_or(0.0)
    }
}

/// Blue at 0, yellow at 0.5, red at 1.
pub fn activation_color(activation: f64) -> String {
    let a = clamp01(activation);
    let (r, g, b) = if a <= 0.5 {
        let t = a * 2.0;
        (255.0 * t, 255.0 * t, 255.0 * (1.0 - t))
    } else {
        let t = (a - 0.5) * 2.0;
        (255.0, 255.0 * (1.0 - t), 0.0)
    };
    format!("#{:02X}{:02X}{:02X}", r as u8, g as u8, b as u8)
}
