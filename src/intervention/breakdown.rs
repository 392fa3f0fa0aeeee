use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::intervention::channel::Channel;
use crate::intervention::config::BreakdownModeConfig;

/// Global mode entered by a level-3 prompt. Suppresses channel prompts until
/// risk has stayed low for enough consecutive intervals.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownMode {
    pub active: bool,
    pub recovery_count: u32,
    pub entered_at: Option<DateTime<Utc>>,
    pub trigger: Option<Channel>,
}

impl BreakdownMode {
    pub fn enter(&mut self, channel: Channel, now: DateTime<Utc>) {
        *self = Self {
            active: true,
            recovery_count: 0,
            entered_at: Some(now),
            trigger: Some(channel),
        };
    }

    /// Feed one interval's risk. Returns true on the interval the mode exits.
    pub fn observe(&mut self, risk: f64, config: &BreakdownModeConfig) -> bool {
        if !self.active {
            return false;
        }
        if risk < config.low_risk_threshold {
            self.recovery_count += 1;
        } else {
            self.recovery_count = 0;
        }
        if self.recovery_count >= config.recovery_intervals.max(1) {
            *self = Self::default();
            return true;
        }
        false
    }
}
