use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::intervention::config::{BandConfig, BannerConfig};
use crate::utils::math::secs;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RiskBand {
    Green,
    Yellow,
    Red,
}

impl Default for RiskBand {
    fn default() -> Self {
        RiskBand::Green
    }
}

impl RiskBand {
    pub fn from_risk(risk: f64, config: &BandConfig) -> Self {
        if risk >= config.red {
            RiskBand::Red
        } else if risk >= config.yellow {
            RiskBand::Yellow
        } else {
            RiskBand::Green
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum BannerPhase {
    Hidden,
    Showing,
    /// Closed while risk may still be red; can re-fire after the short cooldown.
    Dismissed,
}

impl Default for BannerPhase {
    fn default() -> Self {
        BannerPhase::Hidden
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum HideReason {
    Dismissed,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerEvent {
    Shown,
    Hidden(HideReason),
}

/// Full-screen breakdown banner driven by the risk band.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BannerState {
    pub phase: BannerPhase,
    pub shown_at: Option<DateTime<Utc>>,
    pub cooldown_until: Option<DateTime<Utc>>,
    /// Red was entered while hidden and the banner has not shown for it yet.
    #[serde(default)]
    pub pending_red: bool,
}

impl BannerState {
    fn cooldown_expired(&self, now: DateTime<Utc>) -> bool {
        self.cooldown_until.map_or(true, |until| now >= until)
    }

    fn show(&mut self, now: DateTime<Utc>, config: &BannerConfig) -> BannerEvent {
        self.phase = BannerPhase::Showing;
        self.pending_red = false;
        self.shown_at = Some(now);
        self.cooldown_until = Some(now + secs(config.entry_cooldown_secs));
        BannerEvent::Shown
    }

    fn hide(&mut self, reason: HideReason, now: DateTime<Utc>, config: &BannerConfig) -> BannerEvent {
        self.phase = BannerPhase::Dismissed;
        self.shown_at = None;
        self.cooldown_until = Some(now + secs(config.refire_cooldown_secs));
        BannerEvent::Hidden(reason)
    }

    /// One interval of band input. At most one visible transition per call.
    pub fn advance(
        &mut self,
        previous: RiskBand,
        band: RiskBand,
        now: DateTime<Utc>,
        config: &BannerConfig,
    ) -> Option<BannerEvent> {
        match self.phase {
            BannerPhase::Hidden => {
                if band != RiskBand::Red {
                    self.pending_red = false;
                    return None;
                }
                if previous != RiskBand::Red {
                    self.pending_red = true;
                }
                // A red entry inside the cooldown waits for it to expire.
                (self.pending_red && self.cooldown_expired(now)).then(|| self.show(now, config))
            }
            BannerPhase::Showing => {
                let timed_out = self
                    .shown_at
                    .map_or(true, |at| now >= at + secs(config.auto_dismiss_secs));
                timed_out.then(|| self.hide(HideReason::TimedOut, now, config))
            }
            BannerPhase::Dismissed => {
                if band != RiskBand::Red {
                    self.phase = BannerPhase::Hidden;
                    self.pending_red = false;
                    None
                } else if self.cooldown_expired(now) {
                    Some(self.show(now, config))
                } else {
                    None
                }
            }
        }
    }

    /// User closed the banner. No-op unless it is showing.
    pub fn dismiss(&mut self, now: DateTime<Utc>, config: &BannerConfig) -> Option<BannerEvent> {
        (self.phase == BannerPhase::Showing).then(|| self.hide(HideReason::Dismissed, now, config))
    }
}
