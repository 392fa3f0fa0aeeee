use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::intervention::banner::{BannerEvent, HideReason, RiskBand};
use crate::intervention::channel::{Channel, EscalationLevel, InterventionKind};
use crate::intervention::config::InterventionConfig;
use crate::intervention::state::InterventionState;
use crate::models::InferenceResult;
use crate::utils::math::secs;

/// Side effects for the UI layer, in the order they were decided.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Effect {
    VisualCue {
        channel: Channel,
        level: EscalationLevel,
    },
    Prompt {
        channel: Channel,
        level: EscalationLevel,
        kind: InterventionKind,
    },
    BreakdownModeEntered {
        channel: Channel,
    },
    BreakdownModeExited,
    BandChanged {
        from: RiskBand,
        to: RiskBand,
    },
    BannerShown,
    BannerHidden {
        reason: HideReason,
    },
}

impl Effect {
    pub fn is_prompt(&self) -> bool {
        matches!(self, Effect::Prompt { .. })
    }
}

fn banner_effect(event: BannerEvent) -> Effect {
    match event {
        BannerEvent::Shown => Effect::BannerShown,
        BannerEvent::Hidden(reason) => Effect::BannerHidden { reason },
    }
}

/// Decide this interval's interventions. Pure: the caller owns the state.
///
/// Channels are evaluated first, then the risk band and banner, which run
/// independently of channel dispatch and breakdown mode.
pub fn evaluate(
    state: &InterventionState,
    result: &InferenceResult,
    now: DateTime<Utc>,
    config: &InterventionConfig,
) -> (InterventionState, Vec<Effect>) {
    let mut next = state.clone();
    let mut effects = Vec::new();

    // Channels stay quiet for the whole interval in which breakdown mode exits.
    let mut suppressed = next.breakdown.active;
    if suppressed && next.breakdown.observe(result.risk, &config.breakdown_mode) {
        effects.push(Effect::BreakdownModeExited);
    }

    let floors = config.thresholds.for_task(result.task_type);
    for channel in Channel::ALL {
        let level = EscalationLevel::from_value(channel.value(result), floors.for_channel(channel));
        let channel_state = next.channel_mut(channel);
        channel_state.observe(level, config.max_hysteresis);

        if suppressed {
            continue;
        }

        let ready = channel_state.cooldown_expired(now);
        let fires = match level {
            EscalationLevel::Clear => continue,
            EscalationLevel::Level1 => false,
            EscalationLevel::Level2 => ready,
            EscalationLevel::Level3 => ready && channel_state.hysteresis >= config.sustain_intervals,
        };

        match channel.intervention(level).filter(|_| fires) {
            Some(kind) => {
                channel_state.cooldown_until =
                    Some(now + secs(config.cooldowns.for_channel(channel)));
                next.last_fired = Some(kind);
                effects.push(Effect::Prompt {
                    channel,
                    level,
                    kind,
                });
                if level == EscalationLevel::Level3 {
                    next.breakdown.enter(channel, now);
                    effects.push(Effect::BreakdownModeEntered { channel });
                    suppressed = true;
                }
            }
            None => effects.push(Effect::VisualCue { channel, level }),
        }
    }

    let band = RiskBand::from_risk(result.risk, &config.band);
    let previous_band = next.band;
    if band != previous_band {
        effects.push(Effect::BandChanged {
            from: previous_band,
            to: band,
        });
        next.band = band;
    }
    if let Some(event) = next.banner.advance(previous_band, band, now, &config.banner) {
        effects.push(banner_effect(event));
    }

    (next, effects)
}

/// User dismissed the breakdown banner.
pub fn dismiss_banner(
    state: &InterventionState,
    now: DateTime<Utc>,
    config: &InterventionConfig,
) -> (InterventionState, Vec<Effect>) {
    let mut next = state.clone();
    let effects = next
        .banner
        .dismiss(now, &config.banner)
        .map(banner_effect)
        .into_iter()
        .collect();
    (next, effects)
}
