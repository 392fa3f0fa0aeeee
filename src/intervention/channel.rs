use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::intervention::config::LevelFloors;
use crate::models::InferenceResult;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Channel {
    Instability,
    Drift,
    Fatigue,
}

impl Channel {
    /// Evaluation order within one interval.
    pub const ALL: [Channel; 3] = [Channel::Instability, Channel::Drift, Channel::Fatigue];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Instability => "instability",
            Channel::Drift => "drift",
            Channel::Fatigue => "fatigue",
        }
    }

    pub fn value(&self, result: &InferenceResult) -> f64 {
        match self {
            Channel::Instability => result.instability,
            Channel::Drift => result.drift,
            Channel::Fatigue => result.fatigue,
        }
    }

    /// The prompt a level-2 or level-3 reading on this channel triggers.
    pub fn intervention(&self, level: EscalationLevel) -> Option<InterventionKind> {
        let kind = match (self, level) {
            (Channel::Instability, EscalationLevel::Level2) => InterventionKind::ImpulseCheck,
            (Channel::Instability, EscalationLevel::Level3) => InterventionKind::SpotlightMode,
            (Channel::Drift, EscalationLevel::Level2) => InterventionKind::StillEngagedCheck,
            (Channel::Drift, EscalationLevel::Level3) => InterventionKind::ReflectionPrompt,
            (Channel::Fatigue, EscalationLevel::Level2) => InterventionKind::MicroBreak,
            (Channel::Fatigue, EscalationLevel::Level3) => InterventionKind::BreathingExercise,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum EscalationLevel {
    Clear,
    /// Visual cue only
    Level1,
    /// Gentle prompt
    Level2,
    /// Strong prompt and breakdown mode
    Level3,
}

impl Default for EscalationLevel {
    fn default() -> Self {
        EscalationLevel::Clear
    }
}

impl EscalationLevel {
    pub fn from_value(value: f64, floors: &LevelFloors) -> Self {
        if value >= floors.level3 {
            EscalationLevel::Level3
        } else if value >= floors.level2 {
            EscalationLevel::Level2
        } else if value >= floors.level1 {
            EscalationLevel::Level1
        } else {
            EscalationLevel::Clear
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum InterventionKind {
    ImpulseCheck,
    SpotlightMode,
    StillEngagedCheck,
    ReflectionPrompt,
    MicroBreak,
    BreathingExercise,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelState {
    /// Up on intervals at or above level 1, down otherwise; saturating.
    pub hysteresis: u32,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub level: EscalationLevel,
}

impl ChannelState {
    pub fn observe(&mut self, level: EscalationLevel, max_hysteresis: u32) {
        if level >= EscalationLevel::Level1 {
            self.hysteresis = (self.hysteresis + 1).min(max_hysteresis);
        } else {
            self.hysteresis = self.hysteresis.saturating_sub(1);
        }
        self.level = level;
    }

    pub fn cooldown_expired(&self, now: DateTime<Utc>) -> bool {
        self.cooldown_until.map_or(true, |until| now >= until)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_from_floors() {
        let floors = LevelFloors::new(0.2, 0.3, 0.55);
        assert_eq!(EscalationLevel::from_value(0.1, &floors), EscalationLevel::Clear);
        assert_eq!(EscalationLevel::from_value(0.2, &floors), EscalationLevel::Level1);
        assert_eq!(EscalationLevel::from_value(0.3, &floors), EscalationLevel::Level2);
        assert_eq!(EscalationLevel::from_value(0.9, &floors), EscalationLevel::Level3);
    }

    #[test]
    fn hysteresis_saturates_and_decays() {
        let mut state = ChannelState::default();
        for _ in 0..5 {
            state.observe(EscalationLevel::Level2, 3);
        }
        assert_eq!(state.hysteresis, 3);
        state.observe(EscalationLevel::Clear, 3);
        assert_eq!(state.hysteresis, 2);
        for _ in 0..5 {
            state.observe(EscalationLevel::Clear, 3);
        }
        assert_eq!(state.hysteresis, 0);
    }

    #[test]
    fn only_levels_two_and_three_map_to_prompts() {
        assert_eq!(Channel::Drift.intervention(EscalationLevel::Level1), None);
        assert_eq!(
            Channel::Fatigue.intervention(EscalationLevel::Level3),
            Some(InterventionKind::BreathingExercise)
        );
    }
}
