use serde::{Deserialize, Serialize};

use crate::intervention::banner::{BannerState, RiskBand};
use crate::intervention::breakdown::BreakdownMode;
use crate::intervention::channel::{Channel, ChannelState, InterventionKind};
use crate::snapshot::Snapshot;

/// Everything the dispatcher remembers between intervals for one session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InterventionState {
    pub instability: ChannelState,
    pub drift: ChannelState,
    pub fatigue: ChannelState,
    pub breakdown: BreakdownMode,
    pub band: RiskBand,
    pub banner: BannerState,
    pub last_fired: Option<InterventionKind>,
}

impl InterventionState {
    pub fn channel(&self, channel: Channel) -> &ChannelState {
        match channel {
            Channel::Instability => &self.instability,
            Channel::Drift => &self.drift,
            Channel::Fatigue => &self.fatigue,
        }
    }

    pub fn channel_mut(&mut self, channel: Channel) -> &mut ChannelState {
        match channel {
            Channel::Instability => &mut self.instability,
            Channel::Drift => &mut self.drift,
            Channel::Fatigue => &mut self.fatigue,
        }
    }
}

impl Snapshot for InterventionState {}
