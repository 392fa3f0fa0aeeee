pub mod banner;
pub mod breakdown;
pub mod channel;
pub mod config;
pub mod dispatcher;
pub mod state;

pub use banner::{BannerPhase, BannerState, HideReason, RiskBand};
pub use breakdown::BreakdownMode;
pub use channel::{Channel, ChannelState, EscalationLevel, InterventionKind};
pub use config::{
    BandConfig, BannerConfig, BreakdownModeConfig, ChannelFloors, CooldownConfig,
    InterventionConfig, LevelFloors, TaskThresholds,
};
pub use dispatcher::{dismiss_banner, evaluate, Effect};
pub use state::InterventionState;
