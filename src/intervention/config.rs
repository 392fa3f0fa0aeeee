use anyhow::{bail, ensure, Result};
use serde::{Deserialize, Serialize};

use crate::intervention::channel::Channel;
use crate::models::TaskType;

/// Ascending level-1 / level-2 / level-3 floors for one channel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LevelFloors {
    pub level1: f64,
    pub level2: f64,
    pub level3: f64,
}

impl LevelFloors {
    pub const fn new(level1: f64, level2: f64, level3: f64) -> Self {
        Self {
            level1,
            level2,
            level3,
        }
    }

    fn validate(&self, what: &str) -> Result<()> {
        for floor in [self.level1, self.level2, self.level3] {
            ensure!(
                floor.is_finite() && (0.0..=1.0).contains(&floor),
                "{what}: floor {floor} outside [0, 1]"
            );
        }
        if !(self.level1 < self.level2 && self.level2 < self.level3) {
            bail!(
                "{what}: floors must ascend, got {} / {} / {}",
                self.level1,
                self.level2,
                self.level3
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ChannelFloors {
    pub instability: LevelFloors,
    pub drift: LevelFloors,
    pub fatigue: LevelFloors,
}

impl ChannelFloors {
    pub fn for_channel(&self, channel: Channel) -> &LevelFloors {
        match channel {
            Channel::Instability => &self.instability,
            Channel::Drift => &self.drift,
            Channel::Fatigue => &self.fatigue,
        }
    }
}

/// Floors per task type. Coding tolerates less switching; video tolerates
/// more passivity before drift counts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TaskThresholds {
    pub coding: ChannelFloors,
    pub writing: ChannelFloors,
    pub reading: ChannelFloors,
    pub video: ChannelFloors,
    pub general: ChannelFloors,
}

impl Default for TaskThresholds {
    fn default() -> Self {
        Self {
            coding: ChannelFloors {
                instability: LevelFloors::new(0.20, 0.30, 0.55),
                drift: LevelFloors::new(0.35, 0.50, 0.70),
                fatigue: LevelFloors::new(0.55, 0.70, 0.85),
            },
            writing: ChannelFloors {
                instability: LevelFloors::new(0.25, 0.40, 0.60),
                drift: LevelFloors::new(0.30, 0.45, 0.65),
                fatigue: LevelFloors::new(0.55, 0.70, 0.85),
            },
            reading: ChannelFloors {
                instability: LevelFloors::new(0.25, 0.40, 0.60),
                drift: LevelFloors::new(0.35, 0.50, 0.70),
                fatigue: LevelFloors::new(0.50, 0.65, 0.80),
            },
            video: ChannelFloors {
                instability: LevelFloors::new(0.30, 0.45, 0.65),
                drift: LevelFloors::new(0.50, 0.65, 0.80),
                fatigue: LevelFloors::new(0.50, 0.65, 0.80),
            },
            general: ChannelFloors {
                instability: LevelFloors::new(0.25, 0.40, 0.60),
                drift: LevelFloors::new(0.35, 0.50, 0.70),
                fatigue: LevelFloors::new(0.55, 0.70, 0.85),
            },
        }
    }
}

impl TaskThresholds {
    pub fn for_task(&self, task: TaskType) -> &ChannelFloors {
        match task {
            TaskType::Coding => &self.coding,
            TaskType::Writing => &self.writing,
            TaskType::Reading => &self.reading,
            TaskType::Video => &self.video,
            TaskType::General => &self.general,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CooldownConfig {
    pub instability_secs: u64,
    pub drift_secs: u64,
    pub fatigue_secs: u64,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            instability_secs: 180,
            drift_secs: 300,
            fatigue_secs: 480,
        }
    }
}

impl CooldownConfig {
    pub fn for_channel(&self, channel: Channel) -> u64 {
        match channel {
            Channel::Instability => self.instability_secs,
            Channel::Drift => self.drift_secs,
            Channel::Fatigue => self.fatigue_secs,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BreakdownModeConfig {
    /// Risk must stay below this to count as a recovery interval
    pub low_risk_threshold: f64,
    /// Consecutive recovery intervals needed to leave breakdown mode
    pub recovery_intervals: u32,
}

impl Default for BreakdownModeConfig {
    fn default() -> Self {
        Self {
            low_risk_threshold: 0.35,
            recovery_intervals: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BandConfig {
    pub yellow: f64,
    pub red: f64,
}

impl Default for BandConfig {
    fn default() -> Self {
        Self {
            yellow: 0.4,
            red: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BannerConfig {
    /// Set when the banner shows; guards against red/yellow flapping
    pub entry_cooldown_secs: u64,
    pub auto_dismiss_secs: u64,
    /// Set on dismissal or timeout so the banner can come back soon
    pub refire_cooldown_secs: u64,
}

impl Default for BannerConfig {
    fn default() -> Self {
        Self {
            entry_cooldown_secs: 60,
            auto_dismiss_secs: 30,
            refire_cooldown_secs: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InterventionConfig {
    pub thresholds: TaskThresholds,
    pub cooldowns: CooldownConfig,
    /// Hysteresis counters saturate here
    pub max_hysteresis: u32,
    /// Counter value a level-3 reading needs before it may fire
    pub sustain_intervals: u32,
    pub breakdown_mode: BreakdownModeConfig,
    pub band: BandConfig,
    pub banner: BannerConfig,
}

impl Default for InterventionConfig {
    fn default() -> Self {
        Self {
            thresholds: TaskThresholds::default(),
            cooldowns: CooldownConfig::default(),
            max_hysteresis: 3,
            sustain_intervals: 2,
            breakdown_mode: BreakdownModeConfig::default(),
            band: BandConfig::default(),
            banner: BannerConfig::default(),
        }
    }
}

impl InterventionConfig {
    pub fn validate(&self) -> Result<()> {
        for task in TaskType::ALL {
            let floors = self.thresholds.for_task(task);
            for channel in Channel::ALL {
                floors
                    .for_channel(channel)
                    .validate(&format!("{task} {channel} thresholds"))?;
            }
        }

        ensure!(self.max_hysteresis >= 1, "max_hysteresis must be at least 1");
        ensure!(
            self.sustain_intervals <= self.max_hysteresis,
            "sustain_intervals ({}) can never be reached with max_hysteresis {}",
            self.sustain_intervals,
            self.max_hysteresis
        );

        let low = self.breakdown_mode.low_risk_threshold;
        ensure!(
            (0.0..=1.0).contains(&low),
            "low_risk_threshold {low} outside [0, 1]"
        );
        ensure!(
            self.breakdown_mode.recovery_intervals >= 1,
            "recovery_intervals must be at least 1"
        );

        let BandConfig { yellow, red } = self.band;
        ensure!(
            (0.0..=1.0).contains(&yellow) && (0.0..=1.0).contains(&red) && yellow < red,
            "band thresholds must satisfy 0 <= yellow < red <= 1, got {yellow} / {red}"
        );
        Ok(())
    }
}
