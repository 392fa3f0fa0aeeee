//! Per-interval telemetry as delivered by the external collector.
//!
//! Every field is optional on the wire. Values that are missing, null, of the
//! wrong JSON type, or non-finite read as 0 so they can never be mistaken for a
//! genuine signal.

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use log::warn;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::utils::math::clamp01;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum TaskType {
    Coding,
    Writing,
    Reading,
    Video,
    General,
}

impl Default for TaskType {
    fn default() -> Self {
        TaskType::General
    }
}

impl TaskType {
    pub const ALL: [TaskType; 5] = [
        TaskType::Coding,
        TaskType::Writing,
        TaskType::Reading,
        TaskType::Video,
        TaskType::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Coding => "coding",
            TaskType::Writing => "writing",
            TaskType::Reading => "reading",
            TaskType::Video => "video",
            TaskType::General => "general",
        }
    }

    /// Unknown labels fall back to `General`.
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }
}

impl FromStr for TaskType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "coding" => Ok(TaskType::Coding),
            "writing" => Ok(TaskType::Writing),
            "reading" => Ok(TaskType::Reading),
            "video" | "lecture" => Ok(TaskType::Video),
            "general" => Ok(TaskType::General),
            other => Err(anyhow!("unknown task type '{other}'")),
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw telemetry snapshot for one sampling interval.
///
/// Field names and order are stable: the risk model is trained against them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FeatureRecord {
    /// Tab/app switches, normalised to [0, 1].
    #[serde(default, deserialize_with = "lenient_f64")]
    pub switch_rate: Option<f64>,
    /// Fraction of the interval with no input.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub idle_ratio: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub typing_interval_variance: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub mouse_velocity_variance: Option<f64>,
    /// Share of scroll events that reverse direction (re-reading).
    #[serde(default, deserialize_with = "lenient_f64")]
    pub scroll_reversal_ratio: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub tab_hidden_ratio: Option<f64>,
    /// Fraction of the interval with passive media playing.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub passive_playback: Option<f64>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub break_detected: Option<bool>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub task_type: Option<String>,
}

/// Sanitised view of a [`FeatureRecord`]: every value finite and in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TelemetrySignals {
    pub switch_rate: f64,
    pub idle_ratio: f64,
    pub typing_interval_variance: f64,
    pub mouse_velocity_variance: f64,
    pub scroll_reversal_ratio: f64,
    pub tab_hidden_ratio: f64,
    pub passive_playback: f64,
    pub break_detected: bool,
}

impl FeatureRecord {
    /// Parse one JSON record. Anything unparseable becomes the all-zero record.
    pub fn from_json_lenient(raw: &str) -> Self {
        match serde_json::from_str::<FeatureRecord>(raw) {
            Ok(record) => record,
            Err(err) => {
                warn!("malformed feature record, substituting zeros: {err}");
                FeatureRecord::default()
            }
        }
    }

    pub fn signals(&self) -> TelemetrySignals {
        TelemetrySignals {
            switch_rate: unit(self.switch_rate),
            idle_ratio: unit(self.idle_ratio),
            typing_interval_variance: unit(self.typing_interval_variance),
            mouse_velocity_variance: unit(self.mouse_velocity_variance),
            scroll_reversal_ratio: unit(self.scroll_reversal_ratio),
            tab_hidden_ratio: unit(self.tab_hidden_ratio),
            passive_playback: unit(self.passive_playback),
            break_detected: self.break_detected.unwrap_or(false),
        }
    }

    /// Task type carried by the record, if it names a known one.
    pub fn task_type(&self) -> Option<TaskType> {
        self.task_type.as_deref().and_then(|raw| raw.parse().ok())
    }
}

fn unit(value: Option<f64>) -> f64 {
    value.map(clamp01).unwrap_or(0.0)
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(number) => number.as_f64().filter(|v| v.is_finite()),
        Value::String(text) => text.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        Value::Bool(flag) => Some(if flag { 1.0 } else { 0.0 }),
        _ => None,
    })
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(flag) => Some(flag),
        Value::Number(number) => number.as_f64().map(|v| v != 0.0),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(text) => Some(text),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_and_null_fields_read_as_zero() {
        let record = FeatureRecord::from_json_lenient(r#"{"switch_rate": null, "idle_ratio": 0.4}"#);
        let signals = record.signals();
        assert_eq!(signals.switch_rate, 0.0);
        assert_eq!(signals.idle_ratio, 0.4);
        assert_eq!(signals.mouse_velocity_variance, 0.0);
        assert!(!signals.break_detected);
    }

    #[test]
    fn wrong_types_do_not_poison_the_record() {
        let record = FeatureRecord::from_json_lenient(
            r#"{"switch_rate": "0.5", "idle_ratio": [1, 2], "break_detected": "yes", "task_type": 7}"#,
        );
        let signals = record.signals();
        assert_eq!(signals.switch_rate, 0.5);
        assert_eq!(signals.idle_ratio, 0.0);
        assert!(signals.break_detected);
        assert_eq!(record.task_type(), None);
    }

    #[test]
    fn garbage_becomes_the_zero_record() {
        let record = FeatureRecord::from_json_lenient("not json at all");
        assert_eq!(record, FeatureRecord::default());
        assert_eq!(record.signals(), TelemetrySignals::default());
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let record = FeatureRecord {
            switch_rate: Some(3.0),
            idle_ratio: Some(-1.0),
            ..Default::default()
        };
        let signals = record.signals();
        assert_eq!(signals.switch_rate, 1.0);
        assert_eq!(signals.idle_ratio, 0.0);
    }

    #[test]
    fn task_type_parsing_is_case_insensitive() {
        assert_eq!(TaskType::parse_lenient(" Coding "), TaskType::Coding);
        assert_eq!(TaskType::parse_lenient("lecture"), TaskType::Video);
        assert_eq!(TaskType::parse_lenient("gardening"), TaskType::General);

        let record = FeatureRecord {
            task_type: Some("READING".into()),
            ..Default::default()
        };
        assert_eq!(record.task_type(), Some(TaskType::Reading));
    }
}
