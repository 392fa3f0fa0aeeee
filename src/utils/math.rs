use chrono::Duration;

/// Longest cooldown or timeout we accept from config (one year).
const MAX_CONFIG_SECS: u64 = 365 * 24 * 60 * 60;

/// Clamp to [0, 1]; non-finite input collapses to 0.
pub fn clamp01(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Replace NaN/inf with 0.
pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Arithmetic mean; 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance; 0 for fewer than two values.
pub fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

pub fn secs(value: u64) -> Duration {
    Duration::seconds(value.min(MAX_CONFIG_SECS) as i64)
}
