use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AggregationConfig {
    /// Results kept in the rolling window (120 intervals is 10 min at 5 s)
    pub window_capacity: usize,
    /// Minimum change in mean risk between halves before a trend is reported
    pub trend_epsilon: f64,
    /// Intervals with instability below this count as deep work
    pub deep_work_instability: f64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            window_capacity: 120,
            trend_epsilon: 0.02,
            deep_work_instability: 0.5,
        }
    }
}
