use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::models::InferenceResult;
use crate::snapshot::Snapshot;
use crate::utils::math::mean;

const DEFAULT_CAPACITY: usize = 120;
/// Entries compared on each side of the trend split.
const TREND_SPAN: usize = 3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    Risk,
    Instability,
    Drift,
    Fatigue,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Risk,
        Metric::Instability,
        Metric::Drift,
        Metric::Fatigue,
    ];
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Trend {
    Rising,
    Falling,
    Stable,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct MetricAverages {
    pub risk: f64,
    pub instability: f64,
    pub drift: f64,
    pub fatigue: f64,
}

impl MetricAverages {
    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Risk => self.risk,
            Metric::Instability => self.instability,
            Metric::Drift => self.drift,
            Metric::Fatigue => self.fatigue,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WindowSummary {
    pub averages: MetricAverages,
    /// None for an empty window.
    pub dominant_metric: Option<Metric>,
    pub trend: Trend,
    pub entry_count: usize,
}

/// Bounded FIFO of the most recent inference results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RollingWindow {
    capacity: usize,
    entries: VecDeque<InferenceResult>,
}

impl Default for RollingWindow {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &InferenceResult> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&InferenceResult> {
        self.entries.back()
    }

    pub fn push(&mut self, result: InferenceResult) {
        while self.entries.len() >= self.capacity.max(1) {
            self.entries.pop_front();
        }
        self.entries.push_back(result);
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }

    /// Change capacity, keeping the newest entries that still fit.
    pub fn resize(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    fn column(&self, pick: impl Fn(&InferenceResult) -> f64) -> Vec<f64> {
        self.entries.iter().map(pick).collect()
    }

    pub fn summarize(&self, trend_epsilon: f64) -> WindowSummary {
        let risks = self.column(|r| r.risk);
        let averages = MetricAverages {
            risk: mean(&risks),
            instability: mean(&self.column(|r| r.instability)),
            drift: mean(&self.column(|r| r.drift)),
            fatigue: mean(&self.column(|r| r.fatigue)),
        };

        let dominant_metric = if self.entries.is_empty() {
            None
        } else {
            let mut best = Metric::Risk;
            for metric in Metric::ALL {
                if averages.get(metric) > averages.get(best) {
                    best = metric;
                }
            }
            Some(best)
        };

        WindowSummary {
            averages,
            dominant_metric,
            trend: classify_trend(&risks, trend_epsilon),
            entry_count: self.entries.len(),
        }
    }
}

impl Snapshot for RollingWindow {}

/// Compare the last three values against the three before them.
///
/// Rising additionally needs the last three to be non-decreasing; falling only
/// needs the drop in means. Short series are always stable.
pub fn classify_trend(values: &[f64], epsilon: f64) -> Trend {
    let n = values.len();
    if n < 2 * TREND_SPAN {
        return Trend::Stable;
    }

    let last = &values[n - TREND_SPAN..];
    let prev = &values[n - 2 * TREND_SPAN..n - TREND_SPAN];
    let change = mean(last) - mean(prev);
    let non_decreasing = last.windows(2).all(|pair| pair[1] >= pair[0]);

    if non_decreasing && change > epsilon {
        Trend::Rising
    } else if -change > epsilon {
        Trend::Falling
    } else {
        Trend::Stable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Attribution, NetworkState, TaskType};
    use chrono::{TimeZone, Utc};

    const EPS: f64 = 0.02;

    fn result(tick: u64, risk: f64) -> InferenceResult {
        InferenceResult {
            tick,
            timestamp: Utc.timestamp_opt(1_700_000_000 + tick as i64 * 5, 0).unwrap(),
            task_type: TaskType::Coding,
            risk,
            instability: risk / 2.0,
            drift: 0.1,
            fatigue: 0.05,
            accumulated_conflict: 0.0,
            breakdown_imminent: false,
            breakdown_active: false,
            attribution: Attribution::default(),
            network: NetworkState::default(),
            degraded: false,
        }
    }

    #[test]
    fn overflow_keeps_the_newest_entries() {
        let mut window = RollingWindow::new(4);
        for tick in 0..5 {
            window.push(result(tick, 0.1));
        }
        assert_eq!(window.len(), 4);
        let ticks: Vec<u64> = window.entries().map(|r| r.tick).collect();
        assert_eq!(ticks, vec![1, 2, 3, 4]);
    }

    #[test]
    fn empty_summary_is_safe() {
        let summary = RollingWindow::default().summarize(EPS);
        assert_eq!(summary.entry_count, 0);
        assert_eq!(summary.averages, MetricAverages::default());
        assert_eq!(summary.dominant_metric, None);
        assert_eq!(summary.trend, Trend::Stable);
    }

    #[test]
    fn averages_and_dominant_metric() {
        let mut window = RollingWindow::new(10);
        window.push(result(0, 0.2));
        window.push(result(1, 0.4));
        let summary = window.summarize(EPS);
        assert!((summary.averages.risk - 0.3).abs() < 1e-12);
        assert!((summary.averages.instability - 0.15).abs() < 1e-12);
        assert_eq!(summary.dominant_metric, Some(Metric::Risk));
    }

    #[test]
    fn dominant_ties_go_to_earlier_metric() {
        let mut window = RollingWindow::new(10);
        let mut entry = result(0, 0.3);
        entry.instability = 0.3;
        entry.drift = 0.3;
        window.push(entry);
        assert_eq!(window.summarize(EPS).dominant_metric, Some(Metric::Risk));

        let mut window = RollingWindow::new(10);
        let mut entry = result(0, 0.1);
        entry.drift = 0.6;
        entry.fatigue = 0.6;
        window.push(entry);
        assert_eq!(window.summarize(EPS).dominant_metric, Some(Metric::Drift));
    }

    #[test]
    fn trend_cases() {
        assert_eq!(classify_trend(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6], EPS), Trend::Rising);
        assert_eq!(classify_trend(&[0.6, 0.5, 0.4, 0.3, 0.2, 0.1], EPS), Trend::Falling);
        assert_eq!(classify_trend(&[0.4; 6], EPS), Trend::Stable);
        // Higher mean but not monotonic: not rising, and not falling either.
        assert_eq!(classify_trend(&[0.1, 0.1, 0.1, 0.5, 0.9, 0.6], EPS), Trend::Stable);
        // Falling does not require monotonic values.
        assert_eq!(classify_trend(&[0.9, 0.9, 0.9, 0.2, 0.5, 0.3], EPS), Trend::Falling);
        assert_eq!(classify_trend(&[0.1, 0.5, 0.9, 1.0, 1.0], EPS), Trend::Stable);
    }

    #[test]
    fn reset_and_resize() {
        let mut window = RollingWindow::new(6);
        for tick in 0..6 {
            window.push(result(tick, 0.1 * tick as f64));
        }
        window.resize(2);
        assert_eq!(window.len(), 2);
        assert_eq!(window.latest().map(|r| r.tick), Some(5));
        window.reset();
        assert!(window.is_empty());
        assert_eq!(window.capacity(), 2);
    }
}
