pub mod brain_map;
pub mod config;
pub mod totals;
pub mod window;

pub use brain_map::{activation_color, BrainMap, BrainRegion, RegionActivation};
pub use config::AggregationConfig;
pub use totals::SessionTotals;
pub use window::{classify_trend, Metric, MetricAverages, RollingWindow, Trend, WindowSummary};
