pub mod inference;
pub mod session;
pub mod state;
pub mod telemetry;

pub use inference::{Attribution, AttributionEntry, InferenceResult, Signal, FEATURE_COUNT};
pub use session::SessionStatus;
pub use state::{LatentState, NetworkState};
pub use telemetry::{FeatureRecord, TaskType, TelemetrySignals};
