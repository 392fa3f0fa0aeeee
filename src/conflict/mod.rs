pub mod accumulator;
pub mod config;

pub use accumulator::{ConflictAccumulator, ConflictPhase, ConflictUpdate};
pub use config::ConflictConfig;
