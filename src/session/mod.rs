pub mod clock;
pub mod controller;
pub mod engine;
pub mod loop_worker;
pub mod registry;
pub mod sampler;

pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{SessionController, SessionHandle};
pub use engine::{SessionEngine, SessionReport, Tick, CHECKPOINT_VERSION};
pub use loop_worker::{SessionCommand, SessionEvent};
pub use registry::SessionRegistry;
pub use sampler::TelemetrySampler;
