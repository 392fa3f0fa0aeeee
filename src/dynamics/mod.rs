pub mod config;
pub mod network;

pub use config::DynamicsConfig;
pub use network::NetworkSimulator;
