pub mod config;
pub mod latent;

pub use config::EstimatorConfig;
pub use latent::LatentEstimator;
