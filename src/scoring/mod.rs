pub mod features;
pub mod model;
pub mod personalized;
pub mod scorer;

pub use features::FeatureVector;
pub use model::{baseline_factory, sigmoid, LogisticModel, ModelFactory, RiskModel};
pub use personalized::{model_factory, personalized_factory, AdapterConfig, PersonalizedModel};
pub use scorer::{RiskScorer, Score};
