pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod location;
pub mod output;
pub mod registry;
pub mod result;
pub mod scoring;
pub mod sources;
pub mod telemetry;

pub use cache::{CacheManager, CacheStats};
pub use engine::{AggregatedData, Engine, FetchSettings};
pub use error::EngineError;
pub use location::Location;
pub use result::{FactorResult, Priority, Recommendation, ScoringResult};
pub use scoring::ScoringAlgorithm;
pub use sources::{DataSource, Payload};
