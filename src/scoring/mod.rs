pub mod grade;
pub mod habitat;
pub mod model;
pub mod property;
pub mod recommendations;
pub mod tiers;
pub mod validation;

pub use grade::{GradeScale, HabitatGrade};
pub use habitat::{score_property, Breakdown, Confidence, HabitatAlgorithm};
pub use model::{ModelCatalog, ModelDefinition, ScoringModel};
pub use property::{PlantEntry, PropertyData};
pub use validation::validate_model;

use crate::engine::AggregatedData;
use crate::location::Location;
use crate::result::ScoringResult;

/// A named scoring rule set the engine can dispatch to.
///
/// `calculate` must be a pure function of its inputs apart from the result
/// timestamp.
pub trait ScoringAlgorithm: Send + Sync {
    fn name(&self) -> &str;

    /// Front-end tool the algorithm serves (e.g. "homeowner").
    fn tool(&self) -> &str;

    fn calculate(&self, location: &Location, data: &AggregatedData) -> ScoringResult;
}
