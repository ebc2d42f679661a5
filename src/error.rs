/// Failures that cross the engine boundary.
///
/// Provider problems never show up here; they are recorded as error payloads
/// inside the aggregated data instead.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum EngineError {
    #[error("unknown algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("unknown scoring model version: {0}")]
    UnknownModel(String),

    #[error("invalid scoring model version '{version}': {reason}")]
    InvalidModelVersion { version: String, reason: String },

    #[error("scoring model {version} is invalid: {}", errors.join("; "))]
    InvalidModel { version: String, errors: Vec<String> },
}
