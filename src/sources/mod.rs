pub mod http;
pub mod static_source;

pub use http::HttpJsonSource;
pub use static_source::StaticSource;

use anyhow::Result;
use async_trait::async_trait;

use crate::location::Location;

/// Structured provider response. Sources return arbitrary JSON objects.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Per-source options forwarded to `DataSource::fetch`.
pub type FetchOptions = serde_json::Map<String, serde_json::Value>;

/// Key under which a failed fetch is recorded in the aggregated bundle.
pub const ERROR_KEY: &str = "error";

/// A pluggable provider of site data.
///
/// Implementations should not retry internally; a failed fetch is recorded
/// for the current call and retried only when a later call misses the cache.
#[async_trait]
pub trait DataSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, location: &Location, options: &FetchOptions) -> Result<Payload>;
}

/// Build the `{"error": message}` payload recorded for a failed source.
pub fn error_payload(message: impl Into<String>) -> Payload {
    let mut payload = Payload::new();
    payload.insert(
        ERROR_KEY.to_string(),
        serde_json::Value::String(message.into()),
    );
    payload
}

/// The error message carried by a payload, if it records a failed fetch.
pub fn payload_error(payload: &Payload) -> Option<&str> {
    payload.get(ERROR_KEY).and_then(|v| v.as_str())
}
