use futures::stream::{self, StreamExt};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cache::{CacheManager, CacheStats};
use crate::error::EngineError;
use crate::location::Location;
use crate::registry::Registry;
use crate::result::ScoringResult;
use crate::scoring::ScoringAlgorithm;
use crate::sources::{error_payload, payload_error, DataSource, FetchOptions, Payload};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Per-call bundle of provider payloads for one location.
///
/// Sources appear in the order they were requested. A failed source carries an
/// `{"error": ...}` payload instead of data.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedData {
    location: Location,
    sources: Vec<(String, Payload)>,
}

impl AggregatedData {
    pub fn new(location: Location) -> Self {
        Self {
            location,
            sources: Vec::new(),
        }
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Insert or replace the payload for `source`.
    pub fn insert(&mut self, source: impl Into<String>, payload: Payload) {
        let source = source.into();
        match self.sources.iter_mut().find(|(name, _)| *name == source) {
            Some((_, slot)) => *slot = payload,
            None => self.sources.push((source, payload)),
        }
    }

    pub fn get(&self, source: &str) -> Option<&Payload> {
        self.sources
            .iter()
            .find(|(name, _)| name == source)
            .map(|(_, payload)| payload)
    }

    pub fn sources(&self) -> impl Iterator<Item = (&str, &Payload)> {
        self.sources
            .iter()
            .map(|(name, payload)| (name.as_str(), payload))
    }

    /// Sources whose fetch failed, with their error messages.
    pub fn errors(&self) -> impl Iterator<Item = (&str, &str)> {
        self.sources
            .iter()
            .filter_map(|(name, payload)| payload_error(payload).map(|e| (name.as_str(), e)))
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn to_value(&self) -> Value {
        let sources: serde_json::Map<String, Value> = self
            .sources
            .iter()
            .map(|(name, payload)| (name.clone(), Value::Object(payload.clone())))
            .collect();
        json!({
            "location": {
                "lat": self.location.lat(),
                "lng": self.location.lng(),
                "grid_hash": self.location.grid_hash(),
            },
            "sources": sources,
        })
    }
}

/// Fan-out limits applied to provider fetches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchSettings {
    pub timeout: Duration,
    pub max_concurrent: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_FETCH_TIMEOUT,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }
}

/// Orchestrates sources, the cache, and scoring algorithms.
pub struct Engine {
    sources: Registry<dyn DataSource>,
    algorithms: Registry<dyn ScoringAlgorithm>,
    source_options: HashMap<String, FetchOptions>,
    cache: CacheManager,
    settings: FetchSettings,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(CacheManager::default(), FetchSettings::default())
    }
}

impl Engine {
    pub fn new(cache: CacheManager, settings: FetchSettings) -> Self {
        Self {
            sources: Registry::new(),
            algorithms: Registry::new(),
            source_options: HashMap::new(),
            cache,
            settings,
        }
    }

    pub fn settings(&self) -> FetchSettings {
        self.settings
    }

    /// Register a source under its own name, replacing any previous binding.
    pub fn register_source(&mut self, source: Arc<dyn DataSource>) {
        let name = source.name().to_string();
        if self.sources.register(name.clone(), source).is_some() {
            debug!(source = %name, "replaced data source");
        }
    }

    pub fn register_algorithm(&mut self, algorithm: Arc<dyn ScoringAlgorithm>) {
        let name = algorithm.name().to_string();
        if self.algorithms.register(name.clone(), algorithm).is_some() {
            debug!(algorithm = %name, "replaced scoring algorithm");
        }
    }

    /// Options forwarded to every fetch of `source`.
    pub fn set_source_options(&mut self, source: impl Into<String>, options: FetchOptions) {
        self.source_options.insert(source.into(), options);
    }

    pub fn list_sources(&self) -> Vec<String> {
        self.sources.list()
    }

    pub fn list_algorithms(&self) -> Vec<String> {
        self.algorithms.list()
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Requested sources that are registered, deduplicated, in request order.
    /// `None` or an empty request means every registered source.
    fn resolve_sources(&self, requested: Option<&[String]>) -> Vec<(String, Arc<dyn DataSource>)> {
        let names = match requested {
            Some(names) if !names.is_empty() => names.to_vec(),
            _ => self.sources.list(),
        };

        let mut seen = HashSet::new();
        names
            .into_iter()
            .filter(|name| seen.insert(name.clone()))
            .filter_map(|name| match self.sources.get(&name) {
                Some(source) => Some((name, source)),
                None => {
                    debug!(source = %name, "skipping unregistered source");
                    None
                }
            })
            .collect()
    }

    /// Gather data for `location` from the requested sources.
    ///
    /// Cached payloads are reused. Misses are fetched concurrently up to the
    /// configured limit, each under the fetch timeout. A failed or timed out
    /// source is recorded as an error payload and never cached.
    pub async fn fetch_data(&self, location: &Location, sources: Option<&[String]>) -> AggregatedData {
        let requested = self.resolve_sources(sources);
        let mut collected: HashMap<String, Payload> = HashMap::new();
        let mut misses = Vec::new();

        for (name, source) in &requested {
            match self.cache.get(name, location) {
                Some(payload) => {
                    collected.insert(name.clone(), payload);
                }
                None => misses.push((name.clone(), Arc::clone(source))),
            }
        }

        let timeout = self.settings.timeout;
        let fetched: Vec<(String, Result<Payload, String>)> = stream::iter(misses)
            .map(|(name, source)| {
                let options = self.source_options.get(&name).cloned().unwrap_or_default();
                async move {
                    let result =
                        match tokio::time::timeout(timeout, source.fetch(location, &options)).await {
                            Ok(Ok(payload)) => Ok(payload),
                            Ok(Err(e)) => Err(format!("{:#}", e)),
                            Err(_) => Err(format!(
                                "timed out after {}",
                                humantime::format_duration(timeout)
                            )),
                        };
                    (name, result)
                }
            })
            .buffer_unordered(self.settings.max_concurrent.max(1))
            .collect()
            .await;

        for (name, result) in fetched {
            match result {
                Ok(payload) => {
                    self.cache.set(&name, location, payload.clone());
                    collected.insert(name, payload);
                }
                Err(message) => {
                    warn!(
                        source = %name,
                        grid_hash = %location.grid_hash(),
                        error = %message,
                        "source fetch failed"
                    );
                    collected.insert(name, error_payload(message));
                }
            }
        }

        let mut data = AggregatedData::new(location.clone());
        for (name, _) in requested {
            if let Some(payload) = collected.remove(&name) {
                data.insert(name, payload);
            }
        }
        data
    }

    /// Fetch each location in turn.
    pub async fn batch_fetch(&self, locations: &[Location]) -> Vec<AggregatedData> {
        let mut results = Vec::with_capacity(locations.len());
        for location in locations {
            results.push(self.fetch_data(location, None).await);
        }
        results
    }

    fn algorithm(&self, name: &str) -> Result<Arc<dyn ScoringAlgorithm>, EngineError> {
        self.algorithms
            .get(name)
            .ok_or_else(|| EngineError::UnknownAlgorithm(name.to_string()))
    }

    /// Score one location with a registered algorithm, using every registered
    /// source.
    pub async fn score(&self, location: &Location, algorithm: &str) -> Result<ScoringResult, EngineError> {
        let algo = self.algorithm(algorithm)?;
        let data = self.fetch_data(location, None).await;
        let result = algo.calculate(location, &data);
        info!(
            grid_hash = %location.grid_hash(),
            algorithm = %algorithm,
            score = result.total_score,
            grade = %result.grade.letter,
            "scored location"
        );
        Ok(result)
    }

    /// Score locations sequentially. The algorithm is resolved before any
    /// data is fetched.
    pub async fn batch_score(
        &self,
        locations: &[Location],
        algorithm: &str,
    ) -> Result<Vec<ScoringResult>, EngineError> {
        self.algorithm(algorithm)?;
        let mut results = Vec::with_capacity(locations.len());
        for location in locations {
            results.push(self.score(location, algorithm).await?);
        }
        Ok(results)
    }

    pub fn export_config(&self) -> Value {
        json!({
            "sources": self.list_sources(),
            "algorithms": self.list_algorithms(),
            "cache_stats": self.cache_stats(),
            "fetch": {
                "timeout": humantime::format_duration(self.settings.timeout).to_string(),
                "max_concurrent": self.settings.max_concurrent,
            },
        })
    }
}
