use serde::{Deserialize, Serialize};

use crate::cache::{DEFAULT_MAX_ENTRIES, DEFAULT_TTL_HOURS};
use crate::engine::DEFAULT_MAX_CONCURRENT;
use crate::scoring::habitat::{DEFAULT_TOOL, PROPERTY_SOURCE};
use crate::scoring::ModelDefinition;
use crate::sources::FetchOptions;

/// Application configuration.
///
/// Example YAML:
/// ```yaml
/// log_level: info
/// cache:
///   ttl_hours: 24
///   max_entries: 1000
/// fetch:
///   timeout: 10s
///   max_concurrent: 4
/// scoring:
///   active_model: 2.0.0
///   models:
///     - version: 2.2.0
///       extends: 2.0.0
///       overrides:
///         impervious_config: { threshold_pct: 25 }
/// sources:
///   - name: soil
///     url: "https://example.org/soil?lat={lat}&lng={lng}"
///     options: { depth_cm: 30 }
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub scoring: ScoringSection,

    /// HTTP JSON providers registered alongside the property source
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            cache: CacheConfig::default(),
            fetch: FetchConfig::default(),
            scoring: ScoringSection::default(),
            sources: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: i64,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_hours: DEFAULT_TTL_HOURS,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

fn default_ttl_hours() -> i64 {
    DEFAULT_TTL_HOURS
}

fn default_max_entries() -> usize {
    DEFAULT_MAX_ENTRIES
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FetchConfig {
    /// Per-source timeout, humantime format (e.g. "10s", "1m 30s")
    #[serde(default = "default_timeout")]
    pub timeout: String,

    /// Upper bound on concurrent fetches for one location
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }
}

fn default_timeout() -> String {
    "10s".to_string()
}

fn default_max_concurrent() -> usize {
    DEFAULT_MAX_CONCURRENT
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScoringSection {
    /// Model version used for scoring; the base model when unset
    #[serde(default)]
    pub active_model: Option<String>,

    /// Source whose payload holds the property inventory
    #[serde(default = "default_property_source")]
    pub property_source: String,

    #[serde(default = "default_tool")]
    pub tool: String,

    /// Extra model versions, resolved in order
    #[serde(default)]
    pub models: Vec<ModelDefinition>,
}

impl Default for ScoringSection {
    fn default() -> Self {
        Self {
            active_model: None,
            property_source: default_property_source(),
            tool: default_tool(),
            models: Vec::new(),
        }
    }
}

fn default_property_source() -> String {
    PROPERTY_SOURCE.to_string()
}

fn default_tool() -> String {
    DEFAULT_TOOL.to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    pub name: String,

    /// URL template; `{lat}`, `{lng}` and `{grid_hash}` are substituted
    pub url: String,

    /// Sent as query parameters on every fetch
    #[serde(default)]
    pub options: FetchOptions,
}
