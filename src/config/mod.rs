mod schema;

pub use schema::{CacheConfig, Config, FetchConfig, ScoringSection, SourceConfig};

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::CacheManager;
use crate::engine::{Engine, FetchSettings};
use crate::scoring::{HabitatAlgorithm, ModelCatalog};
use crate::sources::HttpJsonSource;

/// Get the config directory path (e.g. ~/.config/habitat-score/)
pub fn get_config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir().context("Could not determine the user config directory")?;
    Ok(base.join("habitat-score"))
}

/// Get the default config file path (e.g. ~/.config/habitat-score/config.yaml)
pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.yaml"))
}

/// Load configuration from a YAML file
///
/// # Arguments
///
/// * `path` - Optional path to config file. If None, uses the default path and
///   falls back to built-in defaults when that file does not exist.
///
/// # Errors
///
/// Returns an error if:
/// - An explicitly given config file does not exist
/// - The config file cannot be read
/// - The YAML cannot be parsed
pub fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found at {}", path.display());
            }
            path
        }
        None => {
            let default_path = get_config_path()?;
            if !default_path.exists() {
                tracing::debug!(path = %default_path.display(), "no config file, using defaults");
                return Ok(Config::default());
            }
            default_path
        }
    };

    let config_content = fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;

    parse_config(&config_content)
        .with_context(|| format!("Failed to parse config: invalid YAML in {}", config_path.display()))
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = serde_saphyr::from_str(content)?;
    Ok(config)
}

impl Config {
    pub fn fetch_settings(&self) -> Result<FetchSettings> {
        let timeout = humantime::parse_duration(self.fetch.timeout.trim())
            .with_context(|| format!("Invalid fetch.timeout '{}'", self.fetch.timeout))?;
        if self.fetch.max_concurrent == 0 {
            anyhow::bail!("fetch.max_concurrent must be at least 1");
        }
        Ok(FetchSettings {
            timeout,
            max_concurrent: self.fetch.max_concurrent,
        })
    }

    pub fn cache_manager(&self) -> Result<CacheManager> {
        let ttl_hours = self.cache.ttl_hours;
        if ttl_hours < 1 {
            anyhow::bail!("cache.ttl_hours must be at least 1 (got {})", ttl_hours);
        }
        if chrono::Duration::try_hours(ttl_hours).is_none() {
            anyhow::bail!("cache.ttl_hours is too large (got {})", ttl_hours);
        }
        if self.cache.max_entries == 0 {
            anyhow::bail!("cache.max_entries must be at least 1");
        }
        Ok(CacheManager::new(ttl_hours, self.cache.max_entries))
    }

    /// Built-in models plus those declared in the config, with the configured
    /// version made active.
    pub fn model_catalog(&self) -> Result<ModelCatalog> {
        let mut catalog = ModelCatalog::builtin();
        for definition in &self.scoring.models {
            catalog
                .define(definition.clone())
                .with_context(|| format!("Failed to load scoring model {}", definition.version))?;
        }
        if let Some(version) = &self.scoring.active_model {
            catalog
                .set_active(version)
                .context("Invalid scoring.active_model")?;
        }
        Ok(catalog)
    }

    /// Engine with the configured HTTP sources and the habitat algorithm for
    /// the active model. The property source is registered by the caller.
    pub fn build_engine(&self, catalog: &ModelCatalog) -> Result<Engine> {
        let mut engine = Engine::new(self.cache_manager()?, self.fetch_settings()?);

        for source in &self.sources {
            engine.register_source(Arc::new(HttpJsonSource::new(&source.name, &source.url)));
            if !source.options.is_empty() {
                engine.set_source_options(&source.name, source.options.clone());
            }
        }

        let algorithm = HabitatAlgorithm::new(catalog.active())
            .with_tool(&self.scoring.tool)
            .with_property_source(&self.scoring.property_source);
        engine.register_algorithm(Arc::new(algorithm));

        Ok(engine)
    }
}
