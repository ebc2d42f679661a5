use anyhow::{Context, Result};
use atomic_write_file::AtomicWriteFile;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use habitat_score::config::Config;
use habitat_score::output;
use habitat_score::scoring::{ModelCatalog, PropertyData};
use habitat_score::sources::{Payload, StaticSource};
use habitat_score::{Engine, Location, ScoringResult};

const EXIT_SUCCESS: i32 = 0;
const EXIT_SCORING: i32 = 1;
const EXIT_INPUT: i32 = 2;
const EXIT_OUTPUT: i32 = 3;
const EXIT_CONFIG: i32 = 4;

#[derive(Subcommand, Debug)]
enum Commands {
    /// Score a single site
    Score {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        /// Display name for the site
        #[arg(long)]
        name: Option<String>,
        /// YAML file with the property inventory
        #[arg(long)]
        property: Option<PathBuf>,
    },
    /// Score every site listed in a YAML file
    Batch {
        /// YAML list of sites: lat, lng, optional name/address/property
        sites: PathBuf,
        /// Tab-separated output for scripting
        #[arg(long)]
        tsv: bool,
    },
    /// List scoring model versions
    Models,
    /// Describe the active scoring model
    Methodology,
}

#[derive(Parser, Debug)]
#[command(name = "habitat-score")]
#[command(about = "Pollinator habitat scoring from multi-source site data", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to config file (defaults to ~/.config/habitat-score/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Score with this model version instead of the configured one
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Print JSON instead of formatted text
    #[arg(long, global = true)]
    json: bool,

    /// Also write JSON output to this file
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SiteEntry {
    lat: f64,
    lng: f64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    property: Option<PropertyData>,
}

impl SiteEntry {
    fn location(&self) -> Location {
        let mut location = Location::new(self.lat, self.lng);
        if let Some(name) = &self.name {
            location = location.with_name(name);
        }
        if let Some(address) = &self.address {
            location = location.with_address(address);
        }
        location
    }
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_saphyr::from_str(&content)
        .with_context(|| format!("Failed to parse YAML in {}", path.display()))
}

fn property_payload(property: &PropertyData) -> Result<Payload> {
    match serde_json::to_value(property).context("Failed to encode property data")? {
        serde_json::Value::Object(map) => Ok(map),
        _ => anyhow::bail!("Property data did not encode as an object"),
    }
}

/// Write JSON atomically so a failed run never leaves a truncated file.
fn write_json(path: &Path, value: &serde_json::Value) -> Result<()> {
    let mut file = AtomicWriteFile::open(path)
        .with_context(|| format!("Failed to open atomic write file at {}", path.display()))?;
    serde_json::to_writer_pretty(&mut file, value).context("Failed to serialize results")?;
    file.write_all(b"\n").context("Failed to write results")?;
    file.commit()
        .with_context(|| format!("Failed to save results to {}", path.display()))?;
    Ok(())
}

fn emit_results(cli: &Cli, results: &[ScoringResult], tsv: bool) -> Result<()> {
    let records: Vec<serde_json::Value> = results.iter().map(ScoringResult::to_record).collect();
    let json = if results.len() == 1 && !matches!(cli.command, Commands::Batch { .. }) {
        records[0].clone()
    } else {
        serde_json::Value::Array(records)
    };

    if let Some(path) = &cli.output {
        write_json(path, &json)?;
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else if tsv {
        println!("{}", output::format_tsv(results));
    } else {
        let use_colors = output::should_use_colors();
        if results.len() == 1 {
            println!("{}", output::format_result_detail(&results[0], use_colors));
        } else {
            println!("{}", output::format_results_table(results, use_colors));
        }
    }
    Ok(())
}

fn print_json_or(cli: &Cli, value: serde_json::Value, text: String) -> Result<()> {
    if let Some(path) = &cli.output {
        write_json(path, &value)?;
    }
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{}", text);
    }
    Ok(())
}

fn build(config: &Config, model: Option<&str>) -> Result<(ModelCatalog, Engine)> {
    let mut catalog = config.model_catalog()?;
    if let Some(version) = model {
        catalog.set_active(version)?;
    }
    let engine = config.build_engine(&catalog)?;
    Ok((catalog, engine))
}

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for rustls 0.23+)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("Failed to install rustls crypto provider");
        std::process::exit(EXIT_CONFIG);
    }

    let cli = Cli::parse();

    let config = match habitat_score::config::load_config(cli.config.clone()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {:#}", e);
            std::process::exit(EXIT_CONFIG);
        }
    };

    let log_level = if cli.verbose { "debug" } else { config.log_level.as_str() };
    if let Err(e) = habitat_score::telemetry::init(log_level) {
        eprintln!("Config error: {}", e);
        std::process::exit(EXIT_CONFIG);
    }

    let (catalog, mut engine) = match build(&config, cli.model.as_deref()) {
        Ok(built) => built,
        Err(e) => {
            eprintln!("Config error: {:#}", e);
            std::process::exit(EXIT_CONFIG);
        }
    };
    let algorithm = habitat_score::scoring::habitat::ALGORITHM_NAME;
    let property_source = config.scoring.property_source.clone();

    let outcome = match &cli.command {
        Commands::Models => {
            let models = catalog.list();
            let value = serde_json::to_value(&models).unwrap_or_default();
            print_json_or(
                &cli,
                value,
                output::format_model_list(&models, output::should_use_colors()),
            )
        }
        Commands::Methodology => {
            let methodology = catalog.methodology();
            let value = serde_json::to_value(&methodology).unwrap_or_default();
            print_json_or(
                &cli,
                value,
                output::format_methodology(&methodology, output::should_use_colors()),
            )
        }
        Commands::Score {
            lat,
            lng,
            name,
            property,
        } => {
            let site = SiteEntry {
                lat: *lat,
                lng: *lng,
                name: name.clone(),
                address: None,
                property: None,
            };
            let location = site.location();

            let mut source = StaticSource::new(&property_source);
            if let Some(path) = property {
                match read_yaml::<PropertyData>(path).and_then(|p| property_payload(&p)) {
                    Ok(payload) => source.insert(&location, payload),
                    Err(e) => {
                        eprintln!("Input error: {:#}", e);
                        std::process::exit(EXIT_INPUT);
                    }
                }
            }
            engine.register_source(Arc::new(source));

            match engine.score(&location, algorithm).await {
                Ok(result) => emit_results(&cli, &[result], false),
                Err(e) => {
                    eprintln!("Scoring error: {}", e);
                    std::process::exit(EXIT_SCORING);
                }
            }
        }
        Commands::Batch { sites, tsv } => {
            let entries: Vec<SiteEntry> = match read_yaml(sites) {
                Ok(entries) => entries,
                Err(e) => {
                    eprintln!("Input error: {:#}", e);
                    std::process::exit(EXIT_INPUT);
                }
            };

            let mut source = StaticSource::new(&property_source);
            let mut locations = Vec::with_capacity(entries.len());
            for entry in &entries {
                let location = entry.location();
                if let Some(property) = &entry.property {
                    match property_payload(property) {
                        Ok(payload) => source.insert(&location, payload),
                        Err(e) => {
                            eprintln!("Input error: {:#}", e);
                            std::process::exit(EXIT_INPUT);
                        }
                    }
                }
                locations.push(location);
            }
            engine.register_source(Arc::new(source));

            match engine.batch_score(&locations, algorithm).await {
                Ok(results) => {
                    tracing::info!(
                        sites = results.len(),
                        cache = ?engine.cache_stats(),
                        "batch complete"
                    );
                    emit_results(&cli, &results, *tsv)
                }
                Err(e) => {
                    eprintln!("Scoring error: {}", e);
                    std::process::exit(EXIT_SCORING);
                }
            }
        }
    };

    if let Err(e) = outcome {
        eprintln!("Output error: {:#}", e);
        std::process::exit(EXIT_OUTPUT);
    }

    std::process::exit(EXIT_SUCCESS);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("habitat-score-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_exit_codes_distinct() {
        let codes = [EXIT_SUCCESS, EXIT_SCORING, EXIT_INPUT, EXIT_OUTPUT, EXIT_CONFIG];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_write_json_to_missing_dir_fails() {
        let path = scratch_path("missing").join("results.json");
        let err = write_json(&path, &serde_json::json!({"total_score": 1.0})).unwrap_err();
        assert!(format!("{:#}", err).contains("results.json"));
        assert!(!path.exists());
    }

    #[test]
    fn test_write_json_round_trip() {
        let path = scratch_path("results.json");
        let value = serde_json::json!([{"grade": "B", "total_score": 71.25}]);
        write_json(&path, &value).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert!(written.ends_with('\n'));
        assert_eq!(serde_json::from_str::<serde_json::Value>(&written).unwrap(), value);
    }

    #[test]
    fn test_site_entry_location() {
        let entries: Vec<SiteEntry> =
            serde_saphyr::from_str("- lat: 40.5\n  lng: -111.9\n  name: Plot 4\n").unwrap();
        let location = entries[0].location();
        assert_eq!(location.name(), "Plot 4");
        assert_eq!(location.lat(), 40.5);
    }
}
