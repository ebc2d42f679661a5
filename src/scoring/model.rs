use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use super::grade::GradeScale;
use super::property::{MowingFrequency, PesticideFrequency};
use super::tiers::Tier;
use super::validation::validate_model;
use crate::error::EngineError;

/// Version every built-in and configured model ultimately derives from.
pub const BASE_MODEL_VERSION: &str = "2.0.0";

/// Maximum points per category. Also the cap applied to each category total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CategoryWeights {
    pub floral: f64,
    pub nesting: f64,
    pub connectivity: f64,
    pub management: f64,
}

impl CategoryWeights {
    pub fn total(&self) -> f64 {
        self.floral + self.nesting + self.connectivity + self.management
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FloralConfig {
    pub diversity_max: f64,
    pub coverage_max: f64,
    /// Bonus per non-native entry, capped at `non_native_max`.
    pub non_native_points: f64,
    pub non_native_max: f64,
    pub spring_points: f64,
    pub summer_points: f64,
    /// Weighted above spring/summer to offset the late-season nectar deficit.
    pub fall_points: f64,
    pub milkweed_max: f64,
    pub diversity_tiers: Vec<Tier>,
    pub coverage_tiers: Vec<Tier>,
    pub milkweed_tiers: Vec<Tier>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MowingPoints {
    pub weekly: f64,
    pub biweekly: f64,
    pub monthly: f64,
    pub rarely: f64,
    pub never: f64,
}

impl MowingPoints {
    pub fn points(&self, frequency: MowingFrequency) -> f64 {
        match frequency {
            MowingFrequency::Weekly => self.weekly,
            MowingFrequency::Biweekly => self.biweekly,
            MowingFrequency::Monthly => self.monthly,
            MowingFrequency::Rarely => self.rarely,
            MowingFrequency::Never => self.never,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NestingConfig {
    pub ground_max: f64,
    pub cavity_max: f64,
    pub undisturbed_max: f64,
    pub ground_tiers: Vec<Tier>,
    /// Points for any bare ground (> 0 sqft) below the lowest tier.
    pub ground_any_points: f64,
    pub dead_wood_points: f64,
    pub bee_hotel_points: f64,
    pub brush_pile_points: f64,
    pub leaves_winter_points: f64,
    /// Undisturbed credit for a brush pile, on top of its cavity credit.
    pub brush_pile_undisturbed_points: f64,
    pub mowing_points: MowingPoints,
    /// Nesting totals below this trigger nesting recommendations.
    pub recommend_below: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectivityConfig {
    pub pioneer_bonus: f64,
    pub early_adopter_bonus: f64,
    pub early_adopter_max_neighbors: u32,
    pub early_adopter_points_per_neighbor: f64,
    pub neighbor_tiers: Vec<Tier>,
    /// Neighbor points for an established network below every tier.
    pub neighbor_floor: f64,
    pub green_space_tiers: Vec<Tier>,
    /// Urban baseline when green space is below every tier.
    pub green_space_floor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PesticidePoints {
    pub never: f64,
    pub rarely: f64,
    pub sometimes: f64,
    pub often: f64,
}

impl PesticidePoints {
    pub fn points(&self, frequency: PesticideFrequency) -> f64 {
        match frequency {
            PesticideFrequency::Never => self.never,
            PesticideFrequency::Rarely => self.rarely,
            PesticideFrequency::Sometimes => self.sometimes,
            PesticideFrequency::Often => self.often,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManagementConfig {
    pub pesticide_points: PesticidePoints,
    pub native_tiers: Vec<Tier>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImperviousConfig {
    pub threshold_pct: f64,
    pub penalty_per_pct: f64,
    pub max_penalty: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfidenceConfig {
    pub high_min_pct: f64,
    pub medium_min_pct: f64,
}

/// A complete, versioned rule-set parameterization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScoringModel {
    pub version: String,
    pub name: String,
    pub description: String,
    pub created_at: String,
    pub weights: CategoryWeights,
    #[serde(rename = "floral_config")]
    pub floral: FloralConfig,
    #[serde(rename = "nesting_config")]
    pub nesting: NestingConfig,
    #[serde(rename = "connectivity_config")]
    pub connectivity: ConnectivityConfig,
    #[serde(rename = "management_config")]
    pub management: ManagementConfig,
    #[serde(rename = "impervious_config")]
    pub impervious: ImperviousConfig,
    #[serde(rename = "grade_thresholds")]
    pub grades: GradeScale,
    pub confidence: ConfidenceConfig,
    pub citations: Vec<String>,
}

impl Default for ScoringModel {
    fn default() -> Self {
        Self {
            version: BASE_MODEL_VERSION.to_string(),
            name: "Research-Validated v2".to_string(),
            description: "Based on ESTIMAP, InVEST, Berlin study".to_string(),
            created_at: "2025-12-21".to_string(),
            weights: CategoryWeights {
                floral: 35.0,
                nesting: 30.0,
                connectivity: 20.0,
                management: 15.0,
            },
            floral: FloralConfig {
                diversity_max: 12.0,
                coverage_max: 8.0,
                non_native_points: 0.5,
                non_native_max: 2.0,
                spring_points: 2.0,
                summer_points: 2.0,
                fall_points: 6.0,
                milkweed_max: 5.0,
                diversity_tiers: vec![
                    Tier::new(10.0, 12.0),
                    Tier::new(7.0, 10.0),
                    Tier::new(5.0, 8.0),
                    Tier::new(3.0, 5.0),
                    Tier::new(1.0, 2.0),
                ],
                coverage_tiers: vec![
                    Tier::new(30.0, 8.0),
                    Tier::new(20.0, 6.0),
                    Tier::new(10.0, 4.0),
                    Tier::new(5.0, 2.0),
                ],
                milkweed_tiers: vec![
                    Tier::new(5.0, 5.0),
                    Tier::new(3.0, 4.0),
                    Tier::new(1.0, 3.0),
                ],
            },
            nesting: NestingConfig {
                ground_max: 10.0,
                cavity_max: 10.0,
                undisturbed_max: 10.0,
                ground_tiers: vec![
                    Tier::new(50.0, 10.0),
                    Tier::new(25.0, 7.0),
                    Tier::new(10.0, 5.0),
                ],
                ground_any_points: 3.0,
                dead_wood_points: 4.0,
                bee_hotel_points: 3.0,
                brush_pile_points: 3.0,
                leaves_winter_points: 5.0,
                brush_pile_undisturbed_points: 2.0,
                mowing_points: MowingPoints {
                    weekly: 0.0,
                    biweekly: 1.0,
                    monthly: 3.0,
                    rarely: 3.0,
                    never: 3.0,
                },
                recommend_below: 15.0,
            },
            connectivity: ConnectivityConfig {
                pioneer_bonus: 8.0,
                early_adopter_bonus: 4.0,
                early_adopter_max_neighbors: 2,
                early_adopter_points_per_neighbor: 2.0,
                neighbor_tiers: vec![Tier::new(5.0, 10.0), Tier::new(3.0, 7.0)],
                neighbor_floor: 5.0,
                green_space_tiers: vec![
                    Tier::new(30.0, 10.0),
                    Tier::new(20.0, 7.0),
                    Tier::new(10.0, 5.0),
                    Tier::new(5.0, 3.0),
                ],
                green_space_floor: 2.0,
            },
            management: ManagementConfig {
                pesticide_points: PesticidePoints {
                    never: 8.0,
                    rarely: 5.0,
                    sometimes: 2.0,
                    often: 0.0,
                },
                native_tiers: vec![
                    Tier::new(80.0, 7.0),
                    Tier::new(60.0, 5.0),
                    Tier::new(40.0, 3.0),
                    Tier::new(20.0, 1.0),
                ],
            },
            impervious: ImperviousConfig {
                threshold_pct: 22.0,
                penalty_per_pct: 0.35,
                max_penalty: 10.0,
            },
            grades: GradeScale::default(),
            confidence: ConfidenceConfig {
                high_min_pct: 70.0,
                medium_min_pct: 40.0,
            },
            citations: vec![
                "ESTIMAP-Pollination model (Zulian et al., 2013) R²=0.80".to_string(),
                "InVEST Pollination Model (Sharp et al., 2020) R²=0.65-0.80".to_string(),
                "Berlin impervious study (Fortel et al., 2014) R²=0.84".to_string(),
                "September deficit finding (Murray Corridor, 2025) 84.5%".to_string(),
            ],
        }
    }
}

/// A model declared as a partial override of an earlier version.
///
/// `overrides` is deep-merged onto the fully resolved parent: mappings merge
/// key by key, while lists and scalars replace the parent's value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelDefinition {
    pub version: String,
    #[serde(default = "default_extends")]
    pub extends: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub overrides: Option<Value>,
}

fn default_extends() -> String {
    BASE_MODEL_VERSION.to_string()
}

/// Recursively merge `overrides` into `base`.
pub fn deep_merge(base: &mut Value, overrides: Value) {
    match (base, overrides) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            for (key, value) in override_map {
                match base_map.get_mut(&key) {
                    Some(slot) => deep_merge(slot, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    pub version: String,
    pub name: String,
    pub description: String,
    pub active: bool,
}

/// Public description of the active rule set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Methodology {
    pub version: String,
    pub name: String,
    pub description: String,
    pub weights: CategoryWeights,
    pub citations: Vec<String>,
    pub impervious_threshold_pct: f64,
    pub fall_bloom_points: f64,
}

/// Registry of model versions with one active version.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    models: Vec<Arc<ScoringModel>>,
    active: String,
}

impl ModelCatalog {
    /// Catalog holding the base model only.
    pub fn new() -> Self {
        Self {
            models: vec![Arc::new(ScoringModel::default())],
            active: BASE_MODEL_VERSION.to_string(),
        }
    }

    /// Base model plus the shipped beta variants.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        let beta = ModelDefinition {
            version: "2.1.0-beta".to_string(),
            extends: BASE_MODEL_VERSION.to_string(),
            name: Some("Adjusted Fall Weight".to_string()),
            description: Some("Testing higher fall bloom weight".to_string()),
            created_at: Some("2025-12-21".to_string()),
            overrides: Some(json!({
                "weights": { "floral": 40.0, "nesting": 25.0 },
                "floral_config": { "fall_points": 8.0 },
            })),
        };
        if let Err(e) = catalog.define(beta) {
            tracing::error!(error = %e, "built-in beta model failed to resolve");
        }
        catalog
    }

    /// Add or replace a complete model after validating it.
    pub fn insert(&mut self, model: ScoringModel) -> Result<(), EngineError> {
        semver::Version::parse(&model.version).map_err(|e| EngineError::InvalidModelVersion {
            version: model.version.clone(),
            reason: e.to_string(),
        })?;

        validate_model(&model).map_err(|errors| EngineError::InvalidModel {
            version: model.version.clone(),
            errors,
        })?;

        let model = Arc::new(model);
        match self.models.iter_mut().find(|m| m.version == model.version) {
            Some(slot) => *slot = model,
            None => self.models.push(model),
        }
        Ok(())
    }

    /// Resolve a partial definition against its parent and insert it.
    pub fn define(&mut self, definition: ModelDefinition) -> Result<(), EngineError> {
        let parent = self.get(&definition.extends)?;

        let mut document = serde_json::to_value(parent.as_ref()).map_err(|e| {
            EngineError::InvalidModel {
                version: definition.version.clone(),
                errors: vec![e.to_string()],
            }
        })?;

        match definition.overrides {
            None | Some(Value::Null) => {}
            Some(overrides @ Value::Object(_)) => deep_merge(&mut document, overrides),
            Some(_) => {
                return Err(EngineError::InvalidModel {
                    version: definition.version,
                    errors: vec!["overrides: must be a mapping".to_string()],
                })
            }
        }

        let mut identity = serde_json::Map::new();
        identity.insert("version".to_string(), json!(definition.version));
        if let Some(name) = definition.name {
            identity.insert("name".to_string(), json!(name));
        }
        if let Some(description) = definition.description {
            identity.insert("description".to_string(), json!(description));
        }
        if let Some(created_at) = definition.created_at {
            identity.insert("created_at".to_string(), json!(created_at));
        }
        deep_merge(&mut document, Value::Object(identity));

        let model: ScoringModel =
            serde_json::from_value(document).map_err(|e| EngineError::InvalidModel {
                version: definition.version.clone(),
                errors: vec![e.to_string()],
            })?;

        self.insert(model)
    }

    pub fn get(&self, version: &str) -> Result<Arc<ScoringModel>, EngineError> {
        self.models
            .iter()
            .find(|m| m.version == version)
            .cloned()
            .ok_or_else(|| EngineError::UnknownModel(version.to_string()))
    }

    pub fn active(&self) -> Arc<ScoringModel> {
        // The active version is only ever set to a stored model.
        self.get(&self.active)
            .unwrap_or_else(|_| Arc::new(ScoringModel::default()))
    }

    pub fn active_version(&self) -> &str {
        &self.active
    }

    pub fn set_active(&mut self, version: &str) -> Result<(), EngineError> {
        self.get(version)?;
        self.active = version.to_string();
        Ok(())
    }

    pub fn versions(&self) -> Vec<String> {
        self.models.iter().map(|m| m.version.clone()).collect()
    }

    pub fn list(&self) -> Vec<ModelSummary> {
        self.models
            .iter()
            .map(|m| ModelSummary {
                version: m.version.clone(),
                name: m.name.clone(),
                description: m.description.clone(),
                active: m.version == self.active,
            })
            .collect()
    }

    pub fn methodology(&self) -> Methodology {
        let model = self.active();
        Methodology {
            version: model.version.clone(),
            name: model.name.clone(),
            description: model.description.clone(),
            weights: model.weights.clone(),
            citations: model.citations.clone(),
            impervious_threshold_pct: model.impervious.threshold_pct,
            fall_bloom_points: model.floral.fall_points,
        }
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
