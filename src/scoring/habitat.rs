use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use super::grade::HabitatGrade;
use super::model::{ImperviousConfig, ScoringModel};
use super::property::{PesticideFrequency, PropertyData, Season};
use super::recommendations::generate_recommendations;
use super::tiers::{tier_points, Tier};
use super::ScoringAlgorithm;
use crate::engine::AggregatedData;
use crate::location::Location;
use crate::result::{FactorResult, Metadata, ScoringResult};
use crate::sources::payload_error;

pub const ALGORITHM_NAME: &str = "habitat_v2";
pub const DEFAULT_TOOL: &str = "homeowner";
pub const PROPERTY_SOURCE: &str = "property";
pub const MAX_SCORE: f64 = 100.0;

/// Points earned by one category with its sub-scores.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryScore {
    pub total: f64,
    pub max: f64,
    pub parts: Vec<(&'static str, f64)>,
}

impl CategoryScore {
    pub fn part(&self, name: &str) -> f64 {
        self.parts
            .iter()
            .find(|(part, _)| *part == name)
            .map(|(_, points)| *points)
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }
}

/// Full intermediate computation for one property.
#[derive(Debug, Clone, PartialEq)]
pub struct Breakdown {
    pub floral: CategoryScore,
    pub nesting: CategoryScore,
    pub connectivity: CategoryScore,
    pub management: CategoryScore,
    /// Zero or negative.
    pub impervious_penalty: f64,
    pub raw_score: f64,
    pub final_score: f64,
    pub grade: HabitatGrade,
    pub data_completeness: f64,
    pub confidence: Confidence,
}

fn first_tier_or(tiers: &[Tier], value: f64, fallback: f64) -> f64 {
    tiers
        .iter()
        .find(|tier| tier.matches(value))
        .map(|tier| tier.points)
        .unwrap_or(fallback)
}

fn flag(present: bool, points: f64) -> f64 {
    if present {
        points
    } else {
        0.0
    }
}

pub fn score_floral(data: &PropertyData, model: &ScoringModel) -> CategoryScore {
    let cfg = &model.floral;

    let native = data.native_count();
    let non_native = data.plants.len() - native;
    let non_native_bonus = (non_native as f64 * cfg.non_native_points).min(cfg.non_native_max);
    let diversity =
        (tier_points(&cfg.diversity_tiers, native as f64) + non_native_bonus).min(cfg.diversity_max);

    let coverage =
        tier_points(&cfg.coverage_tiers, data.estimated_flower_coverage_pct).min(cfg.coverage_max);

    let spring = flag(data.has_bloom_in(Season::Spring), cfg.spring_points);
    let summer = flag(data.has_bloom_in(Season::Summer), cfg.summer_points);
    let fall = flag(data.has_bloom_in(Season::Fall), cfg.fall_points);

    let milkweed =
        tier_points(&cfg.milkweed_tiers, data.milkweed_count() as f64).min(cfg.milkweed_max);

    let sum = diversity + coverage + spring + summer + fall + milkweed;
    CategoryScore {
        total: sum.min(model.weights.floral),
        max: model.weights.floral,
        parts: vec![
            ("diversity", diversity),
            ("coverage", coverage),
            ("spring", spring),
            ("summer", summer),
            ("fall", fall),
            ("milkweed_bonus", milkweed),
        ],
    }
}

pub fn score_nesting(data: &PropertyData, model: &ScoringModel) -> CategoryScore {
    let cfg = &model.nesting;

    let ground = if data.has_bare_ground {
        let any = flag(data.bare_ground_sqft > 0.0, cfg.ground_any_points);
        first_tier_or(&cfg.ground_tiers, data.bare_ground_sqft, any).min(cfg.ground_max)
    } else {
        0.0
    };

    let cavity = (flag(data.has_dead_wood, cfg.dead_wood_points)
        + flag(data.has_bee_hotel, cfg.bee_hotel_points)
        + flag(data.has_brush_pile, cfg.brush_pile_points))
    .min(cfg.cavity_max);

    let undisturbed = (flag(data.leaves_stems_over_winter, cfg.leaves_winter_points)
        + cfg.mowing_points.points(data.mowing_frequency)
        + flag(data.has_brush_pile, cfg.brush_pile_undisturbed_points))
    .min(cfg.undisturbed_max);

    CategoryScore {
        total: (ground + cavity + undisturbed).min(model.weights.nesting),
        max: model.weights.nesting,
        parts: vec![
            ("ground", ground),
            ("cavity", cavity),
            ("undisturbed", undisturbed),
        ],
    }
}

pub fn score_connectivity(data: &PropertyData, model: &ScoringModel) -> CategoryScore {
    let cfg = &model.connectivity;
    let neighbors = data.neighbors_in_program;

    // Early participants are rewarded for starting the network; the weight
    // moves to network size once it is established.
    let (pioneer, neighbor_points) = if neighbors == 0 {
        (cfg.pioneer_bonus, 0.0)
    } else if neighbors <= cfg.early_adopter_max_neighbors {
        (
            cfg.early_adopter_bonus,
            neighbors as f64 * cfg.early_adopter_points_per_neighbor,
        )
    } else {
        (
            0.0,
            first_tier_or(&cfg.neighbor_tiers, neighbors as f64, cfg.neighbor_floor),
        )
    };

    let green_space = first_tier_or(
        &cfg.green_space_tiers,
        data.green_space_within_500m,
        cfg.green_space_floor,
    );

    CategoryScore {
        total: (neighbor_points + green_space + pioneer).min(model.weights.connectivity),
        max: model.weights.connectivity,
        parts: vec![
            ("neighbors", neighbor_points),
            ("green_space", green_space),
            ("pioneer_bonus", pioneer),
        ],
    }
}

pub fn score_management(data: &PropertyData, model: &ScoringModel) -> CategoryScore {
    let cfg = &model.management;

    let frequency = if data.uses_pesticides {
        data.pesticide_frequency
    } else {
        PesticideFrequency::Never
    };
    let pesticide_free = cfg.pesticide_points.points(frequency);

    // Skipped entirely for an empty inventory.
    let native_proportion = if data.plants.is_empty() {
        0.0
    } else {
        let native_pct = data.native_count() as f64 / data.plants.len() as f64 * 100.0;
        tier_points(&cfg.native_tiers, native_pct)
    };

    CategoryScore {
        total: (pesticide_free + native_proportion).min(model.weights.management),
        max: model.weights.management,
        parts: vec![
            ("pesticide_free", pesticide_free),
            ("native_proportion", native_proportion),
        ],
    }
}

/// Penalty for impervious cover above the threshold. Never positive.
pub fn impervious_penalty(impervious_pct: f64, cfg: &ImperviousConfig) -> f64 {
    if impervious_pct <= cfg.threshold_pct {
        return 0.0;
    }
    let excess = impervious_pct - cfg.threshold_pct;
    -(excess * cfg.penalty_per_pct).min(cfg.max_penalty)
}

pub fn confidence_for(completeness_pct: f64, model: &ScoringModel) -> Confidence {
    if completeness_pct >= model.confidence.high_min_pct {
        Confidence::High
    } else if completeness_pct >= model.confidence.medium_min_pct {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

/// Score a property against a model.
pub fn score_property(data: &PropertyData, model: &ScoringModel) -> Breakdown {
    let floral = score_floral(data, model);
    let nesting = score_nesting(data, model);
    let connectivity = score_connectivity(data, model);
    let management = score_management(data, model);
    let penalty = impervious_penalty(data.impervious_surface_pct, &model.impervious);

    let raw_score = floral.total + nesting.total + connectivity.total + management.total;
    let final_score = (raw_score + penalty).clamp(0.0, MAX_SCORE);
    let data_completeness = data.completeness_pct();

    Breakdown {
        grade: model.grades.grade_for(final_score),
        confidence: confidence_for(data_completeness, model),
        floral,
        nesting,
        connectivity,
        management,
        impervious_penalty: penalty,
        raw_score,
        final_score,
        data_completeness,
    }
}

/// How the property inventory was obtained for a scoring call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataStatus {
    Provided,
    Empty,
    Missing,
    Unavailable,
    Invalid,
}

impl DataStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataStatus::Provided => "provided",
            DataStatus::Empty => "empty",
            DataStatus::Missing => "missing",
            DataStatus::Unavailable => "unavailable",
            DataStatus::Invalid => "invalid",
        }
    }
}

/// Pull the property inventory out of the aggregated bundle, falling back to
/// defaults when the source is absent, failed, or sent something unreadable.
pub fn extract_property(data: &AggregatedData, source: &str) -> (PropertyData, DataStatus, Option<String>) {
    let Some(payload) = data.get(source) else {
        return (PropertyData::default(), DataStatus::Missing, None);
    };

    if let Some(message) = payload_error(payload) {
        return (
            PropertyData::default(),
            DataStatus::Unavailable,
            Some(message.to_string()),
        );
    }

    if payload.is_empty() {
        return (PropertyData::default(), DataStatus::Empty, None);
    }

    match serde_json::from_value(Value::Object(payload.clone())) {
        Ok(property) => (property, DataStatus::Provided, None),
        Err(e) => (
            PropertyData::default(),
            DataStatus::Invalid,
            Some(e.to_string()),
        ),
    }
}

fn category_factor(name: &str, category: &CategoryScore) -> FactorResult {
    let normalized = if category.max > 0.0 {
        category.total / category.max
    } else {
        0.0
    };
    let weight = category.max / MAX_SCORE;

    let mut metadata = Metadata::new();
    for (part, points) in &category.parts {
        metadata.insert(part.to_string(), json!(points));
    }
    metadata.insert("max".to_string(), json!(category.max));

    FactorResult {
        name: name.to_string(),
        raw_value: json!(category.total),
        normalized_score: normalized,
        weight,
        weighted_score: normalized * weight * MAX_SCORE,
        metadata,
    }
}

fn impervious_factor(impervious_pct: f64, penalty: f64, cfg: &ImperviousConfig) -> FactorResult {
    // Share of the maximum deduction applied; the sign lives in weighted_score
    let normalized = if cfg.max_penalty > 0.0 && penalty < 0.0 {
        -penalty / cfg.max_penalty
    } else {
        0.0
    };

    let mut metadata = Metadata::new();
    metadata.insert("threshold_pct".to_string(), json!(cfg.threshold_pct));
    metadata.insert("penalty".to_string(), json!(penalty));
    metadata.insert("max_penalty".to_string(), json!(cfg.max_penalty));

    FactorResult {
        name: "impervious_penalty".to_string(),
        raw_value: json!(impervious_pct),
        normalized_score: normalized,
        weight: cfg.max_penalty / MAX_SCORE,
        weighted_score: penalty,
        metadata,
    }
}

/// The reference pollinator habitat rule set, parameterized by a model.
pub struct HabitatAlgorithm {
    name: String,
    tool: String,
    property_source: String,
    model: Arc<ScoringModel>,
}

impl HabitatAlgorithm {
    pub fn new(model: Arc<ScoringModel>) -> Self {
        Self {
            name: ALGORITHM_NAME.to_string(),
            tool: DEFAULT_TOOL.to_string(),
            property_source: PROPERTY_SOURCE.to_string(),
            model,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = tool.into();
        self
    }

    pub fn with_property_source(mut self, source: impl Into<String>) -> Self {
        self.property_source = source.into();
        self
    }

    pub fn model(&self) -> &ScoringModel {
        &self.model
    }
}

impl ScoringAlgorithm for HabitatAlgorithm {
    fn name(&self) -> &str {
        &self.name
    }

    fn tool(&self) -> &str {
        &self.tool
    }

    fn calculate(&self, location: &Location, data: &AggregatedData) -> ScoringResult {
        let (property, status, detail) = extract_property(data, &self.property_source);
        match status {
            DataStatus::Unavailable | DataStatus::Invalid => warn!(
                grid_hash = %location.grid_hash(),
                status = status.as_str(),
                detail = detail.as_deref().unwrap_or(""),
                "scoring with default property data"
            ),
            _ => debug!(grid_hash = %location.grid_hash(), status = status.as_str(), "property data"),
        }

        let breakdown = score_property(&property, &self.model);
        let recommendations = generate_recommendations(&property, &breakdown, &self.model);

        let factors = vec![
            category_factor("floral", &breakdown.floral),
            category_factor("nesting", &breakdown.nesting),
            category_factor("connectivity", &breakdown.connectivity),
            category_factor("management", &breakdown.management),
            impervious_factor(
                property.impervious_surface_pct,
                breakdown.impervious_penalty,
                &self.model.impervious,
            ),
        ];

        let mut metadata = Metadata::new();
        metadata.insert("model_version".to_string(), json!(self.model.version));
        metadata.insert("model_name".to_string(), json!(self.model.name));
        metadata.insert("raw_score".to_string(), json!(breakdown.raw_score));
        metadata.insert(
            "data_completeness".to_string(),
            json!(breakdown.data_completeness),
        );
        metadata.insert(
            "confidence".to_string(),
            json!(breakdown.confidence.as_str()),
        );
        metadata.insert("property_data_status".to_string(), json!(status.as_str()));
        if let Some(detail) = detail {
            metadata.insert("property_data_error".to_string(), json!(detail));
        }
        let source_errors: Metadata = data
            .errors()
            .map(|(source, message)| (source.to_string(), json!(message)))
            .collect();
        metadata.insert("source_errors".to_string(), Value::Object(source_errors));

        ScoringResult {
            location: location.clone(),
            total_score: breakdown.final_score,
            max_possible: MAX_SCORE,
            percentage: breakdown.final_score / MAX_SCORE * 100.0,
            grade: breakdown.grade,
            factors,
            recommendations,
            algorithm: self.name.clone(),
            tool: self.tool.clone(),
            timestamp: chrono::Utc::now(),
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::model::ModelCatalog;
    use crate::scoring::property::{MowingFrequency, PlantEntry};
    use crate::sources::{error_payload, Payload};

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn model() -> ScoringModel {
        ScoringModel::default()
    }

    #[test]
    fn test_scenario_empty_yard() {
        let breakdown = score_property(&PropertyData::default(), &model());

        assert_eq!(breakdown.floral.total, 0.0);
        assert_eq!(breakdown.nesting.total, 0.0);
        assert_eq!(breakdown.connectivity.total, 10.0);
        assert_eq!(breakdown.connectivity.part("pioneer_bonus"), 8.0);
        assert_eq!(breakdown.connectivity.part("green_space"), 2.0);
        assert_eq!(breakdown.management.total, 8.0);
        assert!(approx(breakdown.impervious_penalty, -2.8));
        assert_eq!(breakdown.raw_score, 18.0);
        assert!(approx(breakdown.final_score, 15.2));
        assert_eq!(breakdown.grade.letter, "F");
        assert_eq!(breakdown.data_completeness, 0.0);
        assert_eq!(breakdown.confidence, Confidence::Low);
    }

    #[test]
    fn test_scenario_high_impervious() {
        let data = PropertyData {
            plants: vec![PlantEntry::new("Milkweed")
                .blooms(&[Season::Summer])
                .milkweed()],
            impervious_surface_pct: 60.0,
            ..Default::default()
        };
        let breakdown = score_property(&data, &model());

        assert_eq!(breakdown.floral.total, 7.0);
        assert_eq!(breakdown.floral.part("diversity"), 2.0);
        assert_eq!(breakdown.floral.part("summer"), 2.0);
        assert_eq!(breakdown.floral.part("milkweed_bonus"), 3.0);
        assert_eq!(breakdown.nesting.total, 0.0);
        assert_eq!(breakdown.connectivity.total, 10.0);
        assert_eq!(breakdown.management.total, 15.0);
        assert_eq!(breakdown.impervious_penalty, -10.0);
        assert_eq!(breakdown.raw_score, 32.0);
        assert_eq!(breakdown.final_score, 22.0);
        assert_eq!(breakdown.grade.letter, "F");
    }

    #[test]
    fn test_good_garden() {
        let data = PropertyData {
            plants: vec![
                PlantEntry::new("Showy Milkweed")
                    .count(3)
                    .blooms(&[Season::Summer])
                    .milkweed(),
                PlantEntry::new("Rabbitbrush").count(2).blooms(&[Season::Fall]),
                PlantEntry::new("Goldenrod").count(4).blooms(&[Season::Fall]),
                PlantEntry::new("Penstemon")
                    .count(5)
                    .blooms(&[Season::Spring, Season::Summer]),
                PlantEntry::new("Blanket Flower").count(6).blooms(&[Season::Summer]),
            ],
            estimated_flower_coverage_pct: 25.0,
            has_bare_ground: true,
            bare_ground_sqft: 20.0,
            has_dead_wood: true,
            leaves_stems_over_winter: true,
            mowing_frequency: MowingFrequency::Monthly,
            neighbors_in_program: 2,
            impervious_surface_pct: 25.0,
            ..Default::default()
        };
        let breakdown = score_property(&data, &model());

        // diversity 8 + coverage 6 + seasons 10 + milkweed 4
        assert_eq!(breakdown.floral.total, 28.0);
        // ground 5 + cavity 4 + undisturbed 8
        assert_eq!(breakdown.nesting.total, 17.0);
        // neighbors 4 + green floor 2 + early adopter 4
        assert_eq!(breakdown.connectivity.total, 10.0);
        assert_eq!(breakdown.management.total, 15.0);
        assert!(approx(breakdown.impervious_penalty, -1.05));
        assert!(approx(breakdown.final_score, 68.95));
        assert_eq!(breakdown.grade.letter, "C");
        assert_eq!(breakdown.data_completeness, 80.0);
        assert_eq!(breakdown.confidence, Confidence::High);
    }

    #[test]
    fn test_floral_capped() {
        let mut plants: Vec<PlantEntry> = (0..12)
            .map(|i| {
                PlantEntry::new(format!("native {i}"))
                    .blooms(&[Season::Spring, Season::Summer, Season::Fall])
            })
            .collect();
        plants.extend((0..6).map(|i| PlantEntry::new(format!("exotic {i}")).non_native()));
        plants.push(PlantEntry::new("Milkweed").count(10).milkweed());
        let data = PropertyData {
            plants,
            estimated_flower_coverage_pct: 80.0,
            ..Default::default()
        };

        let floral = score_floral(&data, &model());
        // 12 + 8 + 10 + 5 = 35, non-native bonus absorbed by the diversity cap
        assert_eq!(floral.part("diversity"), 12.0);
        assert_eq!(floral.total, 35.0);
    }

    #[test]
    fn test_non_native_bonus_capped_at_two() {
        let data = PropertyData {
            plants: (0..9)
                .map(|i| PlantEntry::new(format!("exotic {i}")).non_native())
                .collect(),
            ..Default::default()
        };
        assert_eq!(score_floral(&data, &model()).part("diversity"), 2.0);

        let one = PropertyData {
            plants: vec![PlantEntry::new("Lavender").non_native()],
            ..Default::default()
        };
        assert_eq!(score_floral(&one, &model()).part("diversity"), 0.5);
    }

    #[test]
    fn test_ground_requires_positive_area() {
        let mut data = PropertyData {
            has_bare_ground: true,
            bare_ground_sqft: 0.0,
            ..Default::default()
        };
        assert_eq!(score_nesting(&data, &model()).part("ground"), 0.0);

        data.bare_ground_sqft = 4.0;
        assert_eq!(score_nesting(&data, &model()).part("ground"), 3.0);

        data.bare_ground_sqft = 50.0;
        assert_eq!(score_nesting(&data, &model()).part("ground"), 10.0);

        data.has_bare_ground = false;
        assert_eq!(score_nesting(&data, &model()).part("ground"), 0.0);
    }

    #[test]
    fn test_nesting_caps() {
        let data = PropertyData {
            has_dead_wood: true,
            has_bee_hotel: true,
            has_brush_pile: true,
            leaves_stems_over_winter: true,
            mowing_frequency: MowingFrequency::Never,
            ..Default::default()
        };
        let nesting = score_nesting(&data, &model());
        assert_eq!(nesting.part("cavity"), 10.0);
        assert_eq!(nesting.part("undisturbed"), 10.0);
    }

    #[test]
    fn test_mowing_credit() {
        let points = |frequency| {
            let data = PropertyData {
                mowing_frequency: frequency,
                ..Default::default()
            };
            score_nesting(&data, &model()).part("undisturbed")
        };
        assert_eq!(points(MowingFrequency::Weekly), 0.0);
        assert_eq!(points(MowingFrequency::Biweekly), 1.0);
        assert_eq!(points(MowingFrequency::Monthly), 3.0);
        assert_eq!(points(MowingFrequency::Rarely), 3.0);
    }

    #[test]
    fn test_connectivity_pioneer_decay() {
        let score = |neighbors, green| {
            let data = PropertyData {
                neighbors_in_program: neighbors,
                green_space_within_500m: green,
                ..Default::default()
            };
            score_connectivity(&data, &model())
        };

        let first = score(0, 0.0);
        assert_eq!(first.part("pioneer_bonus"), 8.0);
        assert_eq!(first.part("neighbors"), 0.0);

        let early = score(2, 0.0);
        assert_eq!(early.part("pioneer_bonus"), 4.0);
        assert_eq!(early.part("neighbors"), 4.0);

        let established = score(3, 0.0);
        assert_eq!(established.part("pioneer_bonus"), 0.0);
        assert_eq!(established.part("neighbors"), 7.0);

        let network = score(8, 35.0);
        assert_eq!(network.part("neighbors"), 10.0);
        assert_eq!(network.part("green_space"), 10.0);
        assert_eq!(network.total, 20.0);

        // Pioneer plus full green space overflows and is capped
        assert_eq!(score(0, 50.0).total, 18.0);
        assert_eq!(score(1, 50.0).total, 16.0);
    }

    #[test]
    fn test_management_pesticides() {
        let points = |uses, frequency| {
            let data = PropertyData {
                uses_pesticides: uses,
                pesticide_frequency: frequency,
                ..Default::default()
            };
            score_management(&data, &model()).part("pesticide_free")
        };
        assert_eq!(points(true, PesticideFrequency::Never), 8.0);
        assert_eq!(points(true, PesticideFrequency::Rarely), 5.0);
        assert_eq!(points(true, PesticideFrequency::Sometimes), 2.0);
        assert_eq!(points(true, PesticideFrequency::Often), 0.0);
        assert_eq!(points(false, PesticideFrequency::Often), 8.0);
    }

    #[test]
    fn test_native_proportion_tiers() {
        let data = PropertyData {
            plants: vec![
                PlantEntry::new("a"),
                PlantEntry::new("b"),
                PlantEntry::new("c").non_native(),
                PlantEntry::new("d").non_native(),
                PlantEntry::new("e").non_native(),
            ],
            ..Default::default()
        };
        // 40% native
        assert_eq!(score_management(&data, &model()).part("native_proportion"), 3.0);
    }

    #[test]
    fn test_impervious_penalty() {
        let cfg = model().impervious;
        assert_eq!(impervious_penalty(0.0, &cfg), 0.0);
        assert_eq!(impervious_penalty(22.0, &cfg), 0.0);
        assert!(approx(impervious_penalty(32.0, &cfg), -3.5));
        assert_eq!(impervious_penalty(100.0, &cfg), -10.0);
    }

    #[test]
    fn test_final_score_bounds() {
        let best = PropertyData {
            plants: (0..15)
                .map(|i| {
                    PlantEntry::new(format!("p{i}"))
                        .count(5)
                        .blooms(&[Season::Spring, Season::Summer, Season::Fall])
                        .milkweed()
                })
                .collect(),
            estimated_flower_coverage_pct: 100.0,
            has_bare_ground: true,
            bare_ground_sqft: 500.0,
            has_dead_wood: true,
            has_bee_hotel: true,
            has_brush_pile: true,
            leaves_stems_over_winter: true,
            mowing_frequency: MowingFrequency::Never,
            neighbors_in_program: 20,
            green_space_within_500m: 90.0,
            impervious_surface_pct: 0.0,
            ..Default::default()
        };
        let top = score_property(&best, &model());
        assert_eq!(top.final_score, 100.0);
        assert_eq!(top.grade.letter, "A+");

        let worst = PropertyData {
            uses_pesticides: true,
            pesticide_frequency: PesticideFrequency::Often,
            neighbors_in_program: 3,
            impervious_surface_pct: 100.0,
            ..Default::default()
        };
        let bottom = score_property(&worst, &model());
        // 7 neighbors + 2 green floor - 10 penalty clamps at zero
        assert_eq!(bottom.raw_score, 9.0);
        assert_eq!(bottom.final_score, 0.0);
    }

    #[test]
    fn test_beta_model_weights_fall_higher() {
        let catalog = ModelCatalog::builtin();
        let beta = catalog.get("2.1.0-beta").unwrap();
        let data = PropertyData {
            plants: vec![PlantEntry::new("Aster").blooms(&[Season::Fall])],
            ..Default::default()
        };
        assert_eq!(score_floral(&data, &beta).part("fall"), 8.0);
        assert_eq!(score_floral(&data, &model()).part("fall"), 6.0);
    }

    fn bundle(property: Option<Payload>) -> AggregatedData {
        let location = Location::new(40.666, -111.897);
        let mut data = AggregatedData::new(location);
        if let Some(payload) = property {
            data.insert(PROPERTY_SOURCE, payload);
        }
        data
    }

    #[test]
    fn test_extract_property_statuses() {
        let (_, status, _) = extract_property(&bundle(None), PROPERTY_SOURCE);
        assert_eq!(status, DataStatus::Missing);

        let (_, status, detail) =
            extract_property(&bundle(Some(error_payload("timed out"))), PROPERTY_SOURCE);
        assert_eq!(status, DataStatus::Unavailable);
        assert_eq!(detail.as_deref(), Some("timed out"));

        let (_, status, _) = extract_property(&bundle(Some(Payload::new())), PROPERTY_SOURCE);
        assert_eq!(status, DataStatus::Empty);

        let mut bad = Payload::new();
        bad.insert("plants".to_string(), json!("lots"));
        let (property, status, detail) = extract_property(&bundle(Some(bad)), PROPERTY_SOURCE);
        assert_eq!(status, DataStatus::Invalid);
        assert!(detail.is_some());
        assert_eq!(property, PropertyData::default());

        let mut good = Payload::new();
        good.insert("neighbors_in_program".to_string(), json!(4));
        let (property, status, _) = extract_property(&bundle(Some(good)), PROPERTY_SOURCE);
        assert_eq!(status, DataStatus::Provided);
        assert_eq!(property.neighbors_in_program, 4);
    }

    #[test]
    fn test_calculate_builds_result() {
        let algorithm = HabitatAlgorithm::new(Arc::new(model()));
        let mut data = bundle(None);
        data.insert("soil", error_payload("503 Service Unavailable"));

        let result = algorithm.calculate(data.location(), &data);

        assert!(approx(result.total_score, 15.2));
        assert_eq!(result.max_possible, 100.0);
        assert!(approx(result.percentage, 15.2));
        assert_eq!(result.grade.letter, "F");
        assert_eq!(result.algorithm, ALGORITHM_NAME);
        assert_eq!(result.tool, DEFAULT_TOOL);
        assert_eq!(result.model_version(), Some("2.0.0"));
        assert_eq!(result.metadata["property_data_status"], json!("missing"));
        assert_eq!(result.metadata["confidence"], json!("low"));
        assert_eq!(
            result.metadata["source_errors"]["soil"],
            json!("503 Service Unavailable")
        );

        let names: Vec<&str> = result.factors.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["floral", "nesting", "connectivity", "management", "impervious_penalty"]
        );

        let connectivity = result.factor("connectivity").unwrap();
        assert_eq!(connectivity.normalized_score, 0.5);
        assert_eq!(connectivity.weight, 0.2);
        assert!(approx(connectivity.weighted_score, 10.0));

        let penalty = result.factor("impervious_penalty").unwrap();
        assert_eq!(penalty.raw_value, json!(30.0));
        assert!(approx(penalty.weighted_score, -2.8));
        assert!(approx(penalty.normalized_score, 0.28));

        for factor in &result.factors {
            assert!(
                (0.0..=1.0).contains(&factor.normalized_score),
                "{} normalized to {}",
                factor.name,
                factor.normalized_score
            );
        }
    }

    #[test]
    fn test_no_penalty_normalizes_to_zero() {
        let factor = impervious_factor(10.0, 0.0, &model().impervious);
        assert_eq!(factor.normalized_score, 0.0);
        assert!(factor.normalized_score.is_sign_positive());
        assert_eq!(factor.weighted_score, 0.0);
    }

    #[test]
    fn test_calculate_is_deterministic() {
        let algorithm = HabitatAlgorithm::new(Arc::new(model()));
        let mut payload = Payload::new();
        payload.insert(
            "plants".to_string(),
            json!([{ "species": "Goldenrod", "bloom_seasons": ["fall"] }]),
        );
        let data = bundle(Some(payload));

        let a = algorithm.calculate(data.location(), &data);
        let b = algorithm.calculate(data.location(), &data);
        assert_eq!(a.total_score, b.total_score);
        assert_eq!(a.factors, b.factors);
        assert_eq!(a.recommendations, b.recommendations);
    }
}
