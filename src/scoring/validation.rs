use super::model::ScoringModel;
use super::tiers::check_descending;

const WEIGHT_TOTAL: f64 = 100.0;

/// Validate a scoring model.
/// Returns all validation errors at once (not just the first).
pub fn validate_model(model: &ScoringModel) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    // Category weights double as category caps
    let weights = [
        ("floral", model.weights.floral),
        ("nesting", model.weights.nesting),
        ("connectivity", model.weights.connectivity),
        ("management", model.weights.management),
    ];
    for (name, weight) in weights {
        if !weight.is_finite() || weight < 0.0 {
            errors.push(format!("weights.{}: must be a non-negative number", name));
        }
    }
    // Scores are reported out of 100, so the category caps must fill it exactly
    let total = model.weights.total();
    if (total - WEIGHT_TOTAL).abs() > 1e-6 {
        errors.push(format!("weights: must sum to {} (got {})", WEIGHT_TOTAL, total));
    }

    let floral = &model.floral;
    errors.extend(check_descending("floral_config.diversity_tiers", &floral.diversity_tiers));
    errors.extend(check_descending("floral_config.coverage_tiers", &floral.coverage_tiers));
    errors.extend(check_descending("floral_config.milkweed_tiers", &floral.milkweed_tiers));
    check_non_negative(
        &mut errors,
        "floral_config",
        &[
            ("diversity_max", floral.diversity_max),
            ("coverage_max", floral.coverage_max),
            ("non_native_points", floral.non_native_points),
            ("non_native_max", floral.non_native_max),
            ("spring_points", floral.spring_points),
            ("summer_points", floral.summer_points),
            ("fall_points", floral.fall_points),
            ("milkweed_max", floral.milkweed_max),
        ],
    );

    let nesting = &model.nesting;
    errors.extend(check_descending("nesting_config.ground_tiers", &nesting.ground_tiers));
    check_non_negative(
        &mut errors,
        "nesting_config",
        &[
            ("ground_max", nesting.ground_max),
            ("cavity_max", nesting.cavity_max),
            ("undisturbed_max", nesting.undisturbed_max),
            ("ground_any_points", nesting.ground_any_points),
            ("dead_wood_points", nesting.dead_wood_points),
            ("bee_hotel_points", nesting.bee_hotel_points),
            ("brush_pile_points", nesting.brush_pile_points),
            ("leaves_winter_points", nesting.leaves_winter_points),
            ("brush_pile_undisturbed_points", nesting.brush_pile_undisturbed_points),
        ],
    );
    if let Some(lowest) = nesting.ground_tiers.last() {
        if lowest.min <= 0.0 {
            errors.push(
                "nesting_config.ground_tiers: lowest min must be above 0 (use ground_any_points)"
                    .to_string(),
            );
        }
    }

    let connectivity = &model.connectivity;
    errors.extend(check_descending(
        "connectivity_config.neighbor_tiers",
        &connectivity.neighbor_tiers,
    ));
    errors.extend(check_descending(
        "connectivity_config.green_space_tiers",
        &connectivity.green_space_tiers,
    ));
    check_non_negative(
        &mut errors,
        "connectivity_config",
        &[
            ("pioneer_bonus", connectivity.pioneer_bonus),
            ("early_adopter_bonus", connectivity.early_adopter_bonus),
            (
                "early_adopter_points_per_neighbor",
                connectivity.early_adopter_points_per_neighbor,
            ),
            ("neighbor_floor", connectivity.neighbor_floor),
            ("green_space_floor", connectivity.green_space_floor),
        ],
    );

    errors.extend(check_descending(
        "management_config.native_tiers",
        &model.management.native_tiers,
    ));

    check_non_negative(
        &mut errors,
        "impervious_config",
        &[
            ("threshold_pct", model.impervious.threshold_pct),
            ("penalty_per_pct", model.impervious.penalty_per_pct),
            ("max_penalty", model.impervious.max_penalty),
        ],
    );

    if model.confidence.high_min_pct < model.confidence.medium_min_pct {
        errors.push("confidence: high_min_pct must not be below medium_min_pct".to_string());
    }

    errors.extend(model.grades.validate());

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_non_negative(errors: &mut Vec<String>, section: &str, fields: &[(&str, f64)]) {
    for (name, value) in fields {
        if !value.is_finite() || *value < 0.0 {
            errors.push(format!("{}.{}: must be a non-negative number", section, name));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::grade::{GradeScale, HabitatGrade};
    use crate::scoring::tiers::Tier;

    #[test]
    fn test_valid_model() {
        assert!(validate_model(&ScoringModel::default()).is_ok());
    }

    #[test]
    fn test_negative_weight() {
        let mut model = ScoringModel::default();
        model.weights.nesting = -1.0;
        model.weights.floral = 66.0;
        let errors = validate_model(&model).unwrap_err();
        assert_eq!(errors, vec!["weights.nesting: must be a non-negative number"]);
    }

    #[test]
    fn test_weights_must_sum_to_hundred() {
        let mut model = ScoringModel::default();
        model.weights.floral = 5.0;
        model.weights.nesting = 5.0;
        model.weights.connectivity = 5.0;
        model.weights.management = 5.0;
        let errors = validate_model(&model).unwrap_err();
        assert_eq!(errors, vec!["weights: must sum to 100 (got 20)"]);
    }

    #[test]
    fn test_fractional_weights_accepted() {
        let mut model = ScoringModel::default();
        model.weights.floral = 35.5;
        model.weights.management = 14.5;
        assert!(validate_model(&model).is_ok());
    }

    #[test]
    fn test_ground_tier_at_zero_rejected() {
        let mut model = ScoringModel::default();
        model.nesting.ground_tiers.push(Tier::new(0.0, 3.0));
        let errors = validate_model(&model).unwrap_err();
        assert!(errors[0].contains("nesting_config.ground_tiers"));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut model = ScoringModel::default();
        model.impervious.penalty_per_pct = -0.35; // Error 1
        model.confidence.high_min_pct = 10.0; // Error 2
        model.grades = GradeScale::new(vec![HabitatGrade::new("A", "a", 50.0)]); // Error 3
        let errors = validate_model(&model).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors[0].contains("impervious_config.penalty_per_pct"));
        assert!(errors[1].contains("confidence"));
        assert!(errors[2].contains("grades"));
    }
}
