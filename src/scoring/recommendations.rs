use super::habitat::Breakdown;
use super::model::ScoringModel;
use super::property::{PesticideFrequency, PropertyData, Season};
use super::tiers::Tier;
use crate::result::{Priority, Recommendation};

fn rec(priority: Priority, action: &str, reason: &str, impact: String, species: &[&str]) -> Recommendation {
    Recommendation {
        priority,
        action: action.to_string(),
        reason: reason.to_string(),
        impact,
        species: species.iter().map(|s| s.to_string()).collect(),
    }
}

/// Improvement suggestions for a scored property, most urgent first.
///
/// Each trigger is checked independently. Within a priority the order of the
/// checks below is kept.
pub fn generate_recommendations(
    data: &PropertyData,
    breakdown: &Breakdown,
    model: &ScoringModel,
) -> Vec<Recommendation> {
    let mut recs = Vec::new();

    if !data.has_bloom_in(Season::Fall) {
        recs.push(rec(
            Priority::Critical,
            "Add fall-blooming plants",
            "Migrating monarchs need late-season nectar",
            format!("+{} points", model.floral.fall_points),
            &["Rabbitbrush", "Goldenrod", "Asters"],
        ));
    }

    if !data.has_milkweed() {
        recs.push(rec(
            Priority::High,
            "Plant milkweed",
            "Monarchs can only lay eggs on milkweed",
            format!("+{}-{} points", lowest_points(&model.floral.milkweed_tiers), model.floral.milkweed_max),
            &["Showy Milkweed", "Narrowleaf Milkweed"],
        ));
    }

    if data.uses_pesticides
        && matches!(
            data.pesticide_frequency,
            PesticideFrequency::Sometimes | PesticideFrequency::Often
        )
    {
        let pts = &model.management.pesticide_points;
        let gain = pts.never - pts.points(data.pesticide_frequency);
        recs.push(rec(
            Priority::High,
            "Switch to integrated pest management",
            "Pesticides harm pollinators directly",
            format!("+{} points", gain),
            &[],
        ));
    }

    if breakdown.nesting.total < model.nesting.recommend_below {
        if !data.has_bare_ground {
            recs.push(rec(
                Priority::Medium,
                "Leave a patch of undisturbed bare soil",
                "Most native bees nest in bare ground",
                format!("+{}-{} points", model.nesting.ground_any_points, model.nesting.ground_max),
                &[],
            ));
        }
        if !data.leaves_stems_over_winter {
            recs.push(rec(
                Priority::Medium,
                "Delay spring cleanup until temperatures exceed 50°F",
                "Stems and leaf litter shelter overwintering bees",
                format!("+{} points", model.nesting.leaves_winter_points),
                &[],
            ));
        }
    }

    if data.neighbors_in_program == 0 {
        let conn = &model.connectivity;
        let best = conn
            .neighbor_tiers
            .iter()
            .map(|t| t.points)
            .fold(conn.neighbor_floor, f64::max);
        recs.push(rec(
            Priority::Medium,
            "Invite a neighbor to join the program",
            "Connected habitats are more effective",
            format!("+{}-{} points", conn.early_adopter_points_per_neighbor, best),
            &[],
        ));
    }

    // Stable: keeps trigger order within a priority
    recs.sort_by_key(|r| r.priority);
    recs
}

fn lowest_points(tiers: &[Tier]) -> f64 {
    tiers.last().map(|t| t.points).unwrap_or(0.0)
}
