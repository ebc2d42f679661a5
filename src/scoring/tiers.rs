use serde::{Deserialize, Serialize};

/// Threshold bucket: `value >= min` earns `points`.
///
/// Tier tables are ordered from the highest minimum to the lowest and the
/// first matching tier wins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Tier {
    pub min: f64,
    pub points: f64,
}

impl Tier {
    pub const fn new(min: f64, points: f64) -> Self {
        Self { min, points }
    }

    pub fn matches(&self, value: f64) -> bool {
        value >= self.min
    }
}

/// Points of the first tier whose minimum is at or below `value`, else 0.
pub fn tier_points(tiers: &[Tier], value: f64) -> f64 {
    tiers
        .iter()
        .find(|tier| tier.matches(value))
        .map(|tier| tier.points)
        .unwrap_or(0.0)
}

/// Check a tier table is strictly descending by minimum.
///
/// Returns a message per offending position, prefixed by `path`.
pub fn check_descending(path: &str, tiers: &[Tier]) -> Vec<String> {
    let mut errors = Vec::new();
    for (i, pair) in tiers.windows(2).enumerate() {
        if pair[1].min >= pair[0].min {
            errors.push(format!(
                "{}[{}].min: {} must be lower than the previous tier's {}",
                path,
                i + 1,
                pair[1].min,
                pair[0].min
            ));
        }
    }
    for (i, tier) in tiers.iter().enumerate() {
        if !tier.min.is_finite() || !tier.points.is_finite() {
            errors.push(format!("{}[{}]: min and points must be finite", path, i));
        } else if tier.points < 0.0 {
            errors.push(format!("{}[{}].points: must be non-negative", path, i));
        }
    }
    errors
}
