use serde::{Deserialize, Serialize};

/// A letter tier with the minimum score needed to reach it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HabitatGrade {
    pub letter: String,
    pub description: String,
    pub min_score: f64,
}

impl HabitatGrade {
    pub fn new(letter: impl Into<String>, description: impl Into<String>, min_score: f64) -> Self {
        Self {
            letter: letter.into(),
            description: description.into(),
            min_score,
        }
    }
}

/// Ordered grade tiers, highest threshold first, ending in a catch-all tier
/// at 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GradeScale {
    tiers: Vec<HabitatGrade>,
}

impl Default for GradeScale {
    fn default() -> Self {
        Self {
            tiers: vec![
                HabitatGrade::new("A+", "Premium Pollinator Site", 90.0),
                HabitatGrade::new("A", "Excellent Potential", 80.0),
                HabitatGrade::new("B", "Good Potential", 70.0),
                HabitatGrade::new("C", "Moderate Potential", 60.0),
                HabitatGrade::new("D", "Limited Potential", 50.0),
                HabitatGrade::new("F", "Challenging Site", 0.0),
            ],
        }
    }
}

impl GradeScale {
    pub fn new(tiers: Vec<HabitatGrade>) -> Self {
        Self { tiers }
    }

    pub fn tiers(&self) -> &[HabitatGrade] {
        &self.tiers
    }

    /// First tier whose minimum is at or below `score`.
    ///
    /// Scores below every tier (only possible on an unvalidated scale) fall
    /// into the last tier.
    pub fn grade_for(&self, score: f64) -> HabitatGrade {
        self.tiers
            .iter()
            .find(|tier| score >= tier.min_score)
            .or_else(|| self.tiers.last())
            .cloned()
            .unwrap_or_else(|| HabitatGrade::new("F", "Ungraded", 0.0))
    }

    /// Rank of a letter in the scale, 0 being the best tier.
    pub fn rank(&self, letter: &str) -> Option<usize> {
        self.tiers.iter().position(|tier| tier.letter == letter)
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.tiers.is_empty() {
            errors.push("grades: at least one tier is required".to_string());
            return errors;
        }

        for (i, pair) in self.tiers.windows(2).enumerate() {
            if pair[1].min_score >= pair[0].min_score {
                errors.push(format!(
                    "grades[{}].min_score: {} ({}) must be lower than {} ({})",
                    i + 1,
                    pair[1].min_score,
                    pair[1].letter,
                    pair[0].min_score,
                    pair[0].letter
                ));
            }
        }

        if let Some(last) = self.tiers.last() {
            if last.min_score != 0.0 {
                errors.push(format!(
                    "grades: last tier '{}' must have min_score 0 to catch every score",
                    last.letter
                ));
            }
        }

        errors
    }
}
