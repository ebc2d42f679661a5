use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::location::Location;
use crate::scoring::grade::HabitatGrade;

pub type Metadata = serde_json::Map<String, Value>;

/// One scored factor in a breakdown.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorResult {
    pub name: String,
    pub raw_value: Value,
    pub normalized_score: f64,
    pub weight: f64,
    pub weighted_score: f64,
    pub metadata: Metadata,
}

impl FactorResult {
    pub fn to_record(&self) -> Value {
        json!({
            "name": self.name,
            "raw_value": self.raw_value,
            "normalized_score": round_dp(self.normalized_score, 3),
            "weight": round_dp(self.weight, 3),
            "weighted_score": round_dp(self.weighted_score, 3),
            "metadata": self.metadata,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
        }
    }
}

/// Actionable habitat improvement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: Priority,
    pub action: String,
    pub reason: String,
    #[serde(default)]
    pub impact: String,
    #[serde(default)]
    pub species: Vec<String>,
}

/// Complete scoring output for one location. Owned by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringResult {
    pub location: Location,
    pub total_score: f64,
    pub max_possible: f64,
    pub percentage: f64,
    pub grade: HabitatGrade,
    pub factors: Vec<FactorResult>,
    pub recommendations: Vec<Recommendation>,
    pub algorithm: String,
    pub tool: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: Metadata,
}

impl ScoringResult {
    pub fn factor(&self, name: &str) -> Option<&FactorResult> {
        self.factors.iter().find(|f| f.name == name)
    }

    /// Version of the model configuration that produced this result.
    pub fn model_version(&self) -> Option<&str> {
        self.metadata.get("model_version").and_then(|v| v.as_str())
    }

    /// Serialized record handed to persistence and API collaborators.
    pub fn to_record(&self) -> Value {
        json!({
            "location": {
                "lat": self.location.lat(),
                "lng": self.location.lng(),
                "name": self.location.name(),
                "grid_hash": self.location.grid_hash(),
            },
            "total_score": round_dp(self.total_score, 2),
            "max_possible": round_dp(self.max_possible, 2),
            "percentage": round_dp(self.percentage, 1),
            "grade": self.grade.letter,
            "grade_description": self.grade.description,
            "factors": self.factors.iter().map(FactorResult::to_record).collect::<Vec<_>>(),
            "recommendations": self.recommendations,
            "algorithm": self.algorithm,
            "tool": self.tool,
            "timestamp": self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
            "metadata": self.metadata,
        })
    }
}

/// Round half away from zero to `dp` decimal places.
pub fn round_dp(value: f64, dp: i32) -> f64 {
    let scale = 10f64.powi(dp);
    (value * scale).round() / scale
}
