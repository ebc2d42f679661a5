use owo_colors::OwoColorize;
use std::io::IsTerminal;

use crate::result::{Priority, ScoringResult};
use crate::scoring::model::{Methodology, ModelSummary};

/// Check if stdout is a TTY (for auto-detecting color support)
pub fn should_use_colors() -> bool {
    std::io::stdout().is_terminal()
}

/// Display label for a location: its name, else its grid cell.
fn location_label(result: &ScoringResult) -> String {
    if result.location.name().is_empty() {
        result.location.grid_hash().to_string()
    } else {
        result.location.name().to_string()
    }
}

fn colored_grade(letter: &str, use_colors: bool) -> String {
    if !use_colors {
        return letter.to_string();
    }
    match letter.chars().next() {
        Some('A') => letter.green().bold().to_string(),
        Some('B') => letter.cyan().bold().to_string(),
        Some('C') | Some('D') => letter.yellow().bold().to_string(),
        _ => letter.red().bold().to_string(),
    }
}

fn colored_priority(priority: Priority, use_colors: bool) -> String {
    let label = format!("[{}]", priority.as_str());
    if !use_colors {
        return label;
    }
    match priority {
        Priority::Critical => label.red().bold().to_string(),
        Priority::High => label.yellow().to_string(),
        Priority::Medium => label.dimmed().to_string(),
    }
}

/// Format one result with its breakdown and recommendations.
pub fn format_result_detail(result: &ScoringResult, use_colors: bool) -> String {
    let mut lines = Vec::new();

    let label = location_label(result);
    let header = format!(
        "{}  {:.1}/{:.0}  {} ({})",
        label,
        result.total_score,
        result.max_possible,
        colored_grade(&result.grade.letter, use_colors),
        result.grade.description
    );
    lines.push(if use_colors {
        header.bold().to_string()
    } else {
        header
    });

    let model = result.model_version().unwrap_or("unknown");
    let confidence = result
        .metadata
        .get("confidence")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown");
    lines.push(format!(
        "  Model: {}  Confidence: {}  Cell: {}",
        model,
        confidence,
        result.location.grid_hash()
    ));

    lines.push(String::new());
    for factor in &result.factors {
        let max = factor.metadata.get("max").and_then(|v| v.as_f64());
        let value = match max {
            Some(max) => format!("{:>6.1} / {:.0}", factor.weighted_score, max),
            None => format!("{:>6.1}", factor.weighted_score),
        };
        lines.push(format!("  {:<20}{}", factor.name, value));
    }

    if let Some(errors) = result.metadata.get("source_errors").and_then(|v| v.as_object()) {
        for (source, message) in errors {
            let line = format!("  ! {} unavailable: {}", source, message.as_str().unwrap_or(""));
            lines.push(if use_colors { line.red().to_string() } else { line });
        }
    }

    if !result.recommendations.is_empty() {
        lines.push(String::new());
        lines.push("Recommendations:".to_string());
        for rec in &result.recommendations {
            let mut line = format!(
                "  {} {} ({})",
                colored_priority(rec.priority, use_colors),
                rec.action,
                rec.impact
            );
            if !rec.species.is_empty() {
                line.push_str(&format!(": {}", rec.species.join(", ")));
            }
            lines.push(line);
        }
    }

    lines.join("\n")
}

/// Truncate a label to fit available width, accounting for Unicode
fn truncate_label(label: &str, max_width: usize) -> String {
    let chars: Vec<char> = label.chars().collect();
    if chars.len() <= max_width {
        label.to_string()
    } else if max_width > 3 {
        format!("{}...", chars[..max_width - 3].iter().collect::<String>())
    } else {
        chars[..max_width].iter().collect()
    }
}

/// Format results as a ranked table: index, score, grade, location.
/// Highest score first; ties keep input order. No headers.
pub fn format_results_table(results: &[ScoringResult], use_colors: bool) -> String {
    if results.is_empty() {
        return "No locations scored.".to_string();
    }

    let mut ranked: Vec<&ScoringResult> = results.iter().collect();
    ranked.sort_by(|a, b| {
        b.total_score
            .partial_cmp(&a.total_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    ranked
        .into_iter()
        .enumerate()
        .map(|(idx, result)| {
            let index_str = format!("{:>2}.", idx + 1);
            let score_str = format!("{:>5.1}", result.total_score);
            let grade_str = format!("{:<2}", result.grade.letter);
            let label = truncate_label(&location_label(result), 40);

            if use_colors {
                format!(
                    "{} {}  {}  {}",
                    index_str.dimmed(),
                    score_str.bold(),
                    colored_grade(&grade_str, true),
                    label
                )
            } else {
                format!("{} {}  {}  {}", index_str, score_str, grade_str, label)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format results as tab-separated values for scripting
/// Columns: score, grade, lat, lng, grid_hash, name (no headers, no colors)
pub fn format_tsv(results: &[ScoringResult]) -> String {
    results
        .iter()
        .map(|result| {
            format!(
                "{:.2}\t{}\t{}\t{}\t{}\t{}",
                result.total_score,
                result.grade.letter,
                result.location.lat(),
                result.location.lng(),
                result.location.grid_hash(),
                result.location.name()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_model_list(models: &[ModelSummary], use_colors: bool) -> String {
    models
        .iter()
        .map(|model| {
            let marker = if model.active { "*" } else { " " };
            let line = format!("{} {:<12} {}", marker, model.version, model.name);
            if use_colors && model.active {
                line.green().to_string()
            } else {
                line
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_methodology(methodology: &Methodology, use_colors: bool) -> String {
    let title = format!("{} (v{})", methodology.name, methodology.version);
    let mut lines = vec![if use_colors {
        title.bold().to_string()
    } else {
        title
    }];
    lines.push(methodology.description.clone());
    lines.push(String::new());
    lines.push("Weights:".to_string());
    let weights = &methodology.weights;
    for (name, weight) in [
        ("floral", weights.floral),
        ("nesting", weights.nesting),
        ("connectivity", weights.connectivity),
        ("management", weights.management),
    ] {
        lines.push(format!("  {:<14}{:>5.0}", name, weight));
    }
    lines.push(format!(
        "Impervious penalty above {}%, fall bloom worth {} points",
        methodology.impervious_threshold_pct, methodology.fall_bloom_points
    ));
    if !methodology.citations.is_empty() {
        lines.push(String::new());
        lines.push("Sources:".to_string());
        for citation in &methodology.citations {
            lines.push(format!("  - {}", citation));
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::AggregatedData;
    use crate::location::Location;
    use crate::scoring::{HabitatAlgorithm, ModelCatalog, ScoringAlgorithm, ScoringModel};
    use std::sync::Arc;

    fn scored(name: &str) -> ScoringResult {
        let location = Location::new(40.666, -111.897).with_name(name);
        let algorithm = HabitatAlgorithm::new(Arc::new(ScoringModel::default()));
        algorithm.calculate(&location, &AggregatedData::new(location.clone()))
    }

    #[test]
    fn test_detail_plain() {
        let output = format_result_detail(&scored("Back Yard"), false);
        assert!(output.starts_with("Back Yard  15.2/100  F (Challenging Site)"));
        assert!(output.contains("Model: 2.0.0  Confidence: low  Cell: 40.666_-111.897"));
        assert!(output.contains("connectivity"));
        assert!(output.contains("[critical] Add fall-blooming plants (+6 points): Rabbitbrush"));
    }

    #[test]
    fn test_detail_falls_back_to_cell() {
        let output = format_result_detail(&scored(""), false);
        assert!(output.starts_with("40.666_-111.897"));
    }

    #[test]
    fn test_table_empty() {
        assert_eq!(format_results_table(&[], false), "No locations scored.");
    }

    #[test]
    fn test_table_plain() {
        let output = format_results_table(&[scored("Front"), scored("Back")], false);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], " 1.  15.2  F   Front");
    }

    #[test]
    fn test_table_ranks_by_score() {
        let mut best = scored("Meadow");
        best.total_score = 82.5;
        let output = format_results_table(&[scored("Lot"), best, scored("Patio")], false);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], " 1.  82.5  F   Meadow");
        assert!(lines[1].ends_with("Lot"));
        assert!(lines[2].ends_with("Patio"));
    }

    #[test]
    fn test_tsv() {
        let output = format_tsv(&[scored("Front")]);
        assert_eq!(output, "15.20\tF\t40.666\t-111.897\t40.666_-111.897\tFront");
    }

    #[test]
    fn test_truncate_label() {
        assert_eq!(truncate_label("short", 10), "short");
        assert_eq!(truncate_label("a very long garden name", 10), "a very ...");
    }

    #[test]
    fn test_model_list_marks_active() {
        let output = format_model_list(&ModelCatalog::builtin().list(), false);
        assert_eq!(
            output.lines().next(),
            Some("* 2.0.0        Research-Validated v2")
        );
        assert!(output.contains("  2.1.0-beta   Adjusted Fall Weight"));
    }

    #[test]
    fn test_methodology_plain() {
        let output = format_methodology(&ModelCatalog::builtin().methodology(), false);
        assert!(output.contains("  floral           35"));
        assert!(output.contains("Impervious penalty above 22%, fall bloom worth 6 points"));
    }
}
