//! Evaluation report produced by one harness run.

use std::fmt;

use serde::Serialize;

use crate::error::Stage;
use crate::labels::LabelMode;
use crate::scoring::Score;

/// Result of one adapter in the roster.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Scored(Score),
    Failed { stage: Stage, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportEntry {
    pub name: String,
    pub outcome: Outcome,
    pub elapsed_secs: f64,
}

impl ReportEntry {
    pub fn score(&self) -> Option<&Score> {
        match &self.outcome {
            Outcome::Scored(score) => Some(score),
            Outcome::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, Outcome::Failed { .. })
    }
}

/// Per-classifier results, in roster order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub mode: LabelMode,
    pub n_train: usize,
    pub n_test: usize,
    pub entries: Vec<ReportEntry>,
}

impl EvaluationReport {
    pub fn new(mode: LabelMode, n_train: usize, n_test: usize) -> Self {
        EvaluationReport {
            mode,
            n_train,
            n_test,
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, entry: ReportEntry) {
        self.entries.push(entry);
    }

    pub fn get(&self, name: &str) -> Option<&ReportEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter().filter(|e| e.is_failed())
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn fmt_metric(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.4}", v))
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            LabelMode::Closed => writeln!(f, "closed-set evaluation")?,
            LabelMode::OpenSet { unknown_label } => {
                writeln!(f, "open-set evaluation (unknown label {})", unknown_label)?
            }
        }
        writeln!(f, "train samples: {}, test samples: {}", self.n_train, self.n_test)?;
        writeln!(
            f,
            "{:<20} {:>10} {:>12} {:>10} {:>9}",
            "classifier", "accuracy", "ood_hit_rate", "ood_recall", "time_s"
        )?;
        for entry in &self.entries {
            match &entry.outcome {
                Outcome::Scored(score) => writeln!(
                    f,
                    "{:<20} {:>10.4} {:>12} {:>10} {:>9.2}",
                    entry.name,
                    score.accuracy,
                    fmt_metric(score.ood_hit_rate),
                    fmt_metric(score.ood_recall),
                    entry.elapsed_secs
                )?,
                Outcome::Failed { stage, message } => writeln!(
                    f,
                    "{:<20} FAILED during {}: {}",
                    entry.name, stage, message
                )?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> EvaluationReport {
        let mut report = EvaluationReport::new(LabelMode::OpenSet { unknown_label: 3 }, 10, 4);
        report.push(ReportEntry {
            name: "mlp".to_string(),
            outcome: Outcome::Scored(Score {
                accuracy: 0.75,
                ood_hit_rate: Some(0.25),
                ood_recall: Some(1.0),
            }),
            elapsed_secs: 0.5,
        });
        report.push(ReportEntry {
            name: "kmeans".to_string(),
            outcome: Outcome::Failed {
                stage: Stage::Fit,
                message: "no clusters".to_string(),
            },
            elapsed_secs: 0.0,
        });
        report
    }

    #[test]
    fn test_display_marks_failures() {
        let text = format!("{}", sample_report());
        assert!(text.contains("open-set evaluation (unknown label 3)"));
        assert!(text.contains("0.7500"));
        let failed = text.lines().find(|l| l.starts_with("kmeans")).unwrap();
        assert!(failed.contains("FAILED during fit: no clusters"));
    }

    #[test]
    fn test_json_tags_outcomes() {
        let json = sample_report().to_json_pretty().unwrap();
        assert!(json.contains("\"status\": \"scored\""));
        assert!(json.contains("\"status\": \"failed\""));
        assert!(json.contains("\"stage\": \"fit\""));
    }

    #[test]
    fn test_lookup_and_failures() {
        let report = sample_report();
        assert_eq!(report.get("mlp").and_then(|e| e.score()).map(|s| s.accuracy), Some(0.75));
        assert_eq!(report.failures().count(), 1);
    }
}
