//! Closed-set accuracy and OOD metrics.
//!
//! The OOD hit rate counts test samples that are correctly predicted as the
//! unknown bucket and divides by the size of the whole test set. It is not
//! recall over the true unknown samples; that quantity is reported separately
//! as `ood_recall`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};
use crate::labels::LabelMode;

/// Metrics for one (predictions, ground truth) pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub accuracy: f64,
    /// `None` in closed-set mode.
    pub ood_hit_rate: Option<f64>,
    /// `None` in closed-set mode or when the test set holds no unknown sample.
    pub ood_recall: Option<f64>,
}

/// Scores predictions against ground truth under a fixed [`LabelMode`].
#[derive(Debug, Clone, Copy)]
pub struct ScoringPolicy {
    mode: LabelMode,
}

impl ScoringPolicy {
    pub fn new(mode: LabelMode) -> Self {
        ScoringPolicy { mode }
    }

    pub fn closed_set() -> Self {
        ScoringPolicy::new(LabelMode::Closed)
    }

    pub fn open_set(unknown_label: usize) -> Self {
        ScoringPolicy::new(LabelMode::OpenSet { unknown_label })
    }

    /// Open-set policy whose unknown label is the largest ground-truth label.
    pub fn from_max_label(ground_truth: &[usize]) -> Self {
        ScoringPolicy::new(LabelMode::from_max_label(ground_truth))
    }

    pub fn mode(&self) -> LabelMode {
        self.mode
    }

    /// All metrics for one prediction vector. A closed-set hit rate is
    /// `None` without a warning; callers scoring a roster warn once per run.
    pub fn score(&self, predictions: &[usize], ground_truth: &[usize]) -> Result<Score> {
        Ok(Score {
            accuracy: accuracy(predictions, ground_truth)?,
            ood_hit_rate: self.hit_rate(predictions, ground_truth)?,
            ood_recall: self.ood_recall(predictions, ground_truth)?,
        })
    }

    /// Fraction of the whole test set correctly predicted as unknown.
    /// Warns when called in closed-set mode.
    pub fn ood_hit_rate(&self, predictions: &[usize], ground_truth: &[usize]) -> Result<Option<f64>> {
        if self.mode.unknown_label().is_none() {
            warn_closed_set_hit_rate();
        }
        self.hit_rate(predictions, ground_truth)
    }

    fn hit_rate(&self, predictions: &[usize], ground_truth: &[usize]) -> Result<Option<f64>> {
        check_pair(predictions, ground_truth)?;
        let Some(unknown) = self.mode.unknown_label() else {
            return Ok(None);
        };
        let hits = ood_hits(predictions, ground_truth, unknown);
        Ok(Some(hits as f64 / ground_truth.len() as f64))
    }

    /// Fraction of true unknown samples predicted as unknown.
    pub fn ood_recall(&self, predictions: &[usize], ground_truth: &[usize]) -> Result<Option<f64>> {
        check_pair(predictions, ground_truth)?;
        let Some(unknown) = self.mode.unknown_label() else {
            return Ok(None);
        };
        let support = ground_truth.iter().filter(|&&t| t == unknown).count();
        if support == 0 {
            return Ok(None);
        }
        let hits = ood_hits(predictions, ground_truth, unknown);
        Ok(Some(hits as f64 / support as f64))
    }
}

pub(crate) fn warn_closed_set_hit_rate() {
    log::warn!("OOD hit rate requested in closed-set mode; no unknown label is reserved, reporting it as undefined");
}

/// Fraction of positions where the prediction equals the ground truth.
pub fn accuracy(predictions: &[usize], ground_truth: &[usize]) -> Result<f64> {
    check_pair(predictions, ground_truth)?;
    let correct = predictions
        .iter()
        .zip(ground_truth.iter())
        .filter(|(p, t)| p == t)
        .count();
    Ok(correct as f64 / ground_truth.len() as f64)
}

fn ood_hits(predictions: &[usize], ground_truth: &[usize], unknown: usize) -> usize {
    predictions
        .iter()
        .zip(ground_truth.iter())
        .filter(|&(&p, &t)| p == t && t == unknown)
        .count()
}

fn check_pair(predictions: &[usize], ground_truth: &[usize]) -> Result<()> {
    if ground_truth.is_empty() {
        return Err(EvalError::EmptyInput("ground truth"));
    }
    if predictions.len() != ground_truth.len() {
        return Err(EvalError::shape(
            "predictions vs ground truth",
            ground_truth.len(),
            predictions.len(),
        ));
    }
    Ok(())
}

/// Confusion matrix, `matrix[true][predicted]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    n_classes: usize,
    matrix: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    /// Build from predictions and ground truth. The class count covers the
    /// largest label seen on either side.
    pub fn from_predictions(predictions: &[usize], ground_truth: &[usize]) -> Result<Self> {
        check_pair(predictions, ground_truth)?;
        let n_classes = predictions
            .iter()
            .chain(ground_truth.iter())
            .max()
            .map_or(0, |&m| m + 1);

        let mut matrix = vec![vec![0usize; n_classes]; n_classes];
        for (&p, &t) in predictions.iter().zip(ground_truth.iter()) {
            matrix[t][p] += 1;
        }
        Ok(ConfusionMatrix { n_classes, matrix })
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn get(&self, truth: usize, predicted: usize) -> usize {
        self.matrix[truth][predicted]
    }

    pub fn total(&self) -> usize {
        self.matrix.iter().map(|row| row.iter().sum::<usize>()).sum()
    }

    /// Samples of class `truth`.
    pub fn support(&self, truth: usize) -> usize {
        self.matrix[truth].iter().sum()
    }

    /// Recall of one class, `None` when it has no support.
    pub fn class_recall(&self, class: usize) -> Option<f64> {
        let support = self.support(class);
        (support > 0).then(|| self.get(class, class) as f64 / support as f64)
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.matrix {
            let cells: Vec<String> = row.iter().map(|c| format!("{:>5}", c)).collect();
            writeln!(f, "{}", cells.join(" "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_b() {
        let predictions = vec![0, 0, 1, 2];
        let truth = vec![0, 1, 1, 2];
        let policy = ScoringPolicy::from_max_label(&truth);
        let score = policy.score(&predictions, &truth).unwrap();
        assert!((score.accuracy - 0.75).abs() < 1e-12);
        assert!((score.ood_hit_rate.unwrap() - 0.25).abs() < 1e-12);
        assert!((score.ood_recall.unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_closed_set_hit_rate_is_undefined() {
        let policy = ScoringPolicy::closed_set();
        let score = policy.score(&[1, 2, 3], &[1, 2, 0]).unwrap();
        assert_eq!(score.ood_hit_rate, None);
        assert_eq!(score.ood_recall, None);
        assert!((score.accuracy - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_recall_without_unknown_support() {
        let policy = ScoringPolicy::open_set(9);
        let score = policy.score(&[9, 1], &[0, 1]).unwrap();
        assert_eq!(score.ood_hit_rate, Some(0.0));
        assert_eq!(score.ood_recall, None);
    }

    #[test]
    fn test_length_mismatch_and_empty() {
        assert!(matches!(
            accuracy(&[1, 2], &[1]),
            Err(EvalError::ShapeMismatch { .. })
        ));
        assert!(matches!(accuracy(&[], &[]), Err(EvalError::EmptyInput(_))));
    }

    #[test]
    fn test_confusion_matrix_counts() {
        let cm = ConfusionMatrix::from_predictions(&[0, 0, 1, 2], &[0, 1, 1, 2]).unwrap();
        assert_eq!(cm.n_classes(), 3);
        assert_eq!(cm.get(1, 0), 1);
        assert_eq!(cm.get(1, 1), 1);
        assert_eq!(cm.total(), 4);
        assert_eq!(cm.class_recall(1), Some(0.5));
    }
}
