use anyhow::Result;
use ndarray::Array2;

use crate::scoring::accuracy;

/// Uniform fit/predict surface over every model family in the roster.
///
/// Labels are compact class indices (`0..n_labels`). Adapters own their
/// hyper-parameters and seed; the harness only ever calls these methods.
pub trait ClassifierAdapter {
    /// Fit the model on one training split.
    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<()>;

    /// Predict one label per row of `x`.
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>>;

    /// The model's own accuracy on `(x, y)`. Only used for secondary
    /// reporting; the harness scores through `ScoringPolicy`.
    fn score(&self, x: &Array2<f64>, y: &[usize]) -> Result<f64> {
        let predictions = self.predict(x)?;
        Ok(accuracy(&predictions, y)?)
    }

    /// Human readable name, used as the report key.
    fn name(&self) -> &str {
        "classifier"
    }
}

/// Sorted distinct labels of a training split.
pub(crate) fn distinct_classes(y: &[usize]) -> Vec<usize> {
    let mut classes = y.to_vec();
    classes.sort_unstable();
    classes.dedup();
    classes
}

/// Index of the largest score; ties resolve to the first one.
pub(crate) fn argmax(scores: &[f64]) -> usize {
    let mut best = 0;
    for (i, &s) in scores.iter().enumerate() {
        if s > scores[best] {
            best = i;
        }
    }
    best
}

pub(crate) fn check_fit_input(x: &Array2<f64>, y: &[usize]) -> Result<()> {
    if x.nrows() == 0 {
        anyhow::bail!("cannot fit on an empty training split");
    }
    if x.nrows() != y.len() {
        anyhow::bail!(
            "feature rows ({}) and labels ({}) differ in length",
            x.nrows(),
            y.len()
        );
    }
    Ok(())
}

pub(crate) fn not_fitted(name: &str) -> anyhow::Error {
    anyhow::anyhow!("{} must be fitted before predict", name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argmax_prefers_first_tie() {
        assert_eq!(argmax(&[0.1, 0.7, 0.7, 0.2]), 1);
        assert_eq!(argmax(&[3.0]), 0);
    }

    #[test]
    fn test_distinct_classes_sorted() {
        assert_eq!(distinct_classes(&[4, 1, 4, 0]), vec![0, 1, 4]);
    }
}
