//! Sequential evaluation of a classifier roster over one train/test split.

use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use ndarray::Array2;

use crate::config::{FailurePolicy, ModelConfig};
use crate::error::{EvalError, Result, Stage};
use crate::labels::LabelMode;
use crate::models::classifier_trait::ClassifierAdapter;
use crate::models::factory::build_roster;
use crate::report::{EvaluationReport, Outcome, ReportEntry};
use crate::scoring::{warn_closed_set_hit_rate, Score, ScoringPolicy};

/// Check that a train/test split is internally consistent.
///
/// Called before any adapter is fitted so that malformed input never
/// produces a partial report.
pub fn validate_split(
    train_x: &Array2<f64>,
    train_y: &[usize],
    test_x: &Array2<f64>,
    test_y: &[usize],
) -> Result<()> {
    if train_y.is_empty() {
        return Err(EvalError::EmptyInput("training split"));
    }
    if test_y.is_empty() {
        return Err(EvalError::EmptyInput("test split"));
    }
    if train_x.nrows() != train_y.len() {
        return Err(EvalError::shape(
            "train feature rows vs train labels",
            train_y.len(),
            train_x.nrows(),
        ));
    }
    if test_x.nrows() != test_y.len() {
        return Err(EvalError::shape(
            "test feature rows vs test labels",
            test_y.len(),
            test_x.nrows(),
        ));
    }
    if train_x.ncols() != test_x.ncols() {
        return Err(EvalError::shape(
            "train vs test feature columns",
            train_x.ncols(),
            test_x.ncols(),
        ));
    }
    Ok(())
}

/// Runs every adapter of a fixed roster, one after another, and scores each
/// one with the same [`ScoringPolicy`].
pub struct EvaluationHarness {
    roster: Vec<Box<dyn ClassifierAdapter>>,
    failure_policy: FailurePolicy,
}

impl EvaluationHarness {
    pub fn new(roster: Vec<Box<dyn ClassifierAdapter>>) -> Self {
        EvaluationHarness {
            roster,
            failure_policy: FailurePolicy::default(),
        }
    }

    /// Build the roster from model configs. `n_test_classes` configures
    /// clustering adapters that have no explicit cluster count.
    pub fn from_configs(models: &[ModelConfig], n_test_classes: usize) -> Self {
        EvaluationHarness::new(build_roster(models, n_test_classes))
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    pub fn adapter_names(&self) -> Vec<&str> {
        self.roster.iter().map(|a| a.name()).collect()
    }

    /// Fit, predict and score every adapter on the split.
    ///
    /// Shape problems fail before any adapter runs. An adapter failure,
    /// returned error or panic, is recorded in the report under
    /// [`FailurePolicy::Isolate`] and returned as [`EvalError::AdapterFailure`]
    /// under [`FailurePolicy::Abort`].
    pub fn run(
        &mut self,
        train_x: &Array2<f64>,
        train_y: &[usize],
        test_x: &Array2<f64>,
        test_y: &[usize],
        mode: LabelMode,
    ) -> Result<EvaluationReport> {
        validate_split(train_x, train_y, test_x, test_y)?;

        let scorer = ScoringPolicy::new(mode);
        let mut report = EvaluationReport::new(mode, train_y.len(), test_y.len());

        log::info!(
            "evaluating {} classifiers on {} train / {} test samples with {} features",
            self.roster.len(),
            train_y.len(),
            test_y.len(),
            train_x.ncols()
        );
        if !mode.is_open_set() {
            warn_closed_set_hit_rate();
        }

        for adapter in self.roster.iter_mut() {
            let name = adapter.name().to_string();
            let start = Instant::now();
            let stage = Cell::new(Stage::Fit);
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                run_adapter(adapter.as_mut(), &scorer, &stage, train_x, train_y, test_x, test_y)
            }))
            .unwrap_or_else(|payload| {
                Err((
                    stage.get(),
                    anyhow::anyhow!("panicked: {}", panic_message(payload.as_ref())),
                ))
            });
            let elapsed_secs = start.elapsed().as_secs_f64();

            let outcome = match result {
                Ok(score) => {
                    log::info!(
                        "{}: accuracy {:.4}, ood hit rate {} ({:.1}s)",
                        name,
                        score.accuracy,
                        score
                            .ood_hit_rate
                            .map_or_else(|| "n/a".to_string(), |v| format!("{:.4}", v)),
                        elapsed_secs
                    );
                    Outcome::Scored(score)
                }
                Err((stage, err)) => {
                    let message = format!("{:#}", err);
                    log::error!("{} failed during {}: {}", name, stage, message);
                    if self.failure_policy == FailurePolicy::Abort {
                        return Err(EvalError::AdapterFailure {
                            adapter: name,
                            stage,
                            message,
                        });
                    }
                    Outcome::Failed { stage, message }
                }
            };

            report.push(ReportEntry {
                name,
                outcome,
                elapsed_secs,
            });
        }

        Ok(report)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// `stage` tracks progress so a panic can be attributed to the step that raised it.
fn run_adapter(
    adapter: &mut dyn ClassifierAdapter,
    scorer: &ScoringPolicy,
    stage: &Cell<Stage>,
    train_x: &Array2<f64>,
    train_y: &[usize],
    test_x: &Array2<f64>,
    test_y: &[usize],
) -> std::result::Result<Score, (Stage, anyhow::Error)> {
    adapter
        .fit(train_x, train_y)
        .map_err(|e| (Stage::Fit, e))?;

    stage.set(Stage::Predict);
    let predictions = adapter.predict(test_x).map_err(|e| (Stage::Predict, e))?;
    if predictions.len() != test_y.len() {
        return Err((
            Stage::Predict,
            anyhow::anyhow!(
                "returned {} predictions for {} test rows",
                predictions.len(),
                test_y.len()
            ),
        ));
    }

    stage.set(Stage::Score);
    scorer
        .score(&predictions, test_y)
        .map_err(|e| (Stage::Score, e.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    /// Predicts the label it was constructed with.
    struct Constant(usize);

    impl ClassifierAdapter for Constant {
        fn fit(&mut self, _x: &Array2<f64>, _y: &[usize]) -> anyhow::Result<()> {
            Ok(())
        }

        fn predict(&self, x: &Array2<f64>) -> anyhow::Result<Vec<usize>> {
            Ok(vec![self.0; x.nrows()])
        }

        fn name(&self) -> &str {
            "constant"
        }
    }

    struct Short;

    impl ClassifierAdapter for Short {
        fn fit(&mut self, _x: &Array2<f64>, _y: &[usize]) -> anyhow::Result<()> {
            Ok(())
        }

        fn predict(&self, _x: &Array2<f64>) -> anyhow::Result<Vec<usize>> {
            Ok(vec![0])
        }

        fn name(&self) -> &str {
            "short"
        }
    }

    #[test]
    fn test_wrong_prediction_count_is_a_predict_failure() {
        let x = array![[0.0], [1.0], [2.0]];
        let y = vec![0, 1, 1];
        let mut harness = EvaluationHarness::new(vec![Box::new(Short), Box::new(Constant(1))]);
        let report = harness.run(&x, &y, &x, &y, LabelMode::Closed).unwrap();

        assert!(matches!(
            report.entries[0].outcome,
            Outcome::Failed {
                stage: Stage::Predict,
                ..
            }
        ));
        let score = report.entries[1].score().unwrap();
        assert!((score.accuracy - 2.0 / 3.0).abs() < 1e-12);
    }

    struct PanicsInPredict;

    impl ClassifierAdapter for PanicsInPredict {
        fn fit(&mut self, _x: &Array2<f64>, _y: &[usize]) -> anyhow::Result<()> {
            Ok(())
        }

        fn predict(&self, _x: &Array2<f64>) -> anyhow::Result<Vec<usize>> {
            panic!("index out of bounds in {}", "predict")
        }

        fn name(&self) -> &str {
            "panics_in_predict"
        }
    }

    #[test]
    fn test_panic_is_recorded_at_its_stage() {
        let x = array![[0.0], [1.0]];
        let y = vec![0, 1];
        let mut harness =
            EvaluationHarness::new(vec![Box::new(PanicsInPredict), Box::new(Constant(0))]);
        let report = harness.run(&x, &y, &x, &y, LabelMode::Closed).unwrap();

        match &report.entries[0].outcome {
            Outcome::Failed { stage, message } => {
                assert_eq!(*stage, Stage::Predict);
                assert!(message.contains("index out of bounds in predict"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(report.entries[1].score().unwrap().accuracy, 0.5);
    }

    #[test]
    fn test_column_mismatch_is_rejected() {
        let train = array![[0.0, 1.0], [1.0, 0.0]];
        let test = array![[0.0], [1.0]];
        let err = validate_split(&train, &[0, 1], &test, &[0, 1]).unwrap_err();
        assert!(matches!(err, EvalError::ShapeMismatch { .. }));
    }
}
