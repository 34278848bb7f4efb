//! End-to-end experiment: label space, features, roster, harness.
use std::collections::BTreeSet;

use anyhow::{Context, Result};
use ndarray::Array2;

use crate::config::ExperimentConfig;
use crate::dataset::{shuffle_split, Dataset, ImageBatch};
use crate::features::extractor_for;
use crate::harness::EvaluationHarness;
use crate::labels::{LabelMode, LabelSpace};
use crate::report::EvaluationReport;

/// Labels of both splits after the optional open-set remap.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedLabels {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
    pub mode: LabelMode,
}

pub struct Experiment {
    config: ExperimentConfig,
}

impl Experiment {
    pub fn new(config: ExperimentConfig) -> Self {
        Experiment { config }
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Remap both splits with one label space built over `0..n_classes`.
    /// Closed-set experiments keep the labels unchanged.
    pub fn prepare_labels(&self, train_labels: &[usize], test_labels: &[usize]) -> Result<PreparedLabels> {
        if !self.config.open_set {
            return Ok(PreparedLabels {
                train: train_labels.to_vec(),
                test: test_labels.to_vec(),
                mode: LabelMode::Closed,
            });
        }

        let space = LabelSpace::with_class_count(self.config.n_classes, &self.config.unknown_classes)?;
        let train = space.apply(train_labels).context("Failed to remap training labels")?;
        let test = space.apply(test_labels).context("Failed to remap test labels")?;
        log::info!(
            "open-set label space: {} known classes, {} folded into unknown label {}",
            space.known_classes(),
            space.unknown_classes().len(),
            space.known_classes()
        );
        Ok(PreparedLabels {
            train,
            test,
            mode: space.label_mode(),
        })
    }

    fn features(&self, images: &ImageBatch) -> Result<Array2<f64>> {
        let extractor = extractor_for(self.config.extractor);
        extractor
            .extract(images)
            .with_context(|| format!("{} feature extraction failed", extractor.name()))
    }

    /// Run the configured roster on precomputed features.
    pub fn run_features(
        &self,
        train_x: &Array2<f64>,
        train_y: &[usize],
        test_x: &Array2<f64>,
        test_y: &[usize],
    ) -> Result<EvaluationReport> {
        let labels = self.prepare_labels(train_y, test_y)?;

        let (train_x, train_y, test_x, test_y) = if self.config.shuffle {
            let (tx, ty) = shuffle_split(train_x, &labels.train, self.config.seed)?;
            let (vx, vy) = shuffle_split(test_x, &labels.test, self.config.seed)?;
            (tx, ty, vx, vy)
        } else {
            (train_x.to_owned(), labels.train, test_x.to_owned(), labels.test)
        };

        let n_test_classes = test_y.iter().collect::<BTreeSet<_>>().len();
        let mut harness = EvaluationHarness::from_configs(&self.config.models, n_test_classes)
            .with_failure_policy(self.config.failure_policy);

        let report = harness.run(&train_x, &train_y, &test_x, &test_y, labels.mode)?;
        Ok(report)
    }

    /// Extract features from both splits and run the roster.
    pub fn run(&self, dataset: &Dataset) -> Result<EvaluationReport> {
        log::info!("extracting {:?} features", self.config.extractor);
        let train_x = self.features(&dataset.train.images)?;
        let test_x = self.features(&dataset.test.images)?;
        self.run_features(&train_x, &dataset.train.labels, &test_x, &dataset.test.labels)
    }
}

/// Convenience wrapper around [`Experiment::run`].
pub fn run_experiment(config: ExperimentConfig, dataset: &Dataset) -> Result<EvaluationReport> {
    Experiment::new(config).run(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModelConfig, ModelType};
    use crate::labels::UnknownClassSet;

    fn config(open_set: bool) -> ExperimentConfig {
        ExperimentConfig {
            n_classes: 4,
            open_set,
            unknown_classes: UnknownClassSet::new([0]),
            models: vec![ModelConfig::new(
                7,
                ModelType::RandomForest {
                    n_trees: 5,
                    max_depth: Some(3),
                    max_features: None,
                },
            )],
            ..ExperimentConfig::default()
        }
    }

    #[test]
    fn test_prepare_labels_shares_one_space() {
        let exp = Experiment::new(config(true));
        let labels = exp.prepare_labels(&[1, 2, 3], &[0, 3]).unwrap();
        assert_eq!(labels.train, vec![0, 1, 2]);
        assert_eq!(labels.test, vec![3, 2]);
        assert_eq!(labels.mode, LabelMode::OpenSet { unknown_label: 3 });
    }

    #[test]
    fn test_closed_set_keeps_labels() {
        let exp = Experiment::new(config(false));
        let labels = exp.prepare_labels(&[1, 2], &[0]).unwrap();
        assert_eq!(labels.train, vec![1, 2]);
        assert_eq!(labels.mode, LabelMode::Closed);
    }

    #[test]
    fn test_run_features_reports_every_model() {
        let train_x = Array2::from_shape_fn((8, 2), |(i, j)| (i % 4) as f64 + j as f64 * 0.1);
        let train_y: Vec<usize> = (0..8).map(|i| i % 4).collect();
        let mut cfg = config(false);
        cfg.shuffle = true;
        let report = Experiment::new(cfg)
            .run_features(&train_x, &train_y, &train_x, &train_y)
            .unwrap();
        assert_eq!(report.entries.len(), 1);
        assert_eq!(report.entries[0].name, "random_forest");
        assert!(!report.entries[0].is_failed());
    }
}
