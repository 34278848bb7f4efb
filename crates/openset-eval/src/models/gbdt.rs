use anyhow::Result;
use gbdt::config::Config;
use gbdt::decision_tree::{Data, DataVec};
use gbdt::gradient_boost::GBDT;
use ndarray::Array2;

use crate::config::{ModelConfig, ModelType};
use crate::models::classifier_trait::{argmax, check_fit_input, distinct_classes, not_fitted, ClassifierAdapter};

/// Gradient Boosting Decision Tree (GBDT) classifier.
///
/// `gbdt` trains binary models, so the multi-class problem is split one-vs-rest:
/// one booster per training class, each learning `+1` for its class and `-1`
/// for the rest. Prediction picks the class whose booster scores highest.
pub struct GBDTClassifier {
    learning_rate: f32,
    max_depth: u32,
    num_boost_round: u32,
    training_optimization_level: u8,
    loss_type: String,
    classes: Vec<usize>,
    models: Vec<GBDT>,
}

impl GBDTClassifier {
    pub fn new(params: ModelConfig) -> Self {
        match params.model_type {
            ModelType::GradientBoosting {
                learning_rate,
                max_depth,
                num_boost_round,
                training_optimization_level,
                loss_type,
            } => GBDTClassifier {
                learning_rate,
                max_depth,
                num_boost_round,
                training_optimization_level,
                loss_type,
                classes: Vec::new(),
                models: Vec::new(),
            },
            other => panic!(
                "Error: Expected ModelType::GradientBoosting params, got {:?}",
                other
            ),
        }
    }

    fn config(&self, feature_size: usize) -> Config {
        let mut config = Config::new();

        config.set_feature_size(feature_size);
        config.set_shrinkage(self.learning_rate);
        config.set_max_depth(self.max_depth);
        config.set_iterations(self.num_boost_round as usize);
        config.set_debug(false);
        config.set_training_optimization_level(self.training_optimization_level);
        config.set_loss(&self.loss_type);
        config
    }
}

fn to_data_vec(x: &Array2<f64>, labels: impl Iterator<Item = f32>) -> DataVec {
    let mut data = DataVec::new();
    for (row, label) in x.rows().into_iter().zip(labels) {
        let features: Vec<f32> = row.iter().map(|&v| v as f32).collect();
        data.push(Data::new_training_data(features, 1.0, label, None));
    }
    data
}

impl ClassifierAdapter for GBDTClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<()> {
        check_fit_input(x, y)?;
        let classes = distinct_classes(y);
        let mut models = Vec::with_capacity(classes.len());

        if classes.len() > 1 {
            for &class in &classes {
                let mut train_x = to_data_vec(
                    x,
                    y.iter().map(|&label| if label == class { 1.0 } else { -1.0 }),
                );
                let mut gbdt = GBDT::new(&self.config(x.ncols()));
                gbdt.fit(&mut train_x);
                models.push(gbdt);
            }
            log::debug!("trained {} one-vs-rest boosters", models.len());
        }

        self.classes = classes;
        self.models = models;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        match self.classes.len() {
            0 => return Err(not_fitted(self.name())),
            1 => return Ok(vec![self.classes[0]; x.nrows()]),
            _ => {}
        }

        let test_x = to_data_vec(x, std::iter::repeat(0.0));
        let mut scores = vec![vec![0f64; self.classes.len()]; x.nrows()];
        for (class_idx, model) in self.models.iter().enumerate() {
            let predictions = model.predict(&test_x);
            for (row, p) in predictions.iter().enumerate() {
                scores[row][class_idx] = *p as f64;
            }
        }

        Ok(scores.iter().map(|s| self.classes[argmax(s)]).collect())
    }

    fn name(&self) -> &str {
        "gradient_boosting"
    }
}
