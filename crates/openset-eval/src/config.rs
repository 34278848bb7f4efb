use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::labels::UnknownClassSet;

/// Seed shared by every randomized adapter unless overridden.
pub const DEFAULT_SEED: u64 = 42;

/// Configuration of one classifier in the roster.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub seed: u64,

    #[serde(flatten)]
    pub model_type: ModelType,
}

/// Supported model families and their hyper-parameters.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub enum ModelType {
    RandomForest {
        n_trees: usize,
        max_depth: Option<usize>,
        /// Features drawn per tree; `None` uses the square root of the width.
        max_features: Option<usize>,
    },
    GradientBoosting {
        learning_rate: f32,
        max_depth: u32,
        num_boost_round: u32,
        training_optimization_level: u8,
        loss_type: String,
    },
    LinearSvm {
        eps: f64,
        c: f64,
    },
    Mlp {
        hidden_units: usize,
        max_iter: usize,
        learning_rate: f64,
        batch_size: usize,
        alpha: f64,
    },
    KMeans {
        /// Number of clusters; `None` means "set by the harness from the test labels".
        n_clusters: Option<usize>,
        max_n_iterations: u64,
        tolerance: f64,
        n_runs: usize,
        majority_vote_labels: bool,
    },
}

impl ModelType {
    /// Short name used as the report key.
    pub fn name(&self) -> &'static str {
        match self {
            ModelType::RandomForest { .. } => "random_forest",
            ModelType::GradientBoosting { .. } => "gradient_boosting",
            ModelType::LinearSvm { .. } => "linear_svm",
            ModelType::Mlp { .. } => "mlp",
            ModelType::KMeans { .. } => "kmeans",
        }
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "random_forest" | "rf" => Ok(ModelType::RandomForest {
                n_trees: 100,
                max_depth: None,
                max_features: None,
            }),
            "gradient_boosting" | "gbdt" => Ok(ModelType::GradientBoosting {
                learning_rate: 0.1,
                max_depth: 3,
                num_boost_round: 100,
                training_optimization_level: 2,
                loss_type: "LogLikelyhood".to_string(),
            }),
            "linear_svm" | "svm" => Ok(ModelType::LinearSvm { eps: 1e-3, c: 1.0 }),
            "mlp" => Ok(ModelType::Mlp {
                hidden_units: 100,
                max_iter: 150,
                learning_rate: 1e-3,
                batch_size: 200,
                alpha: 1e-4,
            }),
            "kmeans" => Ok(ModelType::KMeans {
                n_clusters: None,
                max_n_iterations: 300,
                tolerance: 1e-4,
                n_runs: 10,
                majority_vote_labels: false,
            }),
            _ => Err(format!(
                "Unknown model type: {}. Valid options are: random_forest, gradient_boosting, linear_svm, mlp, kmeans",
                s
            )),
        }
    }
}

impl ModelConfig {
    pub fn new(seed: u64, model_type: ModelType) -> Self {
        Self { seed, model_type }
    }

    pub fn name(&self) -> &'static str {
        self.model_type.name()
    }

    /// The full default roster, in report order.
    pub fn default_roster() -> Vec<ModelConfig> {
        ["random_forest", "gradient_boosting", "linear_svm", "mlp", "kmeans"]
            .iter()
            .filter_map(|name| ModelType::from_str(name).ok())
            .map(|model_type| ModelConfig::new(DEFAULT_SEED, model_type))
            .collect()
    }
}

/// What the harness does when one adapter fails.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Record the failure and keep running the remaining adapters.
    #[default]
    Isolate,
    /// Stop at the first failing adapter.
    Abort,
}

/// Feature representation fed to the roster.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExtractorKind {
    #[default]
    Flatten,
    Prewitt,
    Hog,
}

impl FromStr for ExtractorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "flatten" | "pixels" => Ok(ExtractorKind::Flatten),
            "prewitt" | "edges" => Ok(ExtractorKind::Prewitt),
            "hog" => Ok(ExtractorKind::Hog),
            _ => Err(format!(
                "Unknown extractor: {}. Valid options are: flatten, prewitt, hog",
                s
            )),
        }
    }
}

/// Parameters of one end-to-end experiment.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Number of classes in the dataset's label domain.
    pub n_classes: usize,
    /// Collapse `unknown_classes` into one unknown bucket.
    pub open_set: bool,
    pub unknown_classes: UnknownClassSet,
    pub extractor: ExtractorKind,
    /// Shuffle train and test rows (with `seed`) after feature extraction.
    pub shuffle: bool,
    pub seed: u64,
    pub failure_policy: FailurePolicy,
    pub models: Vec<ModelConfig>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            n_classes: 100,
            open_set: false,
            unknown_classes: UnknownClassSet::default(),
            extractor: ExtractorKind::default(),
            shuffle: false,
            seed: DEFAULT_SEED,
            failure_policy: FailurePolicy::default(),
            models: ModelConfig::default_roster(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_roster_order() {
        let names: Vec<&str> = ModelConfig::default_roster().iter().map(|m| m.name()).collect();
        assert_eq!(
            names,
            vec!["random_forest", "gradient_boosting", "linear_svm", "mlp", "kmeans"]
        );
    }

    #[test]
    fn test_model_type_from_str() {
        assert!(matches!(
            ModelType::from_str("GBDT"),
            Ok(ModelType::GradientBoosting { .. })
        ));
        assert!(ModelType::from_str("xgboost").is_err());
    }

    #[test]
    fn test_experiment_config_partial_json_uses_defaults() {
        let cfg: ExperimentConfig =
            serde_json::from_str(r#"{ "open_set": true, "extractor": "hog" }"#).unwrap();
        assert!(cfg.open_set);
        assert_eq!(cfg.extractor, ExtractorKind::Hog);
        assert_eq!(cfg.n_classes, 100);
        assert_eq!(cfg.models.len(), 5);
        assert_eq!(cfg.unknown_classes, UnknownClassSet::default());
    }
}
