use crate::config::{ModelConfig, ModelType};
use crate::models::classifier_trait::ClassifierAdapter;

/// Build a boxed classifier adapter from a `ModelConfig`.
pub fn build_model(params: ModelConfig) -> Box<dyn ClassifierAdapter> {
    match params.model_type {
        ModelType::RandomForest { .. } => {
            Box::new(crate::models::forest::RandomForestClassifier::new(params))
        }
        ModelType::GradientBoosting { .. } => {
            Box::new(crate::models::gbdt::GBDTClassifier::new(params))
        }
        ModelType::LinearSvm { .. } => Box::new(crate::models::svm::SVMClassifier::new(params)),
        ModelType::Mlp { .. } => Box::new(crate::models::mlp::MLPClassifier::new(params)),
        ModelType::KMeans { .. } => {
            Box::new(crate::models::kmeans::KMeansClassifier::new(params))
        }
    }
}

/// Build the ordered roster for one harness run.
///
/// K-means entries without an explicit cluster count get `n_test_classes`,
/// the number of distinct labels in the test split. That leaks test-set
/// information into the clustering model, which is logged as a warning.
pub fn build_roster(models: &[ModelConfig], n_test_classes: usize) -> Vec<Box<dyn ClassifierAdapter>> {
    models
        .iter()
        .cloned()
        .map(|mut params| {
            if let ModelType::KMeans { n_clusters, .. } = &mut params.model_type {
                if n_clusters.is_none() {
                    log::warn!(
                        "kmeans cluster count set to {} from the distinct test labels; the model sees how many classes the test split holds",
                        n_test_classes
                    );
                    *n_clusters = Some(n_test_classes);
                }
            }
            build_model(params)
        })
        .collect()
}
