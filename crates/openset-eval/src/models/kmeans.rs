use anyhow::Result;
use linfa::traits::{Fit, Predict};
use linfa::DatasetBase;
use linfa_clustering::KMeans;
use linfa_nn::distance::L2Dist;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::{ModelConfig, ModelType};
use crate::models::classifier_trait::{argmax, check_fit_input, not_fitted, ClassifierAdapter};

/// K-means used as a classifier: every test row is assigned to its nearest
/// centroid.
///
/// Clustering ignores the training labels, so by default the cluster index
/// itself is the predicted label. With `majority_vote_labels` each cluster is
/// instead mapped to the most frequent training label among its members.
pub struct KMeansClassifier {
    n_clusters: Option<usize>,
    max_n_iterations: u64,
    tolerance: f64,
    n_runs: usize,
    majority_vote_labels: bool,
    seed: u64,
    model: Option<KMeans<f64, L2Dist>>,
    cluster_labels: Vec<usize>,
}

impl KMeansClassifier {
    pub fn new(params: ModelConfig) -> Self {
        match params.model_type {
            ModelType::KMeans {
                n_clusters,
                max_n_iterations,
                tolerance,
                n_runs,
                majority_vote_labels,
            } => KMeansClassifier {
                n_clusters,
                max_n_iterations,
                tolerance,
                n_runs,
                majority_vote_labels,
                seed: params.seed,
                model: None,
                cluster_labels: Vec::new(),
            },
            other => panic!("Error: Expected ModelType::KMeans params, got {:?}", other),
        }
    }

    pub fn n_clusters(&self) -> Option<usize> {
        self.n_clusters
    }

    fn assign(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        let model = self.model.as_ref().ok_or_else(|| not_fitted(self.name()))?;
        let clusters: Array1<usize> = model.predict(x);
        Ok(clusters)
    }
}

impl ClassifierAdapter for KMeansClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<()> {
        check_fit_input(x, y)?;
        let n_clusters = self
            .n_clusters
            .ok_or_else(|| anyhow::anyhow!("kmeans cluster count was never configured"))?;
        if n_clusters == 0 || n_clusters > x.nrows() {
            anyhow::bail!(
                "kmeans needs between 1 and {} clusters, got {}",
                x.nrows(),
                n_clusters
            );
        }

        let rng = StdRng::seed_from_u64(self.seed);
        let dataset = DatasetBase::from(x.clone());
        let model = KMeans::params_with_rng(n_clusters, rng)
            .max_n_iterations(self.max_n_iterations)
            .tolerance(self.tolerance)
            .n_runs(self.n_runs)
            .fit(&dataset)?;
        self.model = Some(model);

        self.cluster_labels = if self.majority_vote_labels {
            let clusters = self.assign(x)?;
            let n_labels = y.iter().copied().max().map_or(0, |m| m + 1);
            let mut counts = vec![vec![0f64; n_labels]; n_clusters];
            for (&cluster, &label) in clusters.iter().zip(y) {
                counts[cluster][label] += 1.0;
            }
            counts.iter().map(|c| argmax(c)).collect()
        } else {
            (0..n_clusters).collect()
        };
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let clusters = self.assign(x)?;
        Ok(clusters.iter().map(|&c| self.cluster_labels[c]).collect())
    }

    fn name(&self) -> &str {
        "kmeans"
    }
}
