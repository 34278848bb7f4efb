use anyhow::Result;
use linfa::traits::{Fit, Predict};
use linfa::Dataset;
use linfa_trees::DecisionTree;
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::config::{ModelConfig, ModelType};
use crate::models::classifier_trait::{argmax, check_fit_input, distinct_classes, not_fitted, ClassifierAdapter};

/// One bagged tree and the feature columns it was trained on.
struct ForestMember {
    features: Vec<usize>,
    tree: DecisionTree<f64, usize>,
}

/// Random forest: bootstrap-bagged decision trees, each trained on a random
/// feature subspace, combined by majority vote.
///
/// Trees are grown in parallel; tree `t` draws from a generator seeded with
/// `seed + t`, so the result does not depend on scheduling.
pub struct RandomForestClassifier {
    n_trees: usize,
    max_depth: Option<usize>,
    max_features: Option<usize>,
    seed: u64,
    classes: Vec<usize>,
    members: Vec<ForestMember>,
}

impl RandomForestClassifier {
    pub fn new(params: ModelConfig) -> Self {
        let (n_trees, max_depth, max_features) = match params.model_type {
            ModelType::RandomForest {
                n_trees,
                max_depth,
                max_features,
            } => (n_trees, max_depth, max_features),
            other => panic!(
                "Error: Expected ModelType::RandomForest params, got {:?}",
                other
            ),
        };
        RandomForestClassifier {
            n_trees,
            max_depth,
            max_features,
            seed: params.seed,
            classes: Vec::new(),
            members: Vec::new(),
        }
    }

    fn subspace_size(&self, n_features: usize) -> usize {
        self.max_features
            .unwrap_or_else(|| (n_features as f64).sqrt().round() as usize)
            .clamp(1, n_features)
    }
}

impl ClassifierAdapter for RandomForestClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<()> {
        check_fit_input(x, y)?;
        if x.ncols() == 0 {
            anyhow::bail!("random forest needs at least one feature column");
        }
        if self.n_trees == 0 {
            anyhow::bail!("random forest needs at least one tree");
        }

        let n_samples = x.nrows();
        let n_features = x.ncols();
        let subspace = self.subspace_size(n_features);
        let seed = self.seed;
        let max_depth = self.max_depth;

        log::debug!(
            "growing {} trees on {} samples, {} of {} features per tree",
            self.n_trees,
            n_samples,
            subspace,
            n_features
        );

        let members = (0..self.n_trees)
            .into_par_iter()
            .map(|t| -> Result<ForestMember> {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(t as u64));
                let rows: Vec<usize> = (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();
                let mut features = sample(&mut rng, n_features, subspace).into_vec();
                features.sort_unstable();

                let records = x.select(Axis(0), &rows).select(Axis(1), &features);
                let targets: Array1<usize> = rows.iter().map(|&r| y[r]).collect();
                let dataset = Dataset::new(records, targets);

                let tree = DecisionTree::<f64, usize>::params()
                    .max_depth(max_depth)
                    .fit(&dataset)?;
                Ok(ForestMember { features, tree })
            })
            .collect::<Result<Vec<_>>>()?;

        self.classes = distinct_classes(y);
        self.members = members;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        if self.members.is_empty() {
            return Err(not_fitted(self.name()));
        }

        let ballots: Vec<Array1<usize>> = self
            .members
            .par_iter()
            .map(|m| {
                let view = x.select(Axis(1), &m.features);
                let ballot: Array1<usize> = m.tree.predict(&view);
                ballot
            })
            .collect();

        let mut votes = vec![vec![0f64; self.classes.len()]; x.nrows()];
        for ballot in &ballots {
            for (row, label) in ballot.iter().enumerate() {
                if let Ok(idx) = self.classes.binary_search(label) {
                    votes[row][idx] += 1.0;
                }
            }
        }

        Ok(votes.iter().map(|v| self.classes[argmax(v)]).collect())
    }

    fn name(&self) -> &str {
        "random_forest"
    }
}
