use anyhow::Result;
use linfa::dataset::Pr;
use linfa::traits::Predict;
use linfa::Dataset;
use linfa_kernel::{Kernel, KernelMethod, KernelType};
use linfa_svm::{Svm, SvmError, SvmParams};
use ndarray::{Array1, Array2};

use crate::config::{ModelConfig, ModelType};
use crate::models::classifier_trait::{argmax, check_fit_input, distinct_classes, not_fitted, ClassifierAdapter};
use crate::preprocessing::StandardScaler;

/// Neighbours kept per training row in the sparse Gram matrix.
const KERNEL_NEIGHBOURS: usize = 32;

/// Linear support vector classifier behind a standard scaler.
///
/// The scaler is fitted on the training split and reused as-is for
/// prediction. Multi-class problems are split one-vs-rest; each binary SVM
/// outputs a Platt-scaled probability and the most probable class wins.
///
/// The Gram matrix is sparse: each row keeps only its nearest
/// `KERNEL_NEIGHBOURS` entries, so memory grows linearly with the number of
/// training rows.
pub struct SVMClassifier {
    eps: f64,
    c: f64,
    scaler: Option<StandardScaler>,
    classes: Vec<usize>,
    models: Vec<Svm<f64, Pr>>,
}

impl SVMClassifier {
    pub fn new(params: ModelConfig) -> Self {
        match params.model_type {
            ModelType::LinearSvm { eps, c } => SVMClassifier {
                eps,
                c,
                scaler: None,
                classes: Vec::new(),
                models: Vec::new(),
            },
            other => panic!("Error: Expected ModelType::LinearSvm params, got {:?}", other),
        }
    }

    fn fit_binary(&self, x: &Array2<f64>, y: Array1<bool>) -> Result<Svm<f64, Pr>> {
        let neighbours = KERNEL_NEIGHBOURS.min(x.nrows().saturating_sub(1)).max(1);
        let dataset = Dataset::new(x.to_owned(), y);
        let params: SvmParams<f64, Pr> = Svm::<f64, Pr>::params()
            .eps(self.eps)
            .pos_neg_weights(self.c, self.c)
            .with_kernel_params(
                Kernel::params()
                    .kind(KernelType::Sparse(neighbours))
                    .method(KernelMethod::Linear),
            );
        let model = <SvmParams<f64, Pr> as linfa::traits::Fit<_, _, SvmError>>::fit(&params, &dataset)?;
        Ok(model)
    }
}

impl ClassifierAdapter for SVMClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<()> {
        check_fit_input(x, y)?;
        let scaler = StandardScaler::fit(x)?;
        let x_scaled = scaler.transform(x)?;
        let classes = distinct_classes(y);

        let mut models = Vec::new();
        if classes.len() > 1 {
            for &class in &classes {
                let targets: Array1<bool> = y.iter().map(|&label| label == class).collect();
                models.push(self.fit_binary(&x_scaled, targets)?);
            }
        }

        self.scaler = Some(scaler);
        self.classes = classes;
        self.models = models;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let scaler = self.scaler.as_ref().ok_or_else(|| not_fitted(self.name()))?;
        if self.classes.len() == 1 {
            return Ok(vec![self.classes[0]; x.nrows()]);
        }

        let x_scaled = scaler.transform(x)?;
        let mut scores = vec![vec![0f64; self.classes.len()]; x.nrows()];
        for (class_idx, model) in self.models.iter().enumerate() {
            let probabilities: Array1<Pr> = model.predict(&x_scaled);
            for (row, p) in probabilities.iter().enumerate() {
                scores[row][class_idx] = **p as f64;
            }
        }

        Ok(scores.iter().map(|s| self.classes[argmax(s)]).collect())
    }

    fn name(&self) -> &str {
        "linear_svm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_svm_classifier() {
        let x = array![
            [0.0, 0.2],
            [0.2, 0.0],
            [0.1, 0.1],
            [4.0, 4.2],
            [4.2, 4.0],
            [4.1, 4.1],
            [0.0, 8.0],
            [0.2, 8.2],
            [0.1, 7.9],
        ];
        let y = vec![0, 0, 0, 1, 1, 1, 2, 2, 2];

        let params = ModelConfig::new(42, ModelType::LinearSvm { eps: 1e-3, c: 1.0 });
        let mut classifier = SVMClassifier::new(params);
        classifier.fit(&x, &y).unwrap();

        let predictions = classifier.predict(&x).unwrap();
        assert_eq!(predictions.len(), y.len());
        assert!(predictions.iter().all(|p| *p <= 2));
    }

    #[test]
    fn test_svm_fits_thousands_of_rows() {
        // two separated bands, 4000 rows
        let n = 4000;
        let x = Array2::from_shape_fn((n, 2), |(i, j)| {
            let offset = if i % 2 == 0 { -3.0 } else { 3.0 };
            let jitter = ((i * 37 + j * 11) % 100) as f64 / 100.0 - 0.5;
            if j == 0 {
                offset + jitter
            } else {
                jitter * 4.0
            }
        });
        let y: Vec<usize> = (0..n).map(|i| i % 2).collect();

        let mut classifier = SVMClassifier::new(ModelConfig::new(42, "svm".parse().unwrap()));
        classifier.fit(&x, &y).unwrap();
        let predictions = classifier.predict(&x).unwrap();
        assert_eq!(predictions.len(), n);
        assert!(predictions.iter().all(|p| *p <= 1));
    }

    #[test]
    fn test_svm_requires_fit() {
        let classifier = SVMClassifier::new(ModelConfig::new(42, "svm".parse().unwrap()));
        assert!(classifier.predict(&array![[1.0, 2.0]]).is_err());
    }
}
