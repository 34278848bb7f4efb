use anyhow::Result;
use ndarray::{Array, Array1, Array2, ArrayView2, Axis, Dimension, Zip};
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::config::{ModelConfig, ModelType};
use crate::models::classifier_trait::{argmax, check_fit_input, distinct_classes, not_fitted, ClassifierAdapter};

/// Consecutive epochs without `TOLERANCE` loss improvement before stopping.
const N_ITER_NO_CHANGE: usize = 10;
const TOLERANCE: f64 = 1e-4;

/// Single hidden layer perceptron: ReLU hidden units, softmax output,
/// cross-entropy loss with an L2 penalty, trained with Adam on shuffled
/// mini-batches.
pub struct MLPClassifier {
    hidden_units: usize,
    max_iter: usize,
    learning_rate: f64,
    batch_size: usize,
    alpha: f64,
    seed: u64,
    classes: Vec<usize>,
    network: Option<Network>,
}

struct Network {
    w1: Array2<f64>,
    b1: Array1<f64>,
    w2: Array2<f64>,
    b2: Array1<f64>,
}

struct Gradients {
    w1: Array2<f64>,
    b1: Array1<f64>,
    w2: Array2<f64>,
    b2: Array1<f64>,
}

impl Network {
    /// Glorot-uniform weights, zero biases.
    fn init(n_in: usize, n_hidden: usize, n_out: usize, rng: &mut StdRng) -> Self {
        let mut layer = |fan_in: usize, fan_out: usize| {
            let bound = (6.0 / (fan_in + fan_out) as f64).sqrt();
            let dist = Uniform::new_inclusive(-bound, bound);
            Array2::from_shape_simple_fn((fan_in, fan_out), || dist.sample(&mut *rng))
        };
        let w1 = layer(n_in, n_hidden);
        let w2 = layer(n_hidden, n_out);
        Network {
            w1,
            b1: Array1::zeros(n_hidden),
            w2,
            b2: Array1::zeros(n_out),
        }
    }

    /// Returns hidden pre-activations and output probabilities.
    fn forward(&self, x: &ArrayView2<f64>) -> (Array2<f64>, Array2<f64>) {
        let z1 = x.dot(&self.w1) + &self.b1;
        let a1 = z1.mapv(|v| v.max(0.0));
        let mut probs = a1.dot(&self.w2) + &self.b2;
        for mut row in probs.rows_mut() {
            let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
            row.mapv_inplace(|v| (v - max).exp());
            let sum = row.sum();
            row.mapv_inplace(|v| v / sum);
        }
        (z1, probs)
    }

    /// Backpropagate one batch; returns gradients and the batch loss.
    fn backward(&self, x: &ArrayView2<f64>, targets: &[usize], alpha: f64) -> (Gradients, f64) {
        let m = x.nrows() as f64;
        let (z1, probs) = self.forward(x);
        let a1 = z1.mapv(|v| v.max(0.0));

        let mut loss = 0.0;
        let mut delta2 = probs;
        for (mut row, &t) in delta2.rows_mut().into_iter().zip(targets) {
            loss -= row[t].max(1e-12).ln();
            row[t] -= 1.0;
        }
        delta2.mapv_inplace(|v| v / m);
        let penalty = (self.w1.mapv(|w| w * w).sum() + self.w2.mapv(|w| w * w).sum()) * alpha / (2.0 * m);
        loss = loss / m + penalty;

        let w2 = a1.t().dot(&delta2) + &(&self.w2 * (alpha / m));
        let b2 = delta2.sum_axis(Axis(0));

        let mut delta1 = delta2.dot(&self.w2.t());
        Zip::from(&mut delta1).and(&z1).for_each(|d, &z| {
            if z <= 0.0 {
                *d = 0.0;
            }
        });
        let w1 = x.t().dot(&delta1) + &(&self.w1 * (alpha / m));
        let b1 = delta1.sum_axis(Axis(0));

        (Gradients { w1, b1, w2, b2 }, loss)
    }
}

/// Adam state for the four parameter tensors.
struct Adam {
    lr: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    t: i32,
    m: Gradients,
    v: Gradients,
}

impl Adam {
    fn new(lr: f64, net: &Network) -> Self {
        let zeros = || Gradients {
            w1: Array2::zeros(net.w1.raw_dim()),
            b1: Array1::zeros(net.b1.raw_dim()),
            w2: Array2::zeros(net.w2.raw_dim()),
            b2: Array1::zeros(net.b2.raw_dim()),
        };
        Adam {
            lr,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            t: 0,
            m: zeros(),
            v: zeros(),
        }
    }

    fn step(&mut self, net: &mut Network, grads: &Gradients) {
        self.t += 1;
        let lr_t = self.lr * (1.0 - self.beta2.powi(self.t)).sqrt() / (1.0 - self.beta1.powi(self.t));
        let (b1, b2, eps) = (self.beta1, self.beta2, self.epsilon);
        update(&mut net.w1, &grads.w1, &mut self.m.w1, &mut self.v.w1, lr_t, b1, b2, eps);
        update(&mut net.b1, &grads.b1, &mut self.m.b1, &mut self.v.b1, lr_t, b1, b2, eps);
        update(&mut net.w2, &grads.w2, &mut self.m.w2, &mut self.v.w2, lr_t, b1, b2, eps);
        update(&mut net.b2, &grads.b2, &mut self.m.b2, &mut self.v.b2, lr_t, b1, b2, eps);
    }
}

#[allow(clippy::too_many_arguments)]
fn update<D: Dimension>(
    param: &mut Array<f64, D>,
    grad: &Array<f64, D>,
    m: &mut Array<f64, D>,
    v: &mut Array<f64, D>,
    lr_t: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
) {
    Zip::from(param)
        .and(grad)
        .and(m)
        .and(v)
        .for_each(|p, &g, m, v| {
            *m = beta1 * *m + (1.0 - beta1) * g;
            *v = beta2 * *v + (1.0 - beta2) * g * g;
            *p -= lr_t * *m / (v.sqrt() + epsilon);
        });
}

impl MLPClassifier {
    pub fn new(params: ModelConfig) -> Self {
        match params.model_type {
            ModelType::Mlp {
                hidden_units,
                max_iter,
                learning_rate,
                batch_size,
                alpha,
            } => MLPClassifier {
                hidden_units,
                max_iter,
                learning_rate,
                batch_size,
                alpha,
                seed: params.seed,
                classes: Vec::new(),
                network: None,
            },
            other => panic!("Error: Expected ModelType::Mlp params, got {:?}", other),
        }
    }
}

impl ClassifierAdapter for MLPClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<()> {
        check_fit_input(x, y)?;
        if self.hidden_units == 0 || self.batch_size == 0 {
            anyhow::bail!("mlp needs non-zero hidden_units and batch_size");
        }

        let classes = distinct_classes(y);
        let targets: Vec<usize> = y
            .iter()
            .map(|label| classes.binary_search(label).unwrap_or_default())
            .collect();

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut net = Network::init(x.ncols(), self.hidden_units, classes.len(), &mut rng);
        let mut adam = Adam::new(self.learning_rate, &net);

        let n_samples = x.nrows();
        let batch_size = self.batch_size.min(n_samples);
        let mut order: Vec<usize> = (0..n_samples).collect();
        let mut best_loss = f64::INFINITY;
        let mut stale_epochs = 0;

        for epoch in 0..self.max_iter {
            order.shuffle(&mut rng);
            let mut epoch_loss = 0.0;

            for batch in order.chunks(batch_size) {
                let xb = x.select(Axis(0), batch);
                let yb: Vec<usize> = batch.iter().map(|&i| targets[i]).collect();
                let (grads, loss) = net.backward(&xb.view(), &yb, self.alpha);
                adam.step(&mut net, &grads);
                epoch_loss += loss * batch.len() as f64;
            }
            epoch_loss /= n_samples as f64;

            if !epoch_loss.is_finite() {
                anyhow::bail!("mlp training diverged at epoch {}", epoch + 1);
            }

            if epoch_loss > best_loss - TOLERANCE {
                stale_epochs += 1;
            } else {
                stale_epochs = 0;
            }
            best_loss = best_loss.min(epoch_loss);

            if stale_epochs >= N_ITER_NO_CHANGE {
                log::debug!("mlp converged after {} epochs, loss {:.5}", epoch + 1, epoch_loss);
                break;
            }
            if epoch + 1 == self.max_iter {
                log::warn!(
                    "mlp reached max_iter={} without converging, loss {:.5}",
                    self.max_iter,
                    epoch_loss
                );
            }
        }

        self.classes = classes;
        self.network = Some(net);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let net = self.network.as_ref().ok_or_else(|| not_fitted(self.name()))?;
        if x.ncols() != net.w1.nrows() {
            anyhow::bail!(
                "mlp was trained on {} features, got {}",
                net.w1.nrows(),
                x.ncols()
            );
        }
        let (_, probs) = net.forward(&x.view());
        Ok(probs
            .rows()
            .into_iter()
            .map(|row| self.classes[argmax(&row.to_vec())])
            .collect())
    }

    fn name(&self) -> &str {
        "mlp"
    }
}
