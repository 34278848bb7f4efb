//! Feature standardization shared by the margin-classifier adapters.
//!
//! The scaler is fitted on the training split only and then applied
//! unchanged to every later split.

use ndarray::{Array1, Array2, Axis};

use crate::error::{EvalError, Result};

/// Per-column mean/std standard scaler.
#[derive(Clone, Debug)]
pub struct StandardScaler {
    pub mean: Array1<f64>,
    pub std: Array1<f64>,
}

impl StandardScaler {
    /// Minimum stddev to avoid division by zero when transforming.
    const MIN_STD: f64 = 1e-6;

    /// Fit a scaler where rows are samples and columns are features.
    pub fn fit(x: &Array2<f64>) -> Result<Self> {
        let (nrows, ncols) = x.dim();
        if nrows == 0 || ncols == 0 {
            return Err(EvalError::EmptyInput("scaler training matrix"));
        }

        // `mean_axis` is only `None` for an empty axis, ruled out above.
        let mean = x
            .mean_axis(Axis(0))
            .ok_or(EvalError::EmptyInput("scaler training matrix"))?;
        let std = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| s.max(Self::MIN_STD));

        Ok(StandardScaler { mean, std })
    }

    /// Standardize `x` with the fitted statistics, returning a new matrix.
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.mean.len() {
            return Err(EvalError::shape(
                "scaler feature columns",
                self.mean.len(),
                x.ncols(),
            ));
        }
        Ok((x - &self.mean) / &self.std)
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }
}

/// Fit a scaler on `x` and return the transformed matrix with it.
pub fn fit_transform(x: &Array2<f64>) -> Result<(StandardScaler, Array2<f64>)> {
    let scaler = StandardScaler::fit(x)?;
    let transformed = scaler.transform(x)?;
    Ok((scaler, transformed))
}
