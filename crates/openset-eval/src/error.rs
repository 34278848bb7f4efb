use std::fmt;

use thiserror::Error;

/// Stage of an adapter run at which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fit,
    Predict,
    Score,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Stage::Fit => write!(f, "fit"),
            Stage::Predict => write!(f, "predict"),
            Stage::Score => write!(f, "score"),
        }
    }
}

/// Errors raised by the label space, scoring and harness layers.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("invalid unknown-class set: {0}")]
    InvalidLabelSet(String),

    #[error("shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("empty input: {0}")]
    EmptyInput(&'static str),

    #[error("adapter '{adapter}' failed during {stage}: {message}")]
    AdapterFailure {
        adapter: String,
        stage: Stage,
        message: String,
    },
}

impl EvalError {
    pub(crate) fn shape(context: &'static str, expected: usize, actual: usize) -> Self {
        EvalError::ShapeMismatch {
            context,
            expected,
            actual,
        }
    }
}

pub type Result<T> = std::result::Result<T, EvalError>;
