//! openset-eval: closed-set and open-set evaluation of image classifiers.
//!
//! The crate builds an open-set label space (known classes compacted, a
//! chosen subset folded into one unknown bucket), runs a roster of
//! classifier adapters over a feature matrix and reports accuracy together
//! with the OOD hit rate for every adapter.
//!
//! Models are thin wrappers around linfa, gbdt and a small ndarray MLP. The
//! CIFAR-100 loader, feature extractors and `pipeline::Experiment` tie the
//! pieces together for the `openset` command line tool.
pub mod config;
pub mod dataset;
pub mod error;
pub mod features;
pub mod harness;
pub mod labels;
pub mod models;
pub mod pipeline;
pub mod preprocessing;
pub mod report;
pub mod scoring;

pub use error::{EvalError, Result};
