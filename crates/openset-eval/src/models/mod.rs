pub mod forest;
pub mod gbdt;
pub mod kmeans;
pub mod mlp;
pub mod svm;

pub mod classifier_trait;
pub mod factory;
