//! `openset evaluate`: load data and config, run the experiment, write the report.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use openset_eval::config::{ExperimentConfig, ExtractorKind, FailurePolicy};
use openset_eval::dataset::{load_cifar100, LabelGranularity};
use openset_eval::labels::UnknownClassSet;
use openset_eval::pipeline::Experiment;
use openset_eval::report::EvaluationReport;

use crate::util::{validate_data_dir, write_bytes_to_file};

/// Command line values that take precedence over the JSON config.
#[derive(Debug, Clone, Default)]
pub struct EvaluateOverrides {
    pub extractor: Option<ExtractorKind>,
    pub open_set: bool,
    pub unknown_classes: Option<UnknownClassSet>,
    pub coarse_labels: bool,
    pub shuffle: bool,
    pub seed: Option<u64>,
    pub abort_on_failure: bool,
}

/// Load an experiment configuration from a JSON file. Missing fields fall
/// back to their defaults.
pub fn load_experiment_config<P: AsRef<Path>>(path: P) -> Result<ExperimentConfig> {
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
    let config: ExperimentConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.as_ref().display()))?;
    Ok(config)
}

pub fn default_config_json() -> Result<String> {
    Ok(serde_json::to_string_pretty(&ExperimentConfig::default())?)
}

impl EvaluateOverrides {
    /// Apply the overrides and reject an open-set config whose unknown
    /// classes fall outside the selected label granularity.
    pub fn apply(&self, config: &mut ExperimentConfig) -> Result<()> {
        if let Some(extractor) = self.extractor {
            config.extractor = extractor;
        }
        if self.open_set {
            config.open_set = true;
        }
        if let Some(unknown) = &self.unknown_classes {
            config.unknown_classes = unknown.clone();
        }
        if self.coarse_labels {
            config.n_classes = LabelGranularity::Coarse.n_classes();
        }
        if self.shuffle {
            config.shuffle = true;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
            for model in config.models.iter_mut() {
                model.seed = seed;
            }
        }
        if self.abort_on_failure {
            config.failure_policy = FailurePolicy::Abort;
        }

        if config.open_set {
            let out_of_range: Vec<usize> = config
                .unknown_classes
                .iter()
                .filter(|&c| c >= config.n_classes)
                .collect();
            if !out_of_range.is_empty() {
                anyhow::bail!(
                    "unknown classes {:?} are outside the {} {} labels; pass --unknown-classes with indices below {}",
                    out_of_range,
                    config.n_classes,
                    if self.coarse_labels { "coarse" } else { "configured" },
                    config.n_classes
                );
            }
        }
        Ok(())
    }

    pub fn granularity(&self) -> LabelGranularity {
        if self.coarse_labels {
            LabelGranularity::Coarse
        } else {
            LabelGranularity::Fine
        }
    }
}

/// Run one evaluation over a CIFAR-100 binary directory.
pub fn run_evaluate(
    data_dir: &Path,
    config_path: Option<&PathBuf>,
    overrides: &EvaluateOverrides,
) -> Result<EvaluationReport> {
    validate_data_dir(data_dir)?;

    let mut config = match config_path {
        Some(path) => {
            log::info!("Using config: {:?}", path);
            load_experiment_config(path)?
        }
        None => {
            log::info!("No config provided; using defaults.");
            ExperimentConfig::default()
        }
    };
    overrides.apply(&mut config)?;
    log::debug!(
        "Effective config:\n{}",
        serde_json::to_string_pretty(&config).unwrap_or_default()
    );

    let dataset = load_cifar100(data_dir, overrides.granularity())?;
    Experiment::new(config).run(&dataset)
}

/// Write the report as pretty JSON.
pub fn write_report<P: AsRef<Path>>(report: &EvaluationReport, path: P) -> Result<()> {
    let json = report.to_json_pretty()?;
    write_bytes_to_file(&path, json.as_bytes())
        .with_context(|| format!("Failed to write report: {}", path.as_ref().display()))?;
    log::info!("Report written to {}", path.as_ref().display());
    Ok(())
}
