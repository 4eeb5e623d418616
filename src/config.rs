//! Run configuration for the cross-cohort evaluator.

use crate::classify::ForestConfig;
use crate::error::{MetricsError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How much progress the evaluator reports through `tracing`.
///
/// Passed explicitly with each run; nothing here touches the global
/// subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// No events from the evaluation loop.
    Quiet,
    /// One event per training cohort plus recovered metric failures.
    #[default]
    Normal,
    /// Additionally one event per (train, test) pair.
    Detailed,
}

impl Verbosity {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "quiet" | "q" => Some(Self::Quiet),
            "normal" => Some(Self::Normal),
            "detailed" | "verbose" | "v" => Some(Self::Detailed),
            _ => None,
        }
    }
}

/// Settings of one cross-cohort evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossCohortConfig {
    /// Metadata field holding the cohort id.
    pub cohort_field: String,
    /// Metadata field holding the binary class label.
    pub label_field: String,
    /// Restrict each (train, test) pair to their shared features.
    pub use_subset_features: bool,
    /// Permute test labels before predicting (null baseline).
    pub shuffle_test: bool,
    /// Permute training labels before fitting (null baseline).
    pub shuffle_train: bool,
    /// Seed for splits, shuffles and the classifier; `None` uses entropy.
    pub seed: Option<u64>,
    pub verbosity: Verbosity,
    pub forest: ForestConfig,
}

impl Default for CrossCohortConfig {
    fn default() -> Self {
        Self {
            cohort_field: "exp".to_string(),
            label_field: "type".to_string(),
            use_subset_features: true,
            shuffle_test: false,
            shuffle_train: false,
            seed: None,
            verbosity: Verbosity::Normal,
            forest: ForestConfig::default(),
        }
    }
}

impl CrossCohortConfig {
    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(MetricsError::from)
    }

    /// Load from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(MetricsError::from)
    }

    /// Set random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }
}
