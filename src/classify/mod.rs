//! Binary classification of experiments.
//!
//! The cross-cohort evaluator only depends on the [`Classifier`] trait, so
//! any model with a fit/predict pair can be plugged in. [`RandomForest`] is
//! the default implementation.

pub mod forest;
pub mod metrics;

pub use forest::{ForestConfig, ForestModel, RandomForest};
pub use metrics::{balanced_accuracy, roc_auc};

use crate::data::Experiment;
use crate::error::{MetricsError, Result};
use rand::RngCore;

/// A binary classifier trained on the samples of an experiment.
pub trait Classifier {
    /// Fitted model produced by [`Classifier::fit`].
    type Model;

    /// Train on `train`, using the metadata field `label_field` as target.
    fn fit(&self, train: &Experiment, label_field: &str, rng: &mut dyn RngCore)
        -> Result<Self::Model>;

    /// Score every sample of `test` with a fitted model.
    ///
    /// True labels are read from `label_field` and carried along so that
    /// metrics can be computed from the predictions alone.
    fn predict(&self, model: &Self::Model, test: &Experiment, label_field: &str)
        -> Result<Predictions>;
}

/// The two class levels of a binary problem, sorted; the second is positive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLevels {
    pub negative: String,
    pub positive: String,
}

impl ClassLevels {
    /// Derive the levels from training labels; exactly two distinct values
    /// are required.
    pub fn from_labels(labels: &[String]) -> Result<Self> {
        let mut levels: Vec<&String> = labels.iter().collect();
        levels.sort();
        levels.dedup();
        match levels.as_slice() {
            [negative, positive] => Ok(Self {
                negative: (*negative).clone(),
                positive: (*positive).clone(),
            }),
            _ => Err(MetricsError::Classifier(format!(
                "training set needs exactly two classes, found {}",
                levels.len()
            ))),
        }
    }

    pub fn is_positive(&self, label: &str) -> bool {
        label == self.positive
    }

    pub fn contains(&self, label: &str) -> bool {
        label == self.negative || label == self.positive
    }
}

/// Per-sample output of a classifier on a test set.
#[derive(Debug, Clone)]
pub struct Predictions {
    pub classes: ClassLevels,
    pub sample_ids: Vec<String>,
    pub true_labels: Vec<String>,
    /// Probability of the positive class.
    pub probabilities: Vec<f64>,
}

impl Predictions {
    pub fn len(&self) -> usize {
        self.sample_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sample_ids.is_empty()
    }

    /// Hard calls: positive iff the probability exceeds 0.5.
    pub fn predicted_labels(&self) -> Vec<&str> {
        self.probabilities
            .iter()
            .map(|&p| {
                if p > 0.5 {
                    self.classes.positive.as_str()
                } else {
                    self.classes.negative.as_str()
                }
            })
            .collect()
    }
}
