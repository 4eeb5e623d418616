//! Cross-cohort classifier evaluation.
//!
//! For every ordered pair of cohorts (train, test) a classifier is fitted on
//! the training cohort and scored on the test cohort:
//!
//! 1. both cohorts drop features that are absent from all their samples
//! 2. training labels are optionally permuted (once per training cohort)
//! 3. with `use_subset_features`, the training cohort is restricted to the
//!    test cohort's features, then the test cohort to the restricted
//!    training features, so both end up with the same feature set
//! 4. test labels are optionally permuted
//! 5. on the diagonal, 2/3 of the samples (rounded down) train and the rest
//!    test, so no sample is used on both sides; a split whose training side
//!    holds a single class leaves the cell missing
//! 6. fit, predict, and record ROC-AUC and balanced accuracy; a metric that
//!    cannot be computed is stored as missing and the loop continues

use super::matrix::{CrossCohortResult, PerformanceMatrix};
use crate::classify::{balanced_accuracy, roc_auc, Classifier, RandomForest};
use crate::config::{CrossCohortConfig, Verbosity};
use crate::data::Experiment;
use crate::error::{MetricsError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::borrow::Cow;
use std::collections::HashSet;
use tracing::{info, warn};

/// Display label of a cohort id: its last `/`-separated segment.
pub fn cohort_label(cohort_id: &str) -> &str {
    cohort_id.rsplit('/').next().unwrap_or(cohort_id)
}

/// Number of samples used for training when a cohort is tested against itself.
pub fn self_train_size(n_samples: usize) -> usize {
    n_samples * 2 / 3
}

/// Evaluate with the default random forest, seeded from the config.
pub fn cross_cohort_performance(
    exp: &Experiment,
    config: &CrossCohortConfig,
) -> Result<CrossCohortResult> {
    let classifier = RandomForest::new(config.forest.clone());
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    evaluate(exp, config, &classifier, &mut rng)
}

/// Build the cohort × cohort ROC-AUC and balanced accuracy matrices.
///
/// Rows are training cohorts, columns test cohorts, both in the order the
/// cohort values are first encountered in `exp`. The input experiment is not
/// modified; all shuffling and filtering happens on per-cohort copies.
///
/// # Errors
/// Missing metadata fields, fit failures (for instance a training cohort with
/// a single class) and prediction failures abort the whole evaluation.
/// Metric failures and single-class diagonal splits only blank the affected
/// cell.
pub fn evaluate<C, R>(
    exp: &Experiment,
    config: &CrossCohortConfig,
    classifier: &C,
    rng: &mut R,
) -> Result<CrossCohortResult>
where
    C: Classifier,
    R: Rng,
{
    let label_field = config.label_field.as_str();
    let cohorts = exp.iterate(&config.cohort_field)?;
    if cohorts.is_empty() {
        return Err(MetricsError::EmptyData("No cohorts to evaluate".to_string()));
    }

    let labels: Vec<String> = cohorts
        .iter()
        .map(|(id, _)| cohort_label(id).to_string())
        .collect();
    let mut roc = PerformanceMatrix::new("roc_auc", labels.clone());
    let mut accuracy = PerformanceMatrix::new("balanced_accuracy", labels);

    if config.verbosity >= Verbosity::Normal {
        info!(
            n_cohorts = cohorts.len(),
            use_subset_features = config.use_subset_features,
            shuffle_test = config.shuffle_test,
            shuffle_train = config.shuffle_train,
            "processing cohorts"
        );
    }

    // The test side of every pair starts from the same filtered cohort.
    let test_cohorts: Vec<Experiment> = cohorts
        .iter()
        .map(|(_, part)| part.filter_sum_abundance_strict())
        .collect::<Result<_>>()?;

    for (i, (train_id, train_part)) in cohorts.iter().enumerate() {
        let train = if config.shuffle_train {
            train_part
                .shuffle_labels(label_field, rng)?
                .filter_sum_abundance_strict()?
        } else {
            train_part.filter_sum_abundance_strict()?
        };

        if config.verbosity >= Verbosity::Normal {
            info!(
                cohort = %train_id,
                n_samples = train.n_samples(),
                n_features = train.n_features(),
                "training cohort {}/{}",
                i + 1,
                cohorts.len()
            );
        }

        // Without feature subsetting the model only depends on the training
        // cohort, so it is fitted once and reused off the diagonal.
        let shared_model = if config.use_subset_features {
            None
        } else {
            Some(classifier.fit(&train, label_field, rng)?)
        };

        for (j, test_cohort) in test_cohorts.iter().enumerate() {
            let (mut pair_train, mut pair_test) = if config.use_subset_features {
                let restricted = train.filter_feature_ids(test_cohort.feature_ids())?;
                let test = test_cohort.filter_feature_ids(restricted.feature_ids())?;
                (Cow::Owned(restricted), test)
            } else {
                (Cow::Borrowed(&train), test_cohort.clone())
            };

            if config.shuffle_test {
                pair_test = pair_test.shuffle_labels(label_field, rng)?;
            }

            if i == j {
                let keep = self_train_size(pair_train.n_samples());
                let split = pair_train.downsample(keep, rng)?;
                pair_test = pair_test.filter_sample_ids(split.sample_ids(), true)?;
                pair_train = Cow::Owned(split);

                // A random split of a cohort with a rare class can leave the
                // training side with one class; only this cell is lost.
                let n_levels = pair_train
                    .labels(label_field)?
                    .into_iter()
                    .collect::<HashSet<_>>()
                    .len();
                if n_levels < 2 {
                    if config.verbosity >= Verbosity::Normal {
                        warn!(
                            cohort = %roc.labels()[i],
                            n_train = pair_train.n_samples(),
                            "self-comparison split has a single training class, cell left missing"
                        );
                    }
                    continue;
                }
            }

            let fresh_model;
            let model = match (&shared_model, i == j) {
                (Some(model), false) => model,
                _ => {
                    fresh_model = classifier.fit(&pair_train, label_field, rng)?;
                    &fresh_model
                }
            };

            let preds = classifier.predict(model, &pair_test, label_field)?;
            let roc_value = recover(roc_auc(&preds), "roc_auc", &roc, i, j, config.verbosity);
            let acc_value = recover(
                balanced_accuracy(&preds),
                "balanced_accuracy",
                &accuracy,
                i,
                j,
                config.verbosity,
            );
            roc.set(i, j, roc_value)?;
            accuracy.set(i, j, acc_value)?;

            if config.verbosity >= Verbosity::Detailed {
                info!(
                    train = %roc.labels()[i],
                    test = %roc.labels()[j],
                    n_train = pair_train.n_samples(),
                    n_test = pair_test.n_samples(),
                    n_features = pair_train.n_features(),
                    roc_auc = ?roc_value,
                    balanced_accuracy = ?acc_value,
                    "evaluated pair"
                );
            }
        }
    }

    Ok(CrossCohortResult { roc, accuracy })
}

/// Turn a metric failure into the missing marker.
fn recover(
    value: Result<f64>,
    metric: &str,
    matrix: &PerformanceMatrix,
    i: usize,
    j: usize,
    verbosity: Verbosity,
) -> Option<f64> {
    match value {
        Ok(v) => Some(v),
        Err(e) => {
            if verbosity >= Verbosity::Normal {
                warn!(
                    train = %matrix.labels()[i],
                    test = %matrix.labels()[j],
                    "{} unavailable: {}",
                    metric,
                    e
                );
            }
            None
        }
    }
}
