//! Performance metrics computed from classifier predictions.
//!
//! Both metrics are undefined unless the true labels contain both classes;
//! callers get [`MetricsError::SingleClass`] in that case and decide how to
//! record it.

use super::Predictions;
use crate::error::{MetricsError, Result};
use crate::normalize::average_ranks;

/// True labels as positive/negative flags, validated against the model's classes.
fn truth(preds: &Predictions) -> Result<(Vec<bool>, usize, usize)> {
    if preds.is_empty() {
        return Err(MetricsError::EmptyData("No predictions".to_string()));
    }
    if let Some(unknown) = preds.true_labels.iter().find(|l| !preds.classes.contains(l)) {
        return Err(MetricsError::InvalidParameter(format!(
            "label '{}' is not one of the model classes ({}, {})",
            unknown, preds.classes.negative, preds.classes.positive
        )));
    }
    let is_pos: Vec<bool> = preds
        .true_labels
        .iter()
        .map(|l| preds.classes.is_positive(l))
        .collect();
    let n_pos = is_pos.iter().filter(|&&p| p).count();
    let n_neg = is_pos.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        let present = if n_pos == 0 {
            &preds.classes.negative
        } else {
            &preds.classes.positive
        };
        return Err(MetricsError::SingleClass(present.clone()));
    }
    Ok((is_pos, n_pos, n_neg))
}

/// Area under the ROC curve of the positive-class probabilities.
///
/// Computed via the Mann-Whitney U statistic; tied scores contribute half,
/// matching the trapezoidal ROC area.
pub fn roc_auc(preds: &Predictions) -> Result<f64> {
    let (is_pos, n_pos, n_neg) = truth(preds)?;
    let ranks = average_ranks(&preds.probabilities);
    let pos_rank_sum: f64 = ranks
        .iter()
        .zip(&is_pos)
        .filter(|(_, p)| **p)
        .map(|(r, _)| r)
        .sum();
    let u = pos_rank_sum - (n_pos * (n_pos + 1)) as f64 / 2.0;
    Ok(u / (n_pos * n_neg) as f64)
}

/// Mean of the per-class recalls of the hard predictions.
pub fn balanced_accuracy(preds: &Predictions) -> Result<f64> {
    let (is_pos, n_pos, n_neg) = truth(preds)?;
    let mut true_pos = 0usize;
    let mut true_neg = 0usize;
    for (called, &actual) in preds.predicted_labels().iter().zip(&is_pos) {
        let called_pos = preds.classes.is_positive(called);
        match (called_pos, actual) {
            (true, true) => true_pos += 1,
            (false, false) => true_neg += 1,
            _ => {}
        }
    }
    Ok((true_pos as f64 / n_pos as f64 + true_neg as f64 / n_neg as f64) / 2.0)
}
