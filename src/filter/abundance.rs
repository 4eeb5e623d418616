//! Abundance-based feature filtering.

use crate::data::AbundanceMatrix;
use crate::error::{MetricsError, Result};
use rayon::prelude::*;

/// Filter features by their total abundance across all samples.
///
/// With `strict`, a feature is kept only if its total is `> min_total`;
/// otherwise `>= min_total`. `filter_sum_abundance(m, 0.0, true)` drops
/// features absent from every sample. An empty result is not an error.
pub fn filter_sum_abundance(
    counts: &AbundanceMatrix,
    min_total: f64,
    strict: bool,
) -> Result<AbundanceMatrix> {
    if min_total < 0.0 {
        return Err(MetricsError::InvalidParameter(
            "min_total must be non-negative".to_string(),
        ));
    }

    let row_sums = counts.row_sums();
    let keep_indices: Vec<usize> = (0..counts.n_features())
        .into_par_iter()
        .filter(|&row| {
            if strict {
                row_sums[row] > min_total
            } else {
                row_sums[row] >= min_total
            }
        })
        .collect();

    counts.subset_features(&keep_indices)
}
