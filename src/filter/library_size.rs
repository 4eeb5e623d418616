//! Library size-based filtering for samples.

use crate::data::AbundanceMatrix;
use crate::error::{MetricsError, Result};

/// Filter samples by library size (total reads).
///
/// Removes samples whose total abundance is below `min_reads`. Shallow
/// samples are dropped before rescaling so that normalization does not
/// inflate them.
///
/// # Arguments
/// * `counts` - The abundance matrix to filter
/// * `min_reads` - Minimum total reads per sample
///
/// # Returns
/// A new AbundanceMatrix containing only samples meeting the threshold.
pub fn filter_library_size(counts: &AbundanceMatrix, min_reads: f64) -> Result<AbundanceMatrix> {
    if min_reads < 0.0 {
        return Err(MetricsError::InvalidParameter(
            "min_reads must be non-negative".to_string(),
        ));
    }

    let keep_indices: Vec<usize> = counts
        .col_sums()
        .iter()
        .enumerate()
        .filter(|(_, &sum)| sum >= min_reads)
        .map(|(i, _)| i)
        .collect();

    if keep_indices.is_empty() {
        return Err(MetricsError::EmptyData(format!(
            "No samples have at least {} reads",
            min_reads
        )));
    }

    counts.subset_samples(&keep_indices)
}
