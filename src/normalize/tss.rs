//! Total Sum Scaling (TSS) normalization for compositional data.
//!
//! TSS converts abundances to relative abundances by dividing each value by
//! the sample total, then multiplying by a common scale (e.g. 10000 reads).

use crate::data::AbundanceMatrix;
use crate::error::{MetricsError, Result};
use rayon::prelude::*;
use sprs::TriMat;

/// Rescale every sample to the same total.
///
/// # Formula
/// For sample j: TSS(x_ij) = x_ij / sum(x_j) * scale_factor
///
/// Zeros stay zeros, so the sparsity pattern is preserved.
///
/// # Errors
/// Fails on a non-positive scale factor or a sample with zero total.
pub fn norm_tss(counts: &AbundanceMatrix, scale_factor: f64) -> Result<AbundanceMatrix> {
    if counts.n_features() == 0 || counts.n_samples() == 0 {
        return Err(MetricsError::EmptyData(
            "Cannot apply TSS to empty matrix".to_string(),
        ));
    }
    if scale_factor <= 0.0 {
        return Err(MetricsError::InvalidParameter(
            "Scale factor must be positive".to_string(),
        ));
    }

    let library_sizes = counts.col_sums();
    if let Some(j) = library_sizes.iter().position(|&s| s <= 0.0) {
        return Err(MetricsError::EmptyData(format!(
            "Sample {} has zero total abundance, cannot normalize",
            counts.sample_ids()[j]
        )));
    }

    let scaled_rows: Vec<Vec<(usize, f64)>> = (0..counts.n_features())
        .into_par_iter()
        .map(|i| {
            counts
                .row_dense(i)
                .into_iter()
                .enumerate()
                .filter(|&(_, v)| v > 0.0)
                .map(|(j, v)| (j, v / library_sizes[j] * scale_factor))
                .collect()
        })
        .collect();

    let mut tri_mat = TriMat::new((counts.n_features(), counts.n_samples()));
    for (i, row) in scaled_rows.into_iter().enumerate() {
        for (j, v) in row {
            tri_mat.add_triplet(i, j, v);
        }
    }

    AbundanceMatrix::new(
        tri_mat.to_csr(),
        counts.feature_ids().to_vec(),
        counts.sample_ids().to_vec(),
    )
}
