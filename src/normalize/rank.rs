//! Rank transformation of feature abundances.

use crate::data::AbundanceMatrix;
use crate::error::Result;
use nalgebra::DMatrix;
use rayon::prelude::*;

/// Average ranks (1-based) of a slice; tied values share the mean of the
/// ranks they span.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // positions start..end hold ranks start+1..=end
        let rank = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = rank;
        }
        start = end;
    }
    ranks
}

/// Replace every feature's abundances with their ranks across samples.
///
/// Each feature is ranked independently; zeros are ranked like any other
/// value, so the result is dense.
pub fn rank_transform(counts: &AbundanceMatrix) -> Result<AbundanceMatrix> {
    let n_features = counts.n_features();
    let n_samples = counts.n_samples();

    let ranked_rows: Vec<Vec<f64>> = (0..n_features)
        .into_par_iter()
        .map(|i| average_ranks(&counts.row_dense(i)))
        .collect();

    let mut data = DMatrix::zeros(n_features, n_samples);
    for (i, row) in ranked_rows.iter().enumerate() {
        for (j, &r) in row.iter().enumerate() {
            data[(i, j)] = r;
        }
    }

    AbundanceMatrix::from_dense(
        &data,
        counts.feature_ids().to_vec(),
        counts.sample_ids().to_vec(),
    )
}
