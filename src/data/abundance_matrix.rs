//! Abundance matrix with sparse storage for microbiome feature tables.

use crate::error::{MetricsError, Result};
use rayon::prelude::*;
use sprs::{CsMat, TriMat};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// A sparse matrix storing non-negative feature abundances across samples.
///
/// Rows represent features (sequences/taxa), columns represent samples.
/// Uses CSR (Compressed Sparse Row) format for efficient row-wise operations.
/// Values may be raw read counts or rescaled (e.g. TSS) abundances.
#[derive(Debug, Clone)]
pub struct AbundanceMatrix {
    /// Sparse matrix in CSR format (features × samples)
    data: CsMat<f64>,
    /// Feature identifiers (row names)
    feature_ids: Vec<String>,
    /// Sample identifiers (column names)
    sample_ids: Vec<String>,
}

fn check_unique(ids: &[String], axis: &'static str) -> Result<()> {
    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(id.as_str()) {
            return Err(MetricsError::DuplicateId {
                axis,
                id: id.clone(),
            });
        }
    }
    Ok(())
}

impl AbundanceMatrix {
    /// Create a new AbundanceMatrix from a sparse matrix and identifiers.
    ///
    /// Identifiers must be unique within each axis.
    pub fn new(data: CsMat<f64>, feature_ids: Vec<String>, sample_ids: Vec<String>) -> Result<Self> {
        let (nrows, ncols) = data.shape();
        if nrows != feature_ids.len() {
            return Err(MetricsError::DimensionMismatch {
                expected: nrows,
                actual: feature_ids.len(),
            });
        }
        if ncols != sample_ids.len() {
            return Err(MetricsError::DimensionMismatch {
                expected: ncols,
                actual: sample_ids.len(),
            });
        }
        check_unique(&feature_ids, "feature")?;
        check_unique(&sample_ids, "sample")?;
        Ok(Self {
            data,
            feature_ids,
            sample_ids,
        })
    }

    /// Load an abundance table from a TSV file.
    ///
    /// Expected format:
    /// - First row: header with sample IDs (first column is feature ID header)
    /// - Subsequent rows: feature ID followed by abundances
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        let header_line = lines
            .next()
            .ok_or_else(|| MetricsError::EmptyData("Empty TSV file".to_string()))??;
        let header: Vec<&str> = header_line.split('\t').collect();
        if header.len() < 2 {
            return Err(MetricsError::EmptyData(
                "TSV must have at least one sample".to_string(),
            ));
        }
        let sample_ids: Vec<String> = header[1..].iter().map(|s| s.trim().to_string()).collect();
        let n_samples = sample_ids.len();

        let mut triplets: Vec<(usize, usize, f64)> = Vec::new();
        let mut feature_ids: Vec<String> = Vec::new();

        for line_result in lines {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            let row_idx = feature_ids.len();
            feature_ids.push(fields[0].trim().to_string());

            for (col_idx, value_str) in fields[1..].iter().enumerate() {
                if col_idx >= n_samples {
                    break;
                }
                let invalid = || MetricsError::InvalidAbundance {
                    value: value_str.to_string(),
                    row: row_idx,
                    col: col_idx,
                };
                let value: f64 = value_str.trim().parse().map_err(|_| invalid())?;
                if !value.is_finite() || value < 0.0 {
                    return Err(invalid());
                }
                if value > 0.0 {
                    triplets.push((row_idx, col_idx, value));
                }
            }
        }

        let n_features = feature_ids.len();
        if n_features == 0 {
            return Err(MetricsError::EmptyData("No features in TSV".to_string()));
        }

        let mut tri_mat = TriMat::new((n_features, n_samples));
        for (row, col, val) in triplets {
            tri_mat.add_triplet(row, col, val);
        }

        Self::new(tri_mat.to_csr(), feature_ids, sample_ids)
    }

    /// Write the abundance matrix to a TSV file.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        write!(writer, "feature_id")?;
        for sample_id in &self.sample_ids {
            write!(writer, "\t{}", sample_id)?;
        }
        writeln!(writer)?;

        for (row_idx, feature_id) in self.feature_ids.iter().enumerate() {
            write!(writer, "{}", feature_id)?;
            for value in self.row_dense(row_idx) {
                write!(writer, "\t{}", value)?;
            }
            writeln!(writer)?;
        }

        Ok(())
    }

    /// Get the value at (row, col), returning 0 for missing entries.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data.get(row, col).copied().unwrap_or(0.0)
    }

    /// Number of features (rows).
    #[inline]
    pub fn n_features(&self) -> usize {
        self.data.rows()
    }

    /// Number of samples (columns).
    #[inline]
    pub fn n_samples(&self) -> usize {
        self.data.cols()
    }

    /// Total number of stored non-zero entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.data.nnz()
    }

    /// Feature identifiers.
    #[inline]
    pub fn feature_ids(&self) -> &[String] {
        &self.feature_ids
    }

    /// Sample identifiers.
    #[inline]
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Map from feature identifier to row index.
    pub fn feature_index(&self) -> HashMap<&str, usize> {
        self.feature_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect()
    }

    /// Get a dense vector for a specific row (feature).
    pub fn row_dense(&self, row: usize) -> Vec<f64> {
        let mut dense = vec![0.0; self.n_samples()];
        if let Some(row_vec) = self.data.outer_view(row) {
            for (col, &val) in row_vec.iter() {
                dense[col] = val;
            }
        }
        dense
    }

    /// Compute row sums (total abundance per feature).
    pub fn row_sums(&self) -> Vec<f64> {
        (0..self.n_features())
            .into_par_iter()
            .map(|row| {
                self.data
                    .outer_view(row)
                    .map(|v| v.iter().map(|(_, &val)| val).sum())
                    .unwrap_or(0.0)
            })
            .collect()
    }

    /// Compute column sums (library sizes per sample).
    pub fn col_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.n_samples()];
        for row_vec in self.data.outer_iterator() {
            for (col, &val) in row_vec.iter() {
                sums[col] += val;
            }
        }
        sums
    }

    /// Apply `f` to every value, including implicit zeros.
    ///
    /// When `f(0.0) == 0.0` only stored entries are visited and the result
    /// stays sparse. Results must be finite and non-negative.
    pub fn map_values<F>(&self, f: F) -> Result<Self>
    where
        F: Fn(f64) -> f64,
    {
        let check = |value: f64, row: usize, col: usize| -> Result<f64> {
            if value.is_finite() && value >= 0.0 {
                Ok(value)
            } else {
                Err(MetricsError::InvalidAbundance {
                    value: value.to_string(),
                    row,
                    col,
                })
            }
        };

        let mut tri_mat = TriMat::new((self.n_features(), self.n_samples()));
        let zero = f(0.0);
        if zero == 0.0 {
            for (row, row_vec) in self.data.outer_iterator().enumerate() {
                for (col, &val) in row_vec.iter() {
                    let mapped = check(f(val), row, col)?;
                    if mapped != 0.0 {
                        tri_mat.add_triplet(row, col, mapped);
                    }
                }
            }
        } else {
            for row in 0..self.n_features() {
                for (col, val) in self.row_dense(row).into_iter().enumerate() {
                    let mapped = check(f(val), row, col)?;
                    if mapped != 0.0 {
                        tri_mat.add_triplet(row, col, mapped);
                    }
                }
            }
        }

        Self::new(tri_mat.to_csr(), self.feature_ids.clone(), self.sample_ids.clone())
    }

    /// Subset the matrix to include only specified features (by index).
    pub fn subset_features(&self, indices: &[usize]) -> Result<Self> {
        let n_features = indices.len();
        let mut tri_mat = TriMat::new((n_features, self.n_samples()));
        let mut new_feature_ids = Vec::with_capacity(n_features);

        for (new_row, &old_row) in indices.iter().enumerate() {
            if old_row >= self.n_features() {
                return Err(MetricsError::InvalidParameter(format!(
                    "Feature index {} out of bounds",
                    old_row
                )));
            }
            new_feature_ids.push(self.feature_ids[old_row].clone());

            if let Some(row_vec) = self.data.outer_view(old_row) {
                for (col, &val) in row_vec.iter() {
                    tri_mat.add_triplet(new_row, col, val);
                }
            }
        }

        Self::new(tri_mat.to_csr(), new_feature_ids, self.sample_ids.clone())
    }

    /// Subset the matrix to include only specified samples (by index).
    pub fn subset_samples(&self, indices: &[usize]) -> Result<Self> {
        let n_samples = indices.len();

        let col_map: HashMap<usize, usize> = indices
            .iter()
            .enumerate()
            .map(|(new_idx, &old_idx)| (old_idx, new_idx))
            .collect();

        let mut new_sample_ids = Vec::with_capacity(n_samples);
        for &old_col in indices {
            if old_col >= self.n_samples() {
                return Err(MetricsError::InvalidParameter(format!(
                    "Sample index {} out of bounds",
                    old_col
                )));
            }
            new_sample_ids.push(self.sample_ids[old_col].clone());
        }

        let mut tri_mat = TriMat::new((self.n_features(), n_samples));
        for (row, row_vec) in self.data.outer_iterator().enumerate() {
            for (old_col, &val) in row_vec.iter() {
                if let Some(&new_col) = col_map.get(&old_col) {
                    tri_mat.add_triplet(row, new_col, val);
                }
            }
        }

        Self::new(tri_mat.to_csr(), self.feature_ids.clone(), new_sample_ids)
    }

    /// Convert to a dense matrix (features × samples).
    pub fn to_dense(&self) -> nalgebra::DMatrix<f64> {
        let mut dense = nalgebra::DMatrix::zeros(self.n_features(), self.n_samples());
        for (row, row_vec) in self.data.outer_iterator().enumerate() {
            for (col, &val) in row_vec.iter() {
                dense[(row, col)] = val;
            }
        }
        dense
    }

    /// Create from a dense matrix (features × samples).
    pub fn from_dense(
        data: &nalgebra::DMatrix<f64>,
        feature_ids: Vec<String>,
        sample_ids: Vec<String>,
    ) -> Result<Self> {
        let (nrows, ncols) = data.shape();
        let mut tri_mat = TriMat::new((nrows, ncols));

        for row in 0..nrows {
            for col in 0..ncols {
                let val = data[(row, col)];
                if val != 0.0 {
                    tri_mat.add_triplet(row, col, val);
                }
            }
        }

        Self::new(tri_mat.to_csr(), feature_ids, sample_ids)
    }
}
