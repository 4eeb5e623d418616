//! Dysbiosis index: per-sample log-ratio of "up" versus "down" marker
//! features.
//!
//! For each sample, `score = log2((n_up + 0.1) / (n_down + 0.1))`, where
//! `n_up` / `n_down` summarize the up and down markers found in the sample:
//!
//! - [`DysbiosisMethod::Binary`]: number of markers with abundance above a
//!   threshold
//! - [`DysbiosisMethod::Frequency`]: summed abundances
//! - [`DysbiosisMethod::Rank`]: summed per-feature ranks across samples
//!
//! Markers that are not features of the experiment are ignored.

use crate::data::{Direction, Experiment, MarkerTable};
use crate::error::{MetricsError, Result};
use crate::normalize::rank_transform;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

/// Added to both sides of the ratio so that empty samples score 0.
pub const SMOOTHING: f64 = 0.1;

/// Abundance summary used for the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DysbiosisMethod {
    Binary,
    Frequency,
    Rank,
}

impl DysbiosisMethod {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Binary => "binary",
            Self::Frequency => "frequency",
            Self::Rank => "rank",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "binary" | "presence" => Some(Self::Binary),
            "frequency" | "freq" | "freqs" => Some(Self::Frequency),
            "rank" | "ranks" => Some(Self::Rank),
            _ => None,
        }
    }
}

/// Dysbiosis score per sample, in experiment sample order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DysbiosisResult {
    pub scores: Vec<(String, f64)>,
}

impl DysbiosisResult {
    pub fn get(&self, sample_id: &str) -> Option<f64> {
        self.scores
            .iter()
            .find(|(id, _)| id == sample_id)
            .map(|&(_, s)| s)
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Write as TSV with header `SampleID\tDysbiosis_index`.
    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        let mut tsv = csv::WriterBuilder::new().delimiter(b'\t').from_writer(writer);
        tsv.write_record(["SampleID", "Dysbiosis_index"])?;
        for (id, score) in &self.scores {
            tsv.write_record([id.as_str(), score.to_string().as_str()])?;
        }
        tsv.flush()?;
        Ok(())
    }

    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path)?;
        self.to_writer(std::io::BufWriter::new(file))
    }
}

/// Log-ratio of the up and down summaries.
pub fn dysbiosis_score(n_up: f64, n_down: f64) -> f64 {
    ((n_up + SMOOTHING) / (n_down + SMOOTHING)).log2()
}

/// Score with the selected method. `thresh` only applies to
/// [`DysbiosisMethod::Binary`].
pub fn dysbiosis_index(
    exp: &Experiment,
    markers: &MarkerTable,
    method: DysbiosisMethod,
    thresh: f64,
) -> Result<DysbiosisResult> {
    match method {
        DysbiosisMethod::Binary => dbi_binary(exp, markers, thresh),
        DysbiosisMethod::Frequency => dbi_frequency(exp, markers),
        DysbiosisMethod::Rank => dbi_rank(exp, markers),
    }
}

/// Presence/absence index: a marker counts when its abundance is `> thresh`.
pub fn dbi_binary(exp: &Experiment, markers: &MarkerTable, thresh: f64) -> Result<DysbiosisResult> {
    if !thresh.is_finite() {
        return Err(MetricsError::InvalidParameter(
            "threshold must be finite".to_string(),
        ));
    }
    let restricted = exp.filter_feature_ids(markers.feature_ids().as_slice())?;
    let present = restricted
        .counts()
        .map_values(|v| if v > thresh { 1.0 } else { 0.0 })?;
    dbi_frequency(&restricted.with_counts(present)?, markers)
}

/// Abundance index: sums of raw marker abundances.
pub fn dbi_frequency(exp: &Experiment, markers: &MarkerTable) -> Result<DysbiosisResult> {
    score_samples(exp, markers)
}

/// Rank index: abundances are replaced by each feature's ranks across
/// samples, then scored as [`dbi_frequency`].
pub fn dbi_rank(exp: &Experiment, markers: &MarkerTable) -> Result<DysbiosisResult> {
    let ranked = exp.with_counts(rank_transform(exp.counts())?)?;
    dbi_frequency(&ranked, markers)
}

fn score_samples(exp: &Experiment, markers: &MarkerTable) -> Result<DysbiosisResult> {
    let marker_ids = markers.feature_ids();
    let restricted = exp.filter_feature_ids(marker_ids.as_slice())?;
    let directions: Vec<Direction> = restricted
        .feature_ids()
        .iter()
        .filter_map(|id| markers.direction(id))
        .collect();
    let dense = restricted.counts().to_dense();

    let scores = restricted
        .sample_ids()
        .iter()
        .enumerate()
        .map(|(s, sid)| {
            let (mut n_up, mut n_down) = (0.0, 0.0);
            for (f, direction) in directions.iter().enumerate() {
                let v = dense[(f, s)];
                match direction {
                    Direction::Up => n_up += v,
                    Direction::Down => n_down += v,
                }
            }
            (sid.clone(), dysbiosis_score(n_up, n_down))
        })
        .collect();

    Ok(DysbiosisResult { scores })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{AbundanceMatrix, Metadata};
    use approx::assert_relative_eq;
    use sprs::TriMat;

    /// Features: up1, up2, down1, other; samples S0..S2.
    fn create_test_experiment() -> Experiment {
        let mut tri_mat = TriMat::new((4, 3));
        // S0: both up markers present, no down
        tri_mat.add_triplet(0, 0, 5.0);
        tri_mat.add_triplet(1, 0, 2.0);
        // S1: one down marker only
        tri_mat.add_triplet(2, 1, 8.0);
        // S2: only an unrelated feature
        tri_mat.add_triplet(3, 2, 100.0);

        let feature_ids = ["up1", "up2", "down1", "other"].iter().map(|s| s.to_string()).collect();
        let sample_ids: Vec<String> = (0..3).map(|i| format!("S{}", i)).collect();
        let counts = AbundanceMatrix::new(tri_mat.to_csr(), feature_ids, sample_ids.clone()).unwrap();
        let rows = sample_ids.into_iter().map(|s| (s, vec!["x".to_string()])).collect();
        let metadata = Metadata::from_rows(vec!["exp".to_string()], rows).unwrap();
        Experiment::new(counts, metadata).unwrap()
    }

    fn markers() -> MarkerTable {
        MarkerTable::from_lists(&["up1", "up2", "up_absent"], &["down1"]).unwrap()
    }

    #[test]
    fn test_score_formula() {
        assert_eq!(dysbiosis_score(0.0, 0.0), 0.0);
        assert_relative_eq!(dysbiosis_score(3.0, 0.0), 4.954196310386876, epsilon = 1e-12);
        assert_relative_eq!(dysbiosis_score(0.0, 1.0), -(11.0f64).log2(), epsilon = 1e-12);
    }

    #[test]
    fn test_binary() {
        let result = dbi_binary(&create_test_experiment(), &markers(), 0.0).unwrap();

        assert_eq!(result.len(), 3);
        assert_relative_eq!(result.get("S0").unwrap(), (2.1f64 / 0.1).log2(), epsilon = 1e-12);
        assert_relative_eq!(result.get("S1").unwrap(), (0.1f64 / 1.1).log2(), epsilon = 1e-12);
        assert_eq!(result.get("S2").unwrap(), 0.0);
    }

    #[test]
    fn test_binary_threshold() {
        // Only up1 (5.0) exceeds 3.0 in S0
        let result = dbi_binary(&create_test_experiment(), &markers(), 3.0).unwrap();
        assert_relative_eq!(result.get("S0").unwrap(), (1.1f64 / 0.1).log2(), epsilon = 1e-12);
    }

    #[test]
    fn test_binary_negative_threshold_counts_absent_markers() {
        // Every marker in the table is present, zeros included
        let result = dbi_binary(&create_test_experiment(), &markers(), -1.0).unwrap();
        for id in ["S0", "S1", "S2"] {
            assert_relative_eq!(result.get(id).unwrap(), (2.1f64 / 1.1).log2(), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_frequency() {
        let result = dbi_frequency(&create_test_experiment(), &markers()).unwrap();
        assert_relative_eq!(result.get("S0").unwrap(), (7.1f64 / 0.1).log2(), epsilon = 1e-12);
        assert_relative_eq!(result.get("S1").unwrap(), (0.1f64 / 8.1).log2(), epsilon = 1e-12);
        assert_eq!(result.get("S2").unwrap(), 0.0);
    }

    #[test]
    fn test_rank() {
        // Ranks across S0..S2. up1: [3,1.5,1.5], up2: [3,1.5,1.5], down1: [1.5,3,1.5]
        let result = dbi_rank(&create_test_experiment(), &markers()).unwrap();
        assert_relative_eq!(result.get("S0").unwrap(), (6.1f64 / 1.6).log2(), epsilon = 1e-12);
        assert_relative_eq!(result.get("S1").unwrap(), (3.1f64 / 3.1).log2(), epsilon = 1e-12);
        assert_relative_eq!(result.get("S2").unwrap(), (3.1f64 / 1.6).log2(), epsilon = 1e-12);
    }

    #[test]
    fn test_no_marker_overlap_scores_zero() {
        let unrelated = MarkerTable::from_lists(&["nope"], &["neither"]).unwrap();
        let result = dbi_frequency(&create_test_experiment(), &unrelated).unwrap();
        assert!(result.scores.iter().all(|&(_, s)| s == 0.0));
    }

    #[test]
    fn test_method_dispatch() {
        let exp = create_test_experiment();
        let via_method = dysbiosis_index(&exp, &markers(), DysbiosisMethod::Frequency, 0.0).unwrap();
        assert_eq!(via_method, dbi_frequency(&exp, &markers()).unwrap());
        assert_eq!(DysbiosisMethod::from_str("ranks"), Some(DysbiosisMethod::Rank));
    }

    #[test]
    fn test_tsv_output() {
        let result = dbi_binary(&create_test_experiment(), &markers(), 0.0).unwrap();
        let mut buf = Vec::new();
        result.to_writer(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "SampleID\tDysbiosis_index");
        assert_eq!(lines[3], "S2\t0");
    }
}
