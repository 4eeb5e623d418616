//! Experiment: an abundance matrix paired with aligned sample metadata.

use crate::data::{AbundanceMatrix, Metadata, Variable};
use crate::error::{MetricsError, Result};
use crate::filter::filter_sum_abundance;
use rand::seq::{index, SliceRandom};
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Samples × features abundances together with per-sample metadata.
///
/// The metadata always holds exactly the matrix's samples, in matrix order.
/// All filtering operations return new experiments; the receiver is never
/// modified.
#[derive(Debug, Clone)]
pub struct Experiment {
    counts: AbundanceMatrix,
    metadata: Metadata,
}

impl Experiment {
    /// Pair an abundance matrix with metadata, aligning the metadata to the
    /// matrix sample order. Every matrix sample needs a metadata row; extra
    /// metadata rows are dropped.
    pub fn new(counts: AbundanceMatrix, metadata: Metadata) -> Result<Self> {
        if let Some(missing) = counts.sample_ids().iter().find(|s| !metadata.has_sample(s)) {
            return Err(MetricsError::SampleMismatch(format!(
                "Sample '{}' has no metadata row",
                missing
            )));
        }
        let metadata = metadata.align_to(counts.sample_ids())?;
        Ok(Self { counts, metadata })
    }

    /// Load an abundance TSV and a metadata TSV into an experiment.
    pub fn from_tsv<P: AsRef<Path>, Q: AsRef<Path>>(table: P, map: Q) -> Result<Self> {
        let counts = AbundanceMatrix::from_tsv(table)?;
        let metadata = Metadata::from_tsv(map)?;
        Self::new(counts, metadata)
    }

    pub fn counts(&self) -> &AbundanceMatrix {
        &self.counts
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn sample_ids(&self) -> &[String] {
        self.counts.sample_ids()
    }

    pub fn feature_ids(&self) -> &[String] {
        self.counts.feature_ids()
    }

    pub fn n_samples(&self) -> usize {
        self.counts.n_samples()
    }

    pub fn n_features(&self) -> usize {
        self.counts.n_features()
    }

    /// Replace the abundance values, keeping the same samples.
    pub fn with_counts(&self, counts: AbundanceMatrix) -> Result<Self> {
        if counts.sample_ids() != self.sample_ids() {
            return Err(MetricsError::SampleMismatch(
                "Replacement matrix has different samples".to_string(),
            ));
        }
        Ok(Self {
            counts,
            metadata: self.metadata.clone(),
        })
    }

    /// Labels of one metadata field for every sample, in sample order.
    pub fn labels(&self, field: &str) -> Result<Vec<String>> {
        self.sample_ids()
            .iter()
            .map(|sid| self.metadata.label(sid, field))
            .collect()
    }

    /// Partition samples by the value of a metadata field.
    ///
    /// Partitions come back in the order their value is first encountered.
    pub fn iterate(&self, field: &str) -> Result<Vec<(String, Experiment)>> {
        let labels = self.labels(field)?;

        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, label) in labels.into_iter().enumerate() {
            groups
                .entry(label.clone())
                .or_insert_with(|| {
                    order.push(label);
                    Vec::new()
                })
                .push(idx);
        }

        order
            .into_iter()
            .map(|value| {
                let indices = &groups[&value];
                let part = self.subset_sample_indices(indices)?;
                Ok((value, part))
            })
            .collect()
    }

    /// Keep only features whose total abundance is strictly positive.
    pub fn filter_sum_abundance_strict(&self) -> Result<Self> {
        Ok(Self {
            counts: filter_sum_abundance(&self.counts, 0.0, true)?,
            metadata: self.metadata.clone(),
        })
    }

    /// Keep the listed features that exist in this experiment.
    ///
    /// The experiment's own feature order is preserved; unknown ids are ignored.
    pub fn filter_feature_ids<S: AsRef<str>>(&self, ids: &[S]) -> Result<Self> {
        let wanted: HashSet<&str> = ids.iter().map(|s| s.as_ref()).collect();
        let keep: Vec<usize> = self
            .feature_ids()
            .iter()
            .enumerate()
            .filter(|(_, id)| wanted.contains(id.as_str()))
            .map(|(i, _)| i)
            .collect();
        self.subset_feature_indices(&keep)
    }

    /// Keep (or with `negate`, drop) the listed samples.
    pub fn filter_sample_ids<S: AsRef<str>>(&self, ids: &[S], negate: bool) -> Result<Self> {
        let listed: HashSet<&str> = ids.iter().map(|s| s.as_ref()).collect();
        let keep: Vec<usize> = self
            .sample_ids()
            .iter()
            .enumerate()
            .filter(|(_, id)| listed.contains(id.as_str()) != negate)
            .map(|(i, _)| i)
            .collect();
        self.subset_sample_indices(&keep)
    }

    /// Randomly keep exactly `keep` samples, preserving their original order.
    pub fn downsample<R: Rng + ?Sized>(&self, keep: usize, rng: &mut R) -> Result<Self> {
        if keep > self.n_samples() {
            return Err(MetricsError::InvalidParameter(format!(
                "Cannot keep {} of {} samples",
                keep,
                self.n_samples()
            )));
        }
        let mut chosen = index::sample(rng, self.n_samples(), keep).into_vec();
        chosen.sort_unstable();
        self.subset_sample_indices(&chosen)
    }

    /// Randomly permute the values of one metadata field across samples.
    ///
    /// Abundances, sample ids and all other fields are untouched.
    pub fn shuffle_labels<R: Rng + ?Sized>(&self, field: &str, rng: &mut R) -> Result<Self> {
        let mut values: Vec<Variable> = self
            .metadata
            .column(field)?
            .into_iter()
            .cloned()
            .collect();
        values.shuffle(rng);
        Ok(Self {
            counts: self.counts.clone(),
            metadata: self.metadata.with_column_values(field, values)?,
        })
    }

    fn subset_feature_indices(&self, indices: &[usize]) -> Result<Self> {
        Ok(Self {
            counts: self.counts.subset_features(indices)?,
            metadata: self.metadata.clone(),
        })
    }

    fn subset_sample_indices(&self, indices: &[usize]) -> Result<Self> {
        let counts = self.counts.subset_samples(indices)?;
        let metadata = self.metadata.subset_samples(counts.sample_ids())?;
        Ok(Self { counts, metadata })
    }
}
