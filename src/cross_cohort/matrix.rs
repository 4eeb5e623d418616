//! Square cohort × cohort performance tables.

use crate::error::{MetricsError, Result};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Metric values indexed by (training cohort, test cohort).
///
/// `None` marks a cell whose metric could not be computed, e.g. because the
/// test set held a single class. It is written as an empty CSV cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceMatrix {
    metric: String,
    labels: Vec<String>,
    values: Vec<Vec<Option<f64>>>,
}

impl PerformanceMatrix {
    /// Create an all-missing matrix for the given cohort labels.
    pub fn new(metric: &str, labels: Vec<String>) -> Self {
        let n = labels.len();
        Self {
            metric: metric.to_string(),
            labels,
            values: vec![vec![None; n]; n],
        }
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }

    /// Row and column labels (identical order).
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn size(&self) -> usize {
        self.labels.len()
    }

    pub fn get(&self, train: usize, test: usize) -> Option<f64> {
        self.values.get(train).and_then(|row| row.get(test)).copied().flatten()
    }

    pub fn set(&mut self, train: usize, test: usize, value: Option<f64>) -> Result<()> {
        let n = self.size();
        let cell = self
            .values
            .get_mut(train)
            .and_then(|row| row.get_mut(test))
            .ok_or_else(|| {
                MetricsError::InvalidParameter(format!(
                    "cell ({}, {}) outside {}x{} matrix",
                    train, test, n, n
                ))
            })?;
        *cell = value;
        Ok(())
    }

    /// Row of values for one training cohort.
    pub fn row(&self, train: usize) -> Option<&[Option<f64>]> {
        self.values.get(train).map(Vec::as_slice)
    }

    /// Number of cells holding the missing marker.
    pub fn n_missing(&self) -> usize {
        self.values.iter().flatten().filter(|v| v.is_none()).count()
    }

    /// Write as CSV: header of cohort labels, then one labeled row per
    /// training cohort.
    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        let mut header = vec![String::new()];
        header.extend(self.labels.iter().cloned());
        csv_writer.write_record(&header)?;

        for (label, row) in self.labels.iter().zip(&self.values) {
            let mut record = vec![label.clone()];
            record.extend(row.iter().map(|v| v.map(|x| x.to_string()).unwrap_or_default()));
            csv_writer.write_record(&record)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path)?;
        self.to_writer(std::io::BufWriter::new(file))
    }
}

impl std::fmt::Display for PerformanceMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let width = self.labels.iter().map(|l| l.len()).max().unwrap_or(0).max(6);
        write!(f, "{:width$}", self.metric, width = width)?;
        for label in &self.labels {
            write!(f, " {:>width$}", label, width = width)?;
        }
        writeln!(f)?;
        for (label, row) in self.labels.iter().zip(&self.values) {
            write!(f, "{:width$}", label, width = width)?;
            for v in row {
                match v {
                    Some(x) => write!(f, " {:>width$.3}", x, width = width)?,
                    None => write!(f, " {:>width$}", "NA", width = width)?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// ROC-AUC and balanced accuracy matrices from one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossCohortResult {
    pub roc: PerformanceMatrix,
    pub accuracy: PerformanceMatrix,
}

impl CrossCohortResult {
    /// Write `<prefix>_roc.csv` and `<prefix>_accuracy.csv`.
    pub fn write(&self, prefix: &str) -> Result<(PathBuf, PathBuf)> {
        let roc_path = PathBuf::from(format!("{}_roc.csv", prefix));
        let accuracy_path = PathBuf::from(format!("{}_accuracy.csv", prefix));
        self.roc.to_csv(&roc_path)?;
        self.accuracy.to_csv(&accuracy_path)?;
        Ok((roc_path, accuracy_path))
    }
}
