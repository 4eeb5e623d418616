//! Sample metadata handling.

use crate::error::{MetricsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// A metadata value that can be categorical or continuous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Variable {
    /// Categorical variable with string levels.
    Categorical(String),
    /// Continuous numeric variable, with the text it was parsed from.
    Continuous { value: f64, raw: String },
    /// Missing value.
    Missing,
}

impl Variable {
    /// Check if this is a missing value.
    pub fn is_missing(&self) -> bool {
        matches!(self, Variable::Missing)
    }

    /// Try to get as categorical string.
    pub fn as_categorical(&self) -> Option<&str> {
        match self {
            Variable::Categorical(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as continuous f64.
    pub fn as_continuous(&self) -> Option<f64> {
        match self {
            Variable::Continuous { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// The value as a label string; `None` for missing values.
    ///
    /// Numeric values keep their text as loaded, so ids such as `01` and `1`
    /// stay distinct.
    pub fn as_label(&self) -> Option<String> {
        match self {
            Variable::Categorical(s) => Some(s.clone()),
            Variable::Continuous { raw, .. } => Some(raw.clone()),
            Variable::Missing => None,
        }
    }
}

/// Type of a metadata column, inferred at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableType {
    Categorical,
    Continuous,
}

fn is_missing_token(raw: &str) -> bool {
    raw.is_empty() || raw == "NA" || raw == "na"
}

/// Sample metadata containing variables for each sample.
#[derive(Debug, Clone)]
pub struct Metadata {
    /// Sample IDs in order.
    sample_ids: Vec<String>,
    /// Column names.
    column_names: Vec<String>,
    /// Data stored as sample_id -> column_name -> Variable.
    data: HashMap<String, HashMap<String, Variable>>,
    /// Inferred type of each column.
    column_types: HashMap<String, VariableType>,
}

impl Metadata {
    /// Create empty metadata.
    pub fn new() -> Self {
        Self {
            sample_ids: Vec::new(),
            column_names: Vec::new(),
            data: HashMap::new(),
            column_types: HashMap::new(),
        }
    }

    /// Load metadata from a TSV file.
    ///
    /// Expected format:
    /// - First row: header with column names (first column is sample ID)
    /// - Subsequent rows: sample ID followed by variable values
    ///
    /// Columns are inferred as continuous if all values parse as numbers,
    /// otherwise categorical. Empty cells and `NA` are missing.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        let header_line = lines
            .next()
            .ok_or_else(|| MetricsError::EmptyData("Empty metadata file".to_string()))??;
        let header: Vec<&str> = header_line.split('\t').collect();
        if header.len() < 2 {
            return Err(MetricsError::EmptyData(
                "Metadata must have at least one variable column".to_string(),
            ));
        }
        let column_names: Vec<String> = header[1..].iter().map(|s| s.trim().to_string()).collect();

        let mut rows: Vec<(String, Vec<String>)> = Vec::new();
        for line_result in lines {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            let values: Vec<String> = fields[1..].iter().map(|s| s.to_string()).collect();
            rows.push((fields[0].trim().to_string(), values));
        }

        Self::from_rows(column_names, rows)
    }

    /// Build metadata from raw string rows, inferring column types.
    pub fn from_rows(column_names: Vec<String>, rows: Vec<(String, Vec<String>)>) -> Result<Self> {
        if rows.is_empty() {
            return Err(MetricsError::EmptyData("No samples in metadata".to_string()));
        }

        let mut column_types = HashMap::new();
        for (col_idx, col_name) in column_names.iter().enumerate() {
            let all_numeric = rows.iter().all(|(_, values)| {
                match values.get(col_idx).map(|v| v.trim()) {
                    None => true,
                    Some(v) => is_missing_token(v) || v.parse::<f64>().is_ok(),
                }
            });
            let var_type = if all_numeric {
                VariableType::Continuous
            } else {
                VariableType::Categorical
            };
            column_types.insert(col_name.clone(), var_type);
        }

        let mut sample_ids = Vec::with_capacity(rows.len());
        let mut data = HashMap::with_capacity(rows.len());

        for (sample_id, values) in rows {
            if data.contains_key(&sample_id) {
                return Err(MetricsError::DuplicateId {
                    axis: "sample",
                    id: sample_id,
                });
            }
            let mut sample_data = HashMap::new();
            for (col_idx, col_name) in column_names.iter().enumerate() {
                let var = match values.get(col_idx).map(|v| v.trim()) {
                    None => Variable::Missing,
                    Some(raw) if is_missing_token(raw) => Variable::Missing,
                    Some(raw) => match column_types.get(col_name) {
                        Some(VariableType::Continuous) => match raw.parse::<f64>() {
                            Ok(value) => Variable::Continuous {
                                value,
                                raw: raw.to_string(),
                            },
                            Err(_) => Variable::Missing,
                        },
                        Some(VariableType::Categorical) | None => {
                            Variable::Categorical(raw.to_string())
                        }
                    },
                };
                sample_data.insert(col_name.clone(), var);
            }
            sample_ids.push(sample_id.clone());
            data.insert(sample_id, sample_data);
        }

        Ok(Self {
            sample_ids,
            column_names,
            data,
            column_types,
        })
    }

    /// Sample IDs in order.
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Column names.
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Number of samples.
    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    /// Number of columns (variables).
    pub fn n_columns(&self) -> usize {
        self.column_names.len()
    }

    /// Get a variable value for a specific sample and column.
    pub fn get(&self, sample_id: &str, column: &str) -> Option<&Variable> {
        self.data.get(sample_id).and_then(|m| m.get(column))
    }

    /// Get a value rendered as a label, failing on missing values.
    pub fn label(&self, sample_id: &str, column: &str) -> Result<String> {
        if !self.has_column(column) {
            return Err(MetricsError::MissingColumn(column.to_string()));
        }
        self.get(sample_id, column)
            .and_then(Variable::as_label)
            .ok_or_else(|| MetricsError::MissingValue {
                sample: sample_id.to_string(),
                column: column.to_string(),
            })
    }

    /// Get all values for a column, in sample order.
    pub fn column(&self, column: &str) -> Result<Vec<&Variable>> {
        if !self.has_column(column) {
            return Err(MetricsError::MissingColumn(column.to_string()));
        }
        Ok(self
            .sample_ids
            .iter()
            .map(|sid| {
                self.data
                    .get(sid)
                    .and_then(|m| m.get(column))
                    .unwrap_or(&Variable::Missing)
            })
            .collect())
    }

    /// Get the type of a column.
    pub fn column_type(&self, column: &str) -> Option<VariableType> {
        self.column_types.get(column).copied()
    }

    /// Get unique non-missing levels of a column, sorted.
    pub fn levels(&self, column: &str) -> Result<Vec<String>> {
        let mut levels: Vec<String> = self
            .column(column)?
            .iter()
            .filter_map(|v| v.as_label())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        levels.sort();
        Ok(levels)
    }

    /// Return a copy with one column's values replaced, given in sample order.
    pub fn with_column_values(&self, column: &str, values: Vec<Variable>) -> Result<Self> {
        if !self.has_column(column) {
            return Err(MetricsError::MissingColumn(column.to_string()));
        }
        if values.len() != self.n_samples() {
            return Err(MetricsError::DimensionMismatch {
                expected: self.n_samples(),
                actual: values.len(),
            });
        }
        let mut result = self.clone();
        for (sid, value) in self.sample_ids.iter().zip(values) {
            if let Some(sample_data) = result.data.get_mut(sid) {
                sample_data.insert(column.to_string(), value);
            }
        }
        Ok(result)
    }

    /// Subset metadata to the specified samples, in the given order.
    pub fn subset_samples(&self, sample_ids: &[String]) -> Result<Self> {
        let mut new_data = HashMap::with_capacity(sample_ids.len());
        let mut new_sample_ids = Vec::with_capacity(sample_ids.len());

        for sid in sample_ids {
            let sample_data = self.data.get(sid).ok_or_else(|| {
                MetricsError::SampleMismatch(format!("Sample '{}' not found in metadata", sid))
            })?;
            new_data.insert(sid.clone(), sample_data.clone());
            new_sample_ids.push(sid.clone());
        }

        Ok(Self {
            sample_ids: new_sample_ids,
            column_names: self.column_names.clone(),
            data: new_data,
            column_types: self.column_types.clone(),
        })
    }

    /// Align metadata to match the sample order in an abundance matrix.
    pub fn align_to(&self, sample_ids: &[String]) -> Result<Self> {
        self.subset_samples(sample_ids)
    }

    /// Check if a sample exists.
    pub fn has_sample(&self, sample_id: &str) -> bool {
        self.data.contains_key(sample_id)
    }

    /// Check if a column exists.
    pub fn has_column(&self, column: &str) -> bool {
        self.column_names.iter().any(|c| c == column)
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::new()
    }
}
