//! Error types for the cohort-metrics library.

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid abundance value '{value}' at row {row}, column {col}")]
    InvalidAbundance {
        value: String,
        row: usize,
        col: usize,
    },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Duplicate {axis} identifier '{id}'")]
    DuplicateId { axis: &'static str, id: String },

    #[error("Sample ID mismatch: {0}")]
    SampleMismatch(String),

    #[error("Missing column '{0}' in metadata")]
    MissingColumn(String),

    #[error("Sample '{sample}' has no value for '{column}'")]
    MissingValue { sample: String, column: String },

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Only one class present in labels ({0})")]
    SingleClass(String),

    #[error("Feature '{0}' is listed as both up and down marker")]
    MarkerConflict(String),

    #[error("Classifier error: {0}")]
    Classifier(String),
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, MetricsError>;
