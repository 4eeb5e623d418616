//! Cross-cohort classifier performance and dysbiosis index for microbiome
//! experiments.
//!
//! # Overview
//!
//! - **data**: Core data structures (AbundanceMatrix, Metadata, Experiment, MarkerTable)
//! - **filter**: Feature and sample filtering (strict sum filter, library size)
//! - **normalize**: Total sum scaling and rank transform
//! - **classify**: Classifier trait, random forest, ROC-AUC and balanced accuracy
//! - **cross_cohort**: Train-on-one, test-on-another performance matrices
//! - **dysbiosis**: Marker-based dysbiosis index (binary, frequency, rank)
//! - **config**: Serializable run configuration
//!
//! # Example
//!
//! ```no_run
//! use cohort_metrics::prelude::*;
//!
//! let exp = Experiment::from_tsv("table.tsv", "map.tsv").unwrap();
//! let config = CrossCohortConfig::default().with_seed(42);
//! let result = cross_cohort_performance(&exp, &config).unwrap();
//! result.write("meta_analysis").unwrap();
//!
//! let markers = MarkerTable::from_lists(&["TACGGAG"], &["TACGTAG"]).unwrap();
//! let scores = dbi_rank(&exp, &markers).unwrap();
//! scores.to_tsv("dysbiosis.tsv").unwrap();
//! ```

pub mod classify;
pub mod config;
pub mod cross_cohort;
pub mod data;
pub mod dysbiosis;
pub mod error;
pub mod filter;
pub mod normalize;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::classify::{
        balanced_accuracy, roc_auc, ClassLevels, Classifier, ForestConfig, ForestModel,
        Predictions, RandomForest,
    };
    pub use crate::config::{CrossCohortConfig, Verbosity};
    pub use crate::cross_cohort::{
        cohort_label, cross_cohort_performance, evaluate, CrossCohortResult, PerformanceMatrix,
    };
    pub use crate::data::{AbundanceMatrix, Direction, Experiment, MarkerTable, Metadata, Variable};
    pub use crate::dysbiosis::{
        dbi_binary, dbi_frequency, dbi_rank, dysbiosis_index, dysbiosis_score, DysbiosisMethod,
        DysbiosisResult,
    };
    pub use crate::error::{MetricsError, Result};
    pub use crate::filter::{filter_library_size, filter_sum_abundance};
    pub use crate::normalize::{average_ranks, norm_tss, rank_transform};
}
