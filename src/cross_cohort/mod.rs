//! Cross-cohort generalization of disease/healthy classifiers.

mod evaluate;
mod matrix;

pub use evaluate::{cohort_label, cross_cohort_performance, evaluate, self_train_size};
pub use matrix::{CrossCohortResult, PerformanceMatrix};
