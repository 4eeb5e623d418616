//! Data structures for microbiome experiments.

mod abundance_matrix;
mod experiment;
mod markers;
mod metadata;

pub use abundance_matrix::AbundanceMatrix;
pub use experiment::Experiment;
pub use markers::{Direction, MarkerTable};
pub use metadata::{Metadata, Variable, VariableType};
