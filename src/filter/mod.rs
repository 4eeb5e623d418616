//! Feature and sample filtering.

pub mod abundance;
pub mod library_size;

pub use abundance::filter_sum_abundance;
pub use library_size::filter_library_size;
