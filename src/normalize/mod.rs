//! Abundance rescaling and transforms.

pub mod rank;
pub mod tss;

pub use rank::{average_ranks, rank_transform};
pub use tss::norm_tss;
