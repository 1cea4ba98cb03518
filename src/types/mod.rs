//! Core types for the workload kernel.

pub mod job;
pub mod cluster;
pub mod range;

pub use job::{Job, Weighted};
pub use cluster::Cluster;
pub use range::IndexRange;
