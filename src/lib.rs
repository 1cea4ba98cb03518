//! # workload-kernel
//!
//! Deterministic job clustering, chunked workload partitioning and atomic
//! compressed state persistence.
//!
//! The kernel answers two scheduling questions and one storage question:
//!
//! > How should `[0, count)` be cut into bounded units of work?
//! > Which units should run together so no group exceeds its capacity?
//! > How is accumulated state written so a reader never sees half of it?
//!
//! ## Architecture
//!
//! ```text
//! [0, count) → slice_chunks → Job<IndexRange> → cluster_jobs → Vec<Cluster> → dispatcher
//!                                                                   ↓
//!                                              results → StateStore::save / load
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Same count + same max chunk size → identical chunks
//! - Same jobs in the same order + same target weight → identical clusters
//! - Equal weights are broken by input order (later input taken first)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod policy;
pub mod chunker;
pub mod clusterer;
pub mod planner;
pub mod store;

// Re-exports
pub use types::{Job, Weighted, Cluster, IndexRange};
pub use policy::ClusterPolicy;
pub use chunker::{slice_chunks, grouper, ChunkSlices, Grouper};
pub use clusterer::{cluster_jobs, ClusterError};
pub use planner::{WorkloadPlanner, ClusterPlan, ClusterRegistry, ClusterRegistryEntry};
pub use store::{
    StateStore, StoreError, RemapTable, TypeRegistry, TypeName, Persist, Typed,
    ARCHIVE_FORMAT, ARCHIVE_VERSION,
};

/// Default policy version identifier.
pub const DEFAULT_POLICY_VERSION: &str = "cluster_policy_v1";
