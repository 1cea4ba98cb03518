//! Workload planning: chunk, weigh and cluster a batch of work.
//!
//! Turns an index range (or an arbitrary list of jobs) into a
//! `ClusterPlan` ready for dispatch, with a registry of per-cluster
//! metadata.
//!
//! ```text
//! [0, count) → slice_chunks → weigh → Job<IndexRange> → cluster_jobs → ClusterPlan
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chunker::slice_chunks;
use crate::clusterer::{cluster_jobs, ClusterError};
use crate::policy::ClusterPolicy;
use crate::types::{Cluster, IndexRange, Job};

/// Metadata for a single cluster in a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterRegistryEntry {
    /// Position of the cluster in the plan.
    pub index: usize,
    /// Number of jobs in the cluster.
    pub job_count: usize,
    /// Sum of job weights.
    pub total_weight: f64,
    /// Whether this is a singleton whose job alone reaches the target weight.
    pub oversized: bool,
}

/// Registry of all clusters in a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterRegistry {
    /// Individual cluster entries.
    pub entries: Vec<ClusterRegistryEntry>,
}

impl ClusterRegistry {
    /// Create a new registry from entries.
    pub fn new(entries: Vec<ClusterRegistryEntry>) -> Self {
        Self { entries }
    }

    /// Number of entries marked oversized.
    pub fn oversized_count(&self) -> usize {
        self.entries.iter().filter(|e| e.oversized).count()
    }
}

/// Result of planning one batch of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterPlan<P> {
    /// Policy the plan was built under.
    pub policy: ClusterPolicy,
    /// Clusters ready for dispatch.
    pub clusters: Vec<Cluster<Job<P>>>,
    /// Per-cluster metadata.
    pub registry: ClusterRegistry,
}

impl<P> ClusterPlan<P> {
    /// Number of clusters.
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    /// Check if the plan has no clusters.
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Total weight across all clusters.
    pub fn total_weight(&self) -> f64 {
        self.clusters.iter().map(Cluster::total_weight).sum()
    }

    /// Consume the plan, handing clusters to the dispatcher.
    pub fn into_clusters(self) -> Vec<Cluster<Job<P>>> {
        self.clusters
    }
}

/// Plans batches of work under a fixed `ClusterPolicy`.
#[derive(Debug, Clone)]
pub struct WorkloadPlanner {
    policy: ClusterPolicy,
}

impl WorkloadPlanner {
    /// Create a planner, validating the policy.
    pub fn new(policy: ClusterPolicy) -> Result<Self, ClusterError> {
        policy.validate()?;
        Ok(Self { policy })
    }

    /// Get the policy being used.
    pub fn policy(&self) -> &ClusterPolicy {
        &self.policy
    }

    /// Chunk `[0, count)`, weigh each chunk and cluster the chunks.
    ///
    /// `weigh` is called once per chunk, in index order.
    pub fn plan_range<F>(&self, count: usize, mut weigh: F) -> Result<ClusterPlan<IndexRange>, ClusterError>
    where
        F: FnMut(IndexRange) -> f64,
    {
        let jobs = slice_chunks(count, self.policy.max_chunk_size)?
            .map(|range| Job::new(weigh(range), range))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(count, chunks = jobs.len(), "Sliced range into chunks");
        self.plan_jobs(jobs)
    }

    /// Cluster an arbitrary set of jobs.
    pub fn plan_jobs<P>(&self, jobs: Vec<Job<P>>) -> Result<ClusterPlan<P>, ClusterError> {
        let target = self.policy.target_weight;
        let clusters = cluster_jobs(jobs, target)?;

        let entries = clusters
            .iter()
            .enumerate()
            .map(|(index, cluster)| ClusterRegistryEntry {
                index,
                job_count: cluster.len(),
                total_weight: cluster.total_weight(),
                oversized: cluster.is_singleton() && cluster.total_weight() >= target,
            })
            .collect();
        let registry = ClusterRegistry::new(entries);

        debug!(
            policy = %self.policy.policy_id(),
            clusters = clusters.len(),
            oversized = registry.oversized_count(),
            "Planned workload"
        );

        Ok(ClusterPlan {
            policy: self.policy.clone(),
            clusters,
            registry,
        })
    }
}
