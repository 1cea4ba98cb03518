//! Greedy job clustering.
//!
//! Packs indivisible weighted jobs into clusters bounded by a target
//! weight, aiming for few clusters without searching for an optimum.

use tracing::debug;

use crate::types::job::validate_weight;
use crate::types::{Cluster, Weighted};

/// Error type for chunking, clustering and policy validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClusterError {
    /// A size, capacity or weight argument was out of range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Partition `jobs` into clusters whose total weight stays within
/// `target_weight`.
///
/// Every job lands in exactly one cluster. A job whose weight alone
/// reaches `target_weight` is emitted as a singleton and never combined
/// with anything else.
///
/// ## Algorithm
///
/// 1. Stable-sort jobs ascending by weight
/// 2. Emit every job with `weight >= target_weight` alone, largest first
/// 3. While jobs remain:
///    - Take the largest remaining job as the cluster seed
///    - Scan the rest from largest to smallest, adding each job that
///      keeps the total within `target_weight`
///    - Emit the cluster
///
/// Among equal weights the job appearing later in the input is taken
/// first, so the output is fully determined by the input order.
///
/// # Errors
///
/// `InvalidArgument` if `target_weight` is not a finite positive number or
/// any job weight is negative or not finite. No clusters are produced in
/// that case.
pub fn cluster_jobs<J, I>(jobs: I, target_weight: f64) -> Result<Vec<Cluster<J>>, ClusterError>
where
    J: Weighted,
    I: IntoIterator<Item = J>,
{
    if !(target_weight.is_finite() && target_weight > 0.0) {
        return Err(ClusterError::InvalidArgument(format!(
            "target_weight must be finite and positive, got {target_weight}"
        )));
    }

    let mut pool: Vec<J> = jobs.into_iter().collect();
    for job in &pool {
        validate_weight(job.weight())?;
    }
    let job_count = pool.len();

    // Stable: equal weights keep input order.
    pool.sort_by(|a, b| a.weight().total_cmp(&b.weight()));

    let split = pool.partition_point(|job| job.weight() < target_weight);
    let oversized = pool.split_off(split);
    let oversized_count = oversized.len();

    let mut clusters: Vec<Cluster<J>> = oversized.into_iter().rev().map(Cluster::seed).collect();

    while let Some(seed) = pool.pop() {
        let mut cluster = Cluster::seed(seed);
        let mut kept = Vec::with_capacity(pool.len());

        for job in pool.drain(..).rev() {
            if cluster.fits(job.weight(), target_weight) {
                cluster.push(job);
            } else {
                kept.push(job);
            }
        }

        // Back to ascending order for the next pass.
        kept.reverse();
        pool = kept;
        clusters.push(cluster);
    }

    debug!(
        jobs = job_count,
        clusters = clusters.len(),
        oversized = oversized_count,
        target_weight,
        "Clustered jobs"
    );

    Ok(clusters)
}
