//! Cluster types: groups of jobs dispatched together.

use serde::{Deserialize, Serialize};

use super::job::Weighted;

/// A group of jobs assigned to run together.
///
/// `total_weight` never exceeds the target capacity used to build the
/// cluster, except for a singleton whose only job is already oversized.
/// Jobs are kept in the order they were added: the seed (largest) first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster<J> {
    jobs: Vec<J>,
    total_weight: f64,
}

impl<J: Weighted> Cluster<J> {
    /// Start a cluster from its seed job.
    pub(crate) fn seed(job: J) -> Self {
        let total_weight = job.weight();
        Self {
            jobs: vec![job],
            total_weight,
        }
    }

    /// Add a job, accumulating its weight.
    pub(crate) fn push(&mut self, job: J) {
        self.total_weight += job.weight();
        self.jobs.push(job);
    }

    /// Check whether adding `weight` keeps the cluster within `capacity`.
    pub(crate) fn fits(&self, weight: f64, capacity: f64) -> bool {
        self.total_weight + weight <= capacity
    }
}

impl<J> Cluster<J> {
    /// Member jobs, seed first.
    pub fn jobs(&self) -> &[J] {
        &self.jobs
    }

    /// Sum of member weights.
    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// Number of member jobs.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Always false for clusters produced by `cluster_jobs`.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Check if the cluster holds exactly one job.
    pub fn is_singleton(&self) -> bool {
        self.jobs.len() == 1
    }

    /// Consume the cluster, handing its jobs to the dispatcher.
    pub fn into_jobs(self) -> Vec<J> {
        self.jobs
    }
}

impl<J> IntoIterator for Cluster<J> {
    type Item = J;
    type IntoIter = std::vec::IntoIter<J>;

    fn into_iter(self) -> Self::IntoIter {
        self.jobs.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Job;

    #[test]
    fn test_cluster_accumulates_weight() {
        let mut cluster = Cluster::seed(Job::new(4.0, 'a').unwrap());
        assert!(cluster.is_singleton());
        assert!(cluster.fits(6.0, 10.0));
        assert!(!cluster.fits(6.5, 10.0));

        cluster.push(Job::new(6.0, 'b').unwrap());
        assert_eq!(cluster.len(), 2);
        assert_eq!(cluster.total_weight(), 10.0);

        let payloads: Vec<char> = cluster.into_iter().map(Job::into_payload).collect();
        assert_eq!(payloads, vec!['a', 'b']);
    }
}
