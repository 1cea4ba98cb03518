//! ClusterPolicy v1: capacity and chunk bounds for workload planning.
//!
//! Missing fields in a serialized policy fall back to the defaults, so a
//! config file only needs to name what it overrides.

use serde::{Deserialize, Serialize};

use crate::clusterer::ClusterError;
use crate::DEFAULT_POLICY_VERSION;

/// Cluster policy version 1.
///
/// Controls how a workload is chunked and packed into clusters.
///
/// ## Parameters
///
/// - `target_weight`: Capacity of one cluster (sum of job weights)
/// - `max_chunk_size`: Largest number of indices in one chunk of a range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterPolicy {
    /// Policy version identifier.
    pub version: String,
    /// Maximum total weight of one cluster.
    pub target_weight: f64,
    /// Maximum number of indices per chunk.
    pub max_chunk_size: usize,
}

impl ClusterPolicy {
    /// Create a new policy with custom parameters.
    pub fn new(target_weight: f64, max_chunk_size: usize) -> Self {
        Self {
            version: DEFAULT_POLICY_VERSION.to_string(),
            target_weight,
            max_chunk_size,
        }
    }

    /// Get the policy ID.
    pub fn policy_id(&self) -> &str {
        &self.version
    }

    /// Check that the parameters can drive chunking and clustering.
    pub fn validate(&self) -> Result<(), ClusterError> {
        if !(self.target_weight.is_finite() && self.target_weight > 0.0) {
            return Err(ClusterError::InvalidArgument(format!(
                "target_weight must be finite and positive, got {}",
                self.target_weight
            )));
        }
        if self.max_chunk_size == 0 {
            return Err(ClusterError::InvalidArgument(
                "max_chunk_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ClusterPolicy {
    fn default() -> Self {
        Self::new(1.0e6, 1024)
    }
}
