//! Job types: indivisible, weighted units of dispatchable work.

use serde::{Deserialize, Serialize};

use crate::clusterer::ClusterError;

/// Anything carrying a scalar cost estimate that can be clustered.
///
/// Weights must be finite and non-negative; `cluster_jobs` rejects
/// anything else before doing any work.
pub trait Weighted {
    /// Cost/size estimate of this unit of work.
    fn weight(&self) -> f64;
}

/// One unit of dispatchable work.
///
/// The weight is fixed at construction. The payload is owned by the job
/// and never inspected by the clustering algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job<P> {
    weight: f64,
    payload: P,
}

impl<P> Job<P> {
    /// Create a new job.
    ///
    /// Fails with `InvalidArgument` if `weight` is negative, NaN or infinite.
    pub fn new(weight: f64, payload: P) -> Result<Self, ClusterError> {
        validate_weight(weight)?;
        Ok(Self { weight, payload })
    }

    /// Get the job weight.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Borrow the payload.
    pub fn payload(&self) -> &P {
        &self.payload
    }

    /// Consume the job, returning its payload.
    pub fn into_payload(self) -> P {
        self.payload
    }
}

impl<P> Weighted for Job<P> {
    fn weight(&self) -> f64 {
        self.weight
    }
}

impl<W: Weighted + ?Sized> Weighted for &W {
    fn weight(&self) -> f64 {
        (**self).weight()
    }
}

impl<W: Weighted + ?Sized> Weighted for Box<W> {
    fn weight(&self) -> f64 {
        (**self).weight()
    }
}

pub(crate) fn validate_weight(weight: f64) -> Result<(), ClusterError> {
    if weight.is_finite() && weight >= 0.0 {
        Ok(())
    } else {
        Err(ClusterError::InvalidArgument(format!(
            "job weight must be finite and non-negative, got {weight}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_accessors() {
        let job = Job::new(2.5, "payload").unwrap();
        assert_eq!(job.weight(), 2.5);
        assert_eq!(*job.payload(), "payload");
        assert_eq!(job.into_payload(), "payload");
    }

    #[test]
    fn test_zero_weight_allowed() {
        assert!(Job::new(0.0, ()).is_ok());
    }

    #[test]
    fn test_invalid_weights_rejected() {
        for weight in [-1.0, f64::NAN, f64::INFINITY] {
            let err = Job::new(weight, ()).unwrap_err();
            assert!(matches!(err, ClusterError::InvalidArgument(_)));
        }
    }
}
