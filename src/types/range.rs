//! Index range types for chunked workloads.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Contiguous half-open range `[start, stop)` over an index space.
///
/// Implements `Ord` for deterministic ordering: (start, stop).
/// `stop >= start` always holds; deserializing an inverted range fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawIndexRange")]
pub struct IndexRange {
    start: usize,
    stop: usize,
}

#[derive(Deserialize)]
struct RawIndexRange {
    start: usize,
    stop: usize,
}

impl TryFrom<RawIndexRange> for IndexRange {
    type Error = String;

    fn try_from(raw: RawIndexRange) -> Result<Self, Self::Error> {
        if raw.stop < raw.start {
            return Err(format!("inverted index range [{}, {})", raw.start, raw.stop));
        }
        Ok(Self {
            start: raw.start,
            stop: raw.stop,
        })
    }
}

impl IndexRange {
    /// Create a new range. `stop` is clamped so it is never below `start`.
    pub fn new(start: usize, stop: usize) -> Self {
        Self {
            start,
            stop: stop.max(start),
        }
    }

    /// First index covered by the range.
    pub fn start(&self) -> usize {
        self.start
    }

    /// One past the last index covered by the range.
    pub fn stop(&self) -> usize {
        self.stop
    }

    /// Number of indices in the range.
    pub fn len(&self) -> usize {
        self.stop.saturating_sub(self.start)
    }

    /// Check if the range covers no indices.
    pub fn is_empty(&self) -> bool {
        self.start == self.stop
    }

    /// Check if `index` lies inside the range.
    pub fn contains(&self, index: usize) -> bool {
        self.start <= index && index < self.stop
    }

    /// Convert into a standard library range, e.g. for slicing arrays.
    pub fn as_range(&self) -> Range<usize> {
        self.start..self.stop
    }
}

impl From<IndexRange> for Range<usize> {
    fn from(range: IndexRange) -> Self {
        range.as_range()
    }
}

impl From<Range<usize>> for IndexRange {
    fn from(range: Range<usize>) -> Self {
        Self::new(range.start, range.end)
    }
}

impl fmt::Display for IndexRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.stop)
    }
}
