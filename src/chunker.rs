//! Chunked workload partitioning.
//!
//! Splits a fixed-size index space into contiguous chunks of bounded,
//! as-equal-as-possible size, so that one large homogeneous array
//! computation becomes several bounded units of work.
//!
//! ## Algorithm
//!
//! ```text
//! chunk_count = ceil(count / max_chunk_size)
//! chunk_size  = ceil(count / chunk_count)
//! chunk i     = [i * chunk_size, min(count, (i + 1) * chunk_size))
//! ```
//!
//! Re-deriving `chunk_size` from `chunk_count` spreads the remainder over
//! the chunks instead of leaving one small tail chunk.

use std::iter::FusedIterator;

use crate::clusterer::ClusterError;
use crate::types::IndexRange;

/// Lazy, restartable sequence of chunks produced by [`slice_chunks`].
///
/// Cloning the iterator restarts the sequence from its current position;
/// calling [`slice_chunks`] again recomputes it from scratch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSlices {
    count: usize,
    chunk_size: usize,
    chunk_count: usize,
    next: usize,
}

impl ChunkSlices {
    /// Size of every chunk except possibly the last, which may be shorter.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Total number of chunks in the full sequence.
    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    fn chunk(&self, i: usize) -> IndexRange {
        // i < chunk_count keeps i * chunk_size below count
        let start = i * self.chunk_size;
        IndexRange::new(start, self.count.min(start.saturating_add(self.chunk_size)))
    }
}

impl Iterator for ChunkSlices {
    type Item = IndexRange;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.chunk_count {
            return None;
        }
        let range = self.chunk(self.next);
        self.next += 1;
        Some(range)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.chunk_count - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ChunkSlices {}

impl FusedIterator for ChunkSlices {}

/// Split `[0, count)` into equal-sized contiguous chunks of at most
/// `max_chunk_size` indices.
///
/// The chunks tile the index space exactly. `count == 0` yields nothing;
/// `max_chunk_size >= count` yields a single chunk.
///
/// # Errors
///
/// `InvalidArgument` if `max_chunk_size` is zero.
pub fn slice_chunks(count: usize, max_chunk_size: usize) -> Result<ChunkSlices, ClusterError> {
    if max_chunk_size == 0 {
        return Err(ClusterError::InvalidArgument(
            "max_chunk_size must be positive".to_string(),
        ));
    }

    let chunk_count = count.div_ceil(max_chunk_size);
    // chunk_size <= max_chunk_size and (chunk_count - 1) * chunk_size < count,
    // so no chunk is ever empty.
    let chunk_size = if chunk_count == 0 { 0 } else { count.div_ceil(chunk_count) };

    Ok(ChunkSlices {
        count,
        chunk_size,
        chunk_count,
        next: 0,
    })
}

/// Batches an iterator into `Vec`s of at most `size` items.
#[derive(Debug, Clone)]
pub struct Grouper<I> {
    inner: I,
    size: usize,
}

impl<I: Iterator> Iterator for Grouper<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let group: Vec<_> = self.inner.by_ref().take(self.size).collect();
        if group.is_empty() {
            None
        } else {
            Some(group)
        }
    }
}

/// Group consecutive items of `iter` into batches of `size`.
///
/// Every batch except the last holds exactly `size` items.
///
/// # Errors
///
/// `InvalidArgument` if `size` is zero.
pub fn grouper<I: IntoIterator>(iter: I, size: usize) -> Result<Grouper<I::IntoIter>, ClusterError> {
    if size == 0 {
        return Err(ClusterError::InvalidArgument(
            "group size must be positive".to_string(),
        ));
    }
    Ok(Grouper {
        inner: iter.into_iter(),
        size,
    })
}
