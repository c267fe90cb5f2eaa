use std::{num::NonZeroUsize, ops::Range};

use crate::{MlErr, Result};

/// Splits `total` samples among `num_workers` and returns the shard for `worker_id`.
///
/// Properties:
/// - Ranges are contiguous, disjoint and cover `[0..total)`.
/// - Sizes differ by at most 1 (balanced partition).
///
/// A `worker_id` past the last worker gets an empty range at the end.
pub fn shard_range(total: usize, worker_id: usize, num_workers: NonZeroUsize) -> Range<usize> {
    if worker_id >= num_workers.get() {
        return total..total;
    }

    let base = total / num_workers;
    let rem = total % num_workers;

    let start = worker_id * base + worker_id.min(rem);
    let extra = usize::from(worker_id < rem);
    let end = start + base + extra;

    start..end
}

/// The slice of the dataset a replica is responsible for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardSpec {
    worker_id: usize,
    num_workers: NonZeroUsize,
}

impl ShardSpec {
    /// # Errors
    /// `MlErr::InvalidInput` if `worker_id` is not smaller than `num_workers`.
    pub fn new(worker_id: usize, num_workers: NonZeroUsize) -> Result<Self> {
        if worker_id >= num_workers.get() {
            return Err(MlErr::InvalidInput("worker id out of range"));
        }

        Ok(Self {
            worker_id,
            num_workers,
        })
    }

    /// The whole dataset, for a single worker.
    pub fn full() -> Self {
        Self {
            worker_id: 0,
            num_workers: NonZeroUsize::MIN,
        }
    }

    #[inline]
    pub fn worker_id(self) -> usize {
        self.worker_id
    }

    #[inline]
    pub fn num_workers(self) -> NonZeroUsize {
        self.num_workers
    }

    #[inline]
    pub fn range(self, total: usize) -> Range<usize> {
        shard_range(total, self.worker_id, self.num_workers)
    }
}
