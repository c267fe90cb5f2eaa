use std::{num::NonZeroUsize, ops::Range, sync::Arc};

use super::{BatchRef, Dataset, ShardSpec, shard_range};

/// Shard-aware loader producing borrowed batches, in dataset order.
///
/// The dataset is shared so every replica can hold a loader over the same samples.
#[derive(Debug, Clone)]
pub struct DataLoader {
    dataset: Arc<Dataset>,
    shard: ShardSpec,
    shard_range: Range<usize>,
    batch_size: NonZeroUsize,
}

impl DataLoader {
    pub fn new(dataset: Arc<Dataset>, shard: ShardSpec, batch_size: NonZeroUsize) -> Self {
        let shard_range = shard.range(dataset.len());

        Self {
            dataset,
            shard,
            shard_range,
            batch_size,
        }
    }

    #[inline]
    pub fn shard(&self) -> ShardSpec {
        self.shard
    }

    #[inline]
    pub fn shard_range(&self) -> Range<usize> {
        self.shard_range.clone()
    }

    #[inline]
    pub fn batch_size(&self) -> NonZeroUsize {
        self.batch_size
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// The amount of samples in this loader's shard.
    #[inline]
    pub fn len(&self) -> usize {
        self.shard_range.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.shard_range.is_empty()
    }

    /// The amount of batches a pass yields, counting the last partial one.
    pub fn num_batches(&self) -> usize {
        self.len().div_ceil(self.batch_size.get())
    }

    /// The amount of batches a pass over the largest shard of the dataset yields.
    ///
    /// Replicas that average their gradients every step must all take this many steps, even
    /// when their own shard runs out one batch earlier.
    pub fn lockstep_batches(&self) -> usize {
        let largest = shard_range(self.dataset.len(), 0, self.shard.num_workers()).len();
        largest.div_ceil(self.batch_size.get())
    }

    /// Starts a new pass over the shard.
    pub fn batches(&self) -> Batches<'_> {
        Batches {
            dataset: &self.dataset,
            cursor: self.shard_range.start,
            end: self.shard_range.end,
            batch_size: self.batch_size.get(),
        }
    }
}

impl<'a> IntoIterator for &'a DataLoader {
    type Item = BatchRef<'a>;
    type IntoIter = Batches<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.batches()
    }
}

/// One pass over a loader's shard.
#[derive(Debug, Clone)]
pub struct Batches<'a> {
    dataset: &'a Dataset,
    cursor: usize, // absolute index in dataset
    end: usize,
    batch_size: usize,
}

impl<'a> Iterator for Batches<'a> {
    type Item = BatchRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.end {
            return None;
        }

        let stop = (self.cursor + self.batch_size).min(self.end);
        let batch = self.dataset.slice(self.cursor..stop);

        self.cursor = stop;
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = (self.end.saturating_sub(self.cursor)).div_ceil(self.batch_size);
        (n, Some(n))
    }
}

impl ExactSizeIterator for Batches<'_> {}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    fn n(v: usize) -> NonZeroUsize {
        NonZeroUsize::new(v).unwrap()
    }

    #[test]
    fn dataloader_borrowed_batches_respect_shard_and_batch_size() {
        let ds = Dataset::from_flat(
            (0..10).map(|i| i as f32).collect(),
            1,
            (0..10).map(|i| i + 100).collect(),
        )
        .unwrap();

        let shard = ShardSpec::new(1, n(3)).unwrap(); // 4..7
        let dl = DataLoader::new(Arc::new(ds), shard, n(2));

        assert_eq!(dl.shard_range(), 4..7);
        assert_eq!(dl.len(), 3);
        assert_eq!(dl.num_batches(), 2);

        let mut batches = dl.batches();
        assert_eq!(batches.len(), 2);

        let b1 = batches.next().unwrap();
        assert_eq!(b1.xs, array![[4.], [5.]]);
        assert_eq!(b1.labels, &[104, 105]);

        let b2 = batches.next().unwrap();
        assert_eq!(b2.xs, array![[6.]]);
        assert_eq!(b2.labels, &[106]);

        assert!(batches.next().is_none());

        // a new pass starts over
        let b3 = dl.batches().next().unwrap();
        assert_eq!(b3.labels, &[104, 105]);
    }

    #[test]
    fn empty_shard_yields_nothing() {
        let ds = Dataset::from_flat(vec![0., 1.], 1, vec![0, 1]).unwrap();
        let dl = DataLoader::new(Arc::new(ds), ShardSpec::new(2, n(3)).unwrap(), n(4));

        assert!(dl.is_empty());
        assert_eq!((&dl).into_iter().count(), 0);
        assert_eq!(dl.lockstep_batches(), 1);
    }

    #[test]
    fn lockstep_batches_follow_the_largest_shard() {
        let ds = Arc::new(Dataset::from_flat(vec![0.; 9], 1, vec![0; 9]).unwrap());

        // shards of 5 and 4 samples
        let first = DataLoader::new(Arc::clone(&ds), ShardSpec::new(0, n(2)).unwrap(), n(2));
        let second = DataLoader::new(ds, ShardSpec::new(1, n(2)).unwrap(), n(2));

        assert_eq!(first.num_batches(), 3);
        assert_eq!(second.num_batches(), 2);
        assert_eq!(first.lockstep_batches(), 3);
        assert_eq!(second.lockstep_batches(), 3);
    }
}
