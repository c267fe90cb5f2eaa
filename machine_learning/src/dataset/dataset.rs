use std::ops::Range;

use ndarray::{Array2, ArrayView1, ArrayView2, s};

use crate::{MlErr, Result};

/// A single labeled sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample<'a> {
    pub x: ArrayView1<'a, f32>,
    pub label: usize,
}

/// An in-memory classification dataset: one row of features per sample and its class label.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    xs: Array2<f32>,
    labels: Vec<usize>,
}

impl Dataset {
    /// Creates a new dataset from owned buffers.
    ///
    /// # Errors
    /// `MlErr::SizeMismatch` if there is not exactly one label per row.
    pub fn new(xs: Array2<f32>, labels: Vec<usize>) -> Result<Self> {
        if xs.nrows() != labels.len() {
            return Err(MlErr::SizeMismatch {
                what: "dataset labels",
                got: labels.len(),
                expected: xs.nrows(),
            });
        }

        Ok(Self { xs, labels })
    }

    /// Creates a new dataset from a flat row-major buffer of `x_size` features per sample.
    pub fn from_flat(data: Vec<f32>, x_size: usize, labels: Vec<usize>) -> Result<Self> {
        let xs = Array2::from_shape_vec((labels.len(), x_size), data)?;
        Self::new(xs, labels)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// The amount of features per sample.
    #[inline]
    pub fn x_size(&self) -> usize {
        self.xs.ncols()
    }

    pub fn sample(&self, idx: usize) -> Option<Sample<'_>> {
        let label = *self.labels.get(idx)?;
        Some(Sample {
            x: self.xs.row(idx),
            label,
        })
    }

    /// Borrows the samples in `range` as a batch.
    ///
    /// The range is clamped to the dataset's bounds.
    pub fn slice(&self, range: Range<usize>) -> BatchRef<'_> {
        let end = range.end.min(self.len());
        let start = range.start.min(end);

        BatchRef {
            xs: self.xs.slice(s![start..end, ..]),
            labels: &self.labels[start..end],
        }
    }

    #[inline]
    pub fn xs(&self) -> ArrayView2<'_, f32> {
        self.xs.view()
    }

    #[inline]
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }
}

/// Borrowed batch view (zero-copy).
#[derive(Debug, Clone, Copy)]
pub struct BatchRef<'a> {
    pub xs: ArrayView2<'a, f32>,
    pub labels: &'a [usize],
}

impl BatchRef<'_> {
    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn dataset_basic() {
        let ds = Dataset::new(array![[1., 2.], [3., 4.], [5., 6.]], vec![0, 1, 0]).unwrap();
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.x_size(), 2);

        let sample = ds.sample(1).unwrap();
        assert_eq!(sample.x, array![3., 4.]);
        assert_eq!(sample.label, 1);
        assert!(ds.sample(3).is_none());
    }

    #[test]
    fn mismatched_labels_are_rejected() {
        assert!(Dataset::new(array![[1., 2.]], vec![0, 1]).is_err());
        assert!(Dataset::from_flat(vec![1., 2., 3.], 2, vec![0, 1]).is_err());
    }

    #[test]
    fn slice_is_clamped() {
        let ds = Dataset::from_flat((0..8).map(|i| i as f32).collect(), 2, vec![0, 1, 2, 3]).unwrap();

        let batch = ds.slice(2..10);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.xs, array![[4., 5.], [6., 7.]]);
        assert_eq!(batch.labels, &[2, 3]);

        assert!(ds.slice(5..9).is_empty());
    }
}
