use ndarray::{Array2, ArrayView1, ArrayView2};

use super::LossFn;
use crate::{MlErr, Result};

/// Softmax cross entropy over raw scores, averaged over the batch.
#[derive(Debug, Default, Clone, Copy)]
pub struct CrossEntropy;

impl CrossEntropy {
    /// Returns a new `CrossEntropy`.
    pub fn new() -> Self {
        Self
    }

    /// Row-wise softmax, shifted by each row's max so large scores do not overflow.
    pub fn softmax(logits: ArrayView2<f32>) -> Array2<f32> {
        let mut probs = logits.to_owned();

        for mut row in probs.rows_mut() {
            let max = row_max(row.view());
            row.mapv_inplace(|z| (z - max).exp());
            let sum = row.sum();
            row /= sum;
        }

        probs
    }

    fn check(logits: ArrayView2<f32>, labels: &[usize]) -> Result<()> {
        if logits.nrows() != labels.len() {
            return Err(MlErr::SizeMismatch {
                what: "batch labels",
                got: labels.len(),
                expected: logits.nrows(),
            });
        }

        if logits.is_empty() {
            return Err(MlErr::InvalidInput("empty batch"));
        }

        let classes = logits.ncols();
        if let Some(&label) = labels.iter().find(|&&label| label >= classes) {
            return Err(MlErr::LabelOutOfRange { label, classes });
        }

        Ok(())
    }
}

fn row_max(row: ArrayView1<f32>) -> f32 {
    row.fold(f32::NEG_INFINITY, |max, &z| max.max(z))
}

impl LossFn for CrossEntropy {
    fn loss(&self, logits: ArrayView2<f32>, labels: &[usize]) -> Result<f32> {
        Self::check(logits, labels)?;

        // -log(softmax(z)[y]) = logsumexp(z) - z[y]
        let total: f32 = logits
            .rows()
            .into_iter()
            .zip(labels)
            .map(|(row, &label)| {
                let max = row_max(row);
                let lse = max + row.mapv(|z| (z - max).exp()).sum().ln();
                lse - row[label]
            })
            .sum();

        Ok(total / labels.len() as f32)
    }

    fn loss_prime(&self, logits: ArrayView2<f32>, labels: &[usize]) -> Result<Array2<f32>> {
        Self::check(logits, labels)?;

        let mut d = Self::softmax(logits);
        for (mut row, &label) in d.rows_mut().into_iter().zip(labels) {
            row[label] -= 1.;
        }

        d /= labels.len() as f32;
        Ok(d)
    }
}
