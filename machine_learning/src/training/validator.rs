use log::info;
use ndarray::ArrayView1;

use crate::{MlErr, Parameters, Result, arch::Model, arch::loss::LossFn, dataset::DataLoader};

/// The outcome of a validation pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Validation {
    /// The mean of the per batch losses.
    pub loss: f32,
    pub correct: usize,
    pub total: usize,
}

impl Validation {
    /// The fraction of correctly classified samples, in `[0, 1]`.
    pub fn accuracy(&self) -> f32 {
        if self.total == 0 {
            return 0.;
        }

        self.correct as f32 / self.total as f32
    }
}

/// The index of the largest value, the first one on ties.
pub fn argmax(row: ArrayView1<f32>) -> Option<usize> {
    row.iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, max)) if max >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Evaluates the model on `loader` without touching its parameters.
///
/// # Errors
/// `MlErr::EmptyPass` if the loader yields no batches.
pub fn validate_epoch<M, L>(
    loader: &DataLoader,
    model: &mut M,
    params: &Parameters,
    loss_fn: &L,
) -> Result<Validation>
where
    M: Model,
    L: LossFn,
{
    let mut total_loss = 0.0;
    let mut batches = 0;
    let mut correct = 0;
    let mut total = 0;

    for batch in loader {
        let y_pred = model.forward(params.values(), batch.xs)?;
        total_loss += loss_fn.loss(y_pred, batch.labels)?;

        correct += y_pred
            .rows()
            .into_iter()
            .zip(batch.labels)
            .filter(|(row, label)| argmax(row.view()) == Some(**label))
            .count();

        total += batch.len();
        batches += 1;
    }

    if batches == 0 {
        return Err(MlErr::EmptyPass("validation"));
    }

    let validation = Validation {
        loss: total_loss / batches as f32,
        correct,
        total,
    };

    info!(
        "Test Error: Accuracy: {:>0.1}%, Avg loss: {:>8.6}",
        100. * validation.accuracy(),
        validation.loss
    );

    Ok(validation)
}

#[cfg(test)]
mod tests {
    use std::{num::NonZeroUsize, sync::Arc};

    use ndarray::{Array2, array};

    use super::*;
    use crate::{
        arch::{Sequential, loss::CrossEntropy},
        dataset::{Dataset, ShardSpec},
    };

    fn loader(dataset: Dataset) -> DataLoader {
        DataLoader::new(Arc::new(dataset), ShardSpec::full(), NonZeroUsize::new(2).unwrap())
    }

    #[test]
    fn argmax_prefers_the_first_max() {
        assert_eq!(argmax(array![0., 3., 3., 1.].view()), Some(1));
        assert_eq!(argmax(array![-2.].view()), Some(0));
        assert_eq!(argmax(ArrayView1::from(&[] as &[f32])), None);
    }

    #[test]
    fn counts_correct_predictions_without_mutating() {
        // identity 2 -> 2, so the prediction is the larger input feature
        let mut model = Sequential::feedforward(&[2, 2], None).unwrap();
        let params = Parameters::new(model.layout(), vec![1., 0., 0., 1., 0., 0.]).unwrap();
        let before = params.clone();

        let dataset = Dataset::new(
            array![[1., 0.], [0., 1.], [1., 0.], [0.2, 0.1], [0., 1.]],
            vec![0, 1, 1, 0, 0],
        )
        .unwrap();
        let loader = loader(dataset);

        let first = validate_epoch(&loader, &mut model, &params, &CrossEntropy).unwrap();
        let second = validate_epoch(&loader, &mut model, &params, &CrossEntropy).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.correct, 3);
        assert_eq!(first.total, 5);
        assert!((first.accuracy() - 0.6).abs() < 1e-6);
        assert!(first.loss.is_finite());
        assert_eq!(params, before);
    }

    #[test]
    fn empty_validation_is_an_error() {
        let mut model = Sequential::feedforward(&[2, 2], None).unwrap();
        let params = Parameters::new(model.layout(), vec![0.; 6]).unwrap();
        let loader = loader(Dataset::new(Array2::zeros((0, 2)), vec![]).unwrap());

        assert!(matches!(
            validate_epoch(&loader, &mut model, &params, &CrossEntropy),
            Err(MlErr::EmptyPass(_))
        ));
    }
}
