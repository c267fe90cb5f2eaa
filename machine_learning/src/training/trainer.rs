use std::num::NonZeroUsize;

use log::{debug, info};

use super::GradSync;
use crate::{
    MlErr, Parameters, Result, arch::Model, arch::loss::LossFn, dataset::DataLoader,
    optimization::Optimizer,
};

/// What one training pass over a loader saw.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct TrainStats {
    pub batches: usize,
    pub samples: usize,
    /// The mean of the per batch losses.
    pub mean_loss: f32,
}

/// Runs one training pass over `loader`, taking an optimizer step per batch.
///
/// For each batch: forward, loss, backward, gradient sync, optimizer step and finally the
/// gradient is cleared. The pass takes `loader.lockstep_batches()` steps so every replica of a
/// run syncs the same amount of times; once the local shard runs out the remaining steps
/// contribute no samples. Progress is logged every `log_interval` batches.
///
/// # Arguments
/// * `loader` - The batches to train on, in order.
/// * `model` - The model.
/// * `params` - The model's parameters, updated in place.
/// * `loss_fn` - The loss function.
/// * `optimizer` - The update rule.
/// * `sync` - How the gradient is combined with the other replicas' before each step.
/// * `log_interval` - How many batches between progress lines.
///
/// # Errors
/// `MlErr::NonFiniteLoss` as soon as a batch's loss is NaN or infinite, `MlErr::SyncAborted` if
/// another replica failed, along with whatever the model or the loss function fail with.
pub fn train_epoch<M, L, O, S>(
    loader: &DataLoader,
    model: &mut M,
    params: &mut Parameters,
    loss_fn: &L,
    optimizer: &mut O,
    sync: &mut S,
    log_interval: NonZeroUsize,
) -> Result<TrainStats>
where
    M: Model,
    L: LossFn,
    O: Optimizer,
    S: GradSync,
{
    let size = loader.len();
    let batch_size = loader.batch_size().get();
    let mut stats = TrainStats::default();
    let mut total_loss = 0.0;
    let mut batches = loader.batches();

    for step in 0..loader.lockstep_batches() {
        let samples = match batches.next() {
            Some(batch) => {
                let (values, grad) = params.split_grad();
                let y_pred = model.forward(values, batch.xs)?;
                let loss = loss_fn.loss(y_pred, batch.labels)?;

                if !loss.is_finite() {
                    return Err(MlErr::NonFiniteLoss { batch: step, loss });
                }

                let d = loss_fn.loss_prime(y_pred, batch.labels)?;
                model.backward(values, grad, d)?;

                total_loss += loss;
                stats.batches += 1;
                stats.samples += batch.len();

                if step % log_interval == 0 {
                    let current = step * batch_size;
                    info!("loss: {loss:>7.6}  [{current:>5}/{size:>5}]");
                }

                batch.len()
            }
            None => 0,
        };

        let (_, grad) = params.split_grad();
        sync.all_reduce(grad, samples)?;

        params.step(optimizer);
        params.zero_grad();
    }

    if stats.batches > 0 {
        stats.mean_loss = total_loss / stats.batches as f32;
    }

    debug!(batches = stats.batches, samples = stats.samples; "training pass done");
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ndarray::Array2;

    use super::*;
    use crate::{
        ParamLayout,
        arch::{Sequential, activations::ActFn, loss::CrossEntropy},
        dataset::{Dataset, ShardSpec},
        optimization::GradientDescent,
        training::NoSync,
    };

    fn n(v: usize) -> NonZeroUsize {
        NonZeroUsize::new(v).unwrap()
    }

    /// Two separable clusters: class 0 around (1, 0), class 1 around (0, 1).
    fn clusters() -> Dataset {
        let mut data = Vec::new();
        let mut labels = Vec::new();
        for i in 0..20 {
            let jitter = i as f32 * 0.01;
            if i % 2 == 0 {
                data.extend([1. + jitter, jitter]);
                labels.push(0);
            } else {
                data.extend([jitter, 1. + jitter]);
                labels.push(1);
            }
        }
        Dataset::from_flat(data, 2, labels).unwrap()
    }

    fn zeroed(model: &Sequential) -> Parameters {
        let layout: ParamLayout = model.layout();
        let size = layout.size();
        Parameters::new(layout, vec![0.; size]).unwrap()
    }

    #[test]
    fn loss_goes_down_on_separable_data() {
        let loader = DataLoader::new(Arc::new(clusters()), ShardSpec::full(), n(4));
        let mut model = Sequential::feedforward(&[2, 2], None).unwrap();
        let mut params = zeroed(&model);
        let mut optimizer = GradientDescent::new(0.5);

        let first = train_epoch(&loader, &mut model, &mut params, &CrossEntropy, &mut optimizer, &mut NoSync, n(100))
            .unwrap();
        let mut last = first;
        for _ in 0..10 {
            last = train_epoch(&loader, &mut model, &mut params, &CrossEntropy, &mut optimizer, &mut NoSync, n(100))
                .unwrap();
        }

        assert_eq!(first.batches, 5);
        assert_eq!(first.samples, 20);
        assert!(last.mean_loss < first.mean_loss);
        assert!(params.grad().iter().all(|&g| g == 0.));
    }

    #[test]
    fn empty_loader_is_a_no_op() {
        let dataset = Dataset::new(Array2::zeros((0, 2)), vec![]).unwrap();
        let empty = DataLoader::new(Arc::new(dataset), ShardSpec::full(), n(64));

        let mut model = Sequential::feedforward(&[2, 2], Some(ActFn::relu())).unwrap();
        let mut params = zeroed(&model);
        let before = params.clone();

        let stats = train_epoch(&empty, &mut model, &mut params, &CrossEntropy, &mut GradientDescent::new(1.), &mut NoSync, n(1))
            .unwrap();
        assert_eq!(stats, TrainStats::default());
        assert_eq!(params, before);
    }

    #[test]
    fn last_shard_trains_on_its_own_slice() {
        let loader = DataLoader::new(Arc::new(clusters()), ShardSpec::new(3, n(4)).unwrap(), n(2));
        let mut model = Sequential::feedforward(&[2, 2], None).unwrap();
        let mut params = zeroed(&model);

        let stats = train_epoch(&loader, &mut model, &mut params, &CrossEntropy, &mut GradientDescent::new(0.1), &mut NoSync, n(1))
            .unwrap();
        assert_eq!(stats.samples, 5);
        assert_eq!(stats.batches, 3);
        // zeroed weights predict uniformly on the first batch
        assert!(stats.mean_loss <= 2f32.ln());
    }

    /// Records how many samples every step contributed.
    #[derive(Default)]
    struct RecordingSync {
        samples: Vec<usize>,
    }

    impl GradSync for RecordingSync {
        fn all_reduce(&mut self, _grad: &mut [f32], samples: usize) -> Result<()> {
            self.samples.push(samples);
            Ok(())
        }
    }

    #[test]
    fn shorter_shards_keep_stepping_in_lockstep() {
        // 20 samples among 3 workers: shards of 7, 7 and 6
        let loader = DataLoader::new(Arc::new(clusters()), ShardSpec::new(2, n(3)).unwrap(), n(2));
        let mut model = Sequential::feedforward(&[2, 2], None).unwrap();
        let mut params = zeroed(&model);
        let mut sync = RecordingSync::default();

        let stats = train_epoch(&loader, &mut model, &mut params, &CrossEntropy, &mut GradientDescent::new(0.1), &mut sync, n(1))
            .unwrap();

        assert_eq!(sync.samples, vec![2, 2, 2, 0]);
        assert_eq!(stats.batches, 3);
        assert_eq!(stats.samples, 6);
    }

    #[test]
    fn non_finite_loss_aborts() {
        let loader = DataLoader::new(Arc::new(clusters()), ShardSpec::full(), n(4));
        let mut model = Sequential::feedforward(&[2, 2], None).unwrap();
        let layout = model.layout();
        let mut params = Parameters::new(layout, vec![f32::NAN; 6]).unwrap();

        let err = train_epoch(&loader, &mut model, &mut params, &CrossEntropy, &mut GradientDescent::new(0.1), &mut NoSync, n(1))
            .unwrap_err();
        assert!(matches!(err, MlErr::NonFiniteLoss { batch: 0, .. }));
    }
}
