use std::{num::NonZeroUsize, sync::Arc, time::Instant};

use log::{debug, info};
use machine_learning::{
    Parameters,
    arch::{Sequential, loss::CrossEntropy},
    dataset::{DataLoader, Dataset, ShardSpec},
    optimization::GradientDescent,
    training::{train_epoch, validate_epoch},
};
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    BarrierSync, Checkpoint, DriverState, EpochResult, ReplicaContext, Reporter, Result,
    TrainLoopConfig, WorkerMetrics,
};

/// What a replica returns once its loop completes.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TrainLoopOutput {
    /// One result per epoch, in epoch order.
    pub results: Vec<EpochResult>,
    pub metrics: WorkerMetrics,
}

impl TrainLoopOutput {
    /// The validation loss of every epoch, in order.
    pub fn losses(&self) -> Vec<f32> {
        self.results.iter().map(|r| r.loss).collect()
    }
}

/// The state a replica builds while initializing and mutates through its epochs.
struct Replica {
    train: DataLoader,
    test: DataLoader,
    model: Sequential,
    params: Parameters,
    optimizer: GradientDescent,
    loss_fn: CrossEntropy,
}

/// One replica of the training loop, see `WorkerBuilder` for building one per replica.
///
/// The loop is synchronous: each epoch trains then validates over the replica's shard, and
/// the next epoch does not start until the tracker accepted the previous report. Every
/// training step waits for the other replicas to average the gradient.
pub struct Worker {
    pub(crate) ctx: ReplicaContext,
    pub(crate) config: TrainLoopConfig,
    pub(crate) shard: ShardSpec,
    pub(crate) batch_size: NonZeroUsize,
    pub(crate) log_interval: NonZeroUsize,
    pub(crate) train: Arc<Dataset>,
    pub(crate) test: Arc<Dataset>,
    pub(crate) model: Sequential,
    pub(crate) reporter: Reporter,
    pub(crate) sync: BarrierSync,
}

impl Worker {
    /// Runs the training loop to completion.
    ///
    /// # Returns
    /// The result of every epoch and the replica's metrics.
    ///
    /// # Errors
    /// Any failure is fatal: the first error aborts the loop, releases the other replicas
    /// waiting on the gradient sync and is returned as is.
    pub fn run(mut self) -> Result<TrainLoopOutput> {
        let output = self.run_loop();
        if output.is_err() {
            self.sync.abort();
        }
        output
    }

    fn run_loop(&mut self) -> Result<TrainLoopOutput> {
        let rank = self.ctx.rank();
        let epochs = self.config.epochs;
        let mut output = TrainLoopOutput::default();

        debug!(rank = rank; "{}", DriverState::Initializing);
        let mut replica = self.initialize()?;
        let mut state = DriverState::after_init(epochs);

        while state != DriverState::Completed {
            debug!(rank = rank; "{state}");

            state = match state {
                DriverState::RunningEpoch(epoch) => {
                    let result = self.run_epoch(&mut replica, epoch, &mut output.metrics)?;
                    DriverState::Reporting(result)
                }
                DriverState::Reporting(result) => {
                    self.report(&replica, result, &mut output)?;
                    DriverState::after_report(result.epoch, epochs)
                }
                DriverState::Initializing | DriverState::Completed => DriverState::Completed,
            };
        }

        info!(rank = rank, epochs = output.results.len(); "worker finished");
        Ok(output)
    }

    fn initialize(&self) -> Result<Replica> {
        let model = self.model.clone();
        let params = model.init_params(StdRng::seed_from_u64(self.config.seed()))?;

        let train = DataLoader::new(Arc::clone(&self.train), self.shard, self.batch_size);
        let test = DataLoader::new(Arc::clone(&self.test), self.shard, self.batch_size);
        debug!(
            rank = self.ctx.rank(),
            train_samples = train.len(),
            test_samples = test.len(),
            params = params.len();
            "replica initialized"
        );

        Ok(Replica {
            train,
            test,
            model,
            params,
            optimizer: GradientDescent::new(self.config.lr),
            loss_fn: CrossEntropy::new(),
        })
    }

    fn run_epoch(
        &mut self,
        replica: &mut Replica,
        epoch: usize,
        metrics: &mut WorkerMetrics,
    ) -> Result<EpochResult> {
        info!(rank = self.ctx.rank(); "Epoch {}", epoch + 1);

        let start = Instant::now();
        let stats = train_epoch(
            &replica.train,
            &mut replica.model,
            &mut replica.params,
            &replica.loss_fn,
            &mut replica.optimizer,
            &mut self.sync,
            self.log_interval,
        )?;
        metrics.add_train_pass(stats.batches, stats.samples, start.elapsed());

        let start = Instant::now();
        let validation = validate_epoch(
            &replica.test,
            &mut replica.model,
            &replica.params,
            &replica.loss_fn,
        )?;
        metrics.add_validation_pass(validation.total, start.elapsed());

        Ok(EpochResult {
            epoch,
            loss: validation.loss,
            accuracy: validation.accuracy(),
            train_loss: stats.mean_loss,
        })
    }

    fn report(
        &self,
        replica: &Replica,
        result: EpochResult,
        output: &mut TrainLoopOutput,
    ) -> Result<()> {
        let start = Instant::now();
        let checkpoint = Checkpoint::snapshot(self.ctx.rank(), result, &replica.params);
        self.reporter.report(result, checkpoint)?;

        output.metrics.add_report(start.elapsed());
        output.results.push(result);
        Ok(())
    }
}
