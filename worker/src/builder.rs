use std::sync::Arc;

use machine_learning::{MlErr, arch::Sequential, dataset::Dataset};

use crate::{BarrierSync, ReplicaContext, Reporter, Result, TrainLoopConfig, Worker, WorkerErr};

/// Everything replicas have in common; builds one `Worker` per replica.
#[derive(Debug, Clone)]
pub struct WorkerBuilder {
    config: TrainLoopConfig,
    train: Arc<Dataset>,
    test: Arc<Dataset>,
    model: Sequential,
}

impl WorkerBuilder {
    /// Creates a builder for the fashion mnist classifier.
    ///
    /// # Args
    /// * `config` - The training loop's hyperparameters.
    /// * `train` - The training split, sharded among the replicas.
    /// * `test` - The validation split, sharded among the replicas.
    pub fn new(config: TrainLoopConfig, train: Arc<Dataset>, test: Arc<Dataset>) -> Self {
        Self {
            config,
            train,
            test,
            model: Sequential::fashion_mnist(),
        }
    }

    /// Replaces the model every replica starts from.
    pub fn with_model(mut self, model: Sequential) -> Self {
        self.model = model;
        self
    }

    /// Fixes the seed every replica initializes its parameters with.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn config(&self) -> &TrainLoopConfig {
        &self.config
    }

    /// Builds the worker for one replica, checking everything it needs before it runs.
    ///
    /// # Args
    /// * `ctx` - The replica's rank and the world size.
    /// * `reporter` - Where the replica sends its epoch reports.
    /// * `sync` - The replica's handle on the group's gradient averaging.
    ///
    /// # Errors
    /// `WorkerErr::InvalidConfig` if the config is not valid, the batch can't be split among
    /// the replicas or `sync` belongs to another rank, and `WorkerErr::Ml` if the datasets
    /// do not fit the model.
    pub fn build(
        &self,
        ctx: ReplicaContext,
        reporter: Reporter,
        sync: BarrierSync,
    ) -> Result<Worker> {
        self.config.validate()?;

        if sync.rank() != ctx.rank() || sync.world_size() != ctx.world_size() {
            return Err(WorkerErr::InvalidConfig(format!(
                "replica {} of {} got the sync handle of replica {} of {}",
                ctx.rank(),
                ctx.world_size(),
                sync.rank(),
                sync.world_size()
            )));
        }

        let shard = ctx.shard()?;
        let batch_size = self.config.worker_batch_size(&ctx)?;
        let log_interval = self.config.log_interval()?;

        if let Some(expected) = self.model.input_size() {
            for dataset in [&self.train, &self.test] {
                if !dataset.is_empty() && dataset.x_size() != expected {
                    return Err(MlErr::SizeMismatch {
                        what: "dataset features",
                        got: dataset.x_size(),
                        expected,
                    }
                    .into());
                }
            }
        }

        Ok(Worker {
            ctx,
            config: self.config.clone(),
            shard,
            batch_size,
            log_interval,
            train: Arc::clone(&self.train),
            test: Arc::clone(&self.test),
            model: self.model.clone(),
            reporter,
            sync,
        })
    }
}
