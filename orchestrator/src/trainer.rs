use std::num::NonZeroUsize;

use futures::future;
use log::{info, warn};
use tokio::{runtime::Runtime, sync::mpsc, task};
use worker::{BarrierSync, ReplicaContext, Reporter, Worker, WorkerBuilder};

use crate::{Cluster, OrchestratorError, RunConfig, ScalingConfig, Tracker, TrainingResult};

/// Replicates the training loop across `num_workers` replicas, each on its own shard of the
/// data, while a tracker collects their reports.
#[derive(Debug)]
pub struct DataParallelTrainer {
    cluster: Cluster,
    builder: WorkerBuilder,
    world_size: NonZeroUsize,
    run: RunConfig,
}

impl DataParallelTrainer {
    /// Creates a new `DataParallelTrainer`.
    ///
    /// If the training config leaves the seed unset one is picked here, so every replica still
    /// starts from the same parameters.
    ///
    /// # Arguments
    /// * `cluster` - Where the replicas run.
    /// * `builder` - The recipe every replica is built from.
    /// * `scaling` - How many replicas to run.
    /// * `run` - Where checkpoints are persisted.
    ///
    /// # Errors
    /// `OrchestratorError::InvalidConfig` if any of the configs is not valid.
    pub fn new(
        cluster: Cluster,
        builder: WorkerBuilder,
        scaling: ScalingConfig,
        run: RunConfig,
    ) -> Result<Self, OrchestratorError> {
        let world_size = scaling.validate()?;
        run.validate()?;
        builder
            .config()
            .validate()
            .map_err(|e| OrchestratorError::InvalidConfig(e.to_string()))?;

        let builder = match builder.config().seed {
            Some(_) => builder,
            None => {
                let seed = rand::random();
                info!(seed = seed; "no seed given, picked one");
                builder.with_seed(seed)
            }
        };

        Ok(Self {
            cluster,
            builder,
            world_size,
            run,
        })
    }

    pub fn world_size(&self) -> NonZeroUsize {
        self.world_size
    }

    /// Runs every replica to completion.
    ///
    /// # Returns
    /// The aggregated metrics, the latest checkpoint and each replica's losses.
    ///
    /// # Errors
    /// The tracker's error if it failed, otherwise the error of the replica that failed on its
    /// own rather than because another one did.
    pub fn fit(self) -> Result<TrainingResult, OrchestratorError> {
        match self.cluster {
            Cluster::Local => {
                let runtime = Runtime::new()?;
                runtime.block_on(self.fit_local())
            }
        }
    }

    async fn fit_local(self) -> Result<TrainingResult, OrchestratorError> {
        let world_size = self.world_size;
        info!(workers = world_size.get(); "starting training");

        let (tx, rx) = mpsc::channel(world_size.get());

        // every worker is built and checked before anything runs
        let workers = BarrierSync::group(world_size)
            .into_iter()
            .enumerate()
            .map(|(rank, sync)| {
                let worker = ReplicaContext::new(rank, world_size)
                    .and_then(|ctx| self.builder.build(ctx, Reporter::new(rank, tx.clone()), sync));
                worker.map_err(|source| OrchestratorError::Worker {
                    worker_id: rank,
                    source,
                })
            })
            .collect::<Result<Vec<Worker>, _>>()?;
        drop(tx);

        let tracker = Tracker::new(self.run, world_size);
        let tracker = task::spawn_blocking(move || tracker.consume(rx));

        let replicas = workers
            .into_iter()
            .map(|worker| task::spawn_blocking(move || worker.run()));
        let outputs = future::join_all(replicas).await;

        let mut result = tracker.await??;

        let mut losses = Vec::with_capacity(outputs.len());
        let mut failures = Vec::new();
        for (rank, output) in outputs.into_iter().enumerate() {
            match output? {
                Ok(output) => losses.push(output.losses()),
                Err(source) => {
                    if !source.is_knock_on() {
                        warn!(rank = rank; "worker failed: {source}");
                    }
                    failures.push((rank, source));
                }
            }
        }

        if !failures.is_empty() {
            // the replica that failed first, rather than the ones it released
            let first = failures
                .iter()
                .position(|(_, e)| !e.is_knock_on())
                .unwrap_or(0);
            let (worker_id, source) = failures.swap_remove(first);
            return Err(OrchestratorError::Worker { worker_id, source });
        }

        result.worker_losses = losses;

        info!(
            epochs = result.metrics.len();
            "training finished, latest checkpoint: {:?}",
            result.checkpoint
        );
        Ok(result)
    }
}
