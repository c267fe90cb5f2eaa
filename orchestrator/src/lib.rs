pub mod cluster;
pub mod configs;
pub mod error;
pub mod export;
mod result;
mod trainer;
mod tracker;

pub use cluster::Cluster;
pub use configs::{RunConfig, ScalingConfig};
pub use error::OrchestratorError;
pub use result::{EpochMetrics, TrainingResult};
pub use trainer::DataParallelTrainer;
pub use tracker::{METRICS_FILE, Tracker};

use worker::WorkerBuilder;

/// Connects to the cluster and trains one replica per worker until every epoch ran.
///
/// # Arguments
/// * `address` - The cluster address, see `Cluster::connect`.
/// * `builder` - The recipe every replica is built from.
/// * `scaling` - How many replicas to run and where.
/// * `run` - Where checkpoints are persisted.
///
/// # Errors
/// Returns an `OrchestratorError` if the setup is invalid or any replica fails.
pub fn train(
    address: Option<&str>,
    builder: WorkerBuilder,
    scaling: ScalingConfig,
    run: RunConfig,
) -> Result<TrainingResult, OrchestratorError> {
    log::info!("validating configs");
    let cluster = Cluster::connect(address)?;
    let trainer = DataParallelTrainer::new(cluster, builder, scaling, run)?;
    log::info!("launching {} worker(s)", trainer.world_size());
    trainer.fit()
}
