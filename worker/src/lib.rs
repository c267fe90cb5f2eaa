pub mod builder;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod metrics;
pub mod report;
pub mod state;
pub mod sync;
pub mod worker;

pub use builder::WorkerBuilder;
pub use checkpoint::{Checkpoint, CheckpointMeta};
pub use config::{ReplicaContext, TrainLoopConfig};
pub use error::{Result, WorkerErr};
pub use metrics::WorkerMetrics;
pub use report::{EpochReport, EpochResult, Reporter};
pub use state::DriverState;
pub use sync::BarrierSync;
pub use worker::{TrainLoopOutput, Worker};
