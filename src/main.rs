use std::{num::NonZeroUsize, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use machine_learning::dataset::FashionMnist;
use orchestrator::{export, RunConfig, ScalingConfig};
use worker::{TrainLoopConfig, WorkerBuilder};

/// Trains the fashion mnist classifier over a set of data parallel workers.
#[derive(Parser, Debug)]
#[command(name = "train")]
struct Args {
    /// The cluster address, workers run in process if unset or `local`.
    #[arg(long)]
    address: Option<String>,

    /// The amount of workers.
    #[arg(long, short = 'n', default_value_t = 2)]
    num_workers: usize,

    /// Train on accelerator hardware.
    #[arg(long)]
    use_gpu: bool,

    /// Directory holding the uncompressed fashion mnist idx files.
    #[arg(long, default_value = "data/fashion-mnist")]
    data_dir: PathBuf,

    /// Directory the run's checkpoints are stored under.
    #[arg(long, default_value = "runs")]
    storage_dir: PathBuf,

    /// The run's name, its checkpoints go to `<storage-dir>/<name>`.
    #[arg(long, default_value = "fashion_mnist")]
    name: String,

    /// Keep only this many of the latest checkpoints.
    #[arg(long)]
    keep_checkpoints: Option<NonZeroUsize>,

    /// Copy the final checkpoint here once training is done.
    #[arg(long)]
    export_to: Option<PathBuf>,

    /// JSON file with the training loop config, the flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Learning rate [default: 1e-3].
    #[arg(long)]
    lr: Option<f32>,

    /// Total batch size across all workers [default: 64].
    #[arg(long)]
    batch_size: Option<usize>,

    /// Number of epochs [default: 1].
    #[arg(long)]
    epochs: Option<usize>,

    /// Seed for the parameters' initialization, random if unset.
    #[arg(long)]
    seed: Option<u64>,
}

impl Args {
    fn train_loop_config(&self) -> Result<TrainLoopConfig> {
        let mut config = match &self.config {
            Some(path) => TrainLoopConfig::from_json_file(path)
                .with_context(|| format!("reading {}", path.display()))?,
            None => TrainLoopConfig::default(),
        };

        if let Some(lr) = self.lr {
            config.lr = lr;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(epochs) = self.epochs {
            config.epochs = epochs;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }

        config.validate()?;
        Ok(config)
    }

    fn scaling(&self) -> ScalingConfig {
        ScalingConfig {
            num_workers: self.num_workers,
            use_gpu: self.use_gpu,
        }
    }

    fn run(&self) -> RunConfig {
        let run = RunConfig::new(&self.storage_dir, &self.name);
        match self.keep_checkpoints {
            Some(keep) => run.with_keep_checkpoints(keep),
            None => run,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.train_loop_config()?;
    let scaling = args.scaling();
    scaling.validate()?;

    let (train, test) = FashionMnist::load(&args.data_dir)
        .with_context(|| format!("loading fashion mnist from {}", args.data_dir.display()))?;
    let builder = WorkerBuilder::new(config, Arc::new(train), Arc::new(test));

    let result = orchestrator::train(args.address.as_deref(), builder, scaling, args.run())?;
    for metrics in &result.metrics {
        info!(
            "epoch {}: mean loss {:.6}, mean accuracy {:.1}%",
            metrics.epoch,
            metrics.mean_loss,
            100. * metrics.mean_accuracy
        );
    }

    let Some(model_path) = result.checkpoint else {
        println!("no epochs ran, no checkpoint to export");
        return Ok(());
    };

    println!("model_path: {}", model_path.display());

    if let Some(export_to) = &args.export_to {
        export::copy_recursive(&model_path, export_to)?;
    }

    Ok(())
}
