use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use convnet::data::DataSource;
use env_logger::Env;
use log::error;
use supervisor::{Device, RunConfig};

/// Samples in the generated training split when `--synthetic` is used.
const SYNTH_TRAIN_LEN: usize = 256;
/// Samples in the generated test split.
const SYNTH_TEST_LEN: usize = 64;

/// Lock-free multiprocess MNIST training.
#[derive(Parser, Debug)]
#[command(name = "mnist-hogwild")]
#[command(about = "Trains a small CNN on MNIST with racing worker processes", long_about = None)]
struct Cli {
    /// Training batch size.
    #[arg(long, default_value_t = 64)]
    batch_size: usize,

    /// Evaluation batch size.
    #[arg(long, default_value_t = 1000)]
    test_batch_size: usize,

    /// Passes over the training split, per worker.
    #[arg(long, default_value_t = 1)]
    epochs: usize,

    /// Learning rate.
    #[arg(long, default_value_t = 0.01)]
    lr: f32,

    /// Momentum coefficient.
    #[arg(long, default_value_t = 0.5)]
    momentum: f32,

    /// Base seed; every worker offsets it by its rank.
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Batches between progress log lines, 0 to silence them.
    #[arg(long, default_value_t = 10)]
    log_interval: usize,

    /// Worker processes training concurrently.
    #[arg(long, default_value_t = 2)]
    num_processes: usize,

    /// Train on a gpu if this build supports one.
    #[arg(long)]
    cuda: bool,

    /// Stop each worker after a single batch.
    #[arg(long)]
    dry_run: bool,

    /// Continue from the saved checkpoint when one is usable.
    #[arg(long)]
    resume: bool,

    /// Directory holding the MNIST idx files.
    #[arg(long, conflicts_with = "synthetic")]
    data: Option<PathBuf>,

    /// Train on generated digits instead of MNIST files.
    #[arg(long)]
    synthetic: bool,

    /// Where the checkpoint file lives.
    #[arg(long, default_value = ".")]
    checkpoint_dir: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Runs one training worker. Spawned by the parent, not for direct use.
    #[command(hide = true)]
    Worker {
        /// Serialized worker spec.
        #[arg(long)]
        spec: String,
    },
}

impl Cli {
    fn into_config(self) -> RunConfig {
        let data = if self.synthetic {
            DataSource::Synthetic {
                train_len: SYNTH_TRAIN_LEN,
                test_len: SYNTH_TEST_LEN,
                seed: self.seed,
            }
        } else {
            DataSource::Mnist {
                dir: self.data.unwrap_or_else(|| PathBuf::from("data")),
            }
        };

        RunConfig {
            batch_size: self.batch_size,
            test_batch_size: self.test_batch_size,
            epochs: self.epochs,
            learning_rate: self.lr,
            momentum: self.momentum,
            seed: self.seed,
            log_interval: self.log_interval,
            num_processes: self.num_processes,
            device: Device::resolve(self.cuda),
            dry_run: self.dry_run,
            resume: self.resume,
            data,
            checkpoint_dir: self.checkpoint_dir,
            region_path: std::env::temp_dir()
                .join(format!("mnist-hogwild-params.{}.bin", std::process::id())),
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let mut cli = Cli::parse();
    if let Some(Command::Worker { spec }) = cli.command.take() {
        return match supervisor::run_worker(&spec) {
            Ok(_) => ExitCode::SUCCESS,
            Err(e) => {
                error!("worker failed: {e}");
                ExitCode::FAILURE
            }
        };
    }

    match supervisor::pipeline(&cli.into_config()) {
        Ok(summary) => {
            println!(
                "test accuracy: {:.2}% (avg loss {:.4})",
                summary.report.accuracy_pct, summary.report.avg_loss
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("run failed: {e}");
            ExitCode::FAILURE
        }
    }
}
