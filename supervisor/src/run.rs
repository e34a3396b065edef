use convnet::Net;
use convnet::init::init_params;
use convnet::layout::ParamLayout;
use convnet::optim::SgdMomentum;
use log::{info, warn};
use param_store::SharedParams;
use rand::{SeedableRng, rngs::StdRng};
use worker::{TrainLoop, WorkerMetrics, WorkerSpec};

use crate::checkpoint;
use crate::config::RunConfig;
use crate::error::Result;
use crate::eval::{self, EvalReport};
use crate::spawn::{Launcher, ProcessLauncher, WorkerExit, WorkerHandle};

/// What a completed run did.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub spawned: usize,
    pub failed_spawns: usize,
    pub failed_workers: usize,
    pub report: EvalReport,
    pub checkpoint_saved: bool,
}

/// Runs the full pipeline with real worker processes.
pub fn pipeline(config: &RunConfig) -> Result<RunSummary> {
    let mut launcher = ProcessLauncher::new()?;
    run(config, &mut launcher)
}

/// Entry point for the hidden subcommand a spawned worker process runs.
pub fn run_worker(spec_json: &str) -> Result<WorkerMetrics> {
    let spec = WorkerSpec::from_json(spec_json)?;
    let metrics = TrainLoop::new(spec).run()?;
    Ok(metrics)
}

/// Runs the pipeline with the given launcher.
///
/// Fatal errors are initialization, sharing the parameter region and the
/// final evaluation. A worker that fails to spawn or exits non-zero, an
/// unusable resume checkpoint and a failed save are logged and absorbed.
pub fn run<L: Launcher>(config: &RunConfig, launcher: &mut L) -> Result<RunSummary> {
    let layout = ParamLayout::mnist_cnn();
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut params = init_params(&layout, &mut rng)?;

    if config.resume {
        match checkpoint::load(&config.checkpoint_path()) {
            Ok(record) => match record.restore_into(&layout, &mut params) {
                Ok(()) => info!(
                    "resuming from {} (epoch {}, accuracy {:.2}%)",
                    config.checkpoint_path().display(),
                    record.epoch,
                    record.accuracy,
                ),
                Err(e) => warn!("checkpoint does not fit this model, starting fresh: {e}"),
            },
            Err(e) => warn!("starting fresh: {e}"),
        }
    }

    info!(
        "device: {}, sharing {} parameters at {}",
        config.device,
        layout.total(),
        config.region_path.display(),
    );
    let store = SharedParams::share(&config.region_path, &params)?;

    let outcome = supervise(config, launcher, &store, &layout);
    if let Err(e) = store.remove() {
        warn!("failed to remove the shared region: {e}");
    }
    outcome
}

fn supervise<L: Launcher>(
    config: &RunConfig,
    launcher: &mut L,
    store: &SharedParams,
    layout: &ParamLayout,
) -> Result<RunSummary> {
    let mut handles = Vec::new();
    let mut failed_spawns = 0;
    for rank in 0..config.num_processes {
        let spec = worker_spec(config, rank);
        match launcher.spawn(&spec) {
            Ok(handle) => handles.push((rank, handle)),
            Err(e) => {
                warn!(rank = rank; "could not spawn worker: {e}");
                failed_spawns += 1;
            }
        }
    }
    let spawned = handles.len();
    info!("{spawned} of {} workers running", config.num_processes);

    let mut failed_workers = 0;
    for (rank, handle) in handles {
        match handle.join() {
            Ok(WorkerExit::Clean) => {}
            Ok(WorkerExit::Failed { code }) => {
                warn!(rank = rank; "worker exited with status {code:?}");
                failed_workers += 1;
            }
            Err(e) => {
                warn!(rank = rank; "could not join worker: {e}");
                failed_workers += 1;
            }
        }
    }

    // Every worker is done, so from here the buffer no longer changes.
    let snapshot = store.snapshot();

    let test = config.data.load_test()?;
    let net = Net::new(config.seed);
    let report = eval::evaluate(&net, &snapshot, &test, config.test_batch_size);

    // Saved the way the run would start over: trained weights, zeroed
    // momentum.
    let optim = SgdMomentum::new(layout.total(), config.learning_rate, config.momentum);
    let checkpoint_path = config.checkpoint_path();
    let checkpoint_saved = match checkpoint::save(
        &checkpoint_path,
        layout,
        &snapshot,
        Some(&optim),
        config.epochs as u64,
        report.accuracy_pct,
    ) {
        Ok(()) => {
            info!("checkpoint written to {}", checkpoint_path.display());
            true
        }
        Err(e) => {
            warn!("could not save the checkpoint: {e}");
            false
        }
    };

    Ok(RunSummary {
        spawned,
        failed_spawns,
        failed_workers,
        report,
        checkpoint_saved,
    })
}

fn worker_spec(config: &RunConfig, rank: usize) -> WorkerSpec {
    WorkerSpec {
        rank,
        param_path: config.region_path.clone(),
        param_len: convnet::PARAM_COUNT,
        data: config.data.clone(),
        batch_size: config.batch_size,
        epochs: config.epochs,
        learning_rate: config.learning_rate,
        momentum: config.momentum,
        seed: config.seed,
        log_interval: config.log_interval,
        dry_run: config.dry_run,
    }
}
