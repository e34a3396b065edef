//! Parent-side orchestration of a Hogwild training run.
//!
//! The supervisor initializes parameters, shares them through a mapped
//! file, launches worker processes that train into it concurrently, joins
//! them, and only then evaluates and checkpoints what the races produced.

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod eval;
pub mod run;
pub mod spawn;

pub use config::{CHECKPOINT_FILE, Device, RunConfig};
pub use error::{Result, SupervisorErr};
pub use eval::EvalReport;
pub use run::{RunSummary, pipeline, run, run_worker};
pub use spawn::{Launcher, ProcessLauncher, WorkerExit, WorkerHandle};
