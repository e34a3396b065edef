use std::{error::Error, fmt, io};

use convnet::MlErr;
use param_store::StoreErr;
use worker::WorkerErr;

/// The supervisor module's result type.
pub type Result<T> = std::result::Result<T, SupervisorErr>;

/// Errors that abort a run.
///
/// Everything recoverable (a worker that fails to spawn, a stale
/// checkpoint, a failed save) is logged and absorbed inside the pipeline;
/// these variants are what remains.
#[derive(Debug)]
pub enum SupervisorErr {
    Io(io::Error),
    /// Building or initializing the model failed.
    Model(MlErr),
    /// The shared parameter region could not be created or mapped.
    Store(StoreErr),
    /// A worker run inside this process failed.
    Worker(WorkerErr),
    /// A worker spec did not survive the command-line handoff.
    Spec(serde_json::Error),
}

impl fmt::Display for SupervisorErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupervisorErr::Io(e) => write!(f, "io error: {e}"),
            SupervisorErr::Model(e) => write!(f, "model error: {e}"),
            SupervisorErr::Store(e) => write!(f, "shared parameter error: {e}"),
            SupervisorErr::Worker(e) => write!(f, "worker error: {e}"),
            SupervisorErr::Spec(e) => write!(f, "bad worker spec: {e}"),
        }
    }
}

impl Error for SupervisorErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SupervisorErr::Io(e) => Some(e),
            SupervisorErr::Model(e) => Some(e),
            SupervisorErr::Store(e) => Some(e),
            SupervisorErr::Worker(e) => Some(e),
            SupervisorErr::Spec(e) => Some(e),
        }
    }
}

impl From<io::Error> for SupervisorErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<MlErr> for SupervisorErr {
    fn from(value: MlErr) -> Self {
        Self::Model(value)
    }
}

impl From<StoreErr> for SupervisorErr {
    fn from(value: StoreErr) -> Self {
        Self::Store(value)
    }
}

impl From<WorkerErr> for SupervisorErr {
    fn from(value: WorkerErr) -> Self {
        Self::Worker(value)
    }
}

impl From<serde_json::Error> for SupervisorErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Spec(value)
    }
}
