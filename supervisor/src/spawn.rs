use std::io;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use log::debug;
use worker::WorkerSpec;

/// How a finished worker ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    Clean,
    Failed { code: Option<i32> },
}

/// One live worker that can be waited on exactly once.
pub trait WorkerHandle {
    fn join(self) -> io::Result<WorkerExit>;
}

/// Starts workers for the supervisor.
///
/// The production launcher re-executes the current binary; tests plug in
/// whatever stand-in they need.
pub trait Launcher {
    type Handle: WorkerHandle;

    fn spawn(&mut self, spec: &WorkerSpec) -> io::Result<Self::Handle>;
}

/// Launches each worker as a fresh OS process: the current executable,
/// re-run with the hidden `worker` subcommand and a serialized spec.
pub struct ProcessLauncher {
    exe: PathBuf,
}

impl ProcessLauncher {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            exe: std::env::current_exe()?,
        })
    }
}

impl Launcher for ProcessLauncher {
    type Handle = ProcessHandle;

    fn spawn(&mut self, spec: &WorkerSpec) -> io::Result<Self::Handle> {
        let json = spec.to_json().map_err(io::Error::other)?;
        debug!(rank = spec.rank; "spawning worker process");
        let child = Command::new(&self.exe)
            .arg("worker")
            .arg("--spec")
            .arg(json)
            .stdin(Stdio::null())
            // Worker logs land on the parent's stderr.
            .stderr(Stdio::inherit())
            .spawn()?;
        Ok(ProcessHandle { child })
    }
}

/// A spawned worker process.
pub struct ProcessHandle {
    child: Child,
}

impl WorkerHandle for ProcessHandle {
    fn join(mut self) -> io::Result<WorkerExit> {
        let status = self.child.wait()?;
        Ok(if status.success() {
            WorkerExit::Clean
        } else {
            WorkerExit::Failed {
                code: status.code(),
            }
        })
    }
}
