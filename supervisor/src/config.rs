use std::fmt;
use std::path::PathBuf;

use convnet::data::DataSource;
use log::warn;

/// File name of the checkpoint inside `checkpoint_dir`.
pub const CHECKPOINT_FILE: &str = "mnist_cnn.safetensors";

/// Compute device a run targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Cuda,
}

impl Device {
    /// Resolves the requested device against what this build can do.
    ///
    /// This build is CPU-only, so asking for cuda logs a warning and falls
    /// back instead of failing the run.
    pub fn resolve(cuda_requested: bool) -> Device {
        if cuda_requested {
            warn!("cuda requested but this build is cpu-only, falling back to cpu");
        }
        Device::Cpu
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda => write!(f, "cuda"),
        }
    }
}

/// Immutable description of one full training run.
///
/// Built once from the command line and passed around by reference; nothing
/// reads configuration from anywhere else.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub batch_size: usize,
    pub test_batch_size: usize,
    /// Passes over the training split, per worker.
    pub epochs: usize,
    pub learning_rate: f32,
    pub momentum: f32,
    /// Base seed; workers offset it by their rank.
    pub seed: u64,
    pub log_interval: usize,
    pub num_processes: usize,
    pub device: Device,
    pub dry_run: bool,
    /// Try to continue from the saved checkpoint.
    pub resume: bool,
    pub data: DataSource,
    pub checkpoint_dir: PathBuf,
    /// Backing file for the shared parameter buffer, unique per run.
    pub region_path: PathBuf,
}

impl RunConfig {
    pub fn checkpoint_path(&self) -> PathBuf {
        self.checkpoint_dir.join(CHECKPOINT_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cuda_request_falls_back_to_cpu() {
        assert_eq!(Device::resolve(true), Device::Cpu);
        assert_eq!(Device::resolve(false), Device::Cpu);
    }

    #[test]
    fn checkpoint_path_is_inside_the_directory() {
        let config = RunConfig {
            batch_size: 64,
            test_batch_size: 1000,
            epochs: 1,
            learning_rate: 0.01,
            momentum: 0.5,
            seed: 1,
            log_interval: 10,
            num_processes: 2,
            device: Device::Cpu,
            dry_run: false,
            resume: false,
            data: DataSource::Synthetic {
                train_len: 8,
                test_len: 8,
                seed: 1,
            },
            checkpoint_dir: PathBuf::from("/var/run/hogwild"),
            region_path: PathBuf::from("/tmp/params.bin"),
        };
        assert_eq!(
            config.checkpoint_path(),
            PathBuf::from("/var/run/hogwild/mnist_cnn.safetensors")
        );
    }
}
