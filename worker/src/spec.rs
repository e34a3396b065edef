use std::path::PathBuf;

use convnet::data::DataSource;
use serde::{Deserialize, Serialize};

/// Everything a worker process needs to run, serialized by the parent and
/// handed over on the command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerSpec {
    /// Position of this worker among its siblings, starting at 0.
    pub rank: usize,
    /// Backing file of the shared parameter buffer.
    pub param_path: PathBuf,
    /// Parameter count the buffer was shared with.
    pub param_len: usize,
    /// Where the training split comes from.
    pub data: DataSource,
    pub batch_size: usize,
    pub epochs: usize,
    pub learning_rate: f32,
    pub momentum: f32,
    /// Base seed; each worker offsets it by its rank.
    pub seed: u64,
    /// Batches between progress log lines.
    pub log_interval: usize,
    /// Stop after a single batch, for smoke runs.
    pub dry_run: bool,
}

impl WorkerSpec {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> WorkerSpec {
        WorkerSpec {
            rank: 3,
            param_path: PathBuf::from("/tmp/params.bin"),
            param_len: 21840,
            data: DataSource::Synthetic {
                train_len: 128,
                test_len: 32,
                seed: 7,
            },
            batch_size: 64,
            epochs: 2,
            learning_rate: 0.01,
            momentum: 0.5,
            seed: 1,
            log_interval: 10,
            dry_run: false,
        }
    }

    #[test]
    fn survives_the_json_handoff() {
        let spec = sample();
        let json = spec.to_json().unwrap();
        let back = WorkerSpec::from_json(&json).unwrap();
        assert_eq!(back, spec);
    }

    #[test]
    fn mnist_source_keeps_its_directory() {
        let mut spec = sample();
        spec.data = DataSource::Mnist {
            dir: PathBuf::from("data/mnist"),
        };
        let back = WorkerSpec::from_json(&spec.to_json().unwrap()).unwrap();
        assert_eq!(back.data, spec.data);
    }

    #[test]
    fn rejects_garbage() {
        assert!(WorkerSpec::from_json("not a spec").is_err());
    }
}
