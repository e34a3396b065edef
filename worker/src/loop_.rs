use convnet::Net;
use convnet::data::DataLoader;
use convnet::layout::ParamLayout;
use convnet::optim::{Optimizer, SgdMomentum};
use log::info;
use param_store::SharedParams;
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    error::{Result, WorkerErr},
    metrics::WorkerMetrics,
    spec::WorkerSpec,
};

/// Drives one worker's entire training run.
///
/// Design:
/// - Attaches to the shared buffer; parameters are never copied locally.
/// - Each step reads whatever values the other workers left behind, computes
///   a gradient from them, and writes the update straight back. No locks.
/// - The gradient buffer is persistent and reused every step.
/// - Momentum state stays process-local; only parameter updates hit the
///   shared memory.
pub struct TrainLoop {
    spec: WorkerSpec,
    metrics: WorkerMetrics,
}

impl TrainLoop {
    pub fn new(spec: WorkerSpec) -> Self {
        Self {
            spec,
            metrics: WorkerMetrics::default(),
        }
    }

    pub fn metrics(&self) -> &WorkerMetrics {
        &self.metrics
    }

    /// Runs `spec.epochs` passes over the training split.
    ///
    /// # Returns
    /// The accumulated counters, or an error when the spec disagrees with
    /// the model layout, the buffer cannot be attached, or the data is
    /// unreadable.
    pub fn run(mut self) -> Result<WorkerMetrics> {
        let layout = ParamLayout::mnist_cnn();
        if self.spec.param_len != layout.total() {
            return Err(WorkerErr::ParamLengthMismatch {
                got: self.spec.param_len,
                expected: layout.total(),
            });
        }

        let store = SharedParams::attach(&self.spec.param_path, self.spec.param_len)?;
        let dataset = self.spec.data.load_train()?;

        // Rank-offset seed: every worker walks the data in its own order and
        // draws its own dropout masks.
        let seed = self.spec.seed.wrapping_add(self.spec.rank as u64);
        let mut net = Net::new(seed);
        let mut optim = SgdMomentum::new(
            self.spec.param_len,
            self.spec.learning_rate,
            self.spec.momentum,
        );
        let mut rng = StdRng::seed_from_u64(seed);
        let mut loader = DataLoader::new(&dataset, self.spec.batch_size, true);
        let mut grad = vec![0.0; self.spec.param_len];

        let pid = std::process::id();
        let rank = self.spec.rank;
        let total = loader.dataset_len();
        let num_batches = loader.num_batches();

        info!(pid = pid, rank = rank; "worker attached to {} shared parameters", self.spec.param_len);

        'run: for epoch in 1..=self.spec.epochs {
            for (batch_idx, batch) in loader.epoch(&mut rng).enumerate() {
                let loss = store.with(|params| net.train_step(params, &mut grad, &batch));
                store.update(|params| optim.update_params(&grad, params))?;

                self.metrics.bump_batch();
                self.metrics.add_samples(batch.len());
                self.metrics.record_loss(loss);

                if self.spec.log_interval != 0 && batch_idx % self.spec.log_interval == 0 {
                    info!(
                        pid = pid, rank = rank;
                        "train epoch: {} [{}/{} ({:.0}%)]\tloss: {:.6}",
                        epoch,
                        batch_idx * self.spec.batch_size,
                        total,
                        100.0 * batch_idx as f64 / num_batches as f64,
                        loss,
                    );
                }

                if self.spec.dry_run {
                    break 'run;
                }
            }
            self.metrics.bump_epoch();
        }

        info!(pid = pid, rank = rank; "worker finished");
        Ok(self.metrics)
    }
}
