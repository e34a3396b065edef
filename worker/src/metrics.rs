/// Counters a training loop accumulates while it runs.
#[derive(Debug, Default, Clone)]
pub struct WorkerMetrics {
    pub epochs: u64,
    pub batches: u64,
    pub samples: u64,
    pub last_loss: f32,
}

impl WorkerMetrics {
    #[inline]
    pub fn bump_epoch(&mut self) {
        self.epochs += 1;
    }

    #[inline]
    pub fn bump_batch(&mut self) {
        self.batches += 1;
    }

    #[inline]
    pub fn add_samples(&mut self, n: usize) {
        self.samples += n as u64;
    }

    #[inline]
    pub fn record_loss(&mut self, loss: f32) {
        self.last_loss = loss;
    }
}
