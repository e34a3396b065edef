use ndarray::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::data::{Batch, IMAGE_PIXELS, IMAGE_SIDE, NUM_CLASSES};
use crate::layers::{Conv2d, Dense, Dropout, Dropout2d, MaxPool2d, Relu};
use crate::loss::{LossFn, Nll, log_softmax};

const CONV1_FILTERS: usize = 10;
const CONV2_FILTERS: usize = 20;
const KERNEL: usize = 5;
const FC1_IN: usize = 320;
const FC1_OUT: usize = 50;
const DROP_P: f64 = 0.5;

/// Total `f32` parameters the network consumes, all layers concatenated.
pub const PARAM_COUNT: usize = (CONV1_FILTERS * KERNEL * KERNEL + CONV1_FILTERS)
    + (CONV2_FILTERS * CONV1_FILTERS * KERNEL * KERNEL + CONV2_FILTERS)
    + (FC1_IN * FC1_OUT + FC1_OUT)
    + (FC1_OUT * NUM_CLASSES + NUM_CLASSES);

/// Whether dropout is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Train,
    Eval,
}

/// The MNIST convnet: two convolution blocks followed by two dense layers,
/// ending in log-probabilities over the ten digit classes.
///
/// Parameters are read from (and gradients written to) caller-owned flat
/// buffers on every call, so concurrent trainers can point the same network
/// code at one shared buffer.
#[derive(Clone)]
pub struct Net {
    conv1: Conv2d,
    pool1: MaxPool2d,
    relu1: Relu,
    conv2: Conv2d,
    drop2: Dropout2d,
    pool2: MaxPool2d,
    relu2: Relu,
    fc1: Dense,
    relu3: Relu,
    drop3: Dropout,
    fc2: Dense,

    rng: StdRng,
}

impl Net {
    /// Builds the network. `seed` drives the dropout masks only; weights
    /// come from the parameter buffer handed to each call.
    pub fn new(seed: u64) -> Self {
        // spatial flow: 28 -> conv 24 -> pool 12 -> conv 8 -> pool 4
        let conv1 = Conv2d::new(1, CONV1_FILTERS, KERNEL, IMAGE_SIDE);
        let conv2 = Conv2d::new(CONV1_FILTERS, CONV2_FILTERS, KERNEL, 12);

        Self {
            conv1,
            pool1: MaxPool2d::new(CONV1_FILTERS, 24, 2),
            relu1: Relu::new(),
            drop2: Dropout2d::new(DROP_P, CONV2_FILTERS, 8 * 8),
            conv2,
            pool2: MaxPool2d::new(CONV2_FILTERS, 8, 2),
            relu2: Relu::new(),
            fc1: Dense::new(FC1_IN, FC1_OUT),
            relu3: Relu::new(),
            drop3: Dropout::new(DROP_P),
            fc2: Dense::new(FC1_OUT, NUM_CLASSES),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Runs the batch through the network.
    ///
    /// # Arguments
    /// * `params` - Flat parameter buffer of `PARAM_COUNT` values.
    /// * `images` - Batch of `[b, 1, 28, 28]` normalized images.
    /// * `mode` - Train mode samples fresh dropout masks, eval mode does not.
    ///
    /// # Returns
    /// Log-probabilities, one `[NUM_CLASSES]` row per sample.
    pub fn forward(&mut self, params: &[f32], images: &Array4<f32>, mode: Mode) -> Array2<f32> {
        debug_assert_eq!(params.len(), PARAM_COUNT);
        let b = images.dim().0;
        let x = images
            .view()
            .into_shape_with_order((b, IMAGE_PIXELS))
            .unwrap();

        let (p1, rest) = params.split_at(self.conv1.size());
        let (p2, rest) = rest.split_at(self.conv2.size());
        let (p3, p4) = rest.split_at(self.fc1.size());

        let x = self.conv1.forward(p1, x);
        let x = self.pool1.forward(x);
        let x = self.relu1.forward(x);
        let x = self.conv2.forward(p2, x);
        let x = self.drop2.forward(x, mode, &mut self.rng);
        let x = self.pool2.forward(x);
        let x = self.relu2.forward(x);
        let x = self.fc1.forward(p3, x);
        let x = self.relu3.forward(x);
        let x = self.drop3.forward(x, mode, &mut self.rng);
        let x = self.fc2.forward(p4, x);
        log_softmax(x)
    }

    /// Backpropagates a delta over the logits, accumulating into `grad`.
    fn backward(&mut self, params: &[f32], grad: &mut [f32], d: Array2<f32>) {
        let (p1, rest) = params.split_at(self.conv1.size());
        let (p2, rest) = rest.split_at(self.conv2.size());
        let (p3, p4) = rest.split_at(self.fc1.size());
        let (g1, g_rest) = grad.split_at_mut(self.conv1.size());
        let (g2, g_rest) = g_rest.split_at_mut(self.conv2.size());
        let (g3, g4) = g_rest.split_at_mut(self.fc1.size());

        let d = self.fc2.backward(p4, g4, d.view());
        let d = self.drop3.backward(d);
        let d = self.relu3.backward(d);
        let d = self.fc1.backward(p3, g3, d.view());
        let d = self.relu2.backward(d);
        let d = self.pool2.backward(d.view());
        let d = self.drop2.backward(d);
        let d = self.conv2.backward(p2, g2, d.view());
        let d = self.relu1.backward(d);
        let d = self.pool1.backward(d.view());
        let _ = self.conv1.backward(p1, g1, d.view());
    }

    /// One training step over a batch: zero the gradient, forward, loss,
    /// backward. The optimizer applies `grad` separately, which keeps this
    /// usable against a racily shared parameter buffer.
    ///
    /// # Returns
    /// The mean batch loss.
    pub fn train_step(&mut self, params: &[f32], grad: &mut [f32], batch: &Batch) -> f32 {
        grad.fill(0.0);

        let logp = self.forward(params, &batch.images, Mode::Train);
        let loss = Nll.loss(logp.view(), &batch.labels);
        let d = Nll.loss_prime(logp.view(), &batch.labels);
        self.backward(params, grad, d);

        loss
    }
}

/// Most probable class per row; ties go to the lowest index.
pub fn predictions(logp: ArrayView2<f32>) -> Vec<usize> {
    logp.rows()
        .into_iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |(bi, bv), (i, &v)| {
                    if v > bv { (i, v) } else { (bi, bv) }
                })
                .0
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init::init_params;
    use crate::layout::ParamLayout;
    use crate::optim::{Optimizer, SgdMomentum};

    fn tiny_batch(n: usize) -> Batch {
        let images = Array4::from_shape_fn((n, 1, IMAGE_SIDE, IMAGE_SIDE), |(i, _, y, x)| {
            ((i + 3 * y + 5 * x) % 7) as f32 / 7.0 - 0.5
        });
        let labels = (0..n).map(|i| (i % NUM_CLASSES) as u8).collect();
        Batch { images, labels }
    }

    fn fresh_params(seed: u64) -> Vec<f32> {
        let layout = ParamLayout::mnist_cnn();
        init_params(&layout, &mut StdRng::seed_from_u64(seed)).unwrap()
    }

    #[test]
    fn param_count_matches_the_layout() {
        assert_eq!(PARAM_COUNT, 21_840);
        assert_eq!(ParamLayout::mnist_cnn().total(), PARAM_COUNT);
    }

    #[test]
    fn forward_yields_normalized_log_probs() {
        let params = fresh_params(1);
        let mut net = Net::new(1);
        let batch = tiny_batch(3);

        let logp = net.forward(&params, &batch.images, Mode::Eval);

        assert_eq!(logp.dim(), (3, NUM_CLASSES));
        for row in logp.rows() {
            let total: f32 = row.iter().map(|&v| v.exp()).sum();
            assert!((total - 1.0).abs() < 1e-4, "row sums to {total}");
        }
    }

    #[test]
    fn eval_forward_is_deterministic() {
        let params = fresh_params(2);
        let mut net = Net::new(2);
        let batch = tiny_batch(2);

        let a = net.forward(&params, &batch.images, Mode::Eval);
        let b = net.forward(&params, &batch.images, Mode::Eval);

        assert_eq!(a, b);
    }

    #[test]
    fn repeated_steps_overfit_one_batch() {
        let params = &mut fresh_params(3);
        let mut net = Net::new(3);
        let mut grad = vec![0.0; PARAM_COUNT];
        let mut sgd = SgdMomentum::new(PARAM_COUNT, 0.05, 0.5);
        let batch = tiny_batch(8);

        let mut losses = Vec::with_capacity(40);
        for _ in 0..40 {
            let loss = net.train_step(params, &mut grad, &batch);
            assert!(loss.is_finite());
            losses.push(loss);
            sgd.update_params(&grad, params).unwrap();
        }

        let early: f32 = losses[..5].iter().sum::<f32>() / 5.0;
        let late: f32 = losses[35..].iter().sum::<f32>() / 5.0;
        assert!(
            late < early * 0.5,
            "loss did not fall: early {early}, late {late}"
        );
    }

    #[test]
    fn predictions_pick_the_max_column() {
        let logp = array![[-3.0, -0.1, -5.0], [-0.2, -0.2, -4.0]];
        assert_eq!(predictions(logp.view()), vec![1, 0]);
    }
}
