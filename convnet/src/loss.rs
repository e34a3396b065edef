use ndarray::{Array2, ArrayView2};

/// Loss functions over batched log-probabilities and class labels.
pub trait LossFn {
    /// Mean loss over the batch.
    fn loss(&self, logp: ArrayView2<f32>, labels: &[u8]) -> f32;

    /// Delta to feed the last layer's backward pass.
    fn loss_prime(&self, logp: ArrayView2<f32>, labels: &[u8]) -> Array2<f32>;
}

/// Numerically stable row-wise log-softmax.
pub fn log_softmax(z: ArrayView2<f32>) -> Array2<f32> {
    let mut out = z.to_owned();
    for mut row in out.rows_mut() {
        let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        let lse = row.fold(0.0, |s, &v| s + (v - max).exp()).ln() + max;
        row.mapv_inplace(|v| v - lse);
    }
    out
}

/// Negative log likelihood over log-probabilities.
///
/// `loss_prime` folds the log-softmax jacobian in, so the returned delta is
/// with respect to the raw logits: `(softmax - onehot) / batch`.
#[derive(Default, Clone, Copy)]
pub struct Nll;

impl Nll {
    pub fn new() -> Self {
        Self
    }

    /// Summed (not averaged) loss, so the evaluator can aggregate over
    /// batches of different sizes.
    pub fn loss_sum(&self, logp: ArrayView2<f32>, labels: &[u8]) -> f32 {
        debug_assert_eq!(logp.nrows(), labels.len());
        labels
            .iter()
            .enumerate()
            .map(|(i, &y)| -logp[[i, y as usize]])
            .sum()
    }
}

impl LossFn for Nll {
    fn loss(&self, logp: ArrayView2<f32>, labels: &[u8]) -> f32 {
        self.loss_sum(logp, labels) / labels.len() as f32
    }

    fn loss_prime(&self, logp: ArrayView2<f32>, labels: &[u8]) -> Array2<f32> {
        let inv_b = 1.0 / labels.len() as f32;
        let mut d = logp.mapv(|v| v.exp() * inv_b);
        for (i, &y) in labels.iter().enumerate() {
            d[[i, y as usize]] -= inv_b;
        }
        d
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn close(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-5, "{a} != {b}");
    }

    #[test]
    fn log_softmax_rows_exponentiate_to_one() {
        let z = array![[1.0, 2.0, 3.0], [-5.0, 0.0, 5.0]];
        let logp = log_softmax(z.view());

        for row in logp.rows() {
            close(row.iter().map(|&v| v.exp()).sum::<f32>(), 1.0);
        }
    }

    #[test]
    fn log_softmax_known_two_class_case() {
        let z = array![[0.0, 3f32.ln()]];
        let logp = log_softmax(z.view());

        close(logp[[0, 0]], 0.25f32.ln());
        close(logp[[0, 1]], 0.75f32.ln());
    }

    #[test]
    fn log_softmax_survives_large_logits() {
        let z = array![[1000.0, 1000.0, 999.0]];
        let logp = log_softmax(z.view());

        assert!(logp.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn nll_picks_the_label_column() {
        let logp = array![[-0.1f32, -2.0], [-3.0, -0.2]];
        let labels = [0u8, 1];

        close(Nll.loss_sum(logp.view(), &labels), 0.1 + 0.2);
        close(Nll.loss(logp.view(), &labels), (0.1 + 0.2) / 2.0);
    }

    #[test]
    fn loss_prime_is_softmax_minus_onehot_over_batch() {
        let z = array![[1.0, 1.0], [2.0, 0.0]];
        let logp = log_softmax(z.view());
        let labels = [0u8, 1];

        let d = Nll.loss_prime(logp.view(), &labels);

        close(d[[0, 0]], (0.5 - 1.0) / 2.0);
        close(d[[0, 1]], 0.5 / 2.0);
        // every row of the delta sums to zero
        for row in d.rows() {
            close(row.sum(), 0.0);
        }
    }
}
