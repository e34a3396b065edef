use crate::error::{MlErr, Result};

/// Defines the strategy for updating model parameters from a gradient.
pub trait Optimizer {
    /// Updates the provided parameter slice in place.
    ///
    /// # Arguments
    /// * `grad` - The gradient accumulated for this step.
    /// * `params` - The parameters to update.
    ///
    /// # Returns
    /// An error if `grad` and `params` disagree on length.
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()>;
}

/// Stochastic gradient descent with classical momentum.
///
/// The velocity buffer is local to this instance. When several workers share
/// one parameter buffer, each keeps its own momentum state.
#[derive(Debug, Clone)]
pub struct SgdMomentum {
    learning_rate: f32,
    momentum: f32,
    velocity: Box<[f32]>,
}

impl SgdMomentum {
    /// # Arguments
    /// * `len` - The amount of parameters this instance should track.
    /// * `learning_rate` - The small coefficient that modulates each update.
    /// * `momentum` - Decay factor applied to the running velocity.
    pub fn new(len: usize, learning_rate: f32, momentum: f32) -> Self {
        Self {
            learning_rate,
            momentum,
            velocity: vec![0.; len].into_boxed_slice(),
        }
    }

    pub fn velocity(&self) -> &[f32] {
        &self.velocity
    }
}

impl Optimizer for SgdMomentum {
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        if grad.len() != params.len() || grad.len() != self.velocity.len() {
            return Err(MlErr::SizeMismatch {
                what: "gradient",
                got: grad.len(),
                expected: params.len(),
            });
        }

        let lr = self.learning_rate;
        let mu = self.momentum;

        params
            .iter_mut()
            .zip(grad)
            .zip(self.velocity.iter_mut())
            .for_each(|((p, g), v)| {
                *v = (mu * *v) + g;
                *p -= lr * *v;
            });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_steps_match_hand_computation() {
        let mut sgd = SgdMomentum::new(2, 0.5, 0.5);
        let mut params = [1.0, -1.0];

        sgd.update_params(&[1.0, 2.0], &mut params).unwrap();
        // v = [1, 2], p = [1 - 0.5, -1 - 1]
        assert_eq!(params, [0.5, -2.0]);

        sgd.update_params(&[1.0, 0.0], &mut params).unwrap();
        // v = [1.5, 1], p = [0.5 - 0.75, -2 - 0.5]
        assert_eq!(params, [-0.25, -2.5]);
        assert_eq!(sgd.velocity(), [1.5, 1.0]);
    }

    #[test]
    fn zero_momentum_is_plain_sgd() {
        let mut sgd = SgdMomentum::new(1, 0.5, 0.0);
        let mut params = [2.0];

        sgd.update_params(&[4.0], &mut params).unwrap();
        assert_eq!(params, [0.0]);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let mut sgd = SgdMomentum::new(2, 0.1, 0.5);
        let mut params = [0.0; 3];

        assert!(sgd.update_params(&[1.0, 2.0, 3.0], &mut params).is_err());
    }
}
