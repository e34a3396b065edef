use ndarray::prelude::*;

use super::InplaceReshape;

/// Rectified linear activation, `max(0, z)`.
///
/// Stateless apart from the cached output, which doubles as the gradient
/// mask: the derivative is 1 exactly where the output is positive.
#[derive(Clone)]
pub struct Relu {
    a: Array2<f32>,
}

impl Relu {
    pub fn new() -> Self {
        Self {
            a: Array2::zeros((1, 1)),
        }
    }

    pub fn forward(&mut self, z: ArrayView2<f32>) -> ArrayView2<'_, f32> {
        self.a = std::mem::take(&mut self.a).into_reshape(z.dim());
        self.a.zip_mut_with(&z, |a, &z| *a = z.max(0.0));
        self.a.view()
    }

    pub fn backward<'d>(&self, mut d: ArrayViewMut2<'d, f32>) -> ArrayViewMut2<'d, f32> {
        d.zip_mut_with(&self.a, |d, &a| {
            if a <= 0.0 {
                *d = 0.0;
            }
        });
        d
    }
}

impl Default for Relu {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_clamps_negatives() {
        let mut relu = Relu::new();
        let z = array![[-1.0, 0.0, 2.5], [3.0, -0.5, 0.0]];

        let a = relu.forward(z.view());

        assert_eq!(a, array![[0.0, 0.0, 2.5], [3.0, 0.0, 0.0]]);
    }

    #[test]
    fn backward_masks_where_output_was_zero() {
        let mut relu = Relu::new();
        let z = array![[-1.0, 2.0], [0.5, -3.0]];
        relu.forward(z.view());

        let mut d = array![[10.0, 10.0], [10.0, 10.0]];
        let d = relu.backward(d.view_mut());

        assert_eq!(d, array![[0.0, 10.0], [10.0, 0.0]]);
    }
}
