use ndarray::{linalg, prelude::*};

use super::InplaceReshape;

/// Fully connected layer computing `z = x @ w + b`.
///
/// Weights live in the caller's flat buffer as `[input * output]` values
/// followed by `[output]` biases; the layer only views them. Activation is
/// left to a separate layer.
#[derive(Clone)]
pub struct Dense {
    dim: (usize, usize),
    size: usize,

    // Forward metadata
    x: Array2<f32>,
    z: Array2<f32>,

    // Backward metadata
    d: Array2<f32>,
}

impl Dense {
    pub fn new(input: usize, output: usize) -> Self {
        let zeros = Array2::zeros((1, 1));

        Self {
            dim: (input, output),
            size: (input + 1) * output,
            x: zeros.clone(),
            z: zeros.clone(),
            d: zeros,
        }
    }

    /// The number of parameters this layer consumes from the flat buffer.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> ArrayView2<'_, f32> {
        let (w, b) = self.view_params(params);
        let shape = (x.nrows(), self.dim.1);

        self.z = std::mem::take(&mut self.z).into_reshape(shape);
        linalg::general_mat_mul(1.0, &x, &w, 0.0, &mut self.z);
        self.z += &b;

        self.x = x.to_owned();

        self.z.view()
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: ArrayView2<f32>,
    ) -> ArrayViewMut2<'_, f32> {
        let (mut dw, mut db) = self.view_grad(grad);
        linalg::general_mat_mul(1.0, &self.x.t(), &d, 0.0, &mut dw);
        db.view_mut().assign(&d.sum_axis(Axis(0)));

        let (w, _) = self.view_params(params);
        self.d = std::mem::take(&mut self.d).into_reshape((d.nrows(), w.nrows()));
        linalg::general_mat_mul(1.0, &d, &w.t(), 0.0, &mut self.d);

        self.d.view_mut()
    }

    /// Views the raw gradient slice as this layer's delta weights and biases.
    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> (ArrayViewMut2<'a, f32>, ArrayViewMut1<'a, f32>) {
        let w_size = self.size - self.dim.1;
        let (dw_raw, db_raw) = grad.split_at_mut(w_size);
        let dw = ArrayViewMut2::from_shape(self.dim, dw_raw).unwrap();
        let db = ArrayViewMut1::from_shape(self.dim.1, db_raw).unwrap();
        (dw, db)
    }

    /// Views the raw parameter slice as this layer's weights and biases.
    fn view_params<'a>(&self, params: &'a [f32]) -> (ArrayView2<'a, f32>, ArrayView1<'a, f32>) {
        let w_size = self.size - self.dim.1;
        let weights = ArrayView2::from_shape(self.dim, &params[..w_size]).unwrap();
        let biases = ArrayView1::from_shape(self.dim.1, &params[w_size..]).unwrap();
        (weights, biases)
    }
}
