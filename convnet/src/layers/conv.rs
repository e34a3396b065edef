use ndarray::{linalg, prelude::*};

use super::InplaceReshape;

/// 2D convolution over square feature maps, valid padding, stride 1.
///
/// Each sample is unfolded into a column matrix (im2col) so the whole
/// convolution collapses into one matrix multiply against the weight view.
/// Weights live in the caller's flat buffer as `[c_out * c_in * k * k]`
/// values followed by `[c_out]` biases.
#[derive(Clone)]
pub struct Conv2d {
    c_in: usize,
    c_out: usize,
    k: usize,
    side: usize,
    out_side: usize,
    size: usize,

    // Forward metadata
    cols: Array3<f32>,
    z: Array2<f32>,

    // Backward metadata
    dcols: Array2<f32>,
    d: Array2<f32>,
}

impl Conv2d {
    /// # Arguments
    /// * `c_in` - Input channels.
    /// * `c_out` - Output channels (filters).
    /// * `k` - Kernel side length.
    /// * `side` - Input spatial side length.
    pub fn new(c_in: usize, c_out: usize, k: usize, side: usize) -> Self {
        let zeros2 = Array2::zeros((1, 1));

        Self {
            c_in,
            c_out,
            k,
            side,
            out_side: side - k + 1,
            size: c_out * c_in * k * k + c_out,
            cols: Array3::zeros((1, 1, 1)),
            z: zeros2.clone(),
            dcols: zeros2.clone(),
            d: zeros2,
        }
    }

    /// The number of parameters this layer consumes from the flat buffer.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Flattened output length per sample, `c_out * out_side^2`.
    pub fn output_len(&self) -> usize {
        self.c_out * self.out_side * self.out_side
    }

    pub fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> ArrayView2<'_, f32> {
        let b = x.nrows();
        let patch = self.c_in * self.k * self.k;
        let ohw = self.out_side * self.out_side;
        let (w, bias) = self.view_params(params);

        self.cols = std::mem::take(&mut self.cols).into_reshape((b, patch, ohw));
        self.z = std::mem::take(&mut self.z).into_reshape((b, self.c_out * ohw));

        for i in 0..b {
            let img = x.row(i);
            let mut cols_i = self.cols.index_axis_mut(Axis(0), i);
            for c in 0..self.c_in {
                for ky in 0..self.k {
                    for kx in 0..self.k {
                        let r = (c * self.k + ky) * self.k + kx;
                        for oy in 0..self.out_side {
                            for ox in 0..self.out_side {
                                cols_i[[r, oy * self.out_side + ox]] =
                                    img[(c * self.side + oy + ky) * self.side + ox + kx];
                            }
                        }
                    }
                }
            }

            let cols_i = self.cols.index_axis(Axis(0), i);
            let mut z_i = self
                .z
                .row_mut(i)
                .into_shape_with_order((self.c_out, ohw))
                .unwrap();
            linalg::general_mat_mul(1.0, &w, &cols_i, 0.0, &mut z_i);
            for (mut z_row, &b_val) in z_i.rows_mut().into_iter().zip(bias.iter()) {
                z_row += b_val;
            }
        }

        self.z.view()
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: ArrayView2<f32>,
    ) -> ArrayViewMut2<'_, f32> {
        let b = d.nrows();
        let patch = self.c_in * self.k * self.k;
        let ohw = self.out_side * self.out_side;
        let (w, _) = self.view_params(params);
        let (mut dw, mut db) = self.view_grad(grad);

        self.dcols = std::mem::take(&mut self.dcols).into_reshape((patch, ohw));
        self.d = std::mem::take(&mut self.d)
            .into_reshape((b, self.c_in * self.side * self.side));
        self.d.fill(0.0);

        for i in 0..b {
            let d_i = d
                .row(i)
                .into_shape_with_order((self.c_out, ohw))
                .unwrap();
            let cols_i = self.cols.index_axis(Axis(0), i);

            linalg::general_mat_mul(1.0, &d_i, &cols_i.t(), 1.0, &mut dw);
            db += &d_i.sum_axis(Axis(1));

            // unfolded input gradient, scattered back over the windows
            linalg::general_mat_mul(1.0, &w.t(), &d_i, 0.0, &mut self.dcols);
            let mut d_row = self.d.row_mut(i);
            for c in 0..self.c_in {
                for ky in 0..self.k {
                    for kx in 0..self.k {
                        let r = (c * self.k + ky) * self.k + kx;
                        for oy in 0..self.out_side {
                            for ox in 0..self.out_side {
                                d_row[(c * self.side + oy + ky) * self.side + ox + kx] +=
                                    self.dcols[[r, oy * self.out_side + ox]];
                            }
                        }
                    }
                }
            }
        }

        self.d.view_mut()
    }

    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> (ArrayViewMut2<'a, f32>, ArrayViewMut1<'a, f32>) {
        let w_size = self.size - self.c_out;
        let (dw_raw, db_raw) = grad.split_at_mut(w_size);
        let patch = self.c_in * self.k * self.k;
        let dw = ArrayViewMut2::from_shape((self.c_out, patch), dw_raw).unwrap();
        let db = ArrayViewMut1::from_shape(self.c_out, db_raw).unwrap();
        (dw, db)
    }

    fn view_params<'a>(&self, params: &'a [f32]) -> (ArrayView2<'a, f32>, ArrayView1<'a, f32>) {
        let w_size = self.size - self.c_out;
        let patch = self.c_in * self.k * self.k;
        let weights = ArrayView2::from_shape((self.c_out, patch), &params[..w_size]).unwrap();
        let biases = ArrayView1::from_shape(self.c_out, &params[w_size..]).unwrap();
        (weights, biases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 3x3 input, 2x2 identity-diagonal kernel, bias 0.5
    fn diag_layer() -> (Conv2d, [f32; 5]) {
        (Conv2d::new(1, 1, 2, 3), [1.0, 0.0, 0.0, 1.0, 0.5])
    }

    #[test]
    fn forward_matches_hand_computation() {
        let (mut layer, params) = diag_layer();
        let x = array![[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]];

        let z = layer.forward(&params, x.view());

        // each output adds the window's top-left and bottom-right corners
        assert_eq!(z, array![[6.5, 8.5, 12.5, 14.5]]);
    }

    #[test]
    fn backward_accumulates_grad_and_scatters_delta() {
        let (mut layer, params) = diag_layer();
        let x = array![[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]];
        let mut grad = [0.0; 5];

        layer.forward(&params, x.view());
        let d = array![[1.0, 1.0, 1.0, 1.0]];
        let d_in = layer.backward(&params, &mut grad, d.view());

        // dw sums the input values each kernel cell saw, db sums d
        assert_eq!(grad, [12.0, 16.0, 24.0, 28.0, 4.0]);
        assert_eq!(
            d_in,
            array![[1.0, 1.0, 0.0, 1.0, 2.0, 1.0, 0.0, 1.0, 1.0]]
        );
    }

    #[test]
    fn multi_filter_output_layout_is_filter_major() {
        let mut layer = Conv2d::new(1, 2, 2, 3);
        // filter 0 picks the top-left corner, filter 1 the bottom-right
        let params = [
            1.0, 0.0, 0.0, 0.0, // w0
            0.0, 0.0, 0.0, 1.0, // w1
            0.0, 0.0, // biases
        ];
        let x = array![[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]];

        let z = layer.forward(&params, x.view());

        assert_eq!(layer.output_len(), 8);
        assert_eq!(z, array![[1.0, 2.0, 4.0, 5.0, 5.0, 6.0, 8.0, 9.0]]);
    }

    #[test]
    fn batch_rows_stay_independent() {
        let (mut layer, params) = diag_layer();
        let x = array![
            [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0],
            [0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0],
        ];

        let z = layer.forward(&params, x.view());

        assert_eq!(z.nrows(), 2);
        assert_eq!(z.row(1), array![1.5, 0.5, 0.5, 1.5].view());
    }
}
