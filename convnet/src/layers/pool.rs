use ndarray::prelude::*;

use super::InplaceReshape;

/// Max pooling over square windows with stride equal to the window side.
///
/// Channels pool independently. The flat index of each window's winner is
/// cached so the backward pass can route the gradient straight to it; ties
/// go to the earliest cell, matching the forward scan order.
#[derive(Clone)]
pub struct MaxPool2d {
    channels: usize,
    side: usize,
    k: usize,
    out_side: usize,

    // Forward metadata
    a: Array2<f32>,
    idx: Array2<usize>,

    // Backward metadata
    d: Array2<f32>,
}

impl MaxPool2d {
    /// # Arguments
    /// * `channels` - Feature map count.
    /// * `side` - Input spatial side length, must divide evenly by `k`.
    /// * `k` - Pooling window side length.
    pub fn new(channels: usize, side: usize, k: usize) -> Self {
        debug_assert_eq!(side % k, 0, "pooling window must tile the input");
        let zeros = Array2::zeros((1, 1));

        Self {
            channels,
            side,
            k,
            out_side: side / k,
            a: zeros.clone(),
            idx: Array2::zeros((1, 1)),
            d: zeros,
        }
    }

    /// Flattened output length per sample, `channels * out_side^2`.
    pub fn output_len(&self) -> usize {
        self.channels * self.out_side * self.out_side
    }

    pub fn forward(&mut self, x: ArrayView2<f32>) -> ArrayView2<'_, f32> {
        let b = x.nrows();
        let out_len = self.output_len();

        self.a = std::mem::take(&mut self.a).into_reshape((b, out_len));
        self.idx = std::mem::take(&mut self.idx).into_reshape((b, out_len));

        for i in 0..b {
            let img = x.row(i);
            let mut out = self.a.row_mut(i);
            let mut idx = self.idx.row_mut(i);
            for c in 0..self.channels {
                let base = c * self.side * self.side;
                for oy in 0..self.out_side {
                    for ox in 0..self.out_side {
                        let mut best = f32::NEG_INFINITY;
                        let mut best_at = base;
                        for ky in 0..self.k {
                            for kx in 0..self.k {
                                let at =
                                    base + (oy * self.k + ky) * self.side + ox * self.k + kx;
                                if img[at] > best {
                                    best = img[at];
                                    best_at = at;
                                }
                            }
                        }
                        let o = (c * self.out_side + oy) * self.out_side + ox;
                        out[o] = best;
                        idx[o] = best_at;
                    }
                }
            }
        }

        self.a.view()
    }

    pub fn backward(&mut self, d: ArrayView2<f32>) -> ArrayViewMut2<'_, f32> {
        let b = d.nrows();
        let in_len = self.channels * self.side * self.side;

        self.d = std::mem::take(&mut self.d).into_reshape((b, in_len));
        self.d.fill(0.0);

        for i in 0..b {
            let mut dst = self.d.row_mut(i);
            let src = d.row(i);
            for (j, &at) in self.idx.row(i).iter().enumerate() {
                dst[at] += src[j];
            }
        }

        self.d.view_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_picks_window_maxima() {
        let mut pool = MaxPool2d::new(1, 4, 2);
        let x = array![[
            1.0, 2.0, 3.0, 4.0, //
            5.0, 6.0, 7.0, 8.0, //
            9.0, 10.0, 11.0, 12.0, //
            13.0, 14.0, 15.0, 16.0,
        ]];

        let a = pool.forward(x.view());

        assert_eq!(pool.output_len(), 4);
        assert_eq!(a, array![[6.0, 8.0, 14.0, 16.0]]);
    }

    #[test]
    fn backward_routes_to_the_winning_cell() {
        let mut pool = MaxPool2d::new(1, 4, 2);
        let x = array![[
            1.0, 2.0, 3.0, 4.0, //
            5.0, 6.0, 7.0, 8.0, //
            9.0, 10.0, 11.0, 12.0, //
            13.0, 14.0, 15.0, 16.0,
        ]];
        pool.forward(x.view());

        let d = array![[1.0, 2.0, 3.0, 4.0]];
        let d_in = pool.backward(d.view());

        let mut expected = Array2::zeros((1, 16));
        expected[[0, 5]] = 1.0;
        expected[[0, 7]] = 2.0;
        expected[[0, 13]] = 3.0;
        expected[[0, 15]] = 4.0;
        assert_eq!(d_in, expected);
    }

    #[test]
    fn ties_go_to_the_first_cell() {
        let mut pool = MaxPool2d::new(1, 2, 2);
        let x = array![[3.0, 3.0, 3.0, 3.0]];
        pool.forward(x.view());

        let d = array![[1.0]];
        let d_in = pool.backward(d.view());

        assert_eq!(d_in, array![[1.0, 0.0, 0.0, 0.0]]);
    }

    #[test]
    fn channels_pool_independently() {
        let mut pool = MaxPool2d::new(2, 2, 2);
        let x = array![[1.0, 2.0, 3.0, 4.0, 40.0, 30.0, 20.0, 10.0]];

        let a = pool.forward(x.view());

        assert_eq!(a, array![[4.0, 40.0]]);
    }
}
