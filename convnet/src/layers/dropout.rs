use ndarray::prelude::*;
use rand::Rng;

use super::InplaceReshape;
use crate::model::Mode;

/// Element-wise dropout with inverted scaling.
///
/// In train mode each element is zeroed with probability `p` and survivors
/// are scaled by `1 / (1 - p)`, so eval mode is a plain pass-through. The
/// mask is cached for the backward pass.
#[derive(Clone)]
pub struct Dropout {
    p: f64,
    scale: f32,

    mask: Array2<f32>,
    a: Array2<f32>,
}

impl Dropout {
    pub fn new(p: f64) -> Self {
        let zeros = Array2::zeros((1, 1));

        Self {
            p,
            scale: (1.0 / (1.0 - p)) as f32,
            mask: zeros.clone(),
            a: zeros,
        }
    }

    pub fn forward<R: Rng>(
        &mut self,
        x: ArrayView2<f32>,
        mode: Mode,
        rng: &mut R,
    ) -> ArrayView2<'_, f32> {
        self.a = std::mem::take(&mut self.a).into_reshape(x.dim());

        match mode {
            Mode::Eval => self.a.assign(&x),
            Mode::Train => {
                self.mask = std::mem::take(&mut self.mask).into_reshape(x.dim());
                for m in self.mask.iter_mut() {
                    *m = if rng.random_bool(self.p) { 0.0 } else { self.scale };
                }
                self.a.assign(&x);
                self.a.zip_mut_with(&self.mask, |a, &m| *a *= m);
            }
        }

        self.a.view()
    }

    pub fn backward<'d>(&self, mut d: ArrayViewMut2<'d, f32>) -> ArrayViewMut2<'d, f32> {
        d.zip_mut_with(&self.mask, |d, &m| *d *= m);
        d
    }
}

/// Channel-wise dropout for convolutional feature maps.
///
/// Zeroes whole channels per sample instead of single elements, again with
/// inverted scaling. Input rows are `[channels * spatial]` flat maps and the
/// cached mask holds one factor per `(sample, channel)`.
#[derive(Clone)]
pub struct Dropout2d {
    p: f64,
    scale: f32,
    channels: usize,
    spatial: usize,

    mask: Array2<f32>,
    a: Array2<f32>,
}

impl Dropout2d {
    /// # Arguments
    /// * `p` - Probability of dropping a channel.
    /// * `channels` - Feature map count.
    /// * `spatial` - Elements per feature map.
    pub fn new(p: f64, channels: usize, spatial: usize) -> Self {
        let zeros = Array2::zeros((1, 1));

        Self {
            p,
            scale: (1.0 / (1.0 - p)) as f32,
            channels,
            spatial,
            mask: zeros.clone(),
            a: zeros,
        }
    }

    pub fn forward<R: Rng>(
        &mut self,
        x: ArrayView2<f32>,
        mode: Mode,
        rng: &mut R,
    ) -> ArrayView2<'_, f32> {
        let b = x.nrows();
        self.a = std::mem::take(&mut self.a).into_reshape((b, x.ncols()));

        match mode {
            Mode::Eval => self.a.assign(&x),
            Mode::Train => {
                self.mask = std::mem::take(&mut self.mask).into_reshape((b, self.channels));
                for m in self.mask.iter_mut() {
                    *m = if rng.random_bool(self.p) { 0.0 } else { self.scale };
                }
                self.a.assign(&x);
                apply_channel_mask(&self.mask, self.spatial, &mut self.a.view_mut());
            }
        }

        self.a.view()
    }

    pub fn backward<'d>(&self, mut d: ArrayViewMut2<'d, f32>) -> ArrayViewMut2<'d, f32> {
        apply_channel_mask(&self.mask, self.spatial, &mut d);
        d
    }
}

fn apply_channel_mask(mask: &Array2<f32>, spatial: usize, target: &mut ArrayViewMut2<f32>) {
    for (mut row, mask_row) in target.rows_mut().into_iter().zip(mask.rows()) {
        for (c, &m) in mask_row.iter().enumerate() {
            let s = c * spatial;
            row.slice_mut(s![s..s + spatial]).mapv_inplace(|v| v * m);
        }
    }
}
