use rand::Rng;
use rand_distr::{Distribution, Uniform};

use crate::error::Result;
use crate::layout::ParamLayout;

/// Fills a fresh parameter buffer for the given layout.
///
/// Every tensor is drawn from `U(-1/sqrt(fan_in), 1/sqrt(fan_in))`, the
/// default for convolution and linear layers in most frameworks. Biases use
/// the fan-in of the weight tensor that precedes them in the layout.
///
/// # Arguments
/// * `layout` - The layout describing every tensor in the buffer.
/// * `rng` - A random number generator, seeded by the caller.
///
/// # Returns
/// The initialized buffer, or an error if the layout is inconsistent or a
/// sampling range degenerates.
pub fn init_params<R: Rng>(layout: &ParamLayout, rng: &mut R) -> Result<Vec<f32>> {
    layout.validate()?;

    let mut params = vec![0.0; layout.total()];
    let mut weight_fan_in = 1;
    for entry in layout.entries() {
        if let Some(fan_in) = fan_in(&entry.shape) {
            weight_fan_in = fan_in;
        }
        let bound = 1.0 / (weight_fan_in as f32).sqrt();
        let dist = Uniform::new_inclusive(-bound, bound)?;
        for v in &mut params[entry.range.clone()] {
            *v = dist.sample(rng);
        }
    }
    Ok(params)
}

/// Fan-in of a weight tensor, or `None` for biases.
///
/// Convolution weights are `[c_out, c_in, kh, kw]`, so the fan-in is
/// everything past the first axis. Linear weights are `[input, output]`.
fn fan_in(shape: &[usize]) -> Option<usize> {
    match shape.len() {
        2 => Some(shape[0]),
        4 => Some(shape[1..].iter().product()),
        _ => None,
    }
}
