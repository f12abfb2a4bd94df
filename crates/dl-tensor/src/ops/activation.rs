//! In-place activation functions over float tensors.
//!
//! Only valid elements are touched; row padding keeps whatever it held.

use crate::error::{Result, TensorError};
use crate::shape::Dims;
use crate::tensor::Matrix3dF;

/// Pass as `clip` to disable the upper bound. Any `clip <= 0` or NaN does the
/// same, since a literal zero bound would zero every activation.
pub const NO_CLIP: f32 = f32::INFINITY;

#[inline]
fn upper_bound(clip: f32) -> f32 {
    if clip > 0.0 {
        clip
    } else {
        NO_CLIP
    }
}

/// `x -> max(0, min(x, clip))`.
pub fn relu(m: &mut Matrix3dF, clip: f32) {
    let hi = upper_bound(clip);
    m.map_in_place(|x| {
        if x < 0.0 {
            0.0
        } else if x > hi {
            hi
        } else {
            x
        }
    });
}

/// Like [`relu`], but negative inputs become `x * alpha`.
pub fn leaky_relu(m: &mut Matrix3dF, clip: f32, alpha: f32) {
    let hi = upper_bound(clip);
    m.map_in_place(|x| {
        if x < 0.0 {
            x * alpha
        } else if x > hi {
            hi
        } else {
            x
        }
    });
}

/// Parametric ReLU: negative inputs in channel `ch` are scaled by
/// `slope[ch]`. `slope` must hold exactly one value per channel of `m`.
pub fn prelu(m: &mut Matrix3dF, slope: &Matrix3dF) -> Result<()> {
    let c = m.channels();
    let slopes = slope.to_packed_vec();
    if slopes.len() != c {
        return Err(TensorError::ShapeMismatch {
            op: "prelu",
            expected: Dims::new(1, 1, 1, c),
            got: slope.dims(),
        });
    }
    for n in 0..m.number() {
        for y in 0..m.height() {
            for pixel in m.row_mut(n, y).chunks_exact_mut(c) {
                for (v, &a) in pixel.iter_mut().zip(&slopes) {
                    if *v < 0.0 {
                        *v *= a;
                    }
                }
            }
        }
    }
    Ok(())
}

/// Softmax over all `w * h * c` elements of each batch entry.
///
/// The entry maximum is subtracted before exponentiating, so the result is
/// unchanged by adding a constant to every input.
pub fn softmax(m: &mut Matrix3dF) {
    for n in 0..m.number() {
        let mut max = f32::NEG_INFINITY;
        for y in 0..m.height() {
            max = m.row(n, y).iter().copied().fold(max, f32::max);
        }

        let mut sum = 0.0f32;
        for y in 0..m.height() {
            for v in m.row_mut(n, y) {
                *v = (*v - max).exp();
                sum += *v;
            }
        }

        for y in 0..m.height() {
            for v in m.row_mut(n, y) {
                *v /= sum;
            }
        }
    }
}
