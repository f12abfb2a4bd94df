use crate::backend;
use crate::config::{ConvMode, Padding};
use crate::error::{Result, TensorError};
use crate::shape::{ConvGeometry, Dims};
use crate::tensor::Matrix3dF;

/// Depthwise convolution: every channel is convolved with its own spatial
/// kernel and nothing is summed across channels.
///
/// `filter` is `(1, Kw, Kh, C)` with `C == channels(input)`; there is no bias.
/// Stride and padding behave as in [`conv`](fn@crate::ops::conv).
pub fn depthwise_conv(
    input: &Matrix3dF,
    filter: &Matrix3dF,
    stride_x: usize,
    stride_y: usize,
    padding: Padding,
    mode: ConvMode,
) -> Result<Matrix3dF> {
    let c = input.channels();
    if filter.number() != 1 || filter.channels() != c {
        return Err(TensorError::ShapeMismatch {
            op: "depthwise_conv",
            expected: Dims::new(1, filter.width(), filter.height(), c),
            got: filter.dims(),
        });
    }

    let geom = ConvGeometry::new(
        input.width(),
        input.height(),
        filter.width(),
        filter.height(),
        stride_x,
        stride_y,
        padding,
    )?;
    let kernels = backend::select(mode);
    let mut out = Matrix3dF::alloc(input.number(), geom.output_w(), geom.output_h(), c)?;

    let mut acc = vec![0.0f32; c];
    for n in 0..input.number() {
        for oy in 0..geom.output_h() {
            for ox in 0..geom.output_w() {
                acc.fill(0.0);
                geom.for_each_tap_row(ox, oy, |ky, iy, kx, ix0| {
                    for (i, k) in kx.enumerate() {
                        kernels.mul_acc_f32(
                            &mut acc,
                            input.pixel(n, iy, ix0 + i),
                            filter.pixel(0, ky, k),
                        );
                    }
                });
                let base = out.offset(n, oy, ox);
                out.as_mut_slice()[base..base + c].copy_from_slice(&acc);
            }
        }
    }

    tracing::trace!(backend = kernels.name(), output = %out.dims(), "depthwise_conv");
    Ok(out)
}
