use crate::backend;
use crate::config::{ConvMode, Padding};
use crate::dtype::Element;
use crate::error::{Result, TensorError};
use crate::ops::fc::bias_values;
use crate::shape::{ConvGeometry, Dims};
use crate::tensor::{Matrix3d, Matrix3dF};

/// Dense 2-D convolution.
///
/// - `input`: `(N, W, H, Cin)`, float or quantized. Quantization applies to
///   activations only; weights and bias are always float.
/// - `filter`: `(Cout, Kw, Kh, Cin)`.
/// - `bias`: `Cout` values.
///
/// Output is `(N, Wout, Hout, Cout)` with the sizes given by `padding` (see
/// [`Padding`]). `mode` picks the backend for the inner products.
///
/// # Errors
/// [`TensorError::ShapeMismatch`] if filter or bias do not match the input,
/// [`TensorError::InvalidStride`] for a zero stride,
/// [`TensorError::KernelTooLarge`] for a VALID kernel wider than the input.
pub fn conv<T: Element>(
    input: &Matrix3d<T>,
    filter: &Matrix3dF,
    bias: &Matrix3dF,
    stride_x: usize,
    stride_y: usize,
    padding: Padding,
    mode: ConvMode,
) -> Result<Matrix3dF> {
    let bias = bias_values(bias, filter.number())?;
    conv_impl(input, filter, Some(&bias), stride_x, stride_y, padding, mode)
}

/// [`conv`] without a bias term.
pub fn conv_no_bias<T: Element>(
    input: &Matrix3d<T>,
    filter: &Matrix3dF,
    stride_x: usize,
    stride_y: usize,
    padding: Padding,
    mode: ConvMode,
) -> Result<Matrix3dF> {
    conv_impl(input, filter, None, stride_x, stride_y, padding, mode)
}

fn conv_impl<T: Element>(
    input: &Matrix3d<T>,
    filter: &Matrix3dF,
    bias: Option<&[f32]>,
    stride_x: usize,
    stride_y: usize,
    padding: Padding,
    mode: ConvMode,
) -> Result<Matrix3dF> {
    let cin = input.channels();
    let cout = filter.number();
    if filter.channels() != cin {
        return Err(TensorError::ShapeMismatch {
            op: "conv",
            expected: Dims::new(cout, filter.width(), filter.height(), cin),
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
    let mut out = Matrix3dF::alloc(input.number(), geom.output_w(), geom.output_h(), cout)?;

    let src = input.as_slice();
    let weights = filter.as_slice();
    for n in 0..input.number() {
        for oy in 0..geom.output_h() {
            for ox in 0..geom.output_w() {
                let base = out.offset(n, oy, ox);
                let pixel = &mut out.as_mut_slice()[base..base + cout];
                for (o, value) in pixel.iter_mut().enumerate() {
                    let mut sum = 0.0f32;
                    geom.for_each_tap_row(ox, oy, |ky, iy, kx, ix0| {
                        let len = kx.len() * cin;
                        let a = input.offset(n, iy, ix0);
                        let w = filter.offset(o, ky, kx.start);
                        sum += T::dot(kernels, &src[a..a + len], &weights[w..w + len]);
                    });
                    *value = sum + bias.map_or(0.0, |b| b[o]);
                }
            }
        }
    }

    tracing::trace!(
        backend = kernels.name(),
        dtype = %T::DTYPE,
        output = %out.dims(),
        "conv"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::Matrix3du;
    use approx::assert_relative_eq;

    fn ramp(w: usize, h: usize, c: usize) -> Matrix3dF {
        let data = (0..w * h * c).map(|v| v as f32).collect();
        Matrix3dF::from_vec(1, w, h, c, data).unwrap()
    }

    fn zeros(c: usize) -> Matrix3dF {
        Matrix3dF::alloc(1, 1, 1, c).unwrap()
    }

    /// 1x1 filter mapping input channel `i` to output channel `i`.
    fn identity_1x1(c: usize) -> Matrix3dF {
        let mut f = Matrix3dF::alloc(c, 1, 1, c).unwrap();
        for i in 0..c {
            f.set(i, 0, 0, i, 1.0);
        }
        f
    }

    #[test]
    fn test_valid_window_sums() {
        let input = ramp(4, 4, 1);
        let filter = Matrix3dF::from_vec(1, 3, 3, 1, vec![1.0; 9]).unwrap();
        let out = conv(&input, &filter, &zeros(1), 1, 1, Padding::Valid, ConvMode::Portable)
            .unwrap();
        assert_eq!(out.dims(), Dims::new(1, 2, 2, 1));
        // window at (x, y) sums 0..16 laid out row-major
        let window = |x: usize, y: usize| -> f32 {
            (0..3)
                .flat_map(|dy| (0..3).map(move |dx| ((y + dy) * 4 + x + dx) as f32))
                .sum()
        };
        assert_eq!(
            out.as_slice(),
            &[window(0, 0), window(1, 0), window(0, 1), window(1, 1)]
        );
        assert_eq!(out.as_slice(), &[45.0, 54.0, 81.0, 90.0]);
    }

    #[test]
    fn test_identity_1x1_reproduces_input() {
        let input = ramp(3, 2, 4);
        let out = conv(
            &input,
            &identity_1x1(4),
            &zeros(4),
            1,
            1,
            Padding::Valid,
            ConvMode::Portable,
        )
        .unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn test_same_preserves_spatial_size() {
        let input = ramp(5, 4, 2);
        for k in 1..=6 {
            let filter = Matrix3dF::from_vec(3, k, k, 2, vec![0.5; 3 * k * k * 2]).unwrap();
            let out = conv(&input, &filter, &zeros(3), 1, 1, Padding::Same, ConvMode::Portable)
                .unwrap();
            assert_eq!(out.dims(), Dims::new(1, 5, 4, 3), "kernel {k}");
        }
    }

    #[test]
    fn test_same_zero_padding() {
        // 3x3 ones over a 3x3 ones image: corners see 4 taps, edges 6, center 9
        let input = Matrix3dF::from_vec(1, 3, 3, 1, vec![1.0; 9]).unwrap();
        let filter = Matrix3dF::from_vec(1, 3, 3, 1, vec![1.0; 9]).unwrap();
        let out =
            conv(&input, &filter, &zeros(1), 1, 1, Padding::Same, ConvMode::Portable).unwrap();
        assert_eq!(
            out.as_slice(),
            &[4.0, 6.0, 4.0, 6.0, 9.0, 6.0, 4.0, 6.0, 4.0]
        );
    }

    #[test]
    fn test_same_odd_padding_on_trailing_edge() {
        // kernel 2 on width 3: the one pad column is on the right, so the
        // last output only sees the last input
        let input = Matrix3dF::from_vec(1, 3, 1, 1, vec![1.0, 2.0, 3.0]).unwrap();
        let filter = Matrix3dF::from_vec(1, 2, 1, 1, vec![1.0, 10.0]).unwrap();
        let out =
            conv(&input, &filter, &zeros(1), 1, 1, Padding::Same, ConvMode::Portable).unwrap();
        assert_eq!(out.as_slice(), &[21.0, 32.0, 3.0]);
    }

    #[test]
    fn test_strided_valid() {
        let input = ramp(5, 5, 1);
        let filter = Matrix3dF::from_vec(1, 1, 1, 1, vec![1.0]).unwrap();
        let out =
            conv(&input, &filter, &zeros(1), 2, 2, Padding::Valid, ConvMode::Portable).unwrap();
        assert_eq!(out.dims(), Dims::new(1, 3, 3, 1));
        assert_eq!(
            out.as_slice(),
            &[0.0, 2.0, 4.0, 10.0, 12.0, 14.0, 20.0, 22.0, 24.0]
        );
    }

    #[test]
    fn test_bias_and_channel_mixing() {
        // one pixel, two input channels, two output channels
        let input = Matrix3dF::from_vec(1, 1, 1, 2, vec![1.0, 2.0]).unwrap();
        let filter = Matrix3dF::from_vec(2, 1, 1, 2, vec![1.0, 1.0, 3.0, -1.0]).unwrap();
        let bias = Matrix3dF::from_vec(1, 1, 1, 2, vec![0.5, -0.5]).unwrap();
        let out =
            conv(&input, &filter, &bias, 1, 1, Padding::Valid, ConvMode::Portable).unwrap();
        assert_eq!(out.as_slice(), &[3.5, 0.5]);
    }

    #[test]
    fn test_quantized_input_matches_float() {
        let values: Vec<u8> = (0..6 * 5 * 3).map(|v| (v * 7 % 256) as u8).collect();
        let q = Matrix3du::from_vec(1, 6, 5, 3, values.clone()).unwrap();
        let f = Matrix3dF::from_vec(1, 6, 5, 3, values.iter().map(|&v| v as f32).collect())
            .unwrap();
        let weights = (0..2 * 3 * 3 * 3).map(|v| (v as f32 - 27.0) * 0.01).collect();
        let filter = Matrix3dF::from_vec(2, 3, 3, 3, weights).unwrap();
        let bias = Matrix3dF::from_vec(1, 1, 1, 2, vec![0.25, -0.25]).unwrap();

        let from_q =
            conv(&q, &filter, &bias, 2, 1, Padding::Same, ConvMode::Portable).unwrap();
        let from_f =
            conv(&f, &filter, &bias, 2, 1, Padding::Same, ConvMode::Portable).unwrap();
        assert_eq!(from_q, from_f);
    }

    #[test]
    fn test_strided_input_rows() {
        let mut input = Matrix3dF::alloc_with_stride(1, 2, 2, 1, 3).unwrap();
        input.as_mut_slice().copy_from_slice(&[1.0, 2.0, 100.0, 3.0, 4.0, 100.0]);
        let filter = Matrix3dF::from_vec(1, 2, 2, 1, vec![1.0; 4]).unwrap();
        let out =
            conv(&input, &filter, &zeros(1), 1, 1, Padding::Valid, ConvMode::Portable).unwrap();
        assert_eq!(out.as_slice(), &[10.0]);
    }

    #[test]
    fn test_accelerated_matches_portable() {
        let input = ramp(7, 6, 5);
        let weights = (0..4 * 3 * 3 * 5).map(|v| ((v % 11) as f32 - 5.0) * 0.1).collect();
        let filter = Matrix3dF::from_vec(4, 3, 3, 5, weights).unwrap();
        let bias = Matrix3dF::from_vec(1, 1, 1, 4, vec![0.1, 0.2, 0.3, 0.4]).unwrap();
        let a = conv(&input, &filter, &bias, 1, 2, Padding::Same, ConvMode::Portable).unwrap();
        let b =
            conv(&input, &filter, &bias, 1, 2, Padding::Same, ConvMode::Accelerated).unwrap();
        assert_eq!(a.dims(), b.dims());
        for (x, y) in a.as_slice().iter().zip(b.as_slice()) {
            assert_relative_eq!(*x, *y, epsilon = 1e-2, max_relative = 1e-4);
        }
    }

    #[test]
    fn test_filter_channel_mismatch() {
        let input = ramp(3, 3, 2);
        let filter = Matrix3dF::alloc(1, 1, 1, 3).unwrap();
        let err = conv(&input, &filter, &zeros(1), 1, 1, Padding::Valid, ConvMode::Portable)
            .unwrap_err();
        assert!(matches!(err, TensorError::ShapeMismatch { op: "conv", .. }));
    }

    #[test]
    fn test_kernel_too_large_for_valid() {
        let input = ramp(2, 2, 1);
        let filter = Matrix3dF::alloc(1, 3, 3, 1).unwrap();
        let err = conv(&input, &filter, &zeros(1), 1, 1, Padding::Valid, ConvMode::Portable)
            .unwrap_err();
        assert!(matches!(err, TensorError::KernelTooLarge { .. }));
    }

    #[test]
    fn test_no_bias() {
        let input = ramp(2, 1, 1);
        let filter = Matrix3dF::from_vec(1, 1, 1, 1, vec![2.0]).unwrap();
        let out =
            conv_no_bias(&input, &filter, 1, 1, Padding::Valid, ConvMode::Portable).unwrap();
        assert_eq!(out.as_slice(), &[0.0, 2.0]);
    }
}
