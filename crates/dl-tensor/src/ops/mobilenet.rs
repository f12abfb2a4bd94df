use crate::config::{ConvConfig, Padding};
use crate::dtype::Element;
use crate::error::{Result, TensorError};
use crate::ops::{conv, conv_no_bias, depthwise_conv, prelu};
use crate::shape::Dims;
use crate::tensor::{Matrix3d, Matrix3dF};

/// Fused inverted-residual block:
///
/// 1. 1x1 expand convolution with `dilate` (VALID, stride 1, no bias),
/// 2. depthwise convolution with `depthwise`, using the stride and padding of
///    `config`,
/// 3. 1x1 compress convolution with `compress` plus `bias`,
/// 4. PReLU with one `prelu` slope per output channel.
///
/// `config.mode` applies to all three convolutions. Each intermediate is
/// released as soon as the next stage has consumed it.
///
/// # Errors
/// [`TensorError::DTypeMismatch`] if `config.input_type` does not describe
/// `input`, [`TensorError::ShapeMismatch`] if `dilate` or `compress` is not
/// 1x1, plus whatever the individual stages report.
pub fn mobilenet<T: Element>(
    input: &Matrix3d<T>,
    dilate: &Matrix3dF,
    depthwise: &Matrix3dF,
    compress: &Matrix3dF,
    bias: &Matrix3dF,
    slope: &Matrix3dF,
    config: &ConvConfig,
) -> Result<Matrix3dF> {
    if config.input_type != T::DTYPE {
        return Err(TensorError::DTypeMismatch {
            op: "mobilenet",
            expected: config.input_type,
            got: T::DTYPE,
        });
    }
    for pointwise in [dilate, compress] {
        if pointwise.width() != 1 || pointwise.height() != 1 {
            return Err(TensorError::ShapeMismatch {
                op: "mobilenet",
                expected: Dims::new(pointwise.number(), 1, 1, pointwise.channels()),
                got: pointwise.dims(),
            });
        }
    }

    let expanded = conv_no_bias(input, dilate, 1, 1, Padding::Valid, config.mode)?;
    let filtered = depthwise_conv(
        &expanded,
        depthwise,
        config.stride_x,
        config.stride_y,
        config.padding,
        config.mode,
    )?;
    drop(expanded);
    let mut out = conv(&filtered, compress, bias, 1, 1, Padding::Valid, config.mode)?;
    drop(filtered);
    prelu(&mut out, slope)?;

    tracing::debug!(
        input = %input.dims(),
        output = %out.dims(),
        mode = ?config.mode,
        "mobilenet block"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConvMode;
    use crate::dtype::DType;
    use crate::tensor::Matrix3du;

    fn identity_1x1(c: usize) -> Matrix3dF {
        let mut f = Matrix3dF::alloc(c, 1, 1, c).unwrap();
        for i in 0..c {
            f.set(i, 0, 0, i, 1.0);
        }
        f
    }

    /// Depthwise kernel that only keeps the centre tap.
    fn centre_tap(k: usize, c: usize) -> Matrix3dF {
        let mut f = Matrix3dF::alloc(1, k, k, c).unwrap();
        for ch in 0..c {
            f.set(0, k / 2, k / 2, ch, 1.0);
        }
        f
    }

    fn zeros(c: usize) -> Matrix3dF {
        Matrix3dF::alloc(1, 1, 1, c).unwrap()
    }

    fn ones(c: usize) -> Matrix3dF {
        Matrix3dF::from_vec(1, 1, 1, c, vec![1.0; c]).unwrap()
    }

    #[test]
    fn test_identity_block_passes_input_through() {
        let data: Vec<f32> = (0..4 * 3 * 2).map(|v| v as f32 - 10.0).collect();
        let input = Matrix3dF::from_vec(1, 4, 3, 2, data).unwrap();
        let out = mobilenet(
            &input,
            &identity_1x1(2),
            &centre_tap(3, 2),
            &identity_1x1(2),
            &zeros(2),
            &ones(2),
            &ConvConfig::default(),
        )
        .unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn test_quantized_input() {
        let input = Matrix3du::from_vec(1, 2, 2, 1, vec![0, 10, 200, 255]).unwrap();
        let config = ConvConfig::default().with_input_type(DType::U8);
        let out = mobilenet(
            &input,
            &identity_1x1(1),
            &centre_tap(3, 1),
            &identity_1x1(1),
            &zeros(1),
            &ones(1),
            &config,
        )
        .unwrap();
        assert_eq!(out.as_slice(), &[0.0, 10.0, 200.0, 255.0]);
    }

    #[test]
    fn test_stages_compose() {
        // expand 1 -> 2 channels (x1, x-1), sum 2x2 windows, compress back to
        // one channel (a + b) + bias, then PReLU halves negatives
        let input = Matrix3dF::from_vec(1, 2, 2, 1, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let dilate = Matrix3dF::from_vec(2, 1, 1, 1, vec![1.0, -1.0]).unwrap();
        let depthwise = Matrix3dF::from_vec(1, 2, 2, 2, [1.0, 2.0].repeat(4)).unwrap();
        let compress = Matrix3dF::from_vec(1, 1, 1, 2, vec![1.0, 1.0]).unwrap();
        let bias = Matrix3dF::from_vec(1, 1, 1, 1, vec![-1.0]).unwrap();
        let slope = Matrix3dF::from_vec(1, 1, 1, 1, vec![0.5]).unwrap();
        let config = ConvConfig::new(1, 1, Padding::Valid);
        let out =
            mobilenet(&input, &dilate, &depthwise, &compress, &bias, &slope, &config).unwrap();
        // channel a = 10, channel b = -20, compress = -10 + -1 = -11, prelu = -5.5
        assert_eq!(out.dims(), Dims::new(1, 1, 1, 1));
        assert_eq!(out.as_slice(), &[-5.5]);
    }

    #[test]
    fn test_strided_block_shape() {
        let input = Matrix3dF::alloc(1, 7, 5, 3).unwrap();
        let dilate = Matrix3dF::alloc(8, 1, 1, 3).unwrap();
        let depthwise = Matrix3dF::alloc(1, 3, 3, 8).unwrap();
        let compress = Matrix3dF::alloc(4, 1, 1, 8).unwrap();
        let config = ConvConfig::new(2, 2, Padding::Same).with_mode(ConvMode::Accelerated);
        let out =
            mobilenet(&input, &dilate, &depthwise, &compress, &zeros(4), &ones(4), &config).unwrap();
        assert_eq!(out.dims(), Dims::new(1, 4, 3, 4));
    }

    #[test]
    fn test_dtype_mismatch() {
        let input = Matrix3du::alloc(1, 2, 2, 1).unwrap();
        let err = mobilenet(
            &input,
            &identity_1x1(1),
            &centre_tap(3, 1),
            &identity_1x1(1),
            &zeros(1),
            &ones(1),
            &ConvConfig::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            TensorError::DTypeMismatch {
                op: "mobilenet",
                expected: DType::F32,
                got: DType::U8,
            }
        );
    }

    #[test]
    fn test_pointwise_filters_must_be_1x1() {
        let input = Matrix3dF::alloc(1, 4, 4, 1).unwrap();
        let wide = Matrix3dF::alloc(1, 3, 3, 1).unwrap();
        let err = mobilenet(
            &input,
            &wide,
            &centre_tap(3, 1),
            &identity_1x1(1),
            &zeros(1),
            &ones(1),
            &ConvConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, TensorError::ShapeMismatch { op: "mobilenet", .. }));
    }
}
