use crate::backend;
use crate::config::ConvMode;
use crate::error::{Result, TensorError};
use crate::shape::Dims;
use crate::tensor::Matrix3dF;

/// Fully connected layer: `result[j] = bias[j] + Σ_i input[i] * filter[i][j]`.
///
/// - `input`: `W` values, shape `(1, W, 1, 1)`. Any single-batch tensor with
///   `W` valid elements is accepted as its own flattening.
/// - `filter`: shape `(1, W, H, 1)`; the weight for input `i` and output `j`
///   sits at `x = i, y = j`, so every output is one contiguous dot product.
/// - `bias`: `H` values, shape `(1, 1, 1, H)`.
///
/// Returns a `(1, 1, 1, H)` tensor.
pub fn fc(input: &Matrix3dF, filter: &Matrix3dF, bias: &Matrix3dF) -> Result<Matrix3dF> {
    let w = filter.width();
    let h = filter.height();
    if filter.number() != 1 || filter.channels() != 1 {
        return Err(TensorError::ShapeMismatch {
            op: "fc",
            expected: Dims::new(1, w, h, 1),
            got: filter.dims(),
        });
    }
    if input.number() != 1 || input.dims().per_batch() != w {
        return Err(TensorError::ShapeMismatch {
            op: "fc",
            expected: Dims::new(1, w, 1, 1),
            got: input.dims(),
        });
    }
    let bias = bias_values(bias, h)?;

    let x = input.batch(0);
    let kernels = backend::select(ConvMode::Portable);
    let mut out = Matrix3dF::alloc(1, 1, 1, h)?;
    for (j, v) in out.as_mut_slice().iter_mut().enumerate() {
        *v = bias[j] + kernels.dot_f32(&x, filter.row(0, j));
    }

    tracing::trace!(inputs = w, outputs = h, "fc");
    Ok(out)
}

/// Flattens a bias tensor and checks it holds `count` values.
pub(crate) fn bias_values(bias: &Matrix3dF, count: usize) -> Result<Vec<f32>> {
    let values = bias.to_packed_vec();
    if values.len() != count {
        return Err(TensorError::ShapeMismatch {
            op: "bias",
            expected: Dims::new(1, 1, 1, count),
            got: bias.dims(),
        });
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        let input = Matrix3dF::from_vec(1, 2, 1, 1, vec![1.0, 2.0]).unwrap();
        let filter = Matrix3dF::from_vec(1, 2, 2, 1, vec![1.0, 0.0, 0.0, 1.0]).unwrap();
        let bias = Matrix3dF::alloc(1, 1, 1, 2).unwrap();
        let out = fc(&input, &filter, &bias).unwrap();
        assert_eq!(out.dims(), Dims::new(1, 1, 1, 2));
        assert_eq!(out.as_slice(), &[1.0, 2.0]);
    }

    #[test]
    fn test_weights_and_bias() {
        // 3 inputs, 2 outputs; row j holds the weights of output j
        let input = Matrix3dF::from_vec(1, 3, 1, 1, vec![1.0, 2.0, 3.0]).unwrap();
        let filter =
            Matrix3dF::from_vec(1, 3, 2, 1, vec![1.0, 1.0, 1.0, 0.5, -1.0, 2.0]).unwrap();
        let bias = Matrix3dF::from_vec(1, 1, 1, 2, vec![0.5, -1.0]).unwrap();
        let out = fc(&input, &filter, &bias).unwrap();
        assert_eq!(out.as_slice(), &[6.5, 3.5]);
    }

    #[test]
    fn test_accepts_flattened_feature_map() {
        let input = Matrix3dF::from_vec(1, 2, 1, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let filter = Matrix3dF::from_vec(1, 4, 1, 1, vec![1.0; 4]).unwrap();
        let bias = Matrix3dF::alloc(1, 1, 1, 1).unwrap();
        let out = fc(&input, &filter, &bias).unwrap();
        assert_eq!(out.as_slice(), &[10.0]);
    }

    #[test]
    fn test_input_length_mismatch() {
        let input = Matrix3dF::alloc(1, 3, 1, 1).unwrap();
        let filter = Matrix3dF::alloc(1, 2, 2, 1).unwrap();
        let bias = Matrix3dF::alloc(1, 1, 1, 2).unwrap();
        assert!(matches!(
            fc(&input, &filter, &bias),
            Err(TensorError::ShapeMismatch { op: "fc", .. })
        ));
    }

    #[test]
    fn test_bias_length_mismatch() {
        let input = Matrix3dF::alloc(1, 2, 1, 1).unwrap();
        let filter = Matrix3dF::alloc(1, 2, 2, 1).unwrap();
        let bias = Matrix3dF::alloc(1, 1, 1, 3).unwrap();
        assert!(matches!(
            fc(&input, &filter, &bias),
            Err(TensorError::ShapeMismatch { op: "bias", .. })
        ));
    }
}
