use thiserror::Error;

use crate::dtype::DType;
use crate::shape::Dims;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TensorError {
    #[error("{op}: shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch {
        op: &'static str,
        expected: Dims,
        got: Dims,
    },
    #[error("{op}: dtype mismatch: expected {expected}, got {got}")]
    DTypeMismatch {
        op: &'static str,
        expected: DType,
        got: DType,
    },
    #[error("buffer holds {actual} elements, shape needs {expected}")]
    BufferSizeMismatch { expected: usize, actual: usize },
    #[error("invalid dimensions {dims} with row stride {stride}")]
    InvalidDimensions { dims: Dims, stride: usize },
    #[error("invalid stride ({stride_x}, {stride_y}): both must be positive")]
    InvalidStride { stride_x: usize, stride_y: usize },
    #[error("kernel {kernel_w}x{kernel_h} does not fit input {input_w}x{input_h} with VALID padding")]
    KernelTooLarge {
        kernel_w: usize,
        kernel_h: usize,
        input_w: usize,
        input_h: usize,
    },
    #[error("slice ({x}, {y}) {w}x{h} lies outside a {width}x{height} source")]
    SliceOutOfBounds {
        x: usize,
        y: usize,
        w: usize,
        h: usize,
        width: usize,
        height: usize,
    },
    #[error("failed to allocate {elements} elements ({bytes} bytes)")]
    AllocationFailed { elements: usize, bytes: usize },
}

pub type Result<T> = std::result::Result<T, TensorError>;
