//! `dl-tensor` - NHWC tensor core for small convolutional networks.
//!
//! This crate provides:
//! - A `Matrix3d` tensor with a C-compatible header, in float and u8 flavours
//! - Dense, depthwise and pointwise convolutions, fully connected layers and
//!   the fused mobilenet block
//! - In-place activations (relu, leaky relu, prelu, softmax)
//! - A `ConvBackend` trait with a portable `CpuBackend` and a SIMD backend,
//!   selected per call through `ConvMode`

pub mod backend;
pub mod config;
pub mod cpu;
pub mod dtype;
pub mod error;
pub mod ops;
pub mod shape;
pub mod simd;
mod storage;
pub mod tensor;

// Re-export primary types at the crate root for convenience.
pub use backend::{select, ConvBackend};
pub use config::{ConvConfig, ConvMode, Padding};
pub use cpu::CpuBackend;
pub use dtype::{DType, Element};
pub use error::{Result, TensorError};
pub use ops::{
    conv, conv_no_bias, depthwise_conv, fc, leaky_relu, mobilenet, prelu, relu, slice_copy,
    softmax, NO_CLIP,
};
pub use shape::{ConvGeometry, Dims};
pub use simd::SimdBackend;
pub use tensor::{Matrix3d, Matrix3dF, Matrix3du};
