use std::ffi::c_int;
use std::mem;

use dl_tensor::{ConvConfig, ConvMode, DType, Matrix3dF, Matrix3du, Padding};

use crate::error::FfiError;

/// Status codes returned by FFI functions that do not return a tensor.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DlStatus {
    Ok = 0,
    ErrorNullPointer = 1,
    ErrorInvalidArgument = 2,
    ErrorShape = 3,
    ErrorOutOfMemory = 4,
    ErrorInternal = 5,
}

/// Convolution implementation selector (`mode` argument).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DlConvMode {
    /// Portable reference loops.
    DlCImpl = 0,
    /// SIMD kernels where the CPU supports them.
    DlAcceleratedImpl = 1,
}

/// Element type of the `void *` input of `dl_matrix3d_mobilenet`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DlOpType {
    InputUint8 = 0,
    InputFloat = 1,
}

/// Padding selector (`padding` argument).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DlPadding {
    PaddingValid = 0,
    PaddingSame = 1,
}

/// Float tensor as seen from C. Same layout as `dl_tensor::Matrix3dF`;
/// the header fields must be treated as read-only.
#[repr(C)]
#[derive(Debug)]
pub struct DlMatrix3d {
    pub w: c_int,
    pub h: c_int,
    pub c: c_int,
    pub n: c_int,
    pub stride: c_int,
    pub item: *mut f32,
}

/// Quantized tensor as seen from C. Same layout as `dl_tensor::Matrix3du`.
#[repr(C)]
#[derive(Debug)]
pub struct DlMatrix3du {
    pub w: c_int,
    pub h: c_int,
    pub c: c_int,
    pub n: c_int,
    pub stride: c_int,
    pub item: *mut u8,
}

/// Parameters of the mobilenet block. Enum-valued fields are plain `int`s
/// holding `DlPadding`, `DlConvMode` and `DlOpType` values, and are
/// range-checked on entry.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct DlConvConfig {
    pub stride_x: c_int,
    pub stride_y: c_int,
    pub padding: c_int,
    pub mode: c_int,
    pub op_type: c_int,
}

// The mirrors are cast to and from the tensor types, so they must agree.
const _: () = {
    assert!(mem::size_of::<DlMatrix3d>() == mem::size_of::<Matrix3dF>());
    assert!(mem::align_of::<DlMatrix3d>() == mem::align_of::<Matrix3dF>());
    assert!(mem::size_of::<DlMatrix3du>() == mem::size_of::<Matrix3du>());
    assert!(mem::align_of::<DlMatrix3du>() == mem::align_of::<Matrix3du>());
    assert!(mem::offset_of!(DlMatrix3d, stride) == 4 * mem::size_of::<c_int>());
    assert!(mem::offset_of!(DlMatrix3d, item) == mem::offset_of!(DlMatrix3du, item));
    assert!(
        mem::offset_of!(DlMatrix3d, item)
            == (5 * mem::size_of::<c_int>()).next_multiple_of(mem::align_of::<*mut f32>())
    );
};

pub(crate) fn padding_from(value: c_int) -> Result<Padding, FfiError> {
    match value {
        v if v == DlPadding::PaddingValid as c_int => Ok(Padding::Valid),
        v if v == DlPadding::PaddingSame as c_int => Ok(Padding::Same),
        v => Err(FfiError::invalid(format!("unknown padding {v}"))),
    }
}

pub(crate) fn mode_from(value: c_int) -> Result<ConvMode, FfiError> {
    match value {
        v if v == DlConvMode::DlCImpl as c_int => Ok(ConvMode::Portable),
        v if v == DlConvMode::DlAcceleratedImpl as c_int => Ok(ConvMode::Accelerated),
        v => Err(FfiError::invalid(format!("unknown conv mode {v}"))),
    }
}

pub(crate) fn op_type_from(value: c_int) -> Result<DType, FfiError> {
    match value {
        v if v == DlOpType::InputUint8 as c_int => Ok(DType::U8),
        v if v == DlOpType::InputFloat as c_int => Ok(DType::F32),
        v => Err(FfiError::invalid(format!("unknown op type {v}"))),
    }
}

/// Converts a C `int` size or coordinate, rejecting negatives.
pub(crate) fn to_usize(value: c_int, name: &str) -> Result<usize, FfiError> {
    usize::try_from(value).map_err(|_| FfiError::invalid(format!("{name} is negative: {value}")))
}

impl TryFrom<&DlConvConfig> for ConvConfig {
    type Error = FfiError;

    fn try_from(cfg: &DlConvConfig) -> Result<Self, Self::Error> {
        Ok(ConvConfig::new(
            to_usize(cfg.stride_x, "stride_x")?,
            to_usize(cfg.stride_y, "stride_y")?,
            padding_from(cfg.padding)?,
        )
        .with_mode(mode_from(cfg.mode)?)
        .with_input_type(op_type_from(cfg.op_type)?))
    }
}
