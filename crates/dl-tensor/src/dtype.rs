use std::fmt;

use crate::backend::ConvBackend;

/// Element representations a [`Matrix3d`](crate::Matrix3d) can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DType {
    /// 32-bit floating point.
    F32,
    /// Unsigned 8-bit quantized values. The affine scale lives outside this crate.
    U8,
}

impl DType {
    /// Size in bytes of a single element.
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DType::F32 => 4,
            DType::U8 => 1,
        }
    }

    /// Returns true if this dtype is a quantized format.
    pub fn is_quantized(&self) -> bool {
        matches!(self, DType::U8)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::F32 => write!(f, "f32"),
            DType::U8 => write!(f, "u8"),
        }
    }
}

/// A scalar type usable as tensor element.
///
/// Shape and layout handling is shared by every element type; only the
/// inner products used by the convolution engine are specialised, by routing
/// to the matching [`ConvBackend`] kernel. Weights are always `f32`.
pub trait Element: Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    const DTYPE: DType;

    fn to_f32(self) -> f32;

    /// `Σ a[i] * w[i]` computed by `backend`.
    fn dot(backend: &dyn ConvBackend, a: &[Self], w: &[f32]) -> f32;
}

impl Element for f32 {
    const DTYPE: DType = DType::F32;

    #[inline]
    fn to_f32(self) -> f32 {
        self
    }

    #[inline]
    fn dot(backend: &dyn ConvBackend, a: &[f32], w: &[f32]) -> f32 {
        backend.dot_f32(a, w)
    }
}

impl Element for u8 {
    const DTYPE: DType = DType::U8;

    #[inline]
    fn to_f32(self) -> f32 {
        self as f32
    }

    #[inline]
    fn dot(backend: &dyn ConvBackend, a: &[u8], w: &[f32]) -> f32 {
        backend.dot_u8(a, w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::CpuBackend;

    #[test]
    fn test_size_in_bytes() {
        assert_eq!(DType::F32.size_in_bytes(), 4);
        assert_eq!(DType::U8.size_in_bytes(), 1);
    }

    #[test]
    fn test_quantized_flag() {
        assert!(!DType::F32.is_quantized());
        assert!(DType::U8.is_quantized());
    }

    #[test]
    fn test_display() {
        assert_eq!(DType::F32.to_string(), "f32");
        assert_eq!(DType::U8.to_string(), "u8");
    }

    #[test]
    fn test_element_dot_dispatch() {
        let backend = CpuBackend::new();
        let w = [0.5f32, 2.0, -1.0];
        assert_eq!(f32::dot(&backend, &[2.0, 1.0, 3.0], &w), 0.0);
        assert_eq!(u8::dot(&backend, &[2, 1, 3], &w), 0.0);
        assert_eq!(<u8 as Element>::DTYPE, DType::U8);
        assert_eq!(200u8.to_f32(), 200.0);
    }
}
