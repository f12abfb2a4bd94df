use std::fmt;
use std::ops::Range;

use crate::config::Padding;
use crate::error::{Result, TensorError};

/// Logical tensor dimensions in allocation order `(n, w, h, c)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dims {
    pub n: usize,
    pub w: usize,
    pub h: usize,
    pub c: usize,
}

impl Dims {
    pub const fn new(n: usize, w: usize, h: usize, c: usize) -> Self {
        Dims { n, w, h, c }
    }

    /// Number of logical elements, ignoring any row padding.
    pub fn numel(&self) -> usize {
        self.n * self.w * self.h * self.c
    }

    /// Elements in one batch entry (`w * h * c`).
    pub fn per_batch(&self) -> usize {
        self.w * self.h * self.c
    }
}

impl fmt::Display for Dims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[n={}, w={}, h={}, c={}]", self.n, self.w, self.h, self.c)
    }
}

/// Output size and leading padding along one spatial axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisPlan {
    pub input: usize,
    pub kernel: usize,
    pub stride: usize,
    pub output: usize,
    /// Zero rows/columns virtually added before the first input element.
    pub pad_before: usize,
}

impl AxisPlan {
    /// Plans one axis. SAME splits the total padding with the odd remainder on
    /// the trailing edge.
    pub fn new(input: usize, kernel: usize, stride: usize, padding: Padding) -> Option<Self> {
        let (output, pad_before) = match padding {
            Padding::Valid => {
                if kernel > input {
                    return None;
                }
                ((input - kernel) / stride + 1, 0)
            }
            Padding::Same => {
                let output = input.div_ceil(stride);
                let total = ((output - 1) * stride + kernel).saturating_sub(input);
                (output, total / 2)
            }
        };
        Some(AxisPlan {
            input,
            kernel,
            stride,
            output,
            pad_before,
        })
    }

    /// Trailing padding implied by this plan.
    pub fn pad_after(&self) -> usize {
        ((self.output - 1) * self.stride + self.kernel).saturating_sub(self.input + self.pad_before)
    }

    /// For output index `o`, the in-bounds kernel taps and the input index of
    /// the first one. Taps landing in the padding are skipped.
    #[inline]
    pub fn taps(&self, o: usize) -> (Range<usize>, usize) {
        // origin may be negative, expressed as (start - pad_before)
        let start = o * self.stride;
        let k0 = self.pad_before.saturating_sub(start);
        let k1 = (self.input + self.pad_before - start).min(self.kernel);
        let first = start + k0 - self.pad_before;
        (k0..k1.max(k0), first)
    }
}

/// Sliding-window geometry shared by dense and depthwise convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvGeometry {
    pub x: AxisPlan,
    pub y: AxisPlan,
}

impl ConvGeometry {
    pub fn new(
        input_w: usize,
        input_h: usize,
        kernel_w: usize,
        kernel_h: usize,
        stride_x: usize,
        stride_y: usize,
        padding: Padding,
    ) -> Result<Self> {
        if stride_x == 0 || stride_y == 0 {
            return Err(TensorError::InvalidStride { stride_x, stride_y });
        }
        let too_large = || TensorError::KernelTooLarge {
            kernel_w,
            kernel_h,
            input_w,
            input_h,
        };
        let x = AxisPlan::new(input_w, kernel_w, stride_x, padding).ok_or_else(too_large)?;
        let y = AxisPlan::new(input_h, kernel_h, stride_y, padding).ok_or_else(too_large)?;
        Ok(ConvGeometry { x, y })
    }

    pub fn output_w(&self) -> usize {
        self.x.output
    }

    pub fn output_h(&self) -> usize {
        self.y.output
    }

    /// Visits every in-bounds kernel row of the window producing output
    /// `(ox, oy)`: `f(ky, iy, kx_range, ix0)` where `ix0` is the input column
    /// under `kx_range.start`. Columns of one row are contiguous in NHWC.
    #[inline]
    pub fn for_each_tap_row<F>(&self, ox: usize, oy: usize, mut f: F)
    where
        F: FnMut(usize, usize, Range<usize>, usize),
    {
        let (kx, ix0) = self.x.taps(ox);
        if kx.is_empty() {
            return;
        }
        let (ky, iy0) = self.y.taps(oy);
        for (i, k) in ky.enumerate() {
            f(k, iy0 + i, kx.clone(), ix0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dims() {
        let d = Dims::new(2, 3, 4, 5);
        assert_eq!(d.numel(), 120);
        assert_eq!(d.per_batch(), 60);
        assert_eq!(d.to_string(), "[n=2, w=3, h=4, c=5]");
    }

    #[test]
    fn test_valid_output_size() {
        let p = AxisPlan::new(4, 3, 1, Padding::Valid).unwrap();
        assert_eq!(p.output, 2);
        assert_eq!(p.pad_before, 0);

        let p = AxisPlan::new(7, 3, 2, Padding::Valid).unwrap();
        assert_eq!(p.output, 3);

        assert!(AxisPlan::new(2, 3, 1, Padding::Valid).is_none());
    }

    #[test]
    fn test_same_keeps_size_at_stride_one() {
        for kernel in 1..8 {
            let p = AxisPlan::new(5, kernel, 1, Padding::Same).unwrap();
            assert_eq!(p.output, 5, "kernel {kernel}");
        }
    }

    #[test]
    fn test_same_odd_padding_goes_to_trailing_edge() {
        // 4 wide, kernel 2, stride 1: one pad pixel, on the right.
        let p = AxisPlan::new(4, 2, 1, Padding::Same).unwrap();
        assert_eq!(p.pad_before, 0);
        assert_eq!(p.pad_after(), 1);

        // kernel 4: three pad pixels, one leading and two trailing.
        let p = AxisPlan::new(4, 4, 1, Padding::Same).unwrap();
        assert_eq!(p.pad_before, 1);
        assert_eq!(p.pad_after(), 2);
    }

    #[test]
    fn test_same_strided() {
        let p = AxisPlan::new(7, 3, 2, Padding::Same).unwrap();
        assert_eq!(p.output, 4);
        // (4-1)*2 + 3 - 7 = 2
        assert_eq!(p.pad_before, 1);
        assert_eq!(p.pad_after(), 1);
    }

    #[test]
    fn test_taps_clip_padding() {
        // input 4, kernel 3, SAME: pad 1 before, 1 after.
        let p = AxisPlan::new(4, 3, 1, Padding::Same).unwrap();
        assert_eq!(p.taps(0), (1..3, 0));
        assert_eq!(p.taps(1), (0..3, 0));
        assert_eq!(p.taps(3), (0..2, 2));
    }

    #[test]
    fn test_taps_kernel_larger_than_input() {
        // input 2, kernel 5, SAME: total pad 4, two before.
        let p = AxisPlan::new(2, 5, 1, Padding::Same).unwrap();
        assert_eq!(p.taps(0), (2..4, 0));
        assert_eq!(p.taps(1), (1..3, 0));
    }

    #[test]
    fn test_geometry_rejects_zero_stride() {
        let err = ConvGeometry::new(4, 4, 3, 3, 0, 1, Padding::Valid).unwrap_err();
        assert!(matches!(err, TensorError::InvalidStride { .. }));
    }

    #[test]
    fn test_geometry_kernel_too_large() {
        let err = ConvGeometry::new(2, 4, 3, 3, 1, 1, Padding::Valid).unwrap_err();
        assert!(matches!(err, TensorError::KernelTooLarge { .. }));
    }

    #[test]
    fn test_tap_rows_cover_window() {
        let g = ConvGeometry::new(4, 4, 3, 3, 1, 1, Padding::Valid).unwrap();
        let mut rows = Vec::new();
        g.for_each_tap_row(1, 1, |ky, iy, kx, ix0| rows.push((ky, iy, kx, ix0)));
        assert_eq!(rows, vec![(0, 1, 0..3, 1), (1, 2, 0..3, 1), (2, 3, 0..3, 1)]);
    }
}
