use std::borrow::Cow;
use std::ffi::c_int;
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ptr::NonNull;
use std::slice;

use crate::dtype::{DType, Element};
use crate::error::{Result, TensorError};
use crate::shape::Dims;
use crate::storage;

/// A 4-D tensor in NHWC order with a C-compatible header.
///
/// Element `(n, y, x, ch)` lives at `((n * h + y) * stride + x) * c + ch`.
/// `stride >= w` is the element stride between rows, so a row may carry
/// padding columns that operators never read.
///
/// # Layout
/// The record is `#[repr(C)]` and starts with the five `int` fields
/// `w, h, c, n, stride` in that order, followed by the element pointer.
/// SIMD dot-product routines written against the C header read these fields
/// by offset, so the order is fixed and checked at compile time.
///
/// The buffer is uniquely owned and released on drop.
#[repr(C)]
pub struct Matrix3d<T> {
    w: c_int,
    h: c_int,
    c: c_int,
    n: c_int,
    stride: c_int,
    item: NonNull<T>,
    _owns: PhantomData<T>,
}

/// Float tensor.
pub type Matrix3dF = Matrix3d<f32>;
/// Quantized 8-bit tensor.
pub type Matrix3du = Matrix3d<u8>;

// Header ABI. The pointer follows the five ints at its natural alignment.
const _: () = {
    const INT: usize = mem::size_of::<c_int>();
    assert!(mem::offset_of!(Matrix3d<f32>, w) == 0);
    assert!(mem::offset_of!(Matrix3d<f32>, h) == INT);
    assert!(mem::offset_of!(Matrix3d<f32>, c) == 2 * INT);
    assert!(mem::offset_of!(Matrix3d<f32>, n) == 3 * INT);
    assert!(mem::offset_of!(Matrix3d<f32>, stride) == 4 * INT);
    assert!(
        mem::offset_of!(Matrix3d<f32>, item)
            == (5 * INT).next_multiple_of(mem::align_of::<*mut f32>())
    );
    assert!(mem::offset_of!(Matrix3d<u8>, item) == mem::offset_of!(Matrix3d<f32>, item));
};

// SAFETY: the buffer is uniquely owned, like a `Box<[T]>`.
unsafe impl<T: Send> Send for Matrix3d<T> {}
// SAFETY: shared access only hands out `&[T]`.
unsafe impl<T: Sync> Sync for Matrix3d<T> {}

/// Checks dimensions and returns the buffer length.
fn buffer_len<T>(dims: Dims, stride: usize) -> Result<usize> {
    let invalid = || TensorError::InvalidDimensions { dims, stride };
    let fields = [dims.n, dims.w, dims.h, dims.c, stride];
    if fields.iter().any(|&d| d == 0 || d > c_int::MAX as usize) || stride < dims.w {
        return Err(invalid());
    }
    let len = [dims.n, dims.h, dims.c]
        .iter()
        .try_fold(stride, |acc, &d| acc.checked_mul(d))
        .ok_or_else(invalid)?;
    match len.checked_mul(mem::size_of::<T>()) {
        Some(bytes) if bytes <= isize::MAX as usize => Ok(len),
        _ => Err(invalid()),
    }
}

impl<T: Element> Matrix3d<T> {
    fn from_parts(dims: Dims, stride: usize, item: NonNull<T>) -> Self {
        // Fits: checked by `buffer_len`.
        Matrix3d {
            w: dims.w as c_int,
            h: dims.h as c_int,
            c: dims.c as c_int,
            n: dims.n as c_int,
            stride: stride as c_int,
            item,
            _owns: PhantomData,
        }
    }

    /// Allocates a zero-filled tensor with packed rows (`stride == w`).
    ///
    /// `n` is the output channel count for filters and 1 for activations.
    ///
    /// # Errors
    /// [`TensorError::InvalidDimensions`] for zero or oversized dimensions,
    /// [`TensorError::AllocationFailed`] if memory is exhausted.
    pub fn alloc(n: usize, w: usize, h: usize, c: usize) -> Result<Self> {
        Self::alloc_with_stride(n, w, h, c, w)
    }

    /// Allocates a zero-filled tensor whose rows are `stride` elements apart.
    pub fn alloc_with_stride(n: usize, w: usize, h: usize, c: usize, stride: usize) -> Result<Self> {
        let dims = Dims::new(n, w, h, c);
        let len = buffer_len::<T>(dims, stride)?;
        let item = storage::alloc_default::<T>(len)?;
        Ok(Self::from_parts(dims, stride, item))
    }

    /// Builds a packed tensor from `data` in NHWC order.
    ///
    /// # Errors
    /// [`TensorError::BufferSizeMismatch`] if `data.len() != n * w * h * c`.
    pub fn from_vec(n: usize, w: usize, h: usize, c: usize, data: Vec<T>) -> Result<Self> {
        let dims = Dims::new(n, w, h, c);
        let len = buffer_len::<T>(dims, w)?;
        if data.len() != len {
            return Err(TensorError::BufferSizeMismatch {
                expected: len,
                actual: data.len(),
            });
        }
        Ok(Self::from_parts(dims, w, storage::into_raw(data)))
    }

    pub fn width(&self) -> usize {
        self.w as usize
    }

    pub fn height(&self) -> usize {
        self.h as usize
    }

    pub fn channels(&self) -> usize {
        self.c as usize
    }

    /// Batch count; output channels for filter tensors.
    pub fn number(&self) -> usize {
        self.n as usize
    }

    /// Element stride between consecutive rows, in pixels.
    pub fn stride(&self) -> usize {
        self.stride as usize
    }

    pub fn dims(&self) -> Dims {
        Dims::new(self.number(), self.width(), self.height(), self.channels())
    }

    pub fn dtype(&self) -> DType {
        T::DTYPE
    }

    /// Buffer length including row padding.
    pub fn len(&self) -> usize {
        self.number() * self.height() * self.stride() * self.channels()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when rows carry no padding columns.
    pub fn is_packed(&self) -> bool {
        self.stride == self.w
    }

    /// The whole buffer, padding columns included.
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: `item` owns `len()` initialised elements.
        unsafe { slice::from_raw_parts(self.item.as_ptr(), self.len()) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: as above, and `&mut self` guarantees exclusive access.
        unsafe { slice::from_raw_parts_mut(self.item.as_ptr(), self.len()) }
    }

    /// Raw element pointer, for handing the buffer to foreign kernels.
    pub fn as_ptr(&self) -> *const T {
        self.item.as_ptr()
    }

    /// Buffer index of channel 0 at `(n, y, x)`.
    #[inline]
    pub fn offset(&self, n: usize, y: usize, x: usize) -> usize {
        ((n * self.height() + y) * self.stride() + x) * self.channels()
    }

    /// The `w * c` valid elements of row `y` in batch entry `n`.
    #[inline]
    pub fn row(&self, n: usize, y: usize) -> &[T] {
        let start = self.offset(n, y, 0);
        &self.as_slice()[start..start + self.width() * self.channels()]
    }

    #[inline]
    pub fn row_mut(&mut self, n: usize, y: usize) -> &mut [T] {
        let start = self.offset(n, y, 0);
        let end = start + self.width() * self.channels();
        &mut self.as_mut_slice()[start..end]
    }

    /// Channel vector at `(n, y, x)`.
    #[inline]
    pub fn pixel(&self, n: usize, y: usize, x: usize) -> &[T] {
        let start = self.offset(n, y, x);
        &self.as_slice()[start..start + self.channels()]
    }

    pub fn get(&self, n: usize, y: usize, x: usize, ch: usize) -> T {
        self.as_slice()[self.offset(n, y, x) + ch]
    }

    pub fn set(&mut self, n: usize, y: usize, x: usize, ch: usize, value: T) {
        let i = self.offset(n, y, x) + ch;
        self.as_mut_slice()[i] = value;
    }

    /// Valid elements of batch entry `n`, borrowed when rows are packed.
    pub fn batch(&self, n: usize) -> Cow<'_, [T]> {
        if self.is_packed() {
            let per = self.dims().per_batch();
            Cow::Borrowed(&self.as_slice()[n * per..(n + 1) * per])
        } else {
            let mut out = Vec::with_capacity(self.dims().per_batch());
            for y in 0..self.height() {
                out.extend_from_slice(self.row(n, y));
            }
            Cow::Owned(out)
        }
    }

    /// All valid elements in NHWC order, without row padding.
    pub fn to_packed_vec(&self) -> Vec<T> {
        if self.is_packed() {
            return self.as_slice().to_vec();
        }
        let mut out = Vec::with_capacity(self.dims().numel());
        for n in 0..self.number() {
            for y in 0..self.height() {
                out.extend_from_slice(self.row(n, y));
            }
        }
        out
    }

    /// Applies `f` to every valid element, skipping row padding.
    pub fn map_in_place<F: FnMut(T) -> T>(&mut self, mut f: F) {
        for n in 0..self.number() {
            for y in 0..self.height() {
                for v in self.row_mut(n, y) {
                    *v = f(*v);
                }
            }
        }
    }
}

impl<T> Drop for Matrix3d<T> {
    fn drop(&mut self) {
        let len = self.n as usize * self.h as usize * self.stride as usize * self.c as usize;
        // SAFETY: `item` was produced by `storage` with exactly `len` elements
        // and the header is immutable after construction.
        unsafe { storage::release(self.item, len) };
    }
}

impl<T: Element> Clone for Matrix3d<T> {
    fn clone(&self) -> Self {
        Self::from_parts(self.dims(), self.stride(), storage::into_raw(self.as_slice().to_vec()))
    }
}

impl<T: Element> PartialEq for Matrix3d<T> {
    /// Equal shapes and equal valid elements; row padding is ignored.
    fn eq(&self, other: &Self) -> bool {
        if self.dims() != other.dims() {
            return false;
        }
        (0..self.number())
            .all(|n| (0..self.height()).all(|y| self.row(n, y) == other.row(n, y)))
    }
}

impl<T: Element> fmt::Debug for Matrix3d<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matrix3d")
            .field("dtype", &T::DTYPE)
            .field("dims", &self.dims())
            .field("stride", &self.stride())
            .finish()
    }
}
