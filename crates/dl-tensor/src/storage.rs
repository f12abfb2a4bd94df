//! Raw element buffers owned by [`Matrix3d`](crate::Matrix3d).
//!
//! The tensor header only stores a thin pointer so that its layout matches
//! the C record. The element count is recomputed from the header when the
//! buffer is released.

use std::mem;
use std::ptr::{self, NonNull};

use crate::error::{Result, TensorError};

/// Allocates `len` elements initialised to `T::default()`.
///
/// # Errors
/// Returns [`TensorError::AllocationFailed`] if the allocator refuses the
/// request.
pub(crate) fn alloc_default<T: Copy + Default>(len: usize) -> Result<NonNull<T>> {
    let mut data: Vec<T> = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|_| TensorError::AllocationFailed {
            elements: len,
            bytes: len.saturating_mul(mem::size_of::<T>()),
        })?;
    data.resize(len, T::default());
    Ok(into_raw(data))
}

/// Takes ownership of `data`. Release with [`release`] and `data.len()`.
pub(crate) fn into_raw<T>(data: Vec<T>) -> NonNull<T> {
    let raw = Box::into_raw(data.into_boxed_slice()) as *mut T;
    // SAFETY: Box::into_raw never returns null, even for empty slices.
    unsafe { NonNull::new_unchecked(raw) }
}

/// Frees a buffer obtained from [`alloc_default`] or [`into_raw`].
///
/// # Safety
/// `ptr` must come from one of those functions with exactly `len` elements
/// and must not be used afterwards.
pub(crate) unsafe fn release<T>(ptr: NonNull<T>, len: usize) {
    drop(Box::from_raw(ptr::slice_from_raw_parts_mut(ptr.as_ptr(), len)));
}
