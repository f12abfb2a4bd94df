//! C ABI over `dl-tensor`, mirroring the `dl_matrix3d_*` function family.
//!
//! Tensors cross the boundary as `DlMatrix3d` / `DlMatrix3du` pointers that
//! were allocated by this library (`dl_matrix3d_alloc` or any operator that
//! returns a tensor) and must be released with the matching `*_free`.
//! Functions returning a tensor return null on failure; the others return a
//! `DlStatus`. Either way the reason is available from `dl_last_error`.

mod error;
mod types;

pub use error::*;
pub use types::*;

use std::ffi::{c_char, c_int, c_void, CString};
use std::panic::{self, UnwindSafe};
use std::ptr;

use dl_tensor::{ConvConfig, DType, Matrix3dF, Matrix3du};

/// Return types that can carry a failure back to C.
trait FfiReturn {
    fn failure(status: DlStatus) -> Self;
}

impl FfiReturn for DlStatus {
    fn failure(status: DlStatus) -> Self {
        status
    }
}

impl FfiReturn for *mut DlMatrix3d {
    fn failure(_: DlStatus) -> Self {
        ptr::null_mut()
    }
}

impl FfiReturn for *mut DlMatrix3du {
    fn failure(_: DlStatus) -> Self {
        ptr::null_mut()
    }
}

/// Run `f`, turning both errors and panics into the failure value of `R` and
/// recording the message for `dl_last_error`.
fn ffi_call<R, F>(op: &'static str, f: F) -> R
where
    R: FfiReturn,
    F: FnOnce() -> Result<R, FfiError> + UnwindSafe,
{
    match panic::catch_unwind(f) {
        Ok(Ok(value)) => value,
        Ok(Err(err)) => {
            tracing::warn!(op, status = ?err.status, error = %err.message, "call failed");
            set_last_error(format!("{op}: {}", err.message));
            R::failure(err.status)
        }
        Err(_) => {
            tracing::warn!(op, "panic caught at the C boundary");
            set_last_error(format!("{op}: internal panic"));
            R::failure(DlStatus::ErrorInternal)
        }
    }
}

/// # Safety
/// `ptr` must be null or point to a live tensor allocated by this library.
unsafe fn borrow<'a, T>(ptr: *const T, name: &str) -> Result<&'a T, FfiError> {
    unsafe { ptr.as_ref() }.ok_or_else(|| FfiError::null(name))
}

/// # Safety
/// As [`borrow`], and no other reference to the tensor may be alive.
unsafe fn borrow_mut<'a, T>(ptr: *mut T, name: &str) -> Result<&'a mut T, FfiError> {
    unsafe { ptr.as_mut() }.ok_or_else(|| FfiError::null(name))
}

fn into_raw<M, T>(tensor: T) -> *mut M {
    Box::into_raw(Box::new(tensor)).cast()
}

fn alloc_with<T: dl_tensor::Element, M>(
    n: c_int,
    w: c_int,
    h: c_int,
    c: c_int,
) -> Result<*mut M, FfiError> {
    let tensor = dl_tensor::Matrix3d::<T>::alloc(
        to_usize(n, "n")?,
        to_usize(w, "w")?,
        to_usize(h, "h")?,
        to_usize(c, "c")?,
    )?;
    Ok(into_raw(tensor))
}

/// Allocate a zero-filled float tensor of shape `(n, w, h, c)`.
///
/// Returns null if a dimension is not positive or memory is exhausted.
#[no_mangle]
pub extern "C" fn dl_matrix3d_alloc(n: c_int, w: c_int, h: c_int, c: c_int) -> *mut DlMatrix3d {
    ffi_call("dl_matrix3d_alloc", move || alloc_with::<f32, _>(n, w, h, c))
}

/// Allocate a zero-filled quantized tensor of shape `(n, w, h, c)`.
#[no_mangle]
pub extern "C" fn dl_matrix3du_alloc(
    n: c_int,
    w: c_int,
    h: c_int,
    c: c_int,
) -> *mut DlMatrix3du {
    ffi_call("dl_matrix3du_alloc", move || alloc_with::<u8, _>(n, w, h, c))
}

/// Free a float tensor. Passing null is a no-op.
///
/// # Safety
/// `m` must come from this library and must not be used afterwards.
#[no_mangle]
pub unsafe extern "C" fn dl_matrix3d_free(m: *mut DlMatrix3d) {
    if !m.is_null() {
        drop(Box::from_raw(m.cast::<Matrix3dF>()));
    }
}

/// Free a quantized tensor. Passing null is a no-op.
///
/// # Safety
/// `m` must come from this library and must not be used afterwards.
#[no_mangle]
pub unsafe extern "C" fn dl_matrix3du_free(m: *mut DlMatrix3du) {
    if !m.is_null() {
        drop(Box::from_raw(m.cast::<Matrix3du>()));
    }
}

/// In-place `max(0, min(x, clip))`. `clip <= 0` disables the upper bound.
///
/// # Safety
/// `m` must be null or a live tensor from this library.
#[no_mangle]
pub unsafe extern "C" fn dl_matrix3d_relu(m: *mut DlMatrix3d, clip: f32) -> DlStatus {
    ffi_call("dl_matrix3d_relu", move || {
        let m = unsafe { borrow_mut(m.cast::<Matrix3dF>(), "m")? };
        dl_tensor::relu(m, clip);
        Ok(DlStatus::Ok)
    })
}

/// In-place leaky relu: negatives become `x * alpha`, positives are clipped
/// as in `dl_matrix3d_relu`.
///
/// # Safety
/// `m` must be null or a live tensor from this library.
#[no_mangle]
pub unsafe extern "C" fn dl_matrix3d_leaky_relu(
    m: *mut DlMatrix3d,
    clip: f32,
    alpha: f32,
) -> DlStatus {
    ffi_call("dl_matrix3d_leaky_relu", move || {
        let m = unsafe { borrow_mut(m.cast::<Matrix3dF>(), "m")? };
        dl_tensor::leaky_relu(m, clip, alpha);
        Ok(DlStatus::Ok)
    })
}

/// In-place softmax over each batch entry.
///
/// # Safety
/// `m` must be null or a live tensor from this library.
#[no_mangle]
pub unsafe extern "C" fn dl_matrix3d_softmax(m: *mut DlMatrix3d) -> DlStatus {
    ffi_call("dl_matrix3d_softmax", move || {
        let m = unsafe { borrow_mut(m.cast::<Matrix3dF>(), "m")? };
        dl_tensor::softmax(m);
        Ok(DlStatus::Ok)
    })
}

/// Fully connected layer. Returns a new `(1, 1, 1, H)` tensor.
///
/// # Safety
/// Every pointer must be null or a live tensor from this library.
#[no_mangle]
pub unsafe extern "C" fn dl_matrix3d_fc(
    input: *const DlMatrix3d,
    filter: *const DlMatrix3d,
    bias: *const DlMatrix3d,
) -> *mut DlMatrix3d {
    ffi_call("dl_matrix3d_fc", move || {
        let input = unsafe { borrow(input.cast::<Matrix3dF>(), "in")? };
        let filter = unsafe { borrow(filter.cast::<Matrix3dF>(), "filter")? };
        let bias = unsafe { borrow(bias.cast::<Matrix3dF>(), "bias")? };
        Ok(into_raw(dl_tensor::fc(input, filter, bias)?))
    })
}

/// Copy the `w x h` rectangle at `(x, y)` of `src` into `dst`, which must
/// already have shape `(n(src), w, h, c(src))`.
///
/// # Safety
/// Both pointers must be null or live, distinct tensors from this library.
#[no_mangle]
pub unsafe extern "C" fn dl_matrix3d_slice_copy(
    dst: *mut DlMatrix3d,
    src: *const DlMatrix3d,
    x: c_int,
    y: c_int,
    w: c_int,
    h: c_int,
) -> DlStatus {
    ffi_call("dl_matrix3d_slice_copy", move || unsafe {
        slice_copy_raw(dst.cast::<Matrix3dF>(), src.cast::<Matrix3dF>(), x, y, w, h)
    })
}

/// Quantized variant of `dl_matrix3d_slice_copy`.
///
/// # Safety
/// Both pointers must be null or live, distinct tensors from this library.
#[no_mangle]
pub unsafe extern "C" fn dl_matrix3du_slice_copy(
    dst: *mut DlMatrix3du,
    src: *const DlMatrix3du,
    x: c_int,
    y: c_int,
    w: c_int,
    h: c_int,
) -> DlStatus {
    ffi_call("dl_matrix3du_slice_copy", move || unsafe {
        slice_copy_raw(dst.cast::<Matrix3du>(), src.cast::<Matrix3du>(), x, y, w, h)
    })
}

unsafe fn slice_copy_raw<T: dl_tensor::Element>(
    dst: *mut dl_tensor::Matrix3d<T>,
    src: *const dl_tensor::Matrix3d<T>,
    x: c_int,
    y: c_int,
    w: c_int,
    h: c_int,
) -> Result<DlStatus, FfiError> {
    if ptr::eq(dst, src) && !dst.is_null() {
        return Err(FfiError::invalid("dst and src are the same tensor".to_string()));
    }
    let dst = unsafe { borrow_mut(dst, "dst")? };
    let src = unsafe { borrow(src, "src")? };
    dl_tensor::slice_copy(
        dst,
        src,
        to_usize(x, "x")?,
        to_usize(y, "y")?,
        to_usize(w, "w")?,
        to_usize(h, "h")?,
    )?;
    Ok(DlStatus::Ok)
}

/// Dense convolution of a float input. `padding` is a `DlPadding` and `mode`
/// a `DlConvMode` value.
///
/// # Safety
/// Every pointer must be null or a live tensor from this library.
#[no_mangle]
pub unsafe extern "C" fn dl_matrix3d_conv(
    input: *const DlMatrix3d,
    filter: *const DlMatrix3d,
    bias: *const DlMatrix3d,
    stride_x: c_int,
    stride_y: c_int,
    padding: c_int,
    mode: c_int,
) -> *mut DlMatrix3d {
    ffi_call("dl_matrix3d_conv", move || {
        let input = unsafe { borrow(input.cast::<Matrix3dF>(), "in")? };
        let filter = unsafe { borrow(filter.cast::<Matrix3dF>(), "filter")? };
        let bias = unsafe { borrow(bias.cast::<Matrix3dF>(), "bias")? };
        let out = dl_tensor::conv(
            input,
            filter,
            bias,
            to_usize(stride_x, "stride_x")?,
            to_usize(stride_y, "stride_y")?,
            padding_from(padding)?,
            mode_from(mode)?,
        )?;
        Ok(into_raw(out))
    })
}

/// Dense convolution of a quantized input with float weights.
///
/// # Safety
/// Every pointer must be null or a live tensor from this library.
#[no_mangle]
pub unsafe extern "C" fn dl_matrix3du_conv(
    input: *const DlMatrix3du,
    filter: *const DlMatrix3d,
    bias: *const DlMatrix3d,
    stride_x: c_int,
    stride_y: c_int,
    padding: c_int,
    mode: c_int,
) -> *mut DlMatrix3d {
    ffi_call("dl_matrix3du_conv", move || {
        let input = unsafe { borrow(input.cast::<Matrix3du>(), "in")? };
        let filter = unsafe { borrow(filter.cast::<Matrix3dF>(), "filter")? };
        let bias = unsafe { borrow(bias.cast::<Matrix3dF>(), "bias")? };
        let out = dl_tensor::conv(
            input,
            filter,
            bias,
            to_usize(stride_x, "stride_x")?,
            to_usize(stride_y, "stride_y")?,
            padding_from(padding)?,
            mode_from(mode)?,
        )?;
        Ok(into_raw(out))
    })
}

/// Depthwise convolution; `filter` is `(1, Kw, Kh, C)`.
///
/// # Safety
/// Every pointer must be null or a live tensor from this library.
#[no_mangle]
pub unsafe extern "C" fn dl_matrix3d_depthwise_conv(
    input: *const DlMatrix3d,
    filter: *const DlMatrix3d,
    stride_x: c_int,
    stride_y: c_int,
    padding: c_int,
    mode: c_int,
) -> *mut DlMatrix3d {
    ffi_call("dl_matrix3d_depthwise_conv", move || {
        let input = unsafe { borrow(input.cast::<Matrix3dF>(), "in")? };
        let filter = unsafe { borrow(filter.cast::<Matrix3dF>(), "filter")? };
        let out = dl_tensor::depthwise_conv(
            input,
            filter,
            to_usize(stride_x, "stride_x")?,
            to_usize(stride_y, "stride_y")?,
            padding_from(padding)?,
            mode_from(mode)?,
        )?;
        Ok(into_raw(out))
    })
}

/// Fused mobilenet block. `input` is a `DlMatrix3d *` or `DlMatrix3du *`
/// according to `config->op_type`.
///
/// # Safety
/// `input` must point to a tensor of the type named by `config->op_type`;
/// every other pointer must be null or live.
#[no_mangle]
pub unsafe extern "C" fn dl_matrix3d_mobilenet(
    input: *const c_void,
    dilate: *const DlMatrix3d,
    depthwise: *const DlMatrix3d,
    compress: *const DlMatrix3d,
    bias: *const DlMatrix3d,
    prelu: *const DlMatrix3d,
    config: *const DlConvConfig,
) -> *mut DlMatrix3d {
    ffi_call("dl_matrix3d_mobilenet", move || {
        let config = ConvConfig::try_from(unsafe { borrow(config, "config")? })?;
        let dilate = unsafe { borrow(dilate.cast::<Matrix3dF>(), "dilate")? };
        let depthwise = unsafe { borrow(depthwise.cast::<Matrix3dF>(), "depthwise")? };
        let compress = unsafe { borrow(compress.cast::<Matrix3dF>(), "compress")? };
        let bias = unsafe { borrow(bias.cast::<Matrix3dF>(), "bias")? };
        let prelu = unsafe { borrow(prelu.cast::<Matrix3dF>(), "prelu")? };

        let out = match config.input_type {
            DType::F32 => {
                let input = unsafe { borrow(input.cast::<Matrix3dF>(), "in")? };
                dl_tensor::mobilenet(input, dilate, depthwise, compress, bias, prelu, &config)?
            }
            DType::U8 => {
                let input = unsafe { borrow(input.cast::<Matrix3du>(), "in")? };
                dl_tensor::mobilenet(input, dilate, depthwise, compress, bias, prelu, &config)?
            }
        };
        Ok(into_raw(out))
    })
}

/// Retrieve the last error message.
///
/// Returns a pointer to a C string describing the most recent error on this
/// thread, or null if no error has occurred. The caller must free the
/// returned string with `dl_free_string`.
#[no_mangle]
pub extern "C" fn dl_last_error() -> *const c_char {
    match error::take_last_error() {
        Some(e) => e.into_raw(),
        None => std::ptr::null(),
    }
}

/// Free a string previously returned by `dl_last_error`.
///
/// # Safety
/// `s` must come from `dl_last_error` and must not be used afterwards.
#[no_mangle]
pub unsafe extern "C" fn dl_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}
