use std::cell::RefCell;
use std::ffi::CString;

use dl_tensor::TensorError;

use crate::types::DlStatus;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Store an error message for later retrieval via `dl_last_error`.
pub fn set_last_error(msg: String) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Take the last error message, leaving `None` in its place.
pub fn take_last_error() -> Option<CString> {
    LAST_ERROR.with(|e| e.borrow_mut().take())
}

/// A failed call: the status reported to C plus the message for
/// `dl_last_error`.
#[derive(Debug)]
pub struct FfiError {
    pub status: DlStatus,
    pub message: String,
}

impl FfiError {
    pub fn null(name: &str) -> Self {
        FfiError {
            status: DlStatus::ErrorNullPointer,
            message: format!("{name} is null"),
        }
    }

    pub fn invalid(message: String) -> Self {
        FfiError {
            status: DlStatus::ErrorInvalidArgument,
            message,
        }
    }
}

impl From<TensorError> for FfiError {
    fn from(err: TensorError) -> Self {
        let status = match err {
            TensorError::AllocationFailed { .. } => DlStatus::ErrorOutOfMemory,
            TensorError::InvalidDimensions { .. } | TensorError::InvalidStride { .. } => {
                DlStatus::ErrorInvalidArgument
            }
            TensorError::ShapeMismatch { .. }
            | TensorError::DTypeMismatch { .. }
            | TensorError::BufferSizeMismatch { .. }
            | TensorError::KernelTooLarge { .. }
            | TensorError::SliceOutOfBounds { .. } => DlStatus::ErrorShape,
        };
        FfiError {
            status,
            message: err.to_string(),
        }
    }
}
