use crate::dtype::Element;
use crate::error::{Result, TensorError};
use crate::shape::Dims;
use crate::tensor::Matrix3d;

/// Copies the `w x h` rectangle at `(x, y)` of every channel and batch entry
/// of `src` into `dst`, which must already be `(n(src), w, h, c(src))`.
///
/// Nothing is allocated; the copy is always materialised, never a view.
///
/// # Errors
/// [`TensorError::ShapeMismatch`] for a wrongly sized `dst`,
/// [`TensorError::SliceOutOfBounds`] if the rectangle leaves `src`.
pub fn slice_copy<T: Element>(
    dst: &mut Matrix3d<T>,
    src: &Matrix3d<T>,
    x: usize,
    y: usize,
    w: usize,
    h: usize,
) -> Result<()> {
    let expected = Dims::new(src.number(), w, h, src.channels());
    if dst.dims() != expected {
        return Err(TensorError::ShapeMismatch {
            op: "slice_copy",
            expected,
            got: dst.dims(),
        });
    }
    let fits = |start: usize, len: usize, limit: usize| start.checked_add(len).is_some_and(|end| end <= limit);
    if !fits(x, w, src.width()) || !fits(y, h, src.height()) {
        return Err(TensorError::SliceOutOfBounds {
            x,
            y,
            w,
            h,
            width: src.width(),
            height: src.height(),
        });
    }

    let run = w * src.channels();
    let data = src.as_slice();
    for n in 0..src.number() {
        for row in 0..h {
            let start = src.offset(n, y + row, x);
            dst.row_mut(n, row).copy_from_slice(&data[start..start + run]);
        }
    }
    Ok(())
}
