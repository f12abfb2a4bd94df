//! Operators over [`Matrix3d`](crate::Matrix3d) tensors.
//!
//! Every operator validates shapes up front and returns a
//! [`TensorError`](crate::TensorError) instead of touching memory it does not
//! own. Operators that produce a new tensor allocate it; activations work in
//! place.

mod activation;
mod conv;
mod depthwise;
mod fc;
mod mobilenet;
mod slice;

pub use activation::{leaky_relu, prelu, relu, softmax, NO_CLIP};
pub use conv::{conv, conv_no_bias};
pub use depthwise::depthwise_conv;
pub use fc::fc;
pub use mobilenet::mobilenet;
pub use slice::slice_copy;
