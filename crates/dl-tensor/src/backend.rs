use std::fmt::Debug;

use crate::config::ConvMode;
use crate::cpu::CpuBackend;
use crate::simd::SimdBackend;

/// Inner-loop kernels behind the convolution engine.
///
/// There are exactly two implementations: the portable [`CpuBackend`] and
/// the SIMD [`SimdBackend`]. Both must produce the same results up to
/// floating-point accumulation order. Backends hold no state, so a call may
/// pick either one without affecting any other call.
pub trait ConvBackend: Send + Sync + Debug {
    /// Returns the name of this backend (e.g., "cpu", "simd").
    fn name(&self) -> &str;

    /// `Σ a[i] * b[i]` over two slices of equal length.
    fn dot_f32(&self, a: &[f32], b: &[f32]) -> f32;

    /// `Σ a[i] * b[i]` with unsigned 8-bit activations and float weights.
    fn dot_u8(&self, a: &[u8], b: &[f32]) -> f32;

    /// Element-wise multiply-accumulate: `acc[i] += a[i] * b[i]`.
    fn mul_acc_f32(&self, acc: &mut [f32], a: &[f32], b: &[f32]);
}

static CPU: CpuBackend = CpuBackend;
static SIMD: SimdBackend = SimdBackend;

/// Resolves the backend for one operator call.
///
/// [`ConvMode::Accelerated`] degrades to the portable backend when the CPU
/// lacks the instructions the SIMD kernels need.
pub fn select(mode: ConvMode) -> &'static dyn ConvBackend {
    match mode {
        ConvMode::Portable => &CPU,
        ConvMode::Accelerated => {
            if SimdBackend::is_supported() {
                &SIMD
            } else {
                tracing::debug!("accelerated mode unsupported on this CPU, using portable backend");
                &CPU
            }
        }
    }
}
