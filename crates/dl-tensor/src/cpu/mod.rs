use crate::backend::ConvBackend;

/// Pure-Rust portable backend.
///
/// Straight sequential loops, so results are bit-reproducible across
/// platforms. Used as the reference implementation and as the fallback when
/// SIMD kernels are unavailable.
#[derive(Debug, Clone, Copy)]
pub struct CpuBackend;

impl CpuBackend {
    pub fn new() -> Self {
        CpuBackend
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ConvBackend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn dot_f32(&self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        let mut sum = 0.0f32;
        for (x, w) in a.iter().zip(b) {
            sum += x * w;
        }
        sum
    }

    fn dot_u8(&self, a: &[u8], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        let mut sum = 0.0f32;
        for (&x, w) in a.iter().zip(b) {
            sum += x as f32 * w;
        }
        sum
    }

    fn mul_acc_f32(&self, acc: &mut [f32], a: &[f32], b: &[f32]) {
        debug_assert!(acc.len() == a.len() && a.len() == b.len());
        for ((o, x), w) in acc.iter_mut().zip(a).zip(b) {
            *o += x * w;
        }
    }
}
