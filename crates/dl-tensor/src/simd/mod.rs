//! SIMD backend: AVX2+FMA on x86_64, NEON on aarch64.
//!
//! Vector lanes accumulate independently and are reduced at the end, so
//! results differ from [`CpuBackend`](crate::cpu::CpuBackend) only by
//! floating-point summation order.

#[cfg(target_arch = "aarch64")]
mod aarch64;
#[cfg(target_arch = "x86_64")]
mod x86;

use crate::backend::ConvBackend;

/// Hardware-accelerated backend.
///
/// Prefer [`backend::select`](crate::backend::select) with
/// [`ConvMode::Accelerated`](crate::ConvMode::Accelerated); calling the
/// kernels directly on an unsupported CPU runs scalar loops.
#[derive(Debug, Clone, Copy)]
pub struct SimdBackend;

impl SimdBackend {
    /// Returns the backend if this CPU can run its kernels.
    pub fn detect() -> Option<Self> {
        Self::is_supported().then_some(SimdBackend)
    }

    #[cfg(target_arch = "x86_64")]
    pub fn is_supported() -> bool {
        is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma")
    }

    #[cfg(target_arch = "aarch64")]
    pub fn is_supported() -> bool {
        // NEON is mandatory on aarch64
        true
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    pub fn is_supported() -> bool {
        false
    }
}

impl ConvBackend for SimdBackend {
    fn name(&self) -> &str {
        "simd"
    }

    #[allow(unreachable_code)]
    fn dot_f32(&self, a: &[f32], b: &[f32]) -> f32 {
        let n = a.len().min(b.len());
        let (a, b) = (&a[..n], &b[..n]);

        #[cfg(target_arch = "x86_64")]
        {
            if Self::is_supported() {
                // SAFETY: AVX2 and FMA were detected at runtime.
                return unsafe { x86::dot_f32(a, b) };
            }
        }

        #[cfg(target_arch = "aarch64")]
        {
            // SAFETY: NEON is mandatory on aarch64.
            return unsafe { aarch64::dot_f32(a, b) };
        }

        a.iter().zip(b).map(|(x, w)| x * w).sum()
    }

    #[allow(unreachable_code)]
    fn dot_u8(&self, a: &[u8], b: &[f32]) -> f32 {
        let n = a.len().min(b.len());
        let (a, b) = (&a[..n], &b[..n]);

        #[cfg(target_arch = "x86_64")]
        {
            if Self::is_supported() {
                // SAFETY: AVX2 and FMA were detected at runtime.
                return unsafe { x86::dot_u8(a, b) };
            }
        }

        #[cfg(target_arch = "aarch64")]
        {
            // SAFETY: NEON is mandatory on aarch64.
            return unsafe { aarch64::dot_u8(a, b) };
        }

        a.iter().zip(b).map(|(&x, w)| x as f32 * w).sum()
    }

    #[allow(unreachable_code)]
    fn mul_acc_f32(&self, acc: &mut [f32], a: &[f32], b: &[f32]) {
        let n = acc.len().min(a.len()).min(b.len());
        let (acc, a, b) = (&mut acc[..n], &a[..n], &b[..n]);

        #[cfg(target_arch = "x86_64")]
        {
            if Self::is_supported() {
                // SAFETY: AVX2 and FMA were detected at runtime.
                unsafe { x86::mul_acc_f32(acc, a, b) };
                return;
            }
        }

        #[cfg(target_arch = "aarch64")]
        {
            // SAFETY: NEON is mandatory on aarch64.
            unsafe { aarch64::mul_acc_f32(acc, a, b) };
            return;
        }

        for ((o, x), w) in acc.iter_mut().zip(a).zip(b) {
            *o += x * w;
        }
    }
}
