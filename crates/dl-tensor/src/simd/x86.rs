use std::arch::x86_64::*;

#[inline]
#[target_feature(enable = "avx2,fma")]
unsafe fn hsum(v: __m256) -> f32 {
    let low = _mm256_castps256_ps128(v);
    let high = _mm256_extractf128_ps(v, 1);
    let sum128 = _mm_add_ps(low, high);
    let sum64 = _mm_add_ps(sum128, _mm_movehl_ps(sum128, sum128));
    let sum32 = _mm_add_ss(sum64, _mm_shuffle_ps(sum64, sum64, 1));
    _mm_cvtss_f32(sum32)
}

/// # Safety
/// Requires AVX2 and FMA. `a` and `b` must have equal length.
#[target_feature(enable = "avx2,fma")]
pub(super) unsafe fn dot_f32(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len();
    let chunks = n / 8;

    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();
    let mut acc = _mm256_setzero_ps();

    for i in 0..chunks {
        let offset = i * 8;
        let va = _mm256_loadu_ps(a_ptr.add(offset));
        let vb = _mm256_loadu_ps(b_ptr.add(offset));
        acc = _mm256_fmadd_ps(va, vb, acc);
    }

    let mut result = hsum(acc);
    for i in chunks * 8..n {
        result += *a_ptr.add(i) * *b_ptr.add(i);
    }
    result
}

/// # Safety
/// Requires AVX2 and FMA. `a` and `b` must have equal length.
#[target_feature(enable = "avx2,fma")]
pub(super) unsafe fn dot_u8(a: &[u8], b: &[f32]) -> f32 {
    let n = a.len();
    let chunks = n / 8;

    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();
    let mut acc = _mm256_setzero_ps();

    for i in 0..chunks {
        let offset = i * 8;
        // 8 bytes -> 8 x i32 -> 8 x f32
        let bytes = _mm_loadl_epi64(a_ptr.add(offset) as *const __m128i);
        let va = _mm256_cvtepi32_ps(_mm256_cvtepu8_epi32(bytes));
        let vb = _mm256_loadu_ps(b_ptr.add(offset));
        acc = _mm256_fmadd_ps(va, vb, acc);
    }

    let mut result = hsum(acc);
    for i in chunks * 8..n {
        result += *a_ptr.add(i) as f32 * *b_ptr.add(i);
    }
    result
}

/// # Safety
/// Requires AVX2 and FMA. All slices must have equal length.
#[target_feature(enable = "avx2,fma")]
pub(super) unsafe fn mul_acc_f32(acc: &mut [f32], a: &[f32], b: &[f32]) {
    let n = acc.len();
    let chunks = n / 8;

    let acc_ptr = acc.as_mut_ptr();
    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();

    for i in 0..chunks {
        let offset = i * 8;
        let va = _mm256_loadu_ps(a_ptr.add(offset));
        let vb = _mm256_loadu_ps(b_ptr.add(offset));
        let vacc = _mm256_loadu_ps(acc_ptr.add(offset));
        _mm256_storeu_ps(acc_ptr.add(offset), _mm256_fmadd_ps(va, vb, vacc));
    }

    for i in chunks * 8..n {
        *acc_ptr.add(i) += *a_ptr.add(i) * *b_ptr.add(i);
    }
}
