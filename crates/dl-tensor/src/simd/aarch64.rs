use std::arch::aarch64::*;

/// # Safety
/// `a` and `b` must have equal length.
#[target_feature(enable = "neon")]
pub(super) unsafe fn dot_f32(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len();
    let chunks = n / 4;

    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();
    let mut acc = vdupq_n_f32(0.0);

    for i in 0..chunks {
        let offset = i * 4;
        let va = vld1q_f32(a_ptr.add(offset));
        let vb = vld1q_f32(b_ptr.add(offset));
        acc = vfmaq_f32(acc, va, vb);
    }

    let mut result = vaddvq_f32(acc);
    for i in chunks * 4..n {
        result += *a_ptr.add(i) * *b_ptr.add(i);
    }
    result
}

/// # Safety
/// `a` and `b` must have equal length.
#[target_feature(enable = "neon")]
pub(super) unsafe fn dot_u8(a: &[u8], b: &[f32]) -> f32 {
    let n = a.len();
    let chunks = n / 8;

    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();
    let mut acc = vdupq_n_f32(0.0);

    for i in 0..chunks {
        let offset = i * 8;
        // 8 x u8 -> 8 x u16 -> 2 x (4 x u32) -> 2 x (4 x f32)
        let wide = vmovl_u8(vld1_u8(a_ptr.add(offset)));
        let lo = vcvtq_f32_u32(vmovl_u16(vget_low_u16(wide)));
        let hi = vcvtq_f32_u32(vmovl_u16(vget_high_u16(wide)));
        acc = vfmaq_f32(acc, lo, vld1q_f32(b_ptr.add(offset)));
        acc = vfmaq_f32(acc, hi, vld1q_f32(b_ptr.add(offset + 4)));
    }

    let mut result = vaddvq_f32(acc);
    for i in chunks * 8..n {
        result += *a_ptr.add(i) as f32 * *b_ptr.add(i);
    }
    result
}

/// # Safety
/// All slices must have equal length.
#[target_feature(enable = "neon")]
pub(super) unsafe fn mul_acc_f32(acc: &mut [f32], a: &[f32], b: &[f32]) {
    let n = acc.len();
    let chunks = n / 4;

    let acc_ptr = acc.as_mut_ptr();
    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();

    for i in 0..chunks {
        let offset = i * 4;
        let va = vld1q_f32(a_ptr.add(offset));
        let vb = vld1q_f32(b_ptr.add(offset));
        let vacc = vld1q_f32(acc_ptr.add(offset));
        vst1q_f32(acc_ptr.add(offset), vfmaq_f32(vacc, va, vb));
    }

    for i in chunks * 4..n {
        *acc_ptr.add(i) += *a_ptr.add(i) * *b_ptr.add(i);
    }
}
