//! AVX2 inner-product engine.
//!
//! Activations are zero-extended and weights sign-extended to i16; a u8*i8 product always fits
//! in i16 so `mullo` is exact. Products are widened to i32 before accumulation so every lane keeps
//! its own channel.

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

use crate::dwconv::inner_product::{InnerProduct, Lanes, TapBlock, KERNEL_PROD};
use crate::dwconv::packed::GROUP_LANES;

/// Selected only after `is_x86_feature_detected!("avx2")` succeeded.
pub(crate) struct Avx2;

impl InnerProduct for Avx2 {
    #[inline(always)]
    fn inner_prod<const SUM_A: bool>(taps: &TapBlock, group: &[i8], acc: &mut Lanes, a_sum: &mut Lanes) {
        assert!(group.len() >= KERNEL_PROD * GROUP_LANES);
        // SAFETY: the dispatcher only instantiates this engine on CPUs reporting AVX2, and every
        // load reads 16 bytes inside a 32-lane tap row.
        unsafe { inner_prod_3x3_avx2::<SUM_A>(taps, group, acc, a_sum) }
    }
}

#[target_feature(enable = "avx2")]
unsafe fn inner_prod_3x3_avx2<const SUM_A: bool>(
    taps: &TapBlock,
    group: &[i8],
    acc: &mut Lanes,
    a_sum: &mut Lanes,
) {
    let mut c = [_mm256_setzero_si256(); 4];
    let mut s = [_mm256_setzero_si256(); 4];
    for t in 0..KERNEL_PROD {
        let a_ptr = taps[t].as_ptr() as *const __m128i;
        let b_ptr = group.as_ptr().add(t * GROUP_LANES) as *const __m128i;
        for half in 0..2 {
            let a16 = _mm256_cvtepu8_epi16(_mm_loadu_si128(a_ptr.add(half)));
            let b16 = _mm256_cvtepi8_epi16(_mm_loadu_si128(b_ptr.add(half)));
            let p = _mm256_mullo_epi16(a16, b16);
            let p_lo = _mm256_cvtepi16_epi32(_mm256_castsi256_si128(p));
            let p_hi = _mm256_cvtepi16_epi32(_mm256_extracti128_si256::<1>(p));
            c[2 * half] = _mm256_add_epi32(c[2 * half], p_lo);
            c[2 * half + 1] = _mm256_add_epi32(c[2 * half + 1], p_hi);
            if SUM_A {
                let a_lo = _mm256_cvtepu16_epi32(_mm256_castsi256_si128(a16));
                let a_hi = _mm256_cvtepu16_epi32(_mm256_extracti128_si256::<1>(a16));
                s[2 * half] = _mm256_add_epi32(s[2 * half], a_lo);
                s[2 * half + 1] = _mm256_add_epi32(s[2 * half + 1], a_hi);
            }
        }
    }
    for i in 0..4 {
        _mm256_storeu_si256(acc.as_mut_ptr().add(i * 8) as *mut __m256i, c[i]);
        if SUM_A {
            _mm256_storeu_si256(a_sum.as_mut_ptr().add(i * 8) as *mut __m256i, s[i]);
        }
    }
}
