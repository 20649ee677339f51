//! Zero-point correction and affine requantization of i32 accumulators to u8.

use crate::dwconv::quant::{BiasTerm, WeightQuantization};

/// Per-call requantization inputs shared by every pixel.
pub(crate) struct Requant<'a, Q, B> {
    pub a_zero_point: i32,
    pub c_zero_point: i32,
    pub quant: &'a Q,
    /// Empty when the activation side is treated as symmetric.
    pub col_offsets: &'a [i32],
    /// Empty when `B::PRESENT` is false.
    pub bias: &'a [B],
}

/// Scales, rounds half to even, shifts by the output zero point and clamps to u8.
/// With `FUSE_RELU` the lower bound is the output zero point (quantized 0.0).
#[inline(always)]
pub fn quantize_u8<const FUSE_RELU: bool>(raw: f32, multiplier: f32, c_zero_point: i32) -> u8 {
    let rounded = (raw * multiplier).round_ties_even() as i32;
    let v = rounded.saturating_add(c_zero_point);
    let lo = if FUSE_RELU { c_zero_point } else { 0 };
    v.min(255).max(lo) as u8
}

/// Writes `out[c]` for every channel of one output pixel.
#[inline(always)]
pub(crate) fn requantize_pixel<Q, B, const FUSE_RELU: bool, const A_SYMMETRIC: bool, const B_SYMMETRIC: bool>(
    rq: &Requant<'_, Q, B>,
    c_int32: &[i32],
    row_offsets: &[i32],
    out: &mut [u8],
) where
    Q: WeightQuantization,
    B: BiasTerm,
{
    for (c, o) in out.iter_mut().enumerate() {
        let mut raw = c_int32[c];
        if !B_SYMMETRIC {
            raw = raw.wrapping_sub(row_offsets[c]);
        }
        if !A_SYMMETRIC {
            raw = raw.wrapping_sub(rq.a_zero_point.wrapping_mul(rq.col_offsets[c]));
        }
        let raw_f = if B::PRESENT {
            rq.bias[c].fold(raw, rq.quant.act_times_w_scale(c))
        } else {
            raw as f32
        };
        *o = quantize_u8::<FUSE_RELU>(raw_f, rq.quant.multiplier(c), rq.c_zero_point);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dwconv::quant::{NoBias, PerChannelQuant, PerTensorQuant};

    #[test]
    fn rounds_half_to_even() {
        assert_eq!(quantize_u8::<false>(2.5, 1.0, 0), 2);
        assert_eq!(quantize_u8::<false>(3.5, 1.0, 0), 4);
        assert_eq!(quantize_u8::<false>(-0.5, 1.0, 10), 10);
        assert_eq!(quantize_u8::<false>(-1.5, 1.0, 10), 8);
    }

    #[test]
    fn clamps_to_u8_and_relu_floor() {
        assert_eq!(quantize_u8::<false>(1000.0, 1.0, 0), 255);
        assert_eq!(quantize_u8::<false>(-1000.0, 1.0, 0), 0);
        assert_eq!(quantize_u8::<true>(-5.0, 1.0, 100), 100);
        assert_eq!(quantize_u8::<true>(5.0, 1.0, 100), 105);
        assert_eq!(quantize_u8::<false>(f32::MAX, 2.0, 0), 255);
    }

    #[test]
    fn applies_row_and_column_offsets() {
        let q = PerTensorQuant::new(2, 0.5);
        let col = [3, -4];
        let rq: Requant<'_, _, NoBias> = Requant { a_zero_point: 10, c_zero_point: 7, quant: &q, col_offsets: &col, bias: &[] };
        let mut out = [0u8; 2];
        requantize_pixel::<_, _, false, false, false>(&rq, &[100, 100], &[20, 40], &mut out);
        // ch0: 100 - 20 - 30 = 50 -> 25 + 7; ch1: 100 - 40 + 40 = 100 -> 50 + 7
        assert_eq!(out, [32, 57]);
        requantize_pixel::<_, _, false, true, true>(&rq, &[100, 100], &[20, 40], &mut out);
        assert_eq!(out, [57, 57]);
    }

    #[test]
    fn per_channel_float_bias() {
        let zp = [0, 0];
        let m = [1.0, 0.25];
        let s = [0.5, 2.0];
        let q = PerChannelQuant { b_zero_points: &zp, multipliers: &m, act_times_w_scales: &s };
        let bias = [1.0f32, 8.0];
        let rq = Requant { a_zero_point: 0, c_zero_point: 0, quant: &q, col_offsets: &[], bias: &bias };
        let mut out = [0u8; 2];
        requantize_pixel::<_, _, false, true, false>(&rq, &[10, 12], &[0, 0], &mut out);
        // ch0: 10 + 1/0.5 = 12; ch1: (12 + 8/2) * 0.25 = 4
        assert_eq!(out, [12, 4]);
    }
}
