//! Direct nested-loop evaluation of the convolution, used as a test oracle.
//!
//! Reads weights one tap at a time through [`PackedDepthwiseWeights::tap`] and computes each
//! output element independently, with no partitioning or vector grouping.
//!
//! [`PackedDepthwiseWeights::tap`]: crate::dwconv::packed::PackedDepthwiseWeights::tap

use crate::dwconv::quant::WeightQuantization;
use crate::dwconv::{Bias, Conv3x3Params};

pub fn depthwise_3x3_reference<Q: WeightQuantization>(params: &Conv3x3Params<'_, Q>, input: &[u8]) -> Vec<u8> {
    let s = params.shape;
    let (out_h, out_w, k) = (s.out_height(), s.out_width(), s.channels);
    let mut out = vec![0u8; s.output_len()];
    let za = params.a_zero_point;

    for n in 0..s.batch {
        for h in 0..out_h {
            for w in 0..out_w {
                for c in 0..k {
                    let zb = params.quant.b_zero_point(c);
                    let mut raw: i32 = 0;
                    for r in 0..3 {
                        for q in 0..3 {
                            let hh = (h * s.stride_h + r) as isize - 1;
                            let ww = (w * s.stride_w + q) as isize - 1;
                            let inside = hh >= 0 && (hh as usize) < s.height && ww >= 0 && (ww as usize) < s.width;
                            let a = if inside {
                                input[((n * s.height + hh as usize) * s.width + ww as usize) * k + c] as i32
                            } else {
                                za
                            };
                            let wt = params.weights.tap(c, r * 3 + q) as i32;
                            raw = raw.wrapping_add(a.wrapping_mul(wt.wrapping_sub(zb)));
                        }
                    }
                    if let Some(col) = params.col_offsets {
                        raw = raw.wrapping_sub(za.wrapping_mul(col[c]));
                    }
                    let raw_f = match params.bias {
                        Bias::None => raw as f32,
                        Bias::Int(b) => raw.wrapping_add(b[c]) as f32,
                        Bias::Float(b) => raw as f32 + b[c] / params.quant.act_times_w_scale(c),
                    };
                    let q = ((raw_f * params.quant.multiplier(c)).round_ties_even() as i32).saturating_add(params.c_zero_point);
                    let lo = if params.fuse_relu { params.c_zero_point } else { 0 };
                    out[((n * out_h + h) * out_w + w) * k + c] = q.min(255).max(lo) as u8;
                }
            }
        }
    }
    out
}
