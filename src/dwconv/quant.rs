//! Weight quantization schemes and bias kinds.
//!
//! Both are resolved at dispatch time into concrete types so the requantization loop is
//! monomorphized for per-tensor / per-channel scales and for each bias representation.

use crate::dwconv::packed::PackedDepthwiseWeights;
use crate::error::ConvError;

/// Scale and zero-point source for the weight side of the convolution.
pub trait WeightQuantization: Sync {
    const PER_CHANNEL: bool;

    fn b_zero_point(&self, c: usize) -> i32;
    fn multiplier(&self, c: usize) -> f32;
    fn act_times_w_scale(&self, c: usize) -> f32;

    /// True when the row-offset correction can be skipped. Never true per-channel.
    fn is_symmetric(&self) -> bool;

    /// Checks the per-channel arrays cover `channels`. `needs_scale` is set for f32 bias.
    fn validate(&self, channels: usize, needs_scale: bool) -> Result<(), ConvError>;
}

/// Per-tensor weight quantization.
///
/// `act_times_w_scale` is only read for [`Bias::Float`](crate::dwconv::Bias::Float) and must then
/// be set with [`with_act_times_w_scale`](Self::with_act_times_w_scale); a float-bias call
/// without it fails with [`ConvError::MissingActTimesWScale`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerTensorQuant {
    pub b_zero_point: i32,
    pub multiplier: f32,
    pub act_times_w_scale: Option<f32>,
}

impl PerTensorQuant {
    pub fn new(b_zero_point: i32, multiplier: f32) -> Self {
        Self { b_zero_point, multiplier, act_times_w_scale: None }
    }

    pub fn with_act_times_w_scale(mut self, scale: f32) -> Self {
        self.act_times_w_scale = Some(scale);
        self
    }
}

impl WeightQuantization for PerTensorQuant {
    const PER_CHANNEL: bool = false;

    #[inline(always)]
    fn b_zero_point(&self, _c: usize) -> i32 { self.b_zero_point }
    #[inline(always)]
    fn multiplier(&self, _c: usize) -> f32 { self.multiplier }
    #[inline(always)]
    fn act_times_w_scale(&self, _c: usize) -> f32 { self.act_times_w_scale.unwrap_or(1.0) }

    fn is_symmetric(&self) -> bool { self.b_zero_point == 0 }

    fn validate(&self, _channels: usize, needs_scale: bool) -> Result<(), ConvError> {
        if needs_scale && self.act_times_w_scale.is_none() {
            return Err(ConvError::MissingActTimesWScale);
        }
        Ok(())
    }
}

/// Per-channel weight quantization. `act_times_w_scales` may be empty unless the bias is f32.
#[derive(Debug, Clone, Copy)]
pub struct PerChannelQuant<'a> {
    pub b_zero_points: &'a [i32],
    pub multipliers: &'a [f32],
    pub act_times_w_scales: &'a [f32],
}

impl<'a> WeightQuantization for PerChannelQuant<'a> {
    const PER_CHANNEL: bool = true;

    #[inline(always)]
    fn b_zero_point(&self, c: usize) -> i32 { self.b_zero_points[c] }
    #[inline(always)]
    fn multiplier(&self, c: usize) -> f32 { self.multipliers[c] }
    #[inline(always)]
    fn act_times_w_scale(&self, c: usize) -> f32 { self.act_times_w_scales[c] }

    fn is_symmetric(&self) -> bool { false }

    fn validate(&self, channels: usize, needs_scale: bool) -> Result<(), ConvError> {
        check_len("weight zero point", channels, self.b_zero_points.len())?;
        check_len("multiplier", channels, self.multipliers.len())?;
        if needs_scale {
            check_len("activation times weight scale", channels, self.act_times_w_scales.len())?;
        }
        Ok(())
    }
}

pub(crate) fn check_len(what: &'static str, needed: usize, actual: usize) -> Result<(), ConvError> {
    if actual < needed {
        return Err(ConvError::BufferTooSmall { what, needed, actual });
    }
    Ok(())
}

/// Per-channel bias representation folded into the raw accumulator before scaling.
pub(crate) trait BiasTerm: Copy + Send + Sync + 'static {
    const PRESENT: bool;
    fn fold(self, raw: i32, act_times_w_scale: f32) -> f32;
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct NoBias;

impl BiasTerm for NoBias {
    const PRESENT: bool = false;
    #[inline(always)]
    fn fold(self, raw: i32, _act_times_w_scale: f32) -> f32 { raw as f32 }
}

impl BiasTerm for i32 {
    const PRESENT: bool = true;
    #[inline(always)]
    fn fold(self, raw: i32, _act_times_w_scale: f32) -> f32 { raw.wrapping_add(self) as f32 }
}

impl BiasTerm for f32 {
    const PRESENT: bool = true;
    // f32 bias lives in the real domain; bring it to accumulator scale first
    #[inline(always)]
    fn fold(self, raw: i32, act_times_w_scale: f32) -> f32 { raw as f32 + self / act_times_w_scale }
}

/// Column offsets for the activation zero-point correction:
/// `col_offsets[k] = sum_t (w[k][t] - b_zero_point[k])`.
///
/// `b_zero_points` holds one value (per-tensor) or one per channel.
pub fn column_offsets(weights: &PackedDepthwiseWeights, b_zero_points: &[i32]) -> Result<Vec<i32>, ConvError> {
    let channels = weights.channels();
    let broadcast = b_zero_points.len() == 1;
    if !broadcast {
        check_len("weight zero point", channels, b_zero_points.len())?;
    }
    let kp = weights.kernel_product();
    Ok((0..channels)
        .map(|k| {
            let zp = if broadcast { b_zero_points[0] } else { b_zero_points[k] };
            (0..kp).map(|t| weights.tap(k, t) as i32 - zp).sum()
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_offsets_subtract_zero_point_per_tap() {
        let w: Vec<i8> = vec![1, 2, 3, 4, 5, 6, 7, 8, 9, -1, -1, -1, -1, -1, -1, -1, -1, -1];
        let p = PackedDepthwiseWeights::pack(2, 9, &w).unwrap();
        assert_eq!(column_offsets(&p, &[0]).unwrap(), vec![45, -9]);
        assert_eq!(column_offsets(&p, &[1]).unwrap(), vec![36, -18]);
        assert_eq!(column_offsets(&p, &[5, -1]).unwrap(), vec![0, 0]);
    }

    #[test]
    fn column_offsets_reject_short_zero_point_arrays() {
        let p = PackedDepthwiseWeights::pack(3, 9, &[1i8; 27]).unwrap();
        assert_eq!(
            column_offsets(&p, &[]),
            Err(ConvError::BufferTooSmall { what: "weight zero point", needed: 3, actual: 0 })
        );
        assert!(matches!(column_offsets(&p, &[0, 0]), Err(ConvError::BufferTooSmall { needed: 3, actual: 2, .. })));
        assert_eq!(column_offsets(&p, &[0, 0, 0, 0]).unwrap().len(), 3);
    }

    #[test]
    fn f32_bias_is_divided_by_scale() {
        assert_eq!(3.0f32.fold(10, 0.5), 16.0);
        assert_eq!(7i32.fold(-10, 123.0), -3.0);
        assert_eq!(NoBias.fold(42, 0.0), 42.0);
    }

    #[test]
    fn per_channel_validation_reports_short_arrays() {
        let zp = [0i32; 8];
        let m = [1.0f32; 4];
        let q = PerChannelQuant { b_zero_points: &zp, multipliers: &m, act_times_w_scales: &[] };
        assert!(matches!(q.validate(8, false), Err(ConvError::BufferTooSmall { what: "multiplier", .. })));
        let m = [1.0f32; 8];
        let q = PerChannelQuant { b_zero_points: &zp, multipliers: &m, act_times_w_scales: &[] };
        assert!(q.validate(8, false).is_ok());
        assert!(q.validate(8, true).is_err());
    }

    #[test]
    fn per_tensor_float_bias_needs_explicit_scale() {
        let q = PerTensorQuant::new(3, 0.01);
        assert!(q.validate(4, false).is_ok());
        assert_eq!(q.validate(4, true), Err(ConvError::MissingActTimesWScale));
        assert!(q.with_act_times_w_scale(0.25).validate(4, true).is_ok());
    }
}
