//! Vector-friendly layout for depthwise weights.
//!
//! Channels are packed in groups of [`GROUP_LANES`]. Inside a group the taps are stored
//! tap-major: row `t` holds tap `t` of all 32 channels, so the inner product can load one tap
//! for the whole group with a single contiguous read. The number of tap rows is the kernel
//! product rounded up to an even count and the extra row is zero. The last group is always
//! stored at full width; lanes past the channel count are zero.

use crate::error::ConvError;

/// Channels per packed group.
pub const GROUP_LANES: usize = 32;

#[inline]
pub fn tap_rows(kernel_prod: usize) -> usize { (kernel_prod + 1) / 2 * 2 }

#[derive(Debug, Clone)]
pub struct PackedDepthwiseWeights {
    channels: usize,
    kernel_prod: usize,
    data: Vec<i8>,
}

impl PackedDepthwiseWeights {
    /// Packs `weights` laid out as `[channels][kernel_prod]` (row-major taps per channel).
    pub fn pack(channels: usize, kernel_prod: usize, weights: &[i8]) -> Result<Self, ConvError> {
        let needed = channels * kernel_prod;
        if weights.len() < needed {
            return Err(ConvError::BufferTooSmall { what: "weight", needed, actual: weights.len() });
        }
        let rows = tap_rows(kernel_prod);
        let groups = (channels + GROUP_LANES - 1) / GROUP_LANES;
        let mut data = vec![0i8; groups * rows * GROUP_LANES];
        for k in 0..channels {
            let (g, lane) = (k / GROUP_LANES, k % GROUP_LANES);
            let base = g * rows * GROUP_LANES;
            for t in 0..kernel_prod {
                data[base + t * GROUP_LANES + lane] = weights[k * kernel_prod + t];
            }
        }
        Ok(Self { channels, kernel_prod, data })
    }

    pub fn channels(&self) -> usize { self.channels }

    pub fn kernel_product(&self) -> usize { self.kernel_prod }

    /// Raw packed buffer.
    pub fn packed(&self) -> &[i8] { &self.data }

    pub fn num_groups(&self) -> usize { (self.channels + GROUP_LANES - 1) / GROUP_LANES }

    /// Tap rows of channel group `g`: `tap_rows(kernel_product) * GROUP_LANES` values.
    #[inline]
    pub fn group(&self, g: usize) -> &[i8] {
        let len = tap_rows(self.kernel_prod) * GROUP_LANES;
        &self.data[g * len..(g + 1) * len]
    }

    /// Tap `t` (row-major within the kernel window) of channel `k`.
    #[inline]
    pub fn tap(&self, k: usize, t: usize) -> i8 {
        debug_assert!(k < self.channels && t < self.kernel_prod);
        self.group(k / GROUP_LANES)[t * GROUP_LANES + k % GROUP_LANES]
    }

    /// Inverse of [`pack`](Self::pack).
    pub fn unpack(&self) -> Vec<i8> {
        let mut out = Vec::with_capacity(self.channels * self.kernel_prod);
        for k in 0..self.channels {
            for t in 0..self.kernel_prod { out.push(self.tap(k, t)); }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_with_remainder_group() {
        let k = 40;
        let w: Vec<i8> = (0..k * 9).map(|i| ((i * 7) % 255) as i32 as i8).collect();
        let p = PackedDepthwiseWeights::pack(k, 9, &w).unwrap();
        assert_eq!(p.num_groups(), 2);
        assert_eq!(p.packed().len(), 2 * 10 * GROUP_LANES);
        assert_eq!(p.unpack(), w);
    }

    #[test]
    fn padding_lanes_and_rows_are_zero() {
        let w = vec![1i8; 8 * 9];
        let p = PackedDepthwiseWeights::pack(8, 9, &w).unwrap();
        let g = p.group(0);
        // tap rows 0..9 carry lanes 0..8 only
        for t in 0..10 {
            for lane in 0..GROUP_LANES {
                let expect = if t < 9 && lane < 8 { 1 } else { 0 };
                assert_eq!(g[t * GROUP_LANES + lane], expect, "tap {} lane {}", t, lane);
            }
        }
    }

    #[test]
    fn other_kernel_products_round_rows_up() {
        assert_eq!(tap_rows(9), 10);
        assert_eq!(tap_rows(25), 26);
        let p = PackedDepthwiseWeights::pack(3, 25, &vec![0i8; 75]).unwrap();
        assert_eq!(p.kernel_product(), 25);
        assert_eq!(p.packed().len(), 26 * GROUP_LANES);
    }

    #[test]
    fn short_weight_buffer_is_rejected() {
        let err = PackedDepthwiseWeights::pack(4, 9, &[0i8; 10]).unwrap_err();
        assert_eq!(err, ConvError::BufferTooSmall { what: "weight", needed: 36, actual: 10 });
    }
}
