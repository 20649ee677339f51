//! Tap gathering and the 9-tap integer inner product.

use crate::dwconv::packed::GROUP_LANES;

pub const KERNEL_PROD: usize = 9;

/// Nine activation tap vectors for one channel group.
pub type TapBlock = [[u8; GROUP_LANES]; KERNEL_PROD];
/// One i32 per lane of a channel group.
pub type Lanes = [i32; GROUP_LANES];

/// Geometry of the activation image the taps are gathered from.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TapSource<'a> {
    /// One image, `[H][W][K]`.
    pub image: &'a [u8],
    pub height: usize,
    pub width: usize,
    pub channels: usize,
    pub fill: u8,
}

/// Loads the 3x3 window anchored at input coordinate (`h_in`, `w_in`) for channels
/// `k0..k0 + lanes`.
///
/// With `CHECKED` each tap is bounds-checked against the image and out-of-image taps are the
/// activation zero point. Without it every tap must lie inside the image. Lanes past `lanes`
/// are left untouched.
#[inline(always)]
pub(crate) fn gather_taps<const CHECKED: bool>(
    src: &TapSource<'_>,
    h_in: isize,
    w_in: isize,
    k0: usize,
    lanes: usize,
    taps: &mut TapBlock,
) {
    for r in 0..3 {
        let hh = h_in + r as isize;
        let row_ok = !CHECKED || (hh >= 0 && (hh as usize) < src.height);
        for s in 0..3 {
            let ww = w_in + s as isize;
            let tap = &mut taps[r * 3 + s][..lanes];
            if CHECKED && !(row_ok && ww >= 0 && (ww as usize) < src.width) {
                tap.fill(src.fill);
                continue;
            }
            let base = ((hh as usize) * src.width + ww as usize) * src.channels + k0;
            tap.copy_from_slice(&src.image[base..base + lanes]);
        }
    }
}

/// Multiply-accumulate of a gathered [`TapBlock`] against one packed weight group.
pub(crate) trait InnerProduct {
    /// `acc[l] = sum_t taps[t][l] * group[t][l]`; with `SUM_A` also `a_sum[l] = sum_t taps[t][l]`.
    fn inner_prod<const SUM_A: bool>(taps: &TapBlock, group: &[i8], acc: &mut Lanes, a_sum: &mut Lanes);
}

/// Fixed-size array engine; the lane loops are written for the auto-vectorizer.
pub(crate) struct Portable;

impl InnerProduct for Portable {
    #[inline(always)]
    fn inner_prod<const SUM_A: bool>(taps: &TapBlock, group: &[i8], acc: &mut Lanes, a_sum: &mut Lanes) {
        *acc = [0; GROUP_LANES];
        if SUM_A { *a_sum = [0; GROUP_LANES]; }
        for (t, tap) in taps.iter().enumerate() {
            let w = &group[t * GROUP_LANES..(t + 1) * GROUP_LANES];
            for l in 0..GROUP_LANES {
                acc[l] += tap[l] as i32 * w[l] as i32;
            }
            if SUM_A {
                for l in 0..GROUP_LANES { a_sum[l] += tap[l] as i32; }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dwconv::packed::PackedDepthwiseWeights;

    fn image_3x3(k: usize) -> Vec<u8> {
        (0..9 * k).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn checked_gather_fills_out_of_image_taps() {
        let k = 4;
        let img = image_3x3(k);
        let src = TapSource { image: &img, height: 3, width: 3, channels: k, fill: 77 };
        let mut taps = [[0u8; GROUP_LANES]; KERNEL_PROD];
        // window anchored at (-1, -1): only taps (1,1) (1,2) (2,1) (2,2) are inside
        gather_taps::<true>(&src, -1, -1, 0, k, &mut taps);
        for t in [0, 1, 2, 3, 6] {
            assert_eq!(&taps[t][..k], &[77; 4], "tap {}", t);
        }
        assert_eq!(&taps[4][..k], &img[0..4]);
        assert_eq!(&taps[8][..k], &img[(1 * 3 + 1) * k..(1 * 3 + 1) * k + k]);
        // lanes past the channel count are untouched
        assert!(taps.iter().all(|t| t[k..].iter().all(|&v| v == 0)));
    }

    #[test]
    fn unchecked_gather_matches_checked_inside_image() {
        let k = 8;
        let img: Vec<u8> = (0..5 * 5 * k).map(|i| (i * 3 % 256) as u8).collect();
        let src = TapSource { image: &img, height: 5, width: 5, channels: k, fill: 0 };
        let mut a = [[0u8; GROUP_LANES]; KERNEL_PROD];
        let mut b = [[0u8; GROUP_LANES]; KERNEL_PROD];
        gather_taps::<true>(&src, 1, 2, 0, k, &mut a);
        gather_taps::<false>(&src, 1, 2, 0, k, &mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn portable_inner_product_and_activation_sums() {
        let w: Vec<i8> = (0..2 * 9).map(|i| i as i8 - 9).collect();
        let p = PackedDepthwiseWeights::pack(2, 9, &w).unwrap();
        let mut taps = [[0u8; GROUP_LANES]; KERNEL_PROD];
        for t in 0..9 {
            taps[t][0] = t as u8 + 1;
            taps[t][1] = 255;
        }
        let mut acc = [0; GROUP_LANES];
        let mut a_sum = [0; GROUP_LANES];
        Portable::inner_prod::<true>(&taps, p.group(0), &mut acc, &mut a_sum);
        let want0: i32 = (0..9).map(|t| (t as i32 + 1) * (t as i32 - 9)).sum();
        let want1: i32 = (9..18).map(|t| 255 * (t as i32 - 9)).sum();
        assert_eq!(acc[0], want0);
        assert_eq!(acc[1], want1);
        assert_eq!(a_sum[0], 45);
        assert_eq!(a_sum[1], 9 * 255);
        assert_eq!(acc[2], 0);
    }
}
