//! Worker loop: partition, classify, gather, accumulate, requantize.

use log::trace;

use crate::dwconv::boundary::EdgeSplit;
use crate::dwconv::dispatch::Geometry;
use crate::dwconv::inner_product::{gather_taps, InnerProduct, Lanes, TapBlock, TapSource, KERNEL_PROD};
use crate::dwconv::output::OutputView;
use crate::dwconv::packed::{PackedDepthwiseWeights, GROUP_LANES};
use crate::dwconv::partition::partition;
use crate::dwconv::quant::{BiasTerm, WeightQuantization};
use crate::dwconv::requantize::{requantize_pixel, Requant};
use crate::dwconv::Conv3x3Params;

/// One worker's view of a validated call.
pub(crate) struct Call<'a, Q> {
    pub params: &'a Conv3x3Params<'a, Q>,
    pub input: &'a [u8],
    pub out: &'a OutputView<'a>,
    pub thread_id: usize,
    pub num_threads: usize,
}

/// Worker-local buffers, released when the worker returns.
struct Scratch {
    taps: TapBlock,
    acc: Lanes,
    a_sum: Lanes,
    c_int32: Vec<i32>,
    row_offsets: Vec<i32>,
    pixel: Vec<u8>,
}

impl Scratch {
    fn new(channels: usize) -> Self {
        let padded = (channels + GROUP_LANES - 1) / GROUP_LANES * GROUP_LANES;
        Self {
            taps: [[0; GROUP_LANES]; KERNEL_PROD],
            acc: [0; GROUP_LANES],
            a_sum: [0; GROUP_LANES],
            c_int32: vec![0; padded],
            row_offsets: vec![0; padded],
            pixel: vec![0; channels],
        }
    }
}

/// Pixel-invariant state of one worker.
struct Worker<'a, Q, B> {
    src: TapSource<'a>,
    weights: &'a PackedDepthwiseWeights,
    rq: Requant<'a, Q, B>,
    stride_h: usize,
    stride_w: usize,
}

pub(crate) fn run_worker<Q, B, I, G, const FUSE_RELU: bool, const A_SYMMETRIC: bool, const B_SYMMETRIC: bool>(
    call: Call<'_, Q>,
    bias: &[B],
) where
    Q: WeightQuantization,
    B: BiasTerm,
    I: InnerProduct,
    G: Geometry,
{
    let p = call.params;
    let dims = G::resolve(&p.shape);
    let k = p.shape.channels;
    let (out_h, out_w) = (dims.out_height(), dims.out_width());
    let part = partition(p.shape.batch, out_h, out_w, call.thread_id, call.num_threads);
    trace!("worker {}/{}: {:?}", call.thread_id, call.num_threads, part);
    if part.is_empty() {
        return;
    }

    let mut scratch = Scratch::new(k);
    let rows = EdgeSplit::new(part.rows.clone(), out_h);
    let cols = EdgeSplit::new(part.cols.clone(), out_w);
    let image_len = dims.height * dims.width * k;
    let out_image_len = out_h * out_w * k;

    for n in part.batch.clone() {
        let worker = Worker {
            src: TapSource {
                image: &call.input[n * image_len..(n + 1) * image_len],
                height: dims.height,
                width: dims.width,
                channels: k,
                fill: p.a_zero_point as u8,
            },
            weights: p.weights,
            rq: Requant {
                a_zero_point: p.a_zero_point,
                c_zero_point: p.c_zero_point,
                quant: &p.quant,
                col_offsets: if A_SYMMETRIC { &[] } else { p.col_offsets.unwrap_or(&[]) },
                bias,
            },
            stride_h: dims.stride_h,
            stride_w: dims.stride_w,
        };
        let out_base = n * out_image_len;
        let offset = |h: usize, w: usize| out_base + (h * out_w + w) * k;

        for h in rows.borders() {
            for w in part.cols.clone() {
                conv_pixel::<Q, B, I, FUSE_RELU, A_SYMMETRIC, B_SYMMETRIC, true>(&worker, h, w, &mut scratch, call.out, offset(h, w));
            }
        }
        for h in rows.interior.clone() {
            for w in cols.borders() {
                conv_pixel::<Q, B, I, FUSE_RELU, A_SYMMETRIC, B_SYMMETRIC, true>(&worker, h, w, &mut scratch, call.out, offset(h, w));
            }
            for w in cols.interior.clone() {
                conv_pixel::<Q, B, I, FUSE_RELU, A_SYMMETRIC, B_SYMMETRIC, false>(&worker, h, w, &mut scratch, call.out, offset(h, w));
            }
        }
    }
}

#[inline(always)]
fn conv_pixel<Q, B, I, const FUSE_RELU: bool, const A_SYMMETRIC: bool, const B_SYMMETRIC: bool, const CHECKED: bool>(
    worker: &Worker<'_, Q, B>,
    h: usize,
    w: usize,
    scratch: &mut Scratch,
    out: &OutputView<'_>,
    out_offset: usize,
) where
    Q: WeightQuantization,
    B: BiasTerm,
    I: InnerProduct,
{
    let k = worker.src.channels;
    let h_in = (h * worker.stride_h) as isize - 1;
    let w_in = (w * worker.stride_w) as isize - 1;

    for g in 0..worker.weights.num_groups() {
        let k0 = g * GROUP_LANES;
        let lanes = GROUP_LANES.min(k - k0);
        gather_taps::<CHECKED>(&worker.src, h_in, w_in, k0, lanes, &mut scratch.taps);
        let group = worker.weights.group(g);
        if B_SYMMETRIC {
            I::inner_prod::<false>(&scratch.taps, group, &mut scratch.acc, &mut scratch.a_sum);
        } else {
            I::inner_prod::<true>(&scratch.taps, group, &mut scratch.acc, &mut scratch.a_sum);
        }
        scratch.c_int32[k0..k0 + lanes].copy_from_slice(&scratch.acc[..lanes]);
        if !B_SYMMETRIC {
            for l in 0..lanes {
                scratch.row_offsets[k0 + l] = scratch.a_sum[l].wrapping_mul(worker.rq.quant.b_zero_point(k0 + l));
            }
        }
    }

    requantize_pixel::<Q, B, FUSE_RELU, A_SYMMETRIC, B_SYMMETRIC>(
        &worker.rq,
        &scratch.c_int32[..k],
        &scratch.row_offsets[..k],
        &mut scratch.pixel,
    );
    out.store(out_offset, &scratch.pixel);
}
