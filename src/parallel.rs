//! Runs every worker of one convolution call on the current rayon pool.
//!
//! Workers are independent and write disjoint output regions, so they are simply spread over
//! the pool; install a pool with `rayon::ThreadPoolBuilder` to control the OS thread count.
//! The output does not depend on `num_threads`.

use rayon::prelude::*;

use crate::dwconv::kernel::Call;
use crate::dwconv::output::OutputView;
use crate::dwconv::quant::{PerChannelQuant, PerTensorQuant, WeightQuantization};
use crate::dwconv::{dispatch, prepare, Conv3x3Params};
use crate::error::ConvError;

pub fn par_depthwise_3x3_pad_1(
    params: &Conv3x3Params<'_, PerTensorQuant>,
    input: &[u8],
    output: &mut [u8],
    num_threads: usize,
) -> Result<(), ConvError> {
    par_depthwise_3x3(params, input, output, num_threads)
}

pub fn par_depthwise_3x3_per_channel_quantization_pad_1(
    params: &Conv3x3Params<'_, PerChannelQuant<'_>>,
    input: &[u8],
    output: &mut [u8],
    num_threads: usize,
) -> Result<(), ConvError> {
    par_depthwise_3x3(params, input, output, num_threads)
}

fn par_depthwise_3x3<Q: WeightQuantization>(
    params: &Conv3x3Params<'_, Q>,
    input: &[u8],
    output: &mut [u8],
    num_threads: usize,
) -> Result<(), ConvError> {
    let Some(variant) = prepare(params, input.len(), output.len(), num_threads)? else {
        return Ok(());
    };
    let out = OutputView::new(output);
    (0..num_threads).into_par_iter().for_each(|thread_id| {
        dispatch::run(&variant, Call { params, input, out: &out, thread_id, num_threads });
    });
    Ok(())
}
