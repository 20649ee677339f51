//! Quantized 3x3 depthwise convolution, padding 1, NHWC layout.
//!
//! Activations are u8 with a per-tensor zero point, weights are i8 packed by
//! [`PackedDepthwiseWeights`], outputs are u8. Each call computes the share of one worker
//! `(thread_id, num_threads)`; running every worker id (sequentially or concurrently, see
//! [`crate::parallel`]) produces the full output.

pub mod packed;
pub mod quant;
pub mod partition;
pub mod boundary;
pub mod dispatch;
pub mod reference;
pub(crate) mod inner_product;
pub(crate) mod requantize;
pub(crate) mod output;
pub(crate) mod kernel;
#[cfg(all(target_arch = "x86_64", feature = "simd-avx2"))]
pub(crate) mod avx2;

use log::debug;

use crate::error::ConvError;
use dispatch::{BiasKind, Variant};
use inner_product::KERNEL_PROD;
use kernel::Call;
use output::OutputView;
use packed::PackedDepthwiseWeights;
use quant::{check_len, PerChannelQuant, PerTensorQuant, WeightQuantization};

pub const KERNEL_SIZE: usize = 3;
pub const PAD: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvShape {
    pub batch: usize,
    pub height: usize,
    pub width: usize,
    pub channels: usize,
    pub stride_h: usize,
    pub stride_w: usize,
}

impl ConvShape {
    pub fn new(batch: usize, height: usize, width: usize, channels: usize, stride: usize) -> Self {
        Self { batch, height, width, channels, stride_h: stride, stride_w: stride }
    }

    pub fn with_strides(mut self, stride_h: usize, stride_w: usize) -> Self {
        self.stride_h = stride_h;
        self.stride_w = stride_w;
        self
    }

    pub fn out_height(&self) -> usize { out_extent(self.height, self.stride_h) }

    pub fn out_width(&self) -> usize { out_extent(self.width, self.stride_w) }

    pub fn input_len(&self) -> usize { self.batch * self.height * self.width * self.channels }

    pub fn output_len(&self) -> usize { self.batch * self.out_height() * self.out_width() * self.channels }
}

#[inline]
pub(crate) fn out_extent(extent: usize, stride: usize) -> usize {
    (extent + 2 * PAD).saturating_sub(KERNEL_SIZE) / stride.max(1) + 1
}

/// Optional per-channel bias. `Float` values are in the real domain and get divided by the
/// activation times weight scale before being added to the accumulator, so a `Float` bias
/// requires that scale (per tensor or per channel) to be supplied.
#[derive(Debug, Clone, Copy, Default)]
pub enum Bias<'a> {
    #[default]
    None,
    Int(&'a [i32]),
    Float(&'a [f32]),
}

impl<'a> Bias<'a> {
    pub fn kind(&self) -> BiasKind {
        match self {
            Bias::None => BiasKind::None,
            Bias::Int(_) => BiasKind::Int,
            Bias::Float(_) => BiasKind::Float,
        }
    }

    fn len(&self) -> Option<usize> {
        match self {
            Bias::None => None,
            Bias::Int(b) => Some(b.len()),
            Bias::Float(b) => Some(b.len()),
        }
    }
}

/// Everything a depthwise call needs besides the activation and output buffers.
///
/// `col_offsets` holds `sum_t (w[k][t] - b_zero_point[k])` per channel (see
/// [`quant::column_offsets`]). Passing `None` declares that the activation zero-point cross term
/// is already accounted for by the caller (usually folded into the bias); it is then skipped
/// even when `a_zero_point` is non-zero.
#[derive(Debug, Clone, Copy)]
pub struct Conv3x3Params<'a, Q> {
    pub shape: ConvShape,
    pub a_zero_point: i32,
    pub weights: &'a PackedDepthwiseWeights,
    pub quant: Q,
    pub c_zero_point: i32,
    pub col_offsets: Option<&'a [i32]>,
    pub bias: Bias<'a>,
    pub fuse_relu: bool,
}

impl<'a, Q> Conv3x3Params<'a, Q> {
    pub fn new(shape: ConvShape, weights: &'a PackedDepthwiseWeights, quant: Q) -> Self {
        Self {
            shape,
            a_zero_point: 0,
            weights,
            quant,
            c_zero_point: 0,
            col_offsets: None,
            bias: Bias::None,
            fuse_relu: false,
        }
    }
}

/// Per-tensor quantized depthwise 3x3 convolution, worker `thread_id` of `num_threads`.
pub fn depthwise_3x3_pad_1(
    params: &Conv3x3Params<'_, PerTensorQuant>,
    input: &[u8],
    output: &mut [u8],
    thread_id: usize,
    num_threads: usize,
) -> Result<(), ConvError> {
    depthwise_3x3(params, input, output, thread_id, num_threads)
}

/// Per-channel quantized depthwise 3x3 convolution, worker `thread_id` of `num_threads`.
pub fn depthwise_3x3_per_channel_quantization_pad_1(
    params: &Conv3x3Params<'_, PerChannelQuant<'_>>,
    input: &[u8],
    output: &mut [u8],
    thread_id: usize,
    num_threads: usize,
) -> Result<(), ConvError> {
    depthwise_3x3(params, input, output, thread_id, num_threads)
}

fn depthwise_3x3<Q: WeightQuantization>(
    params: &Conv3x3Params<'_, Q>,
    input: &[u8],
    output: &mut [u8],
    thread_id: usize,
    num_threads: usize,
) -> Result<(), ConvError> {
    let Some(variant) = prepare(params, input.len(), output.len(), num_threads)? else {
        return Ok(());
    };
    let out = OutputView::new(output);
    dispatch::run(&variant, Call { params, input, out: &out, thread_id, num_threads });
    Ok(())
}

/// Validates a call and selects its variant. `Ok(None)` means there is nothing to compute.
pub(crate) fn prepare<Q: WeightQuantization>(
    params: &Conv3x3Params<'_, Q>,
    input_len: usize,
    output_len: usize,
    num_threads: usize,
) -> Result<Option<Variant>, ConvError> {
    let kp = params.weights.kernel_product();
    if kp != KERNEL_PROD {
        return Err(ConvError::KernelProduct { expected: KERNEL_PROD, actual: kp });
    }
    let s = &params.shape;
    debug_assert!(
        s.stride_h != 0 && s.stride_w != 0 && num_threads != 0,
        "stride_h == 0 || stride_w == 0 || num_threads == 0"
    );
    if s.stride_h == 0 || s.stride_w == 0 || num_threads == 0 || s.batch == 0 {
        return Ok(None);
    }
    if s.height == 0 || s.width == 0 || s.channels == 0 {
        return Err(ConvError::EmptyShape { height: s.height, width: s.width, channels: s.channels });
    }
    if params.weights.channels() != s.channels {
        return Err(ConvError::ChannelMismatch { expected: s.channels, packed: params.weights.channels() });
    }
    check_zero_point("activation", params.a_zero_point)?;
    check_zero_point("output", params.c_zero_point)?;
    check_len("input", s.input_len(), input_len)?;
    check_len("output", s.output_len(), output_len)?;
    if let Some(col) = params.col_offsets {
        check_len("column offset", s.channels, col.len())?;
    }
    if let Some(n) = params.bias.len() {
        check_len("bias", s.channels, n)?;
    }
    params.quant.validate(s.channels, params.bias.kind() == BiasKind::Float)?;

    let variant = Variant::select(params);
    debug!(
        "depthwise 3x3: N={} H={} W={} K={} stride={}x{} -> {:?}",
        s.batch, s.height, s.width, s.channels, s.stride_h, s.stride_w, variant
    );
    Ok(Some(variant))
}

fn check_zero_point(which: &'static str, value: i32) -> Result<(), ConvError> {
    if !(0..=255).contains(&value) {
        return Err(ConvError::ZeroPointOutOfRange { which, value });
    }
    Ok(())
}
