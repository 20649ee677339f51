// Quantized 3x3 depthwise convolution kernels
pub mod error;
pub mod dwconv;
pub mod parallel;
pub mod cases;

pub use error::ConvError;
pub use dwconv::{
    depthwise_3x3_pad_1, depthwise_3x3_per_channel_quantization_pad_1, Bias, Conv3x3Params,
    ConvShape,
};
pub use dwconv::packed::PackedDepthwiseWeights;
pub use dwconv::quant::{column_offsets, PerChannelQuant, PerTensorQuant};
pub use parallel::{par_depthwise_3x3_pad_1, par_depthwise_3x3_per_channel_quantization_pad_1};
