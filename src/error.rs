use thiserror::Error;

/// Configuration errors reported before a convolution touches any buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvError {
    #[error("packed weight is expected to have kernel product {expected} but has {actual}")]
    KernelProduct { expected: usize, actual: usize },

    #[error("packed weight holds {packed} channels but the convolution has {expected}")]
    ChannelMismatch { expected: usize, packed: usize },

    #[error("empty spatial or channel extent: H={height} W={width} K={channels}")]
    EmptyShape { height: usize, width: usize, channels: usize },

    #[error("{what} buffer too small: need {needed} elements, got {actual}")]
    BufferTooSmall { what: &'static str, needed: usize, actual: usize },

    #[error("{which} zero point {value} is outside 0..=255")]
    ZeroPointOutOfRange { which: &'static str, value: i32 },

    #[error("float bias needs an activation times weight scale; set it with with_act_times_w_scale")]
    MissingActTimesWScale,
}
