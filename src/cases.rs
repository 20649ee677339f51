//! Benchmark and verification cases.
//! Each case describes one depthwise layer; `generate` turns it into deterministic data.

use std::path::Path;

use anyhow::{bail, Context, Result};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::dwconv::packed::PackedDepthwiseWeights;
use crate::dwconv::quant::{column_offsets, PerChannelQuant, PerTensorQuant};
use crate::dwconv::reference::depthwise_3x3_reference;
use crate::dwconv::{depthwise_3x3_pad_1, depthwise_3x3_per_channel_quantization_pad_1, Bias, Conv3x3Params, ConvShape};
use crate::error::ConvError;
use crate::parallel::{par_depthwise_3x3_pad_1, par_depthwise_3x3_per_channel_quantization_pad_1};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BiasSpec {
    #[default]
    None,
    Int,
    Float,
}

/// One depthwise layer.
///
/// In case files the strides are given either as a single `stride` or as `stride_h` /
/// `stride_w`; a per-axis value overrides `stride` for its axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CaseEntry")]
pub struct ConvCase {
    pub name: String,
    pub batch: usize,
    pub height: usize,
    pub width: usize,
    pub channels: usize,
    pub stride_h: usize,
    pub stride_w: usize,
    pub per_channel: bool,
    pub fuse_relu: bool,
    pub bias: BiasSpec,
    pub a_zero_point: i32,
    /// Per-tensor weight zero point; per-channel cases draw theirs around it.
    pub b_zero_point: i32,
    pub c_zero_point: i32,
    /// Supply column offsets (false requests the activation-symmetric path).
    pub col_offsets: bool,
}

/// On-disk form of [`ConvCase`].
#[derive(Debug, Deserialize)]
struct CaseEntry {
    name: String,
    batch: usize,
    height: usize,
    width: usize,
    channels: usize,
    #[serde(default)]
    stride: Option<usize>,
    #[serde(default)]
    stride_h: Option<usize>,
    #[serde(default)]
    stride_w: Option<usize>,
    #[serde(default)]
    per_channel: bool,
    #[serde(default)]
    fuse_relu: bool,
    #[serde(default)]
    bias: BiasSpec,
    #[serde(default = "default_a_zero_point")]
    a_zero_point: i32,
    #[serde(default)]
    b_zero_point: i32,
    #[serde(default = "default_c_zero_point")]
    c_zero_point: i32,
    #[serde(default = "default_true")]
    col_offsets: bool,
}

impl TryFrom<CaseEntry> for ConvCase {
    type Error = String;

    fn try_from(e: CaseEntry) -> Result<Self, Self::Error> {
        let (Some(stride_h), Some(stride_w)) = (e.stride_h.or(e.stride), e.stride_w.or(e.stride)) else {
            return Err(format!("case '{}' needs `stride` or both `stride_h` and `stride_w`", e.name));
        };
        Ok(ConvCase {
            name: e.name,
            batch: e.batch,
            height: e.height,
            width: e.width,
            channels: e.channels,
            stride_h,
            stride_w,
            per_channel: e.per_channel,
            fuse_relu: e.fuse_relu,
            bias: e.bias,
            a_zero_point: e.a_zero_point,
            b_zero_point: e.b_zero_point,
            c_zero_point: e.c_zero_point,
            col_offsets: e.col_offsets,
        })
    }
}

fn default_a_zero_point() -> i32 { 128 }
fn default_c_zero_point() -> i32 { 64 }
fn default_true() -> bool { true }

impl ConvCase {
    /// Case with asymmetric zero points and no bias.
    pub fn small(name: &str, batch: usize, height: usize, width: usize, channels: usize, stride: usize) -> Self {
        Self {
            name: name.to_string(),
            batch,
            height,
            width,
            channels,
            stride_h: stride,
            stride_w: stride,
            per_channel: false,
            fuse_relu: false,
            bias: BiasSpec::None,
            a_zero_point: 100,
            b_zero_point: 3,
            c_zero_point: 64,
            col_offsets: true,
        }
    }

    pub fn with_strides(mut self, stride_h: usize, stride_w: usize) -> Self {
        self.stride_h = stride_h;
        self.stride_w = stride_w;
        self
    }

    pub fn shape(&self) -> ConvShape {
        ConvShape::new(self.batch, self.height, self.width, self.channels, 1).with_strides(self.stride_h, self.stride_w)
    }

    /// Multiply-accumulate operations (x2) of one full convolution.
    pub fn ops(&self) -> u64 { 2 * 9 * self.shape().output_len() as u64 }

    pub fn generate(&self, seed: u64) -> Result<CaseData, ConvError> {
        let mut rng = SmallRng::seed_from_u64(seed);
        let k = self.channels;
        let shape = self.shape();
        let input: Vec<u8> = (0..shape.input_len()).map(|_| rng.gen()).collect();
        let raw: Vec<i8> = (0..k * 9).map(|_| rng.gen()).collect();
        let weights = PackedDepthwiseWeights::pack(k, 9, &raw)?;
        let b_zero_points: Vec<i32> = if self.per_channel {
            (0..k).map(|_| self.b_zero_point + rng.gen_range(-4..=4)).collect()
        } else {
            vec![self.b_zero_point]
        };
        let n_scales = if self.per_channel { k } else { 1 };
        let multipliers = (0..n_scales).map(|_| rng.gen_range(0.0005f32..0.004)).collect();
        let act_times_w_scales = (0..n_scales).map(|_| rng.gen_range(0.05f32..0.5)).collect();
        let col_offsets = column_offsets(&weights, &b_zero_points)?;
        let bias_i32 = (0..k).map(|_| rng.gen_range(-2000..=2000)).collect();
        let bias_f32 = (0..k).map(|_| rng.gen_range(-100.0f32..100.0)).collect();
        Ok(CaseData { input, weights, b_zero_points, multipliers, act_times_w_scales, col_offsets, bias_i32, bias_f32 })
    }
}

/// Generated tensors and quantization parameters for one [`ConvCase`].
#[derive(Debug, Clone)]
pub struct CaseData {
    pub input: Vec<u8>,
    pub weights: PackedDepthwiseWeights,
    pub b_zero_points: Vec<i32>,
    pub multipliers: Vec<f32>,
    pub act_times_w_scales: Vec<f32>,
    pub col_offsets: Vec<i32>,
    pub bias_i32: Vec<i32>,
    pub bias_f32: Vec<f32>,
}

impl CaseData {
    fn params<'a, Q>(&'a self, case: &ConvCase, quant: Q) -> Conv3x3Params<'a, Q> {
        Conv3x3Params {
            shape: case.shape(),
            a_zero_point: case.a_zero_point,
            weights: &self.weights,
            quant,
            c_zero_point: case.c_zero_point,
            col_offsets: case.col_offsets.then_some(self.col_offsets.as_slice()),
            bias: match case.bias {
                BiasSpec::None => Bias::None,
                BiasSpec::Int => Bias::Int(&self.bias_i32),
                BiasSpec::Float => Bias::Float(&self.bias_f32),
            },
            fuse_relu: case.fuse_relu,
        }
    }

    pub fn per_tensor_params(&self, case: &ConvCase) -> Conv3x3Params<'_, PerTensorQuant> {
        let quant = PerTensorQuant::new(self.b_zero_points[0], self.multipliers[0])
            .with_act_times_w_scale(self.act_times_w_scales[0]);
        self.params(case, quant)
    }

    pub fn per_channel_params(&self, case: &ConvCase) -> Conv3x3Params<'_, PerChannelQuant<'_>> {
        let quant = PerChannelQuant {
            b_zero_points: &self.b_zero_points,
            multipliers: &self.multipliers,
            act_times_w_scales: &self.act_times_w_scales,
        };
        self.params(case, quant)
    }

    /// All workers through the rayon driver.
    pub fn run(&self, case: &ConvCase, output: &mut [u8], num_threads: usize) -> Result<(), ConvError> {
        if case.per_channel {
            par_depthwise_3x3_per_channel_quantization_pad_1(&self.per_channel_params(case), &self.input, output, num_threads)
        } else {
            par_depthwise_3x3_pad_1(&self.per_tensor_params(case), &self.input, output, num_threads)
        }
    }

    /// A single worker's share.
    pub fn run_worker(&self, case: &ConvCase, output: &mut [u8], thread_id: usize, num_threads: usize) -> Result<(), ConvError> {
        if case.per_channel {
            depthwise_3x3_per_channel_quantization_pad_1(&self.per_channel_params(case), &self.input, output, thread_id, num_threads)
        } else {
            depthwise_3x3_pad_1(&self.per_tensor_params(case), &self.input, output, thread_id, num_threads)
        }
    }

    pub fn reference(&self, case: &ConvCase) -> Vec<u8> {
        if case.per_channel {
            depthwise_3x3_reference(&self.per_channel_params(case), &self.input)
        } else {
            depthwise_3x3_reference(&self.per_tensor_params(case), &self.input)
        }
    }
}

fn layer(name: &str, hw: usize, channels: usize, stride: usize) -> ConvCase {
    ConvCase {
        name: name.to_string(),
        batch: 1,
        height: hw,
        width: hw,
        channels,
        stride_h: stride,
        stride_w: stride,
        per_channel: false,
        fuse_relu: true,
        bias: BiasSpec::Int,
        a_zero_point: default_a_zero_point(),
        b_zero_point: 0,
        c_zero_point: default_c_zero_point(),
        col_offsets: true,
    }
}

/// Depthwise layers of a MobileNet-style network plus a few odd shapes.
pub fn default_cases() -> Vec<ConvCase> {
    let mut cases = vec![
        layer("mbv2_112x112_c32_s1", 112, 32, 1),
        layer("mbv2_112x112_c96_s2", 112, 96, 2),
        layer("mbv2_56x56_c144_s1", 56, 144, 1),
        layer("mbv2_56x56_c144_s2", 56, 144, 2),
        layer("mbv2_28x28_c192_s1", 28, 192, 1),
        layer("mbv2_14x14_c576_s2", 14, 576, 2),
        layer("mbv2_7x7_c960_s1", 7, 960, 1),
    ];
    let mut per_channel = layer("per_channel_28x28_c192_s2", 28, 192, 2);
    per_channel.per_channel = true;
    per_channel.bias = BiasSpec::Float;
    per_channel.b_zero_point = 2;
    cases.push(per_channel);
    let mut odd = layer("batch4_13x17_c40_s3", 13, 40, 3);
    odd.batch = 4;
    odd.width = 17;
    odd.b_zero_point = -5;
    odd.fuse_relu = false;
    odd.bias = BiasSpec::None;
    cases.push(odd);
    let mut uneven = layer("uneven_11x9_c24_s1x3", 11, 24, 1).with_strides(1, 3);
    uneven.width = 9;
    uneven.b_zero_point = 4;
    cases.push(uneven);
    cases
}

pub fn find_case(name: &str) -> Option<ConvCase> {
    default_cases().into_iter().find(|c| c.name == name)
}

/// Loads a JSON array of cases.
pub fn load_cases<P: AsRef<Path>>(path: P) -> Result<Vec<ConvCase>> {
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("read case file: {}", path.as_ref().display()))?;
    let cases: Vec<ConvCase> = serde_json::from_str(&text)
        .with_context(|| format!("parse case file: {}", path.as_ref().display()))?;
    for c in &cases {
        if c.stride_h == 0 || c.stride_w == 0 || c.height == 0 || c.width == 0 || c.channels == 0 {
            bail!("case '{}' has a zero extent or stride", c.name);
        }
    }
    Ok(cases)
}
