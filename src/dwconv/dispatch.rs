//! Per-call selection of a monomorphized worker.
//!
//! The runtime flags of a call are peeled off one axis at a time (bias kind, instruction set,
//! shape class, fused ReLU, activation symmetry, weight symmetry) until a fully specialized
//! [`run_worker`] instantiation is reached. Nothing in the per-pixel loop looks at a flag again.

use std::sync::OnceLock;

use crate::dwconv::inner_product::{InnerProduct, Portable};
use crate::dwconv::kernel::{run_worker, Call};
use crate::dwconv::quant::{BiasTerm, NoBias, WeightQuantization};
use crate::dwconv::{out_extent, Bias, Conv3x3Params, ConvShape};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiasKind {
    None,
    Int,
    Float,
}

/// Shapes that get their own instantiation with dimensions and strides as constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeClass {
    Fixed7x7Stride1,
    Fixed14x14Stride2,
    Stride1,
    Stride2,
    General,
}

impl ShapeClass {
    pub fn classify(shape: &ConvShape) -> Self {
        match (shape.height, shape.width, shape.stride_h, shape.stride_w) {
            (7, 7, 1, 1) => ShapeClass::Fixed7x7Stride1,
            (14, 14, 2, 2) => ShapeClass::Fixed14x14Stride2,
            (_, _, 1, 1) => ShapeClass::Stride1,
            (_, _, 2, 2) => ShapeClass::Stride2,
            _ => ShapeClass::General,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Isa {
    Portable,
    Avx2,
}

impl Isa {
    /// Best engine for this CPU; probed once per process.
    pub fn detect() -> Self {
        static ISA: OnceLock<Isa> = OnceLock::new();
        *ISA.get_or_init(|| {
            #[cfg(all(target_arch = "x86_64", feature = "simd-avx2"))]
            {
                if is_x86_feature_detected!("avx2") {
                    return Isa::Avx2;
                }
                log::warn!("simd-avx2 enabled but the CPU lacks AVX2; using the portable engine");
            }
            Isa::Portable
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Variant {
    pub fuse_relu: bool,
    pub bias: BiasKind,
    pub a_symmetric: bool,
    pub b_symmetric: bool,
    pub per_channel: bool,
    pub shape: ShapeClass,
    pub isa: Isa,
}

impl Variant {
    pub fn select<Q: WeightQuantization>(params: &Conv3x3Params<'_, Q>) -> Self {
        Self {
            fuse_relu: params.fuse_relu,
            bias: params.bias.kind(),
            a_symmetric: params.a_zero_point == 0 || params.col_offsets.is_none(),
            b_symmetric: !Q::PER_CHANNEL && params.quant.is_symmetric(),
            per_channel: Q::PER_CHANNEL,
            shape: ShapeClass::classify(&params.shape),
            isa: Isa::detect(),
        }
    }
}

/// Resolved spatial geometry of a call.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Dims {
    pub height: usize,
    pub width: usize,
    pub stride_h: usize,
    pub stride_w: usize,
}

impl Dims {
    #[inline(always)]
    pub fn out_height(&self) -> usize { out_extent(self.height, self.stride_h) }
    #[inline(always)]
    pub fn out_width(&self) -> usize { out_extent(self.width, self.stride_w) }
}

/// Spatial geometry of a [`ShapeClass`], constant where the class fixes it.
pub(crate) trait Geometry {
    fn resolve(shape: &ConvShape) -> Dims;
}

pub(crate) struct General;
pub(crate) struct Stride1;
pub(crate) struct Stride2;
pub(crate) struct Fixed7x7Stride1;
pub(crate) struct Fixed14x14Stride2;

impl Geometry for General {
    #[inline(always)]
    fn resolve(s: &ConvShape) -> Dims {
        Dims { height: s.height, width: s.width, stride_h: s.stride_h, stride_w: s.stride_w }
    }
}

impl Geometry for Stride1 {
    #[inline(always)]
    fn resolve(s: &ConvShape) -> Dims { Dims { height: s.height, width: s.width, stride_h: 1, stride_w: 1 } }
}

impl Geometry for Stride2 {
    #[inline(always)]
    fn resolve(s: &ConvShape) -> Dims { Dims { height: s.height, width: s.width, stride_h: 2, stride_w: 2 } }
}

impl Geometry for Fixed7x7Stride1 {
    #[inline(always)]
    fn resolve(_: &ConvShape) -> Dims { Dims { height: 7, width: 7, stride_h: 1, stride_w: 1 } }
}

impl Geometry for Fixed14x14Stride2 {
    #[inline(always)]
    fn resolve(_: &ConvShape) -> Dims { Dims { height: 14, width: 14, stride_h: 2, stride_w: 2 } }
}

pub(crate) fn run<Q: WeightQuantization>(v: &Variant, call: Call<'_, Q>) {
    match call.params.bias {
        Bias::None => with_bias::<Q, NoBias>(v, call, &[]),
        Bias::Int(b) => with_bias::<Q, i32>(v, call, b),
        Bias::Float(b) => with_bias::<Q, f32>(v, call, b),
    }
}

fn with_bias<Q: WeightQuantization, B: BiasTerm>(v: &Variant, call: Call<'_, Q>, bias: &[B]) {
    match v.isa {
        #[cfg(all(target_arch = "x86_64", feature = "simd-avx2"))]
        Isa::Avx2 => with_isa::<Q, B, crate::dwconv::avx2::Avx2>(v, call, bias),
        _ => with_isa::<Q, B, Portable>(v, call, bias),
    }
}

fn with_isa<Q: WeightQuantization, B: BiasTerm, I: InnerProduct>(v: &Variant, call: Call<'_, Q>, bias: &[B]) {
    match v.shape {
        ShapeClass::Fixed7x7Stride1 => with_shape::<Q, B, I, Fixed7x7Stride1>(v, call, bias),
        ShapeClass::Fixed14x14Stride2 => with_shape::<Q, B, I, Fixed14x14Stride2>(v, call, bias),
        ShapeClass::Stride1 => with_shape::<Q, B, I, Stride1>(v, call, bias),
        ShapeClass::Stride2 => with_shape::<Q, B, I, Stride2>(v, call, bias),
        ShapeClass::General => with_shape::<Q, B, I, General>(v, call, bias),
    }
}

fn with_shape<Q: WeightQuantization, B: BiasTerm, I: InnerProduct, G: Geometry>(v: &Variant, call: Call<'_, Q>, bias: &[B]) {
    if v.fuse_relu {
        with_relu::<Q, B, I, G, true>(v, call, bias)
    } else {
        with_relu::<Q, B, I, G, false>(v, call, bias)
    }
}

fn with_relu<Q, B, I, G, const FUSE_RELU: bool>(v: &Variant, call: Call<'_, Q>, bias: &[B])
where
    Q: WeightQuantization,
    B: BiasTerm,
    I: InnerProduct,
    G: Geometry,
{
    if v.a_symmetric {
        with_a_symmetry::<Q, B, I, G, FUSE_RELU, true>(v, call, bias)
    } else {
        with_a_symmetry::<Q, B, I, G, FUSE_RELU, false>(v, call, bias)
    }
}

fn with_a_symmetry<Q, B, I, G, const FUSE_RELU: bool, const A_SYMMETRIC: bool>(v: &Variant, call: Call<'_, Q>, bias: &[B])
where
    Q: WeightQuantization,
    B: BiasTerm,
    I: InnerProduct,
    G: Geometry,
{
    // per-channel weights never take the symmetric path
    if v.b_symmetric && !Q::PER_CHANNEL {
        run_worker::<Q, B, I, G, FUSE_RELU, A_SYMMETRIC, true>(call, bias)
    } else {
        run_worker::<Q, B, I, G, FUSE_RELU, A_SYMMETRIC, false>(call, bias)
    }
}
