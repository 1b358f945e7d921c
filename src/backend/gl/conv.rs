// Neutral enum -> GL enum translation

use crate::error::{Error, Result};
use crate::format::Format;
use crate::command::IndexFormat;
use crate::pipeline::{BlendFactor, BlendOp};
use crate::sampler::{AddressMode, Filter};

// S3TC (EXT_texture_compression_s3tc / EXT_texture_sRGB) is not part of
// the core profile enums.
const COMPRESSED_RGBA_S3TC_DXT1: u32 = 0x83F1;
const COMPRESSED_RGBA_S3TC_DXT3: u32 = 0x83F2;
const COMPRESSED_RGBA_S3TC_DXT5: u32 = 0x83F3;
const COMPRESSED_SRGB_ALPHA_S3TC_DXT1: u32 = 0x8C4D;
const COMPRESSED_SRGB_ALPHA_S3TC_DXT3: u32 = 0x8C4E;
const COMPRESSED_SRGB_ALPHA_S3TC_DXT5: u32 = 0x8C4F;

const COMPRESSED_RED_RGTC1: u32 = 0x8DBB;
const COMPRESSED_SIGNED_RED_RGTC1: u32 = 0x8DBC;
const COMPRESSED_RG_RGTC2: u32 = 0x8DBD;
const COMPRESSED_SIGNED_RG_RGTC2: u32 = 0x8DBE;
const COMPRESSED_RGBA_BPTC_UNORM: u32 = 0x8E8C;
const COMPRESSED_SRGB_ALPHA_BPTC_UNORM: u32 = 0x8E8D;
const COMPRESSED_RGB_BPTC_SIGNED_FLOAT: u32 = 0x8E8E;
const COMPRESSED_RGB_BPTC_UNSIGNED_FLOAT: u32 = 0x8E8F;

/// Sized internal format plus the client format/type used for uploads.
/// `format` and `ty` are zero for compressed formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatDesc {
    pub internal: u32,
    pub format: u32,
    pub ty: u32,
}

impl FormatDesc {
    const fn new(internal: u32, format: u32, ty: u32) -> Self {
        Self { internal, format, ty }
    }

    const fn compressed(internal: u32) -> Self {
        Self { internal, format: 0, ty: 0 }
    }

    pub fn is_compressed(&self) -> bool {
        self.format == 0
    }
}

pub fn format(format: Format) -> Result<FormatDesc> {
    use Format::*;
    let desc = match format {
        Unknown => return Err(Error::invalid_usage("Format::Unknown has no GL equivalent")),

        // Sampled through a swizzle set at texture creation.
        A8_UNorm => FormatDesc::new(glow::R8, glow::RED, glow::UNSIGNED_BYTE),
        R8_UNorm => FormatDesc::new(glow::R8, glow::RED, glow::UNSIGNED_BYTE),
        R8_UInt => FormatDesc::new(glow::R8UI, glow::RED_INTEGER, glow::UNSIGNED_BYTE),
        R8_SNorm => FormatDesc::new(glow::R8_SNORM, glow::RED, glow::BYTE),
        R8_SInt => FormatDesc::new(glow::R8I, glow::RED_INTEGER, glow::BYTE),

        B5G6R5_UNorm => FormatDesc::new(glow::RGB565, glow::RGB, glow::UNSIGNED_SHORT_5_6_5),
        B5G5R5A1_UNorm => FormatDesc::new(glow::RGB5_A1, glow::BGRA, glow::UNSIGNED_SHORT_1_5_5_5_REV),
        R8G8_UNorm => FormatDesc::new(glow::RG8, glow::RG, glow::UNSIGNED_BYTE),
        R8G8_UInt => FormatDesc::new(glow::RG8UI, glow::RG_INTEGER, glow::UNSIGNED_BYTE),
        R8G8_SNorm => FormatDesc::new(glow::RG8_SNORM, glow::RG, glow::BYTE),
        R8G8_SInt => FormatDesc::new(glow::RG8I, glow::RG_INTEGER, glow::BYTE),
        R16_Float => FormatDesc::new(glow::R16F, glow::RED, glow::HALF_FLOAT),
        R16_UNorm => FormatDesc::new(glow::R16, glow::RED, glow::UNSIGNED_SHORT),
        R16_UInt => FormatDesc::new(glow::R16UI, glow::RED_INTEGER, glow::UNSIGNED_SHORT),
        R16_SNorm => FormatDesc::new(glow::R16_SNORM, glow::RED, glow::SHORT),
        R16_SInt => FormatDesc::new(glow::R16I, glow::RED_INTEGER, glow::SHORT),
        D16_UNorm => FormatDesc::new(glow::DEPTH_COMPONENT16, glow::DEPTH_COMPONENT, glow::UNSIGNED_SHORT),

        R8G8B8A8_UNorm => FormatDesc::new(glow::RGBA8, glow::RGBA, glow::UNSIGNED_BYTE),
        R8G8B8A8_UNorm_SRGB => FormatDesc::new(glow::SRGB8_ALPHA8, glow::RGBA, glow::UNSIGNED_BYTE),
        R8G8B8A8_UInt => FormatDesc::new(glow::RGBA8UI, glow::RGBA_INTEGER, glow::UNSIGNED_BYTE),
        R8G8B8A8_SNorm => FormatDesc::new(glow::RGBA8_SNORM, glow::RGBA, glow::BYTE),
        R8G8B8A8_SInt => FormatDesc::new(glow::RGBA8I, glow::RGBA_INTEGER, glow::BYTE),
        B8G8R8A8_UNorm => FormatDesc::new(glow::RGBA8, glow::BGRA, glow::UNSIGNED_BYTE),
        B8G8R8A8_UNorm_SRGB => FormatDesc::new(glow::SRGB8_ALPHA8, glow::BGRA, glow::UNSIGNED_BYTE),
        R10G10B10A2_UNorm => FormatDesc::new(glow::RGB10_A2, glow::RGBA, glow::UNSIGNED_INT_2_10_10_10_REV),
        R10G10B10A2_UInt => FormatDesc::new(glow::RGB10_A2UI, glow::RGBA_INTEGER, glow::UNSIGNED_INT_2_10_10_10_REV),
        R16G16_Float => FormatDesc::new(glow::RG16F, glow::RG, glow::HALF_FLOAT),
        R16G16_UNorm => FormatDesc::new(glow::RG16, glow::RG, glow::UNSIGNED_SHORT),
        R16G16_UInt => FormatDesc::new(glow::RG16UI, glow::RG_INTEGER, glow::UNSIGNED_SHORT),
        R16G16_SNorm => FormatDesc::new(glow::RG16_SNORM, glow::RG, glow::SHORT),
        R16G16_SInt => FormatDesc::new(glow::RG16I, glow::RG_INTEGER, glow::SHORT),
        R32_Float => FormatDesc::new(glow::R32F, glow::RED, glow::FLOAT),
        R32_UInt => FormatDesc::new(glow::R32UI, glow::RED_INTEGER, glow::UNSIGNED_INT),
        R32_SInt => FormatDesc::new(glow::R32I, glow::RED_INTEGER, glow::INT),
        D24_UNorm_S8_UInt => FormatDesc::new(glow::DEPTH24_STENCIL8, glow::DEPTH_STENCIL, glow::UNSIGNED_INT_24_8),
        D32_Float => FormatDesc::new(glow::DEPTH_COMPONENT32F, glow::DEPTH_COMPONENT, glow::FLOAT),

        R16G16B16A16_Float => FormatDesc::new(glow::RGBA16F, glow::RGBA, glow::HALF_FLOAT),
        R16G16B16A16_UNorm => FormatDesc::new(glow::RGBA16, glow::RGBA, glow::UNSIGNED_SHORT),
        R16G16B16A16_UInt => FormatDesc::new(glow::RGBA16UI, glow::RGBA_INTEGER, glow::UNSIGNED_SHORT),
        R16G16B16A16_SNorm => FormatDesc::new(glow::RGBA16_SNORM, glow::RGBA, glow::SHORT),
        R16G16B16A16_SInt => FormatDesc::new(glow::RGBA16I, glow::RGBA_INTEGER, glow::SHORT),
        R32G32_Float => FormatDesc::new(glow::RG32F, glow::RG, glow::FLOAT),
        R32G32_UInt => FormatDesc::new(glow::RG32UI, glow::RG_INTEGER, glow::UNSIGNED_INT),
        R32G32_SInt => FormatDesc::new(glow::RG32I, glow::RG_INTEGER, glow::INT),

        R32G32B32_Float => FormatDesc::new(glow::RGB32F, glow::RGB, glow::FLOAT),
        R32G32B32_UInt => FormatDesc::new(glow::RGB32UI, glow::RGB_INTEGER, glow::UNSIGNED_INT),
        R32G32B32_SInt => FormatDesc::new(glow::RGB32I, glow::RGB_INTEGER, glow::INT),

        R32G32B32A32_Float => FormatDesc::new(glow::RGBA32F, glow::RGBA, glow::FLOAT),
        R32G32B32A32_UInt => FormatDesc::new(glow::RGBA32UI, glow::RGBA_INTEGER, glow::UNSIGNED_INT),
        R32G32B32A32_SInt => FormatDesc::new(glow::RGBA32I, glow::RGBA_INTEGER, glow::INT),

        BC1_UNorm => FormatDesc::compressed(COMPRESSED_RGBA_S3TC_DXT1),
        BC1_UNorm_SRGB => FormatDesc::compressed(COMPRESSED_SRGB_ALPHA_S3TC_DXT1),
        BC2_UNorm => FormatDesc::compressed(COMPRESSED_RGBA_S3TC_DXT3),
        BC2_UNorm_SRGB => FormatDesc::compressed(COMPRESSED_SRGB_ALPHA_S3TC_DXT3),
        BC3_UNorm => FormatDesc::compressed(COMPRESSED_RGBA_S3TC_DXT5),
        BC3_UNorm_SRGB => FormatDesc::compressed(COMPRESSED_SRGB_ALPHA_S3TC_DXT5),
        BC4_UNorm => FormatDesc::compressed(COMPRESSED_RED_RGTC1),
        BC4_SNorm => FormatDesc::compressed(COMPRESSED_SIGNED_RED_RGTC1),
        BC5_UNorm => FormatDesc::compressed(COMPRESSED_RG_RGTC2),
        BC5_SNorm => FormatDesc::compressed(COMPRESSED_SIGNED_RG_RGTC2),
        BC6H_UF16 => FormatDesc::compressed(COMPRESSED_RGB_BPTC_UNSIGNED_FLOAT),
        BC6H_SF16 => FormatDesc::compressed(COMPRESSED_RGB_BPTC_SIGNED_FLOAT),
        BC7_UNorm => FormatDesc::compressed(COMPRESSED_RGBA_BPTC_UNORM),
        BC7_UNorm_SRGB => FormatDesc::compressed(COMPRESSED_SRGB_ALPHA_BPTC_UNORM),
    };
    Ok(desc)
}

pub fn min_filter(min: Filter, mip: Filter) -> u32 {
    match (min, mip) {
        (Filter::Point, Filter::Point) => glow::NEAREST_MIPMAP_NEAREST,
        (Filter::Point, Filter::Linear) => glow::NEAREST_MIPMAP_LINEAR,
        (Filter::Linear, Filter::Point) => glow::LINEAR_MIPMAP_NEAREST,
        (Filter::Linear, Filter::Linear) => glow::LINEAR_MIPMAP_LINEAR,
    }
}

pub fn mag_filter(filter: Filter) -> u32 {
    match filter {
        Filter::Point => glow::NEAREST,
        Filter::Linear => glow::LINEAR,
    }
}

pub fn address_mode(mode: AddressMode) -> u32 {
    match mode {
        AddressMode::Wrap => glow::REPEAT,
        AddressMode::Mirror => glow::MIRRORED_REPEAT,
        AddressMode::ClampToEdge => glow::CLAMP_TO_EDGE,
        AddressMode::ClampToBorder => glow::CLAMP_TO_BORDER,
    }
}

pub fn blend_factor(factor: BlendFactor) -> u32 {
    match factor {
        BlendFactor::Zero => glow::ZERO,
        BlendFactor::One => glow::ONE,
        BlendFactor::SrcColor => glow::SRC_COLOR,
        BlendFactor::OneMinusSrcColor => glow::ONE_MINUS_SRC_COLOR,
        BlendFactor::DestColor => glow::DST_COLOR,
        BlendFactor::OneMinusDestColor => glow::ONE_MINUS_DST_COLOR,
        BlendFactor::SrcAlpha => glow::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => glow::ONE_MINUS_SRC_ALPHA,
        BlendFactor::DestAlpha => glow::DST_ALPHA,
        BlendFactor::OneMinusDestAlpha => glow::ONE_MINUS_DST_ALPHA,
    }
}

pub fn blend_op(op: BlendOp) -> u32 {
    match op {
        BlendOp::Add => glow::FUNC_ADD,
        BlendOp::Subtract => glow::FUNC_SUBTRACT,
        BlendOp::ReverseSubtract => glow::FUNC_REVERSE_SUBTRACT,
        BlendOp::Min => glow::MIN,
        BlendOp::Max => glow::MAX,
    }
}

pub fn index_type(format: IndexFormat) -> u32 {
    match format {
        IndexFormat::U16 => glow::UNSIGNED_SHORT,
        IndexFormat::U32 => glow::UNSIGNED_INT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_known_format_translates() {
        for format in Format::ALL.iter().copied().filter(|f| *f != Format::Unknown) {
            let desc = super::format(format).unwrap();
            assert_ne!(desc.internal, 0, "{:?}", format);
            assert_eq!(desc.is_compressed(), format.is_compressed(), "{:?}", format);
        }
        assert!(super::format(Format::Unknown).is_err());
    }

    #[test]
    fn bgra_uploads_swizzle_on_the_client_side() {
        let bgra = super::format(Format::B8G8R8A8_UNorm).unwrap();
        let rgba = super::format(Format::R8G8B8A8_UNorm).unwrap();
        assert_eq!(bgra.internal, rgba.internal);
        assert_eq!(bgra.format, glow::BGRA);
    }

    #[test]
    fn trilinear_min_filter() {
        assert_eq!(min_filter(Filter::Linear, Filter::Linear), glow::LINEAR_MIPMAP_LINEAR);
        assert_eq!(min_filter(Filter::Point, Filter::Linear), glow::NEAREST_MIPMAP_LINEAR);
        assert_eq!(mag_filter(Filter::Point), glow::NEAREST);
    }
}
