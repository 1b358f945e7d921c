// D3D11 / DXGI enum conversions

use crate::command::IndexFormat;
use crate::error::{Error, Result};
use crate::format::Format;
use crate::pipeline::{BlendFactor, BlendOp};
use crate::sampler::{AddressMode, Filter, SamplerInfo};
use crate::shader::Semantic;
use windows::core::{s, PCSTR};
use windows::Win32::Graphics::Direct3D11::*;
use windows::Win32::Graphics::Dxgi::Common::*;

pub fn format(format: Format) -> Result<DXGI_FORMAT> {
    Ok(match format {
        Format::Unknown => {
            return Err(Error::invalid_usage("Format::Unknown has no DXGI equivalent"));
        }
        Format::A8_UNorm => DXGI_FORMAT_A8_UNORM,
        Format::R8_UNorm => DXGI_FORMAT_R8_UNORM,
        Format::R8_UInt => DXGI_FORMAT_R8_UINT,
        Format::R8_SNorm => DXGI_FORMAT_R8_SNORM,
        Format::R8_SInt => DXGI_FORMAT_R8_SINT,
        Format::B5G6R5_UNorm => DXGI_FORMAT_B5G6R5_UNORM,
        Format::B5G5R5A1_UNorm => DXGI_FORMAT_B5G5R5A1_UNORM,
        Format::R8G8_UNorm => DXGI_FORMAT_R8G8_UNORM,
        Format::R8G8_UInt => DXGI_FORMAT_R8G8_UINT,
        Format::R8G8_SNorm => DXGI_FORMAT_R8G8_SNORM,
        Format::R8G8_SInt => DXGI_FORMAT_R8G8_SINT,
        Format::R16_Float => DXGI_FORMAT_R16_FLOAT,
        Format::R16_UNorm => DXGI_FORMAT_R16_UNORM,
        Format::R16_UInt => DXGI_FORMAT_R16_UINT,
        Format::R16_SNorm => DXGI_FORMAT_R16_SNORM,
        Format::R16_SInt => DXGI_FORMAT_R16_SINT,
        Format::D16_UNorm => DXGI_FORMAT_D16_UNORM,
        Format::R8G8B8A8_UNorm => DXGI_FORMAT_R8G8B8A8_UNORM,
        Format::R8G8B8A8_UNorm_SRGB => DXGI_FORMAT_R8G8B8A8_UNORM_SRGB,
        Format::R8G8B8A8_UInt => DXGI_FORMAT_R8G8B8A8_UINT,
        Format::R8G8B8A8_SNorm => DXGI_FORMAT_R8G8B8A8_SNORM,
        Format::R8G8B8A8_SInt => DXGI_FORMAT_R8G8B8A8_SINT,
        Format::B8G8R8A8_UNorm => DXGI_FORMAT_B8G8R8A8_UNORM,
        Format::B8G8R8A8_UNorm_SRGB => DXGI_FORMAT_B8G8R8A8_UNORM_SRGB,
        Format::R10G10B10A2_UNorm => DXGI_FORMAT_R10G10B10A2_UNORM,
        Format::R10G10B10A2_UInt => DXGI_FORMAT_R10G10B10A2_UINT,
        Format::R16G16_Float => DXGI_FORMAT_R16G16_FLOAT,
        Format::R16G16_UNorm => DXGI_FORMAT_R16G16_UNORM,
        Format::R16G16_UInt => DXGI_FORMAT_R16G16_UINT,
        Format::R16G16_SNorm => DXGI_FORMAT_R16G16_SNORM,
        Format::R16G16_SInt => DXGI_FORMAT_R16G16_SINT,
        Format::R32_Float => DXGI_FORMAT_R32_FLOAT,
        Format::R32_UInt => DXGI_FORMAT_R32_UINT,
        Format::R32_SInt => DXGI_FORMAT_R32_SINT,
        Format::D24_UNorm_S8_UInt => DXGI_FORMAT_D24_UNORM_S8_UINT,
        Format::D32_Float => DXGI_FORMAT_D32_FLOAT,
        Format::R16G16B16A16_Float => DXGI_FORMAT_R16G16B16A16_FLOAT,
        Format::R16G16B16A16_UNorm => DXGI_FORMAT_R16G16B16A16_UNORM,
        Format::R16G16B16A16_UInt => DXGI_FORMAT_R16G16B16A16_UINT,
        Format::R16G16B16A16_SNorm => DXGI_FORMAT_R16G16B16A16_SNORM,
        Format::R16G16B16A16_SInt => DXGI_FORMAT_R16G16B16A16_SINT,
        Format::R32G32_Float => DXGI_FORMAT_R32G32_FLOAT,
        Format::R32G32_UInt => DXGI_FORMAT_R32G32_UINT,
        Format::R32G32_SInt => DXGI_FORMAT_R32G32_SINT,
        Format::R32G32B32_Float => DXGI_FORMAT_R32G32B32_FLOAT,
        Format::R32G32B32_UInt => DXGI_FORMAT_R32G32B32_UINT,
        Format::R32G32B32_SInt => DXGI_FORMAT_R32G32B32_SINT,
        Format::R32G32B32A32_Float => DXGI_FORMAT_R32G32B32A32_FLOAT,
        Format::R32G32B32A32_UInt => DXGI_FORMAT_R32G32B32A32_UINT,
        Format::R32G32B32A32_SInt => DXGI_FORMAT_R32G32B32A32_SINT,
        Format::BC1_UNorm => DXGI_FORMAT_BC1_UNORM,
        Format::BC1_UNorm_SRGB => DXGI_FORMAT_BC1_UNORM_SRGB,
        Format::BC2_UNorm => DXGI_FORMAT_BC2_UNORM,
        Format::BC2_UNorm_SRGB => DXGI_FORMAT_BC2_UNORM_SRGB,
        Format::BC3_UNorm => DXGI_FORMAT_BC3_UNORM,
        Format::BC3_UNorm_SRGB => DXGI_FORMAT_BC3_UNORM_SRGB,
        Format::BC4_UNorm => DXGI_FORMAT_BC4_UNORM,
        Format::BC4_SNorm => DXGI_FORMAT_BC4_SNORM,
        Format::BC5_UNorm => DXGI_FORMAT_BC5_UNORM,
        Format::BC5_SNorm => DXGI_FORMAT_BC5_SNORM,
        Format::BC6H_UF16 => DXGI_FORMAT_BC6H_UF16,
        Format::BC6H_SF16 => DXGI_FORMAT_BC6H_SF16,
        Format::BC7_UNorm => DXGI_FORMAT_BC7_UNORM,
        Format::BC7_UNorm_SRGB => DXGI_FORMAT_BC7_UNORM_SRGB,
    })
}

pub fn index_format(format: IndexFormat) -> DXGI_FORMAT {
    match format {
        IndexFormat::U16 => DXGI_FORMAT_R16_UINT,
        IndexFormat::U32 => DXGI_FORMAT_R32_UINT,
    }
}

pub fn address_mode(mode: AddressMode) -> D3D11_TEXTURE_ADDRESS_MODE {
    match mode {
        AddressMode::Wrap => D3D11_TEXTURE_ADDRESS_WRAP,
        AddressMode::Mirror => D3D11_TEXTURE_ADDRESS_MIRROR,
        AddressMode::ClampToEdge => D3D11_TEXTURE_ADDRESS_CLAMP,
        AddressMode::ClampToBorder => D3D11_TEXTURE_ADDRESS_BORDER,
    }
}

/// D3D11_FILTER packs min/mag/mip linear bits as 0x10/0x04/0x01.
pub fn filter(info: &SamplerInfo) -> D3D11_FILTER {
    if info.anisotropy_enabled() {
        return D3D11_FILTER_ANISOTROPIC;
    }
    let bit = |filter: Filter, mask: i32| if filter == Filter::Linear { mask } else { 0 };
    D3D11_FILTER(bit(info.min_filter, 0x10) | bit(info.mag_filter, 0x04) | bit(info.mip_filter, 0x01))
}

pub fn blend_factor(factor: BlendFactor) -> D3D11_BLEND {
    match factor {
        BlendFactor::Zero => D3D11_BLEND_ZERO,
        BlendFactor::One => D3D11_BLEND_ONE,
        BlendFactor::SrcColor => D3D11_BLEND_SRC_COLOR,
        BlendFactor::OneMinusSrcColor => D3D11_BLEND_INV_SRC_COLOR,
        BlendFactor::DestColor => D3D11_BLEND_DEST_COLOR,
        BlendFactor::OneMinusDestColor => D3D11_BLEND_INV_DEST_COLOR,
        BlendFactor::SrcAlpha => D3D11_BLEND_SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => D3D11_BLEND_INV_SRC_ALPHA,
        BlendFactor::DestAlpha => D3D11_BLEND_DEST_ALPHA,
        BlendFactor::OneMinusDestAlpha => D3D11_BLEND_INV_DEST_ALPHA,
    }
}

pub fn blend_op(op: BlendOp) -> D3D11_BLEND_OP {
    match op {
        BlendOp::Add => D3D11_BLEND_OP_ADD,
        BlendOp::Subtract => D3D11_BLEND_OP_SUBTRACT,
        BlendOp::ReverseSubtract => D3D11_BLEND_OP_REV_SUBTRACT,
        BlendOp::Min => D3D11_BLEND_OP_MIN,
        BlendOp::Max => D3D11_BLEND_OP_MAX,
    }
}

/// Nul-terminated HLSL semantic name for input layouts.
pub fn semantic(semantic: Semantic) -> PCSTR {
    match semantic {
        Semantic::Position => s!("POSITION"),
        Semantic::TexCoord => s!("TEXCOORD"),
        Semantic::Color => s!("COLOR"),
        Semantic::Normal => s!("NORMAL"),
        Semantic::Tangent => s!("TANGENT"),
        Semantic::Bitangent => s!("BITANGENT"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_format_translates() {
        for &f in Format::ALL.iter().skip(1) {
            assert!(format(f).is_ok(), "{:?}", f);
        }
        assert!(format(Format::Unknown).is_err());
    }

    #[test]
    fn filter_bits() {
        assert_eq!(filter(&SamplerInfo::POINT_WRAP), D3D11_FILTER_MIN_MAG_MIP_POINT);
        assert_eq!(filter(&SamplerInfo::LINEAR_CLAMP), D3D11_FILTER_MIN_MAG_MIP_LINEAR);
        assert_eq!(filter(&SamplerInfo::ANISOTROPIC), D3D11_FILTER_ANISOTROPIC);
    }

    #[test]
    fn semantic_names_match_hlsl() {
        for semantic_kind in [Semantic::Position, Semantic::TexCoord, Semantic::Bitangent] {
            let name = unsafe { semantic(semantic_kind).to_string() }.unwrap();
            assert_eq!(name, semantic_kind.name());
        }
    }
}
