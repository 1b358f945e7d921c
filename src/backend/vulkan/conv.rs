// Vulkan enum conversions

use crate::command::{IndexFormat, LoadOp, StoreOp};
use crate::descriptor::DescriptorType;
use crate::error::{Error, Result};
use crate::format::Format;
use crate::pipeline::{BlendFactor, BlendOp, BlendStateDescription};
use crate::sampler::{AddressMode, Filter};
use crate::shader::ShaderStage;
use crate::swapchain::PresentMode;
use ash::vk;

/// VK_FORMAT_A8_UNORM_KHR (VK_KHR_maintenance5).
const A8_UNORM_KHR: vk::Format = vk::Format::from_raw(1_000_470_001);

pub fn format(format: Format) -> Result<vk::Format> {
    Ok(match format {
        Format::Unknown => {
            return Err(Error::invalid_usage("Format::Unknown has no Vulkan equivalent"));
        }
        Format::A8_UNorm => A8_UNORM_KHR,
        Format::R8_UNorm => vk::Format::R8_UNORM,
        Format::R8_UInt => vk::Format::R8_UINT,
        Format::R8_SNorm => vk::Format::R8_SNORM,
        Format::R8_SInt => vk::Format::R8_SINT,
        Format::B5G6R5_UNorm => vk::Format::B5G6R5_UNORM_PACK16,
        Format::B5G5R5A1_UNorm => vk::Format::B5G5R5A1_UNORM_PACK16,
        Format::R8G8_UNorm => vk::Format::R8G8_UNORM,
        Format::R8G8_UInt => vk::Format::R8G8_UINT,
        Format::R8G8_SNorm => vk::Format::R8G8_SNORM,
        Format::R8G8_SInt => vk::Format::R8G8_SINT,
        Format::R16_Float => vk::Format::R16_SFLOAT,
        Format::R16_UNorm => vk::Format::R16_UNORM,
        Format::R16_UInt => vk::Format::R16_UINT,
        Format::R16_SNorm => vk::Format::R16_SNORM,
        Format::R16_SInt => vk::Format::R16_SINT,
        Format::D16_UNorm => vk::Format::D16_UNORM,
        Format::R8G8B8A8_UNorm => vk::Format::R8G8B8A8_UNORM,
        Format::R8G8B8A8_UNorm_SRGB => vk::Format::R8G8B8A8_SRGB,
        Format::R8G8B8A8_UInt => vk::Format::R8G8B8A8_UINT,
        Format::R8G8B8A8_SNorm => vk::Format::R8G8B8A8_SNORM,
        Format::R8G8B8A8_SInt => vk::Format::R8G8B8A8_SINT,
        Format::B8G8R8A8_UNorm => vk::Format::B8G8R8A8_UNORM,
        Format::B8G8R8A8_UNorm_SRGB => vk::Format::B8G8R8A8_SRGB,
        // Red in the low bits, which Vulkan spells A2B10G10R10.
        Format::R10G10B10A2_UNorm => vk::Format::A2B10G10R10_UNORM_PACK32,
        Format::R10G10B10A2_UInt => vk::Format::A2B10G10R10_UINT_PACK32,
        Format::R16G16_Float => vk::Format::R16G16_SFLOAT,
        Format::R16G16_UNorm => vk::Format::R16G16_UNORM,
        Format::R16G16_UInt => vk::Format::R16G16_UINT,
        Format::R16G16_SNorm => vk::Format::R16G16_SNORM,
        Format::R16G16_SInt => vk::Format::R16G16_SINT,
        Format::R32_Float => vk::Format::R32_SFLOAT,
        Format::R32_UInt => vk::Format::R32_UINT,
        Format::R32_SInt => vk::Format::R32_SINT,
        Format::D24_UNorm_S8_UInt => vk::Format::D24_UNORM_S8_UINT,
        Format::D32_Float => vk::Format::D32_SFLOAT,
        Format::R16G16B16A16_Float => vk::Format::R16G16B16A16_SFLOAT,
        Format::R16G16B16A16_UNorm => vk::Format::R16G16B16A16_UNORM,
        Format::R16G16B16A16_UInt => vk::Format::R16G16B16A16_UINT,
        Format::R16G16B16A16_SNorm => vk::Format::R16G16B16A16_SNORM,
        Format::R16G16B16A16_SInt => vk::Format::R16G16B16A16_SINT,
        Format::R32G32_Float => vk::Format::R32G32_SFLOAT,
        Format::R32G32_UInt => vk::Format::R32G32_UINT,
        Format::R32G32_SInt => vk::Format::R32G32_SINT,
        Format::R32G32B32_Float => vk::Format::R32G32B32_SFLOAT,
        Format::R32G32B32_UInt => vk::Format::R32G32B32_UINT,
        Format::R32G32B32_SInt => vk::Format::R32G32B32_SINT,
        Format::R32G32B32A32_Float => vk::Format::R32G32B32A32_SFLOAT,
        Format::R32G32B32A32_UInt => vk::Format::R32G32B32A32_UINT,
        Format::R32G32B32A32_SInt => vk::Format::R32G32B32A32_SINT,
        Format::BC1_UNorm => vk::Format::BC1_RGBA_UNORM_BLOCK,
        Format::BC1_UNorm_SRGB => vk::Format::BC1_RGBA_SRGB_BLOCK,
        Format::BC2_UNorm => vk::Format::BC2_UNORM_BLOCK,
        Format::BC2_UNorm_SRGB => vk::Format::BC2_SRGB_BLOCK,
        Format::BC3_UNorm => vk::Format::BC3_UNORM_BLOCK,
        Format::BC3_UNorm_SRGB => vk::Format::BC3_SRGB_BLOCK,
        Format::BC4_UNorm => vk::Format::BC4_UNORM_BLOCK,
        Format::BC4_SNorm => vk::Format::BC4_SNORM_BLOCK,
        Format::BC5_UNorm => vk::Format::BC5_UNORM_BLOCK,
        Format::BC5_SNorm => vk::Format::BC5_SNORM_BLOCK,
        Format::BC6H_UF16 => vk::Format::BC6H_UFLOAT_BLOCK,
        Format::BC6H_SF16 => vk::Format::BC6H_SFLOAT_BLOCK,
        Format::BC7_UNorm => vk::Format::BC7_UNORM_BLOCK,
        Format::BC7_UNorm_SRGB => vk::Format::BC7_SRGB_BLOCK,
    })
}

pub fn aspect(format: Format) -> vk::ImageAspectFlags {
    if format.has_stencil() {
        vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
    } else if format.is_depth() {
        vk::ImageAspectFlags::DEPTH
    } else {
        vk::ImageAspectFlags::COLOR
    }
}

pub fn present_mode(mode: PresentMode) -> Option<vk::PresentModeKHR> {
    match mode {
        PresentMode::Immediate => Some(vk::PresentModeKHR::IMMEDIATE),
        PresentMode::Mailbox => Some(vk::PresentModeKHR::MAILBOX),
        PresentMode::Fifo => Some(vk::PresentModeKHR::FIFO),
        PresentMode::FifoRelaxed => Some(vk::PresentModeKHR::FIFO_RELAXED),
        // Preferences, resolved through `choose_present_mode` first.
        PresentMode::VSyncOn | PresentMode::VSyncOff => None,
    }
}

pub fn present_mode_from_vk(mode: vk::PresentModeKHR) -> Option<PresentMode> {
    match mode {
        vk::PresentModeKHR::IMMEDIATE => Some(PresentMode::Immediate),
        vk::PresentModeKHR::MAILBOX => Some(PresentMode::Mailbox),
        vk::PresentModeKHR::FIFO => Some(PresentMode::Fifo),
        vk::PresentModeKHR::FIFO_RELAXED => Some(PresentMode::FifoRelaxed),
        _ => None,
    }
}

pub fn filter(filter: Filter) -> vk::Filter {
    match filter {
        Filter::Point => vk::Filter::NEAREST,
        Filter::Linear => vk::Filter::LINEAR,
    }
}

pub fn mipmap_mode(filter: Filter) -> vk::SamplerMipmapMode {
    match filter {
        Filter::Point => vk::SamplerMipmapMode::NEAREST,
        Filter::Linear => vk::SamplerMipmapMode::LINEAR,
    }
}

pub fn address_mode(mode: AddressMode) -> vk::SamplerAddressMode {
    match mode {
        AddressMode::Wrap => vk::SamplerAddressMode::REPEAT,
        AddressMode::Mirror => vk::SamplerAddressMode::MIRRORED_REPEAT,
        AddressMode::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        AddressMode::ClampToBorder => vk::SamplerAddressMode::CLAMP_TO_BORDER,
    }
}

pub fn blend_factor(factor: BlendFactor) -> vk::BlendFactor {
    match factor {
        BlendFactor::Zero => vk::BlendFactor::ZERO,
        BlendFactor::One => vk::BlendFactor::ONE,
        BlendFactor::SrcColor => vk::BlendFactor::SRC_COLOR,
        BlendFactor::OneMinusSrcColor => vk::BlendFactor::ONE_MINUS_SRC_COLOR,
        BlendFactor::DestColor => vk::BlendFactor::DST_COLOR,
        BlendFactor::OneMinusDestColor => vk::BlendFactor::ONE_MINUS_DST_COLOR,
        BlendFactor::SrcAlpha => vk::BlendFactor::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
        BlendFactor::DestAlpha => vk::BlendFactor::DST_ALPHA,
        BlendFactor::OneMinusDestAlpha => vk::BlendFactor::ONE_MINUS_DST_ALPHA,
    }
}

pub fn blend_op(op: BlendOp) -> vk::BlendOp {
    match op {
        BlendOp::Add => vk::BlendOp::ADD,
        BlendOp::Subtract => vk::BlendOp::SUBTRACT,
        BlendOp::ReverseSubtract => vk::BlendOp::REVERSE_SUBTRACT,
        BlendOp::Min => vk::BlendOp::MIN,
        BlendOp::Max => vk::BlendOp::MAX,
    }
}

pub fn blend_attachment(blend: &BlendStateDescription) -> vk::PipelineColorBlendAttachmentState {
    vk::PipelineColorBlendAttachmentState {
        blend_enable: blend.enabled.into(),
        src_color_blend_factor: blend_factor(blend.src_color),
        dst_color_blend_factor: blend_factor(blend.dest_color),
        color_blend_op: blend_op(blend.color_op),
        src_alpha_blend_factor: blend_factor(blend.src_alpha),
        dst_alpha_blend_factor: blend_factor(blend.dest_alpha),
        alpha_blend_op: blend_op(blend.alpha_op),
        color_write_mask: vk::ColorComponentFlags::RGBA,
    }
}

pub fn descriptor_type(ty: DescriptorType) -> vk::DescriptorType {
    match ty {
        DescriptorType::ConstantBuffer => vk::DescriptorType::UNIFORM_BUFFER,
        DescriptorType::Texture => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
    }
}

pub fn shader_stages(stages: ShaderStage) -> vk::ShaderStageFlags {
    let mut flags = vk::ShaderStageFlags::empty();
    if stages.contains(ShaderStage::VERTEX) {
        flags |= vk::ShaderStageFlags::VERTEX;
    }
    if stages.contains(ShaderStage::PIXEL) {
        flags |= vk::ShaderStageFlags::FRAGMENT;
    }
    flags
}

pub fn load_op(op: LoadOp) -> vk::AttachmentLoadOp {
    match op {
        LoadOp::Clear => vk::AttachmentLoadOp::CLEAR,
        LoadOp::Load => vk::AttachmentLoadOp::LOAD,
    }
}

pub fn store_op(op: StoreOp) -> vk::AttachmentStoreOp {
    match op {
        StoreOp::Store => vk::AttachmentStoreOp::STORE,
    }
}

pub fn index_type(format: IndexFormat) -> vk::IndexType {
    match format {
        IndexFormat::U16 => vk::IndexType::UINT16,
        IndexFormat::U32 => vk::IndexType::UINT32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_known_format_maps() {
        for f in Format::ALL.into_iter().filter(|f| *f != Format::Unknown) {
            let native = format(f).unwrap();
            assert_ne!(native, vk::Format::UNDEFINED, "{:?}", f);
        }
        assert!(format(Format::Unknown).is_err());
    }

    #[test]
    fn depth_aspects() {
        assert_eq!(aspect(Format::R8G8B8A8_UNorm), vk::ImageAspectFlags::COLOR);
        assert_eq!(aspect(Format::D32_Float), vk::ImageAspectFlags::DEPTH);
        assert!(aspect(Format::D24_UNorm_S8_UInt).contains(vk::ImageAspectFlags::STENCIL));
    }

    #[test]
    fn present_modes_round_trip() {
        for mode in [
            PresentMode::Immediate,
            PresentMode::Mailbox,
            PresentMode::Fifo,
            PresentMode::FifoRelaxed,
        ] {
            assert_eq!(present_mode_from_vk(present_mode(mode).unwrap()), Some(mode));
        }
        assert_eq!(present_mode(PresentMode::VSyncOn), None);
        assert_eq!(present_mode_from_vk(vk::PresentModeKHR::SHARED_DEMAND_REFRESH), None);
    }

    #[test]
    fn pixel_stage_is_fragment() {
        assert_eq!(
            shader_stages(ShaderStage::VERTEX | ShaderStage::PIXEL),
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT
        );
    }

    #[test]
    fn disabled_blend_still_writes_all_channels() {
        let state = blend_attachment(&BlendStateDescription::NO_BLEND);
        assert_eq!(state.blend_enable, vk::FALSE);
        assert_eq!(state.color_write_mask, vk::ColorComponentFlags::RGBA);
    }
}
