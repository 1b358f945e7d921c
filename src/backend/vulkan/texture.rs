// Textures and image layout tracking
//
// Each image carries its current layout in an `ImageState` shared with the
// command lists that record transitions for it. Only `transition` and the
// mip chain recorder in this module change the tracked layout, and both
// record the matching barrier at the same time.

use super::buffer::VulkanBuffer;
use super::device::DeviceShared;
use super::{conv, VkCheck};
use crate::error::{Error, Result};
use crate::geometry::{Region3D, Size3D};
use crate::texture::{Texture, TextureInfo, TextureUsage};
use ash::vk;
use gpu_allocator::vulkan::Allocation;
use gpu_allocator::MemoryLocation;
use std::any::Any;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

pub(super) struct ImageState {
    pub image: vk::Image,
    pub aspect: vk::ImageAspectFlags,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub sampled: bool,
    layout: AtomicI32,
}

impl ImageState {
    fn new(image: vk::Image, aspect: vk::ImageAspectFlags, mip_levels: u32, array_layers: u32, sampled: bool) -> Self {
        Self {
            image,
            aspect,
            mip_levels,
            array_layers,
            sampled,
            layout: AtomicI32::new(vk::ImageLayout::UNDEFINED.as_raw()),
        }
    }

    pub fn layout(&self) -> vk::ImageLayout {
        vk::ImageLayout::from_raw(self.layout.load(Ordering::Acquire))
    }

    fn set_layout(&self, layout: vk::ImageLayout) {
        self.layout.store(layout.as_raw(), Ordering::Release);
    }

    fn full_range(&self) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask: self.aspect,
            base_mip_level: 0,
            level_count: self.mip_levels,
            base_array_layer: 0,
            layer_count: self.array_layers,
        }
    }
}

/// Stages and accesses that touch an image in `layout`.
pub(super) fn layout_scope(layout: vk::ImageLayout) -> (vk::PipelineStageFlags, vk::AccessFlags) {
    match layout {
        vk::ImageLayout::UNDEFINED => (vk::PipelineStageFlags::TOP_OF_PIPE, vk::AccessFlags::empty()),
        vk::ImageLayout::TRANSFER_DST_OPTIMAL => (vk::PipelineStageFlags::TRANSFER, vk::AccessFlags::TRANSFER_WRITE),
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL => (vk::PipelineStageFlags::TRANSFER, vk::AccessFlags::TRANSFER_READ),
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL => (
            vk::PipelineStageFlags::VERTEX_SHADER | vk::PipelineStageFlags::FRAGMENT_SHADER,
            vk::AccessFlags::SHADER_READ,
        ),
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL => (
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        ),
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL => (
            vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        ),
        // The presentation engine synchronizes through semaphores.
        vk::ImageLayout::PRESENT_SRC_KHR => (vk::PipelineStageFlags::BOTTOM_OF_PIPE, vk::AccessFlags::empty()),
        _ => (
            vk::PipelineStageFlags::ALL_COMMANDS,
            vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE,
        ),
    }
}

fn barrier(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    image: vk::Image,
    old: vk::ImageLayout,
    new: vk::ImageLayout,
    range: vk::ImageSubresourceRange,
) {
    let (src_stage, src_access) = layout_scope(old);
    let (dst_stage, dst_access) = layout_scope(new);
    let barrier = vk::ImageMemoryBarrier::builder()
        .old_layout(old)
        .new_layout(new)
        .src_access_mask(src_access)
        .dst_access_mask(dst_access)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(range)
        .build();

    unsafe {
        device.cmd_pipeline_barrier(
            cmd,
            src_stage,
            dst_stage,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[barrier],
        )
    };
}

/// Move the whole image to `new`. With `discard`, the old contents are
/// dropped (the barrier starts from UNDEFINED).
pub(super) fn transition(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    state: &ImageState,
    new: vk::ImageLayout,
    discard: bool,
) {
    let current = state.layout();
    if current == new && !discard {
        return;
    }
    let old = if discard { vk::ImageLayout::UNDEFINED } else { current };
    barrier(device, cmd, state.image, old, new, state.full_range());
    state.set_layout(new);
}

/// Copy tightly packed texels from `src` into mip 0, layer 0 of `texture`.
/// Sampled textures end in SHADER_READ_ONLY_OPTIMAL.
pub(super) fn record_buffer_copy(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    src: vk::Buffer,
    src_offset: u32,
    texture: &VulkanTexture,
    region: &Region3D,
) {
    let state = &texture.state;
    transition(device, cmd, state, vk::ImageLayout::TRANSFER_DST_OPTIMAL, false);

    let copy = vk::BufferImageCopy {
        buffer_offset: src_offset as u64,
        buffer_row_length: 0,
        buffer_image_height: 0,
        image_subresource: vk::ImageSubresourceLayers {
            aspect_mask: state.aspect,
            mip_level: 0,
            base_array_layer: 0,
            layer_count: 1,
        },
        image_offset: vk::Offset3D {
            x: region.offset.x,
            y: region.offset.y,
            z: region.offset.z,
        },
        image_extent: vk::Extent3D {
            width: region.size.width,
            height: region.size.height,
            depth: region.size.depth.max(1),
        },
    };

    unsafe {
        device.cmd_copy_buffer_to_image(cmd, src, state.image, vk::ImageLayout::TRANSFER_DST_OPTIMAL, &[copy])
    };

    if state.sampled {
        transition(device, cmd, state, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL, false);
    }
}

/// Fill mips 1.. by blitting each level from the one above it.
pub(super) fn record_mip_chain(device: &ash::Device, cmd: vk::CommandBuffer, texture: &VulkanTexture) {
    let state = &texture.state;
    let levels = state.mip_levels;
    let final_layout = if state.sampled {
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
    } else {
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL
    };

    if levels <= 1 {
        transition(device, cmd, state, final_layout, false);
        return;
    }

    let level_range = |level: u32| vk::ImageSubresourceRange {
        aspect_mask: state.aspect,
        base_mip_level: level,
        level_count: 1,
        base_array_layer: 0,
        layer_count: state.array_layers,
    };

    // Level 0 keeps its contents, every other level is overwritten.
    barrier(
        device,
        cmd,
        state.image,
        state.layout(),
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        level_range(0),
    );
    barrier(
        device,
        cmd,
        state.image,
        vk::ImageLayout::UNDEFINED,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        vk::ImageSubresourceRange {
            base_mip_level: 1,
            level_count: levels - 1,
            ..level_range(1)
        },
    );

    let size = texture.info.size;
    for level in 1..levels {
        let src = size.mip(level - 1);
        let dst = size.mip(level);
        let layers = |mip_level: u32| vk::ImageSubresourceLayers {
            aspect_mask: state.aspect,
            mip_level,
            base_array_layer: 0,
            layer_count: state.array_layers,
        };
        let blit = vk::ImageBlit {
            src_subresource: layers(level - 1),
            src_offsets: [vk::Offset3D::default(), extent_offset(src)],
            dst_subresource: layers(level),
            dst_offsets: [vk::Offset3D::default(), extent_offset(dst)],
        };

        unsafe {
            device.cmd_blit_image(
                cmd,
                state.image,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                state.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[blit],
                vk::Filter::LINEAR,
            )
        };

        // The level just written becomes the next source.
        barrier(
            device,
            cmd,
            state.image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            level_range(level),
        );
    }

    barrier(
        device,
        cmd,
        state.image,
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        final_layout,
        state.full_range(),
    );
    state.set_layout(final_layout);
}

fn extent_offset(size: Size3D) -> vk::Offset3D {
    vk::Offset3D {
        x: size.width as i32,
        y: size.height as i32,
        z: size.depth.max(1) as i32,
    }
}

fn usage_flags(usage: TextureUsage) -> vk::ImageUsageFlags {
    let mut flags = vk::ImageUsageFlags::TRANSFER_DST;
    if usage.contains(TextureUsage::SHADER_RESOURCE) {
        flags |= vk::ImageUsageFlags::SAMPLED;
    }
    if usage.contains(TextureUsage::COLOR_TARGET) {
        flags |= vk::ImageUsageFlags::COLOR_ATTACHMENT;
    }
    if usage.contains(TextureUsage::DEPTH_STENCIL_TARGET) {
        flags |= vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT;
    }
    if usage.contains(TextureUsage::GENERATE_MIPS) {
        flags |= vk::ImageUsageFlags::TRANSFER_SRC;
    }
    flags
}

pub struct VulkanTexture {
    device: Arc<DeviceShared>,
    pub(super) state: Arc<ImageState>,
    pub(super) view: vk::ImageView,
    /// None for swapchain images, which the swapchain owns.
    allocation: Option<Allocation>,
    info: TextureInfo,
}

impl VulkanTexture {
    pub(super) fn new(device: Arc<DeviceShared>, info: &TextureInfo) -> Result<Self> {
        info.validate()?;
        let format = conv::format(info.format)?;
        let mip_levels = info.resolved_mip_levels();

        if info.usage.contains(TextureUsage::GENERATE_MIPS) {
            let required = vk::FormatFeatureFlags::BLIT_SRC
                | vk::FormatFeatureFlags::BLIT_DST
                | vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR;
            let props = device.format_properties(format);
            if !props.optimal_tiling_features.contains(required) {
                return Err(Error::unsupported(format!(
                    "{:?} does not support linear blits for mip generation",
                    info.format
                )));
            }
        }

        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width: info.size.width,
                height: info.size.height,
                depth: 1,
            })
            .mip_levels(mip_levels)
            .array_layers(info.array_size)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(usage_flags(info.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { device.device.create_image(&image_info, None) }.check("vkCreateImage")?;

        let requirements = unsafe { device.device.get_image_memory_requirements(image) };
        let allocation = match device.allocate("texture", requirements, MemoryLocation::GpuOnly, false) {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.device.destroy_image(image, None) };
                return Err(e);
            }
        };

        let aspect = conv::aspect(info.format);
        let sampled = info.usage.contains(TextureUsage::SHADER_RESOURCE);
        let mut texture = Self {
            device,
            state: Arc::new(ImageState::new(image, aspect, mip_levels, info.array_size, sampled)),
            view: vk::ImageView::null(),
            allocation: Some(allocation),
            info: TextureInfo {
                mip_levels,
                ..*info
            },
        };

        if let Some(allocation) = &texture.allocation {
            unsafe {
                texture
                    .device
                    .device
                    .bind_image_memory(image, allocation.memory(), allocation.offset())
            }
            .check("vkBindImageMemory")?;
        }

        let view_type = if info.array_size > 1 {
            vk::ImageViewType::TYPE_2D_ARRAY
        } else {
            vk::ImageViewType::TYPE_2D
        };
        texture.view = create_view(&texture.device.device, image, format, view_type, texture.state.full_range())?;

        Ok(texture)
    }

    /// Wrap an image owned by a swapchain.
    pub(super) fn from_swapchain_image(
        device: Arc<DeviceShared>,
        image: vk::Image,
        format: vk::Format,
        info: TextureInfo,
    ) -> Result<Self> {
        let state = ImageState::new(image, vk::ImageAspectFlags::COLOR, 1, 1, false);
        let view = create_view(&device.device, image, format, vk::ImageViewType::TYPE_2D, state.full_range())?;
        Ok(Self {
            device,
            state: Arc::new(state),
            view,
            allocation: None,
            info,
        })
    }

    pub(super) fn is_swapchain_image(&self) -> bool {
        self.allocation.is_none()
    }

    /// Sampled textures created without data are moved straight to the
    /// layout shaders read from.
    pub(super) fn prepare_for_sampling(&self) -> Result<()> {
        if !self.state.sampled {
            return Ok(());
        }
        self.device.one_shot(|cmd| {
            transition(
                &self.device.device,
                cmd,
                &self.state,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                false,
            );
            Ok(())
        })
    }

    /// Blocking upload into mip 0, layer 0.
    pub(super) fn upload(&self, region: &Region3D, data: &[u8]) -> Result<()> {
        if !region.fits_within(self.info.size) {
            return Err(Error::invalid_usage(format!(
                "update region {:?} is outside a texture of {:?}",
                region, self.info.size
            )));
        }
        let expected = self.info.format.data_size(region.size);
        if data.len() != expected {
            return Err(Error::invalid_usage(format!(
                "{:?} region {}x{} needs {} bytes, got {}",
                self.info.format,
                region.size.width,
                region.size.height,
                expected,
                data.len()
            )));
        }

        let staging = VulkanBuffer::staging(self.device.clone(), data)?;
        self.device.one_shot(|cmd| {
            record_buffer_copy(&self.device.device, cmd, staging.raw, 0, self, region);
            Ok(())
        })
    }
}

fn create_view(
    device: &ash::Device,
    image: vk::Image,
    format: vk::Format,
    view_type: vk::ImageViewType,
    range: vk::ImageSubresourceRange,
) -> Result<vk::ImageView> {
    let create_info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(view_type)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(range);

    unsafe { device.create_image_view(&create_info, None) }.check("vkCreateImageView")
}

impl Texture for VulkanTexture {
    fn info(&self) -> &TextureInfo {
        &self.info
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanTexture {
    fn drop(&mut self) {
        unsafe {
            if self.view != vk::ImageView::null() {
                self.device.device.destroy_image_view(self.view, None);
            }
            if let Some(allocation) = self.allocation.take() {
                self.device.device.destroy_image(self.state.image, None);
                self.device.free(allocation);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_mips_makes_image_a_blit_source() {
        let flags = usage_flags(TextureUsage::SHADER_RESOURCE | TextureUsage::GENERATE_MIPS);
        assert!(flags.contains(vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_SRC));
        assert!(!usage_flags(TextureUsage::SHADER_RESOURCE).contains(vk::ImageUsageFlags::TRANSFER_SRC));
    }

    #[test]
    fn layout_tracking_starts_undefined() {
        let state = ImageState::new(vk::Image::null(), vk::ImageAspectFlags::COLOR, 3, 1, true);
        assert_eq!(state.layout(), vk::ImageLayout::UNDEFINED);
        assert_eq!(state.full_range().level_count, 3);
        state.set_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        assert_eq!(state.layout(), vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
    }

    #[test]
    fn undefined_has_no_access_to_wait_on() {
        let (stage, access) = layout_scope(vk::ImageLayout::UNDEFINED);
        assert_eq!(stage, vk::PipelineStageFlags::TOP_OF_PIPE);
        assert!(access.is_empty());

        let (stage, _) = layout_scope(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        assert_eq!(stage, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT);
    }
}
