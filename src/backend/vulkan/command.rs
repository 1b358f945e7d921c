// Vulkan command lists
//
// Each list owns a command pool, one primary command buffer and a fence
// that is signaled when its last submission completes. `begin` waits on
// that fence before the buffer is reset, so a list can be re-recorded as
// soon as it has been executed.
//
// Every recording starts with a full memory barrier. Lists submitted
// earlier therefore finish their writes before this one reads, which gives
// the submission-order guarantee the other backends have implicitly.

use super::buffer::VulkanBuffer;
use super::descriptor::{DescriptorWrites, VulkanDescriptorSet};
use super::device::DeviceShared;
use super::pipeline::VulkanPipeline;
use super::texture::{self, ImageState, VulkanTexture};
use super::{cast, conv, sync, VkCheck, BACKEND};
use crate::buffer::{Buffer, BufferUsage};
use crate::command::{
    resolve_copy_size, resolve_texture_copy, validate_attachments, ColorAttachmentInfo, CommandList, CommandTracker,
    IndexFormat, LoadOp, RecordingState,
};
use crate::descriptor::{validate_descriptors, Descriptor, DescriptorSet};
use crate::error::{Error, Result};
use crate::geometry::Region3D;
use crate::pipeline::{layout_at_slot, Pipeline};
use crate::texture::{Texture, TextureUsage};
use ash::vk;
use std::any::Any;
use std::sync::Arc;

pub struct VulkanCommandList {
    device: Arc<DeviceShared>,
    pool: vk::CommandPool,
    cmd: vk::CommandBuffer,
    fence: vk::Fence,
    tracker: CommandTracker,
    /// The fence will be signaled by a submission nobody has waited on yet.
    in_flight: bool,
    /// Swapchain images drawn to in this recording; moved to
    /// PRESENT_SRC_KHR by `end`.
    presentable: Vec<Arc<ImageState>>,
}

impl VulkanCommandList {
    pub(super) fn new(device: Arc<DeviceShared>) -> Result<Self> {
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(device.queue_family);
        let pool = unsafe { device.device.create_command_pool(&pool_info, None) }.check("vkCreateCommandPool")?;

        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let cmd = match unsafe { device.device.allocate_command_buffers(&alloc_info) }.check("vkAllocateCommandBuffers") {
            Ok(buffers) => buffers[0],
            Err(e) => {
                unsafe { device.device.destroy_command_pool(pool, None) };
                return Err(e);
            }
        };

        let fence = match sync::create_fence(&device.device, false) {
            Ok(fence) => fence,
            Err(e) => {
                unsafe { device.device.destroy_command_pool(pool, None) };
                return Err(e);
            }
        };

        Ok(Self {
            device,
            pool,
            cmd,
            fence,
            tracker: CommandTracker::new(),
            in_flight: false,
            presentable: Vec::new(),
        })
    }

    /// Queue the recorded buffer. Signals the list's fence on completion.
    pub(super) fn submit(&mut self) -> Result<()> {
        if self.tracker.state() != RecordingState::Recorded {
            // Reports the right misuse error without touching the queue.
            return self.tracker.submit();
        }

        let command_buffers = [self.cmd];
        let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);
        unsafe {
            self.device
                .device
                .queue_submit(self.device.queue, &[submit_info.build()], self.fence)
        }
        .check("vkQueueSubmit")?;
        self.in_flight = true;

        self.tracker.submit()
    }

    fn wait_for_completion(&mut self) -> Result<()> {
        if self.in_flight {
            sync::wait_and_reset(&self.device.device, self.fence)?;
            self.in_flight = false;
        }
        Ok(())
    }

    fn raw(&self) -> &ash::Device {
        &self.device.device
    }
}

impl CommandList for VulkanCommandList {
    fn state(&self) -> RecordingState {
        self.tracker.state()
    }

    fn begin(&mut self) -> Result<()> {
        self.wait_for_completion()?;

        let begin_info = vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            self.raw()
                .reset_command_buffer(self.cmd, vk::CommandBufferResetFlags::empty())
                .check("vkResetCommandBuffer")?;
            self.raw()
                .begin_command_buffer(self.cmd, &begin_info)
                .check("vkBeginCommandBuffer")?;
        }

        let barrier = vk::MemoryBarrier::builder()
            .src_access_mask(vk::AccessFlags::MEMORY_WRITE)
            .dst_access_mask(vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE)
            .build();
        unsafe {
            self.raw().cmd_pipeline_barrier(
                self.cmd,
                vk::PipelineStageFlags::ALL_COMMANDS,
                vk::PipelineStageFlags::ALL_COMMANDS,
                vk::DependencyFlags::empty(),
                &[barrier],
                &[],
                &[],
            )
        };

        self.presentable.clear();
        self.tracker.begin();
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.tracker.require_outside_render_pass("end")?;

        for state in &self.presentable {
            texture::transition(&self.device.device, self.cmd, state, vk::ImageLayout::PRESENT_SRC_KHR, false);
        }

        unsafe { self.raw().end_command_buffer(self.cmd) }.check("vkEndCommandBuffer")?;
        self.tracker.end()
    }

    fn begin_render_pass(&mut self, attachments: &[ColorAttachmentInfo<'_>]) -> Result<()> {
        self.tracker.require_outside_render_pass("begin_render_pass")?;
        validate_attachments(attachments)?;

        let mut color_attachments = Vec::with_capacity(attachments.len());
        for attachment in attachments {
            let target = cast::<VulkanTexture>(attachment.texture.as_any(), "color attachment")?;
            let discard = attachment.load_op == LoadOp::Clear;
            texture::transition(
                &self.device.device,
                self.cmd,
                &target.state,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                discard,
            );

            if target.is_swapchain_image() && !self.presentable.iter().any(|s| Arc::ptr_eq(s, &target.state)) {
                self.presentable.push(target.state.clone());
            }

            color_attachments.push(
                vk::RenderingAttachmentInfo::builder()
                    .image_view(target.view)
                    .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                    .load_op(conv::load_op(attachment.load_op))
                    .store_op(conv::store_op(attachment.store_op))
                    .clear_value(vk::ClearValue {
                        color: vk::ClearColorValue {
                            float32: attachment.clear_color.to_array(),
                        },
                    })
                    .build(),
            );
        }

        let size = attachments[0].texture.info().size;
        let extent = vk::Extent2D {
            width: size.width,
            height: size.height,
        };
        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        let rendering_info = vk::RenderingInfo::builder()
            .render_area(render_area)
            .layer_count(1)
            .color_attachments(&color_attachments);

        // Negative height flips Y so clip space matches D3D and GL setups.
        let viewport = vk::Viewport {
            x: 0.0,
            y: extent.height as f32,
            width: extent.width as f32,
            height: -(extent.height as f32),
            min_depth: 0.0,
            max_depth: 1.0,
        };

        unsafe {
            self.raw().cmd_begin_rendering(self.cmd, &rendering_info);
            self.raw().cmd_set_viewport(self.cmd, 0, &[viewport]);
            self.raw().cmd_set_scissor(self.cmd, 0, &[render_area]);
        }

        self.tracker.begin_render_pass()
    }

    fn end_render_pass(&mut self) -> Result<()> {
        self.tracker.require_render_pass("end_render_pass")?;
        unsafe { self.raw().cmd_end_rendering(self.cmd) };
        self.tracker.end_render_pass()
    }

    fn set_graphics_pipeline(&mut self, pipeline: &dyn Pipeline) -> Result<()> {
        self.tracker.require_render_pass("set_graphics_pipeline")?;
        let pipeline = cast::<VulkanPipeline>(pipeline.as_any(), "pipeline")?;
        unsafe {
            self.raw()
                .cmd_bind_pipeline(self.cmd, vk::PipelineBindPoint::GRAPHICS, pipeline.raw)
        };
        self.tracker.pipeline_bound();
        Ok(())
    }

    fn set_descriptor_set(&mut self, slot: u32, pipeline: &dyn Pipeline, set: &dyn DescriptorSet) -> Result<()> {
        self.tracker.require_render_pass("set_descriptor_set")?;
        let expected = layout_at_slot(pipeline, slot, false)?;
        if set.layout_info() != expected {
            return Err(Error::invalid_usage(format!(
                "descriptor set does not match the layout at slot {}",
                slot
            )));
        }

        let vk_pipeline = cast::<VulkanPipeline>(pipeline.as_any(), "pipeline")?;
        let set = cast::<VulkanDescriptorSet>(set.as_any(), "descriptor set")?;
        unsafe {
            self.raw().cmd_bind_descriptor_sets(
                self.cmd,
                vk::PipelineBindPoint::GRAPHICS,
                vk_pipeline.layout,
                slot,
                &[set.raw],
                &[],
            )
        };
        Ok(())
    }

    fn push_descriptors(&mut self, slot: u32, pipeline: &dyn Pipeline, descriptors: &[Descriptor<'_>]) -> Result<()> {
        self.tracker.require_render_pass("push_descriptors")?;
        let layout = layout_at_slot(pipeline, slot, true)?;
        validate_descriptors(layout, descriptors)?;

        let push_fn = self
            .device
            .push_descriptor_fn
            .as_ref()
            .ok_or_else(|| Error::unsupported("VK_KHR_push_descriptor is not available on this device"))?;
        let vk_pipeline = cast::<VulkanPipeline>(pipeline.as_any(), "pipeline")?;
        let writes = DescriptorWrites::new(descriptors)?;

        unsafe {
            push_fn.cmd_push_descriptor_set(
                self.cmd,
                vk::PipelineBindPoint::GRAPHICS,
                vk_pipeline.layout,
                slot,
                &writes.writes(vk::DescriptorSet::null()),
            )
        };
        Ok(())
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: &dyn Buffer, stride: u32, offset: u32) -> Result<()> {
        self.tracker.require_render_pass("set_vertex_buffer")?;
        if !buffer.info().usage.contains(BufferUsage::VERTEX_BUFFER) {
            return Err(Error::invalid_usage("buffer bound as vertex buffer lacks VERTEX_BUFFER usage"));
        }
        let buffer = cast::<VulkanBuffer>(buffer.as_any(), "vertex buffer")?;
        unsafe {
            self.raw().cmd_bind_vertex_buffers2(
                self.cmd,
                slot,
                &[buffer.raw],
                &[offset as u64],
                None,
                Some(&[stride as u64]),
            )
        };
        Ok(())
    }

    fn set_index_buffer(&mut self, buffer: &dyn Buffer, format: IndexFormat, offset: u32) -> Result<()> {
        self.tracker.require_render_pass("set_index_buffer")?;
        if !buffer.info().usage.contains(BufferUsage::INDEX_BUFFER) {
            return Err(Error::invalid_usage("buffer bound as index buffer lacks INDEX_BUFFER usage"));
        }
        let buffer = cast::<VulkanBuffer>(buffer.as_any(), "index buffer")?;
        unsafe {
            self.raw()
                .cmd_bind_index_buffer(self.cmd, buffer.raw, offset as u64, conv::index_type(format))
        };
        self.tracker.index_buffer_bound();
        Ok(())
    }

    fn draw(&mut self, num_vertices: u32, first_vertex: u32) -> Result<()> {
        self.tracker.require_draw("draw", false)?;
        unsafe { self.raw().cmd_draw(self.cmd, num_vertices, 1, first_vertex, 0) };
        Ok(())
    }

    fn draw_indexed(&mut self, num_indices: u32, first_index: u32, base_vertex: i32) -> Result<()> {
        self.tracker.require_draw("draw_indexed", true)?;
        unsafe {
            self.raw()
                .cmd_draw_indexed(self.cmd, num_indices, 1, first_index, base_vertex, 0)
        };
        Ok(())
    }

    fn copy_buffer_to_buffer(
        &mut self,
        src: &dyn Buffer,
        src_offset: u32,
        dst: &dyn Buffer,
        dst_offset: u32,
        size: Option<u32>,
    ) -> Result<()> {
        self.tracker.require_outside_render_pass("copy_buffer_to_buffer")?;
        let size = resolve_copy_size(src, src_offset, dst, dst_offset, size)?;
        let src = cast::<VulkanBuffer>(src.as_any(), "source buffer")?;
        let dst = cast::<VulkanBuffer>(dst.as_any(), "destination buffer")?;

        let region = vk::BufferCopy {
            src_offset: src_offset as u64,
            dst_offset: dst_offset as u64,
            size: size as u64,
        };
        // Later commands in this list see the copied bytes.
        let barrier = vk::MemoryBarrier::builder()
            .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
            .dst_access_mask(vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE)
            .build();

        unsafe {
            self.raw().cmd_copy_buffer(self.cmd, src.raw, dst.raw, &[region]);
            self.raw().cmd_pipeline_barrier(
                self.cmd,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::ALL_COMMANDS,
                vk::DependencyFlags::empty(),
                &[barrier],
                &[],
                &[],
            );
        }
        Ok(())
    }

    fn copy_buffer_to_texture(
        &mut self,
        src: &dyn Buffer,
        src_offset: u32,
        dst: &dyn Texture,
        region: Option<Region3D>,
    ) -> Result<()> {
        self.tracker.require_outside_render_pass("copy_buffer_to_texture")?;
        let region = resolve_texture_copy(src, src_offset, dst, region)?;
        let src = cast::<VulkanBuffer>(src.as_any(), "source buffer")?;
        let dst = cast::<VulkanTexture>(dst.as_any(), "destination texture")?;

        texture::record_buffer_copy(&self.device.device, self.cmd, src.raw, src_offset, dst, &region);
        Ok(())
    }

    fn generate_mipmaps(&mut self, texture: &dyn Texture) -> Result<()> {
        self.tracker.require_outside_render_pass("generate_mipmaps")?;
        if !texture.info().usage.contains(TextureUsage::GENERATE_MIPS) {
            return Err(Error::invalid_usage("generate_mipmaps needs a texture created with GENERATE_MIPS"));
        }
        let texture = cast::<VulkanTexture>(texture.as_any(), "texture")?;
        texture::record_mip_chain(&self.device.device, self.cmd, texture);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Drop for VulkanCommandList {
    fn drop(&mut self) {
        if let Err(e) = self.wait_for_completion() {
            log::warn!(
                target: crate::diagnostics::targets::GENERAL,
                "{} command list dropped while its fence could not be waited on: {}",
                BACKEND,
                e
            );
        }
        unsafe {
            self.device.device.destroy_fence(self.fence, None);
            self.device.device.destroy_command_pool(self.pool, None);
        }
    }
}
