// D3D11 command lists
//
// Each list records into its own deferred context. `end` bakes the
// recording into an ID3D11CommandList and `execute` plays it back on the
// immediate context; neither side inherits the other's state.

use super::buffer::D3D11Buffer;
use super::descriptor::{self, BoundResource, D3D11DescriptorSet, ResolvedBinding};
use super::device::DeviceShared;
use super::pipeline::D3D11Pipeline;
use super::texture::D3D11Texture;
use super::{cast, conv, created, HrCheck, BACKEND};
use crate::buffer::{Buffer, BufferUsage};
use crate::command::{
    resolve_copy_size, resolve_texture_copy, validate_attachments, ColorAttachmentInfo, CommandList, CommandTracker,
    IndexFormat, LoadOp, RecordingState,
};
use crate::descriptor::{validate_descriptors, Descriptor, DescriptorSet};
use crate::diagnostics::targets;
use crate::error::{Error, Result};
use crate::geometry::Region3D;
use crate::pipeline::{layout_at_slot, Pipeline};
use crate::shader::ShaderStage;
use crate::texture::{Texture, TextureUsage};
use std::any::Any;
use std::rc::Rc;
use windows::Win32::Foundation::{FALSE, RECT};
use windows::Win32::Graphics::Direct3D::D3D11_PRIMITIVE_TOPOLOGY_TRIANGLELIST;
use windows::Win32::Graphics::Direct3D11::*;

pub struct D3D11CommandList {
    shared: Rc<DeviceShared>,
    context: ID3D11DeviceContext1,
    tracker: CommandTracker,
    recorded: Option<ID3D11CommandList>,
}

impl D3D11CommandList {
    pub(super) fn new(shared: Rc<DeviceShared>) -> Result<Self> {
        let mut context = None;
        unsafe { shared.device.CreateDeferredContext1(0, Some(&mut context)) }
            .check("ID3D11Device1::CreateDeferredContext1")?;
        Ok(Self {
            context: created(context, "ID3D11Device1::CreateDeferredContext1")?,
            shared,
            tracker: CommandTracker::new(),
            recorded: None,
        })
    }

    pub(super) fn execute(&mut self) -> Result<()> {
        if self.tracker.state() != RecordingState::Recorded {
            return self.tracker.submit();
        }
        let list = self
            .recorded
            .take()
            .ok_or_else(|| Error::invalid_usage("command list has no finished recording"))?;
        unsafe { self.shared.context.ExecuteCommandList(&list, FALSE) };
        log::trace!(target: targets::GENERAL, "{} command list executed", BACKEND);
        self.tracker.submit()
    }

    fn bind_resources(&self, pipeline: &D3D11Pipeline, slot: u32, bindings: &[ResolvedBinding]) {
        let context = &self.context;
        for binding in bindings {
            for stage in [ShaderStage::VERTEX, ShaderStage::PIXEL] {
                if !binding.stages.contains(stage) {
                    continue;
                }
                let Some(register) = pipeline.register(stage, slot, binding.binding) else {
                    log::trace!(
                        target: targets::VALIDATION,
                        "set {} binding {} is unused by the {:?} stage",
                        slot,
                        binding.binding,
                        stage
                    );
                    continue;
                };

                match &binding.resource {
                    BoundResource::ConstantBuffer {
                        buffer,
                        first_constant,
                        num_constants,
                    } => {
                        let buffers = [Some(buffer.clone())];
                        let first = first_constant as *const u32;
                        let count = num_constants as *const u32;
                        unsafe {
                            if stage == ShaderStage::VERTEX {
                                context.VSSetConstantBuffers1(register, 1, Some(buffers.as_ptr()), Some(first), Some(count));
                            } else {
                                context.PSSetConstantBuffers1(register, 1, Some(buffers.as_ptr()), Some(first), Some(count));
                            }
                        }
                    }
                    BoundResource::Texture { view, sampler } => {
                        let views = [Some(view.clone())];
                        let samplers = [Some(sampler.clone())];
                        unsafe {
                            if stage == ShaderStage::VERTEX {
                                context.VSSetShaderResources(register, Some(&views));
                                context.VSSetSamplers(register, Some(&samplers));
                            } else {
                                context.PSSetShaderResources(register, Some(&views));
                                context.PSSetSamplers(register, Some(&samplers));
                            }
                        }
                    }
                }
            }
        }
    }
}

impl CommandList for D3D11CommandList {
    fn state(&self) -> RecordingState {
        self.tracker.state()
    }

    fn begin(&mut self) -> Result<()> {
        if self.tracker.state() == RecordingState::Recording {
            // Throw away the unfinished recording.
            let mut discarded = None;
            unsafe { self.context.FinishCommandList(FALSE, Some(&mut discarded)) }
                .check("ID3D11DeviceContext::FinishCommandList")?;
        }
        self.recorded = None;
        self.tracker.begin();
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.tracker.end()?;
        let mut list = None;
        unsafe { self.context.FinishCommandList(FALSE, Some(&mut list)) }
            .check("ID3D11DeviceContext::FinishCommandList")?;
        self.recorded = Some(created(list, "ID3D11DeviceContext::FinishCommandList")?);
        Ok(())
    }

    fn begin_render_pass(&mut self, attachments: &[ColorAttachmentInfo<'_>]) -> Result<()> {
        self.tracker.require_outside_render_pass("begin_render_pass")?;
        validate_attachments(attachments)?;

        let mut views = Vec::with_capacity(attachments.len());
        for attachment in attachments {
            let texture = cast::<D3D11Texture>(attachment.texture.as_any(), "color attachment")?;
            let view = texture
                .rtv
                .clone()
                .ok_or_else(|| Error::invalid_usage("color attachment has no render target view"))?;
            views.push((view, attachment));
        }

        let size = attachments[0].texture.info().size;
        let viewport = D3D11_VIEWPORT {
            TopLeftX: 0.0,
            TopLeftY: 0.0,
            Width: size.width as f32,
            Height: size.height as f32,
            MinDepth: 0.0,
            MaxDepth: 1.0,
        };
        let scissor = RECT {
            left: 0,
            top: 0,
            right: size.width as i32,
            bottom: size.height as i32,
        };

        let targets: Vec<Option<ID3D11RenderTargetView>> = views.iter().map(|(view, _)| Some(view.clone())).collect();
        unsafe {
            for (view, attachment) in &views {
                if attachment.load_op == LoadOp::Clear {
                    let color = attachment.clear_color.to_array();
                    self.context.ClearRenderTargetView(view, color.as_ptr());
                }
            }
            self.context
                .OMSetRenderTargets(Some(&targets), None::<&ID3D11DepthStencilView>);
            self.context.RSSetViewports(Some(&[viewport]));
            self.context.RSSetScissorRects(Some(&[scissor]));
        }
        self.tracker.begin_render_pass()
    }

    fn end_render_pass(&mut self) -> Result<()> {
        self.tracker.end_render_pass()?;
        // Unbind so the targets can be sampled by later passes.
        unsafe { self.context.OMSetRenderTargets(None, None::<&ID3D11DepthStencilView>) };
        Ok(())
    }

    fn set_graphics_pipeline(&mut self, pipeline: &dyn Pipeline) -> Result<()> {
        self.tracker.require_render_pass("set_graphics_pipeline")?;
        let pipeline = cast::<D3D11Pipeline>(pipeline.as_any(), "pipeline")?;
        let context = &self.context;
        unsafe {
            context.IASetInputLayout(pipeline.input_layout.as_ref());
            context.IASetPrimitiveTopology(D3D11_PRIMITIVE_TOPOLOGY_TRIANGLELIST);
            context.VSSetShader(&pipeline.vertex_shader, None);
            context.PSSetShader(&pipeline.pixel_shader, None);
            context.OMSetBlendState(&pipeline.blend, None, u32::MAX);
            context.OMSetDepthStencilState(&pipeline.depth_stencil, 0);
            context.RSSetState(&pipeline.rasterizer);
        }
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

        let d3d_pipeline = cast::<D3D11Pipeline>(pipeline.as_any(), "pipeline")?;
        let set = cast::<D3D11DescriptorSet>(set.as_any(), "descriptor set")?;
        self.bind_resources(d3d_pipeline, slot, &set.bindings);
        Ok(())
    }

    fn push_descriptors(&mut self, slot: u32, pipeline: &dyn Pipeline, descriptors: &[Descriptor<'_>]) -> Result<()> {
        self.tracker.require_render_pass("push_descriptors")?;
        let layout = layout_at_slot(pipeline, slot, true)?;
        validate_descriptors(layout, descriptors)?;

        let d3d_pipeline = cast::<D3D11Pipeline>(pipeline.as_any(), "pipeline")?;
        let bindings = descriptor::resolve(layout, descriptors)?;
        self.bind_resources(d3d_pipeline, slot, &bindings);
        Ok(())
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: &dyn Buffer, stride: u32, offset: u32) -> Result<()> {
        self.tracker.require_render_pass("set_vertex_buffer")?;
        if !buffer.info().usage.contains(BufferUsage::VERTEX_BUFFER) {
            return Err(Error::invalid_usage("buffer bound as vertex buffer lacks VERTEX_BUFFER usage"));
        }
        let buffer = cast::<D3D11Buffer>(buffer.as_any(), "vertex buffer")?;
        let buffers = [Some(buffer.raw.clone())];
        unsafe {
            self.context.IASetVertexBuffers(
                slot,
                1,
                Some(buffers.as_ptr()),
                Some(&stride as *const u32),
                Some(&offset as *const u32),
            );
        }
        Ok(())
    }

    fn set_index_buffer(&mut self, buffer: &dyn Buffer, format: IndexFormat, offset: u32) -> Result<()> {
        self.tracker.require_render_pass("set_index_buffer")?;
        if !buffer.info().usage.contains(BufferUsage::INDEX_BUFFER) {
            return Err(Error::invalid_usage("buffer bound as index buffer lacks INDEX_BUFFER usage"));
        }
        let buffer = cast::<D3D11Buffer>(buffer.as_any(), "index buffer")?;
        unsafe {
            self.context
                .IASetIndexBuffer(&buffer.raw, conv::index_format(format), offset);
        }
        self.tracker.index_buffer_bound();
        Ok(())
    }

    fn draw(&mut self, num_vertices: u32, first_vertex: u32) -> Result<()> {
        self.tracker.require_draw("draw", false)?;
        unsafe { self.context.Draw(num_vertices, first_vertex) };
        Ok(())
    }

    fn draw_indexed(&mut self, num_indices: u32, first_index: u32, base_vertex: i32) -> Result<()> {
        self.tracker.require_draw("draw_indexed", true)?;
        unsafe { self.context.DrawIndexed(num_indices, first_index, base_vertex) };
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
        let src = cast::<D3D11Buffer>(src.as_any(), "source buffer")?;
        let dst = cast::<D3D11Buffer>(dst.as_any(), "destination buffer")?;
        let region = D3D11_BOX {
            left: src_offset,
            top: 0,
            front: 0,
            right: src_offset + size,
            bottom: 1,
            back: 1,
        };
        unsafe {
            self.context
                .CopySubresourceRegion(&dst.raw, 0, dst_offset, 0, 0, &src.raw, 0, Some(&region));
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
        resolve_texture_copy(src, src_offset, dst, region)?;
        Err(Error::not_implemented(BACKEND, "copy_buffer_to_texture"))
    }

    fn generate_mipmaps(&mut self, texture: &dyn Texture) -> Result<()> {
        self.tracker.require_outside_render_pass("generate_mipmaps")?;
        if !texture.info().usage.contains(TextureUsage::GENERATE_MIPS) {
            return Err(Error::invalid_usage("texture was not created with GENERATE_MIPS usage"));
        }
        let texture = cast::<D3D11Texture>(texture.as_any(), "texture")?;
        let view = texture
            .srv
            .as_ref()
            .ok_or_else(|| Error::invalid_usage("texture has no shader resource view"))?;
        unsafe { self.context.GenerateMips(view) };
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
