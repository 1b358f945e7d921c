// OpenGL command lists
//
// Recording validates every call exactly like the native backends and
// resolves GL object names up front; execute replays the instructions
// against the context. Resources referenced by a list must outlive its
// execution, as on every backend.

use super::buffer::GlBuffer;
use super::conv::{self, FormatDesc};
use super::descriptor::{self, BoundResource, GlDescriptorSet};
use super::device::GlShared;
use super::pipeline::GlPipeline;
use super::texture::GlTexture;
use super::{cast, check_error, BACKEND};
use crate::buffer::{Buffer, BufferUsage};
use crate::command::{
    resolve_copy_size, resolve_texture_copy, validate_attachments, ColorAttachmentInfo, CommandList, CommandTracker,
    IndexFormat, LoadOp, RecordingState,
};
use crate::descriptor::{validate_descriptors, Descriptor, DescriptorSet};
use crate::error::{Error, Result};
use crate::geometry::{Region3D, Size2D};
use crate::pipeline::{layout_at_slot, BlendStateDescription, Pipeline};
use crate::texture::Texture;
use glow::HasContext;
use std::any::Any;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
enum Instruction {
    BeginRenderPass {
        framebuffer: glow::Framebuffer,
        targets: u32,
        size: Size2D,
        /// (draw buffer, color) for attachments loaded with `Clear`.
        clears: Vec<(u32, [f32; 4])>,
    },
    EndRenderPass,
    SetPipeline {
        program: glow::Program,
        vao: glow::VertexArray,
        blends: Vec<BlendStateDescription>,
    },
    BindUniformBuffer {
        index: u32,
        buffer: glow::Buffer,
        offset: u32,
        size: u32,
    },
    BindTexture {
        unit: u32,
        texture: glow::Texture,
        sampler: glow::Sampler,
    },
    SetVertexBuffer {
        slot: u32,
        buffer: glow::Buffer,
        stride: u32,
        offset: u32,
    },
    SetIndexBuffer {
        buffer: glow::Buffer,
        format: IndexFormat,
        offset: u32,
    },
    Draw {
        first: u32,
        count: u32,
    },
    DrawIndexed {
        count: u32,
        first_index: u32,
        base_vertex: i32,
    },
    CopyBufferToBuffer {
        src: glow::Buffer,
        src_offset: u32,
        dst: glow::Buffer,
        dst_offset: u32,
        size: u32,
    },
    CopyBufferToTexture {
        src: glow::Buffer,
        src_offset: u32,
        dst: glow::Texture,
        desc: FormatDesc,
        region: Region3D,
        byte_size: u32,
    },
}

/// Bindings that outlive one instruction during replay.
#[derive(Default)]
struct ReplayState {
    index: Option<(glow::Buffer, IndexFormat, u32)>,
}

pub struct GlCommandList {
    shared: Rc<GlShared>,
    tracker: CommandTracker,
    instructions: Vec<Instruction>,
}

impl GlCommandList {
    pub(super) fn new(shared: Rc<GlShared>) -> Self {
        Self {
            shared,
            tracker: CommandTracker::new(),
            instructions: Vec::new(),
        }
    }

    /// Replay the recording on the context.
    pub(super) fn execute(&mut self) -> Result<()> {
        if self.tracker.state() != RecordingState::Recorded {
            return self.tracker.submit();
        }

        let gl = &self.shared.gl;
        let mut state = ReplayState::default();
        for instruction in &self.instructions {
            unsafe { replay(gl, instruction, &mut state) };
        }
        unsafe {
            gl.bind_vertex_array(None);
            gl.use_program(None);
        }
        log::trace!(
            target: crate::diagnostics::targets::GENERAL,
            "{} command list replayed {} instructions",
            BACKEND,
            self.instructions.len()
        );

        let result = check_error(gl, "command list execution");
        self.tracker.submit()?;
        result
    }

    fn bind_resources(&mut self, pipeline: &GlPipeline, slot: u32, resources: &[(u32, BoundResource)]) -> Result<()> {
        for &(binding, resource) in resources {
            let point = pipeline.binding_point(slot, binding)?;
            self.instructions.push(match resource {
                BoundResource::UniformBuffer { buffer, offset, size } => Instruction::BindUniformBuffer {
                    index: point,
                    buffer,
                    offset,
                    size,
                },
                BoundResource::Texture { texture, sampler } => Instruction::BindTexture {
                    unit: point,
                    texture,
                    sampler,
                },
            });
        }
        Ok(())
    }
}

unsafe fn replay(gl: &glow::Context, instruction: &Instruction, state: &mut ReplayState) {
    match instruction {
        Instruction::BeginRenderPass {
            framebuffer,
            targets,
            size,
            clears,
        } => {
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(*framebuffer));
            let draw_buffers: Vec<u32> = (0..*targets).map(|i| glow::COLOR_ATTACHMENT0 + i).collect();
            gl.draw_buffers(&draw_buffers);
            gl.viewport(0, 0, size.width as i32, size.height as i32);
            gl.disable(glow::SCISSOR_TEST);
            for (draw_buffer, color) in clears {
                gl.color_mask_draw_buffer(*draw_buffer, true, true, true, true);
                gl.clear_buffer_f32_slice(glow::COLOR, *draw_buffer, color);
            }
        }
        Instruction::EndRenderPass => {
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        }
        Instruction::SetPipeline { program, vao, blends } => {
            gl.use_program(Some(*program));
            gl.bind_vertex_array(Some(*vao));
            for (i, blend) in blends.iter().enumerate() {
                let i = i as u32;
                if blend.enabled {
                    gl.enable_draw_buffer(glow::BLEND, i);
                } else {
                    gl.disable_draw_buffer(glow::BLEND, i);
                }
                gl.blend_equation_separate_draw_buffer(i, conv::blend_op(blend.color_op), conv::blend_op(blend.alpha_op));
                gl.blend_func_separate_draw_buffer(
                    i,
                    conv::blend_factor(blend.src_color),
                    conv::blend_factor(blend.dest_color),
                    conv::blend_factor(blend.src_alpha),
                    conv::blend_factor(blend.dest_alpha),
                );
            }
            // The element binding is VAO state; re-apply it for the new VAO.
            if let Some((buffer, _, _)) = state.index {
                gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(buffer));
            }
        }
        Instruction::BindUniformBuffer {
            index,
            buffer,
            offset,
            size,
        } => {
            gl.bind_buffer_range(glow::UNIFORM_BUFFER, *index, Some(*buffer), *offset as i32, *size as i32);
        }
        Instruction::BindTexture { unit, texture, sampler } => {
            gl.active_texture(glow::TEXTURE0 + unit);
            gl.bind_texture(glow::TEXTURE_2D, Some(*texture));
            gl.bind_sampler(*unit, Some(*sampler));
        }
        Instruction::SetVertexBuffer {
            slot,
            buffer,
            stride,
            offset,
        } => {
            gl.bind_vertex_buffer(*slot, Some(*buffer), *offset as i32, *stride as i32);
        }
        Instruction::SetIndexBuffer { buffer, format, offset } => {
            gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(*buffer));
            state.index = Some((*buffer, *format, *offset));
        }
        Instruction::Draw { first, count } => {
            gl.draw_arrays(glow::TRIANGLES, *first as i32, *count as i32);
        }
        Instruction::DrawIndexed {
            count,
            first_index,
            base_vertex,
        } => {
            if let Some((_, format, offset)) = state.index {
                let byte_offset = offset + first_index * format.size_in_bytes();
                gl.draw_elements_base_vertex(
                    glow::TRIANGLES,
                    *count as i32,
                    conv::index_type(format),
                    byte_offset as i32,
                    *base_vertex,
                );
            }
        }
        Instruction::CopyBufferToBuffer {
            src,
            src_offset,
            dst,
            dst_offset,
            size,
        } => {
            gl.bind_buffer(glow::COPY_READ_BUFFER, Some(*src));
            gl.bind_buffer(glow::COPY_WRITE_BUFFER, Some(*dst));
            gl.copy_buffer_sub_data(
                glow::COPY_READ_BUFFER,
                glow::COPY_WRITE_BUFFER,
                *src_offset as i32,
                *dst_offset as i32,
                *size as i32,
            );
            gl.bind_buffer(glow::COPY_READ_BUFFER, None);
            gl.bind_buffer(glow::COPY_WRITE_BUFFER, None);
        }
        Instruction::CopyBufferToTexture {
            src,
            src_offset,
            dst,
            desc,
            region,
            byte_size,
        } => {
            gl.bind_buffer(glow::PIXEL_UNPACK_BUFFER, Some(*src));
            gl.bind_texture(glow::TEXTURE_2D, Some(*dst));
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            let (x, y) = (region.offset.x, region.offset.y);
            let (width, height) = (region.size.width as i32, region.size.height as i32);
            if desc.is_compressed() {
                gl.compressed_tex_sub_image_2d(
                    glow::TEXTURE_2D,
                    0,
                    x,
                    y,
                    width,
                    height,
                    desc.internal,
                    glow::CompressedPixelUnpackData::BufferRange(*src_offset..src_offset + byte_size),
                );
            } else {
                gl.tex_sub_image_2d(
                    glow::TEXTURE_2D,
                    0,
                    x,
                    y,
                    width,
                    height,
                    desc.format,
                    desc.ty,
                    glow::PixelUnpackData::BufferOffset(*src_offset),
                );
            }
            gl.bind_texture(glow::TEXTURE_2D, None);
            gl.bind_buffer(glow::PIXEL_UNPACK_BUFFER, None);
        }
    }
}

impl CommandList for GlCommandList {
    fn state(&self) -> RecordingState {
        self.tracker.state()
    }

    fn begin(&mut self) -> Result<()> {
        self.instructions.clear();
        self.tracker.begin();
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.tracker.end()
    }

    fn begin_render_pass(&mut self, attachments: &[ColorAttachmentInfo<'_>]) -> Result<()> {
        self.tracker.require_outside_render_pass("begin_render_pass")?;
        validate_attachments(attachments)?;

        let mut targets = Vec::with_capacity(attachments.len());
        let mut clears = Vec::new();
        for (i, attachment) in attachments.iter().enumerate() {
            let texture = cast::<GlTexture>(attachment.texture.as_any(), "color attachment")?;
            targets.push((texture.id, texture.raw));
            if attachment.load_op == LoadOp::Clear {
                clears.push((i as u32, attachment.clear_color.to_array()));
            }
        }
        let framebuffer = self.shared.framebuffer(&targets)?;

        let size = attachments[0].texture.info().size;
        self.instructions.push(Instruction::BeginRenderPass {
            framebuffer,
            targets: targets.len() as u32,
            size: Size2D::new(size.width, size.height),
            clears,
        });
        self.tracker.begin_render_pass()
    }

    fn end_render_pass(&mut self) -> Result<()> {
        self.tracker.end_render_pass()?;
        self.instructions.push(Instruction::EndRenderPass);
        Ok(())
    }

    fn set_graphics_pipeline(&mut self, pipeline: &dyn Pipeline) -> Result<()> {
        self.tracker.require_render_pass("set_graphics_pipeline")?;
        let pipeline = cast::<GlPipeline>(pipeline.as_any(), "pipeline")?;
        self.instructions.push(Instruction::SetPipeline {
            program: pipeline.program,
            vao: pipeline.vao,
            blends: pipeline.blends.clone(),
        });
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

        let gl_pipeline = cast::<GlPipeline>(pipeline.as_any(), "pipeline")?;
        let set = cast::<GlDescriptorSet>(set.as_any(), "descriptor set")?;
        self.bind_resources(gl_pipeline, slot, &set.resources)
    }

    fn push_descriptors(&mut self, slot: u32, pipeline: &dyn Pipeline, descriptors: &[Descriptor<'_>]) -> Result<()> {
        self.tracker.require_render_pass("push_descriptors")?;
        let layout = layout_at_slot(pipeline, slot, true)?;
        validate_descriptors(layout, descriptors)?;

        let gl_pipeline = cast::<GlPipeline>(pipeline.as_any(), "pipeline")?;
        let resources = descriptor::resolve(descriptors)?;
        self.bind_resources(gl_pipeline, slot, &resources)
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: &dyn Buffer, stride: u32, offset: u32) -> Result<()> {
        self.tracker.require_render_pass("set_vertex_buffer")?;
        if !buffer.info().usage.contains(BufferUsage::VERTEX_BUFFER) {
            return Err(Error::invalid_usage("buffer bound as vertex buffer lacks VERTEX_BUFFER usage"));
        }
        let buffer = cast::<GlBuffer>(buffer.as_any(), "vertex buffer")?;
        self.instructions.push(Instruction::SetVertexBuffer {
            slot,
            buffer: buffer.raw,
            stride,
            offset,
        });
        Ok(())
    }

    fn set_index_buffer(&mut self, buffer: &dyn Buffer, format: IndexFormat, offset: u32) -> Result<()> {
        self.tracker.require_render_pass("set_index_buffer")?;
        if !buffer.info().usage.contains(BufferUsage::INDEX_BUFFER) {
            return Err(Error::invalid_usage("buffer bound as index buffer lacks INDEX_BUFFER usage"));
        }
        let buffer = cast::<GlBuffer>(buffer.as_any(), "index buffer")?;
        self.instructions.push(Instruction::SetIndexBuffer {
            buffer: buffer.raw,
            format,
            offset,
        });
        self.tracker.index_buffer_bound();
        Ok(())
    }

    fn draw(&mut self, num_vertices: u32, first_vertex: u32) -> Result<()> {
        self.tracker.require_draw("draw", false)?;
        self.instructions.push(Instruction::Draw {
            first: first_vertex,
            count: num_vertices,
        });
        Ok(())
    }

    fn draw_indexed(&mut self, num_indices: u32, first_index: u32, base_vertex: i32) -> Result<()> {
        self.tracker.require_draw("draw_indexed", true)?;
        self.instructions.push(Instruction::DrawIndexed {
            count: num_indices,
            first_index,
            base_vertex,
        });
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
        let src = cast::<GlBuffer>(src.as_any(), "source buffer")?;
        let dst = cast::<GlBuffer>(dst.as_any(), "destination buffer")?;
        self.instructions.push(Instruction::CopyBufferToBuffer {
            src: src.raw,
            src_offset,
            dst: dst.raw,
            dst_offset,
            size,
        });
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
        let byte_size = dst.info().format.data_size(region.size) as u32;
        let src = cast::<GlBuffer>(src.as_any(), "source buffer")?;
        let dst = cast::<GlTexture>(dst.as_any(), "destination texture")?;
        self.instructions.push(Instruction::CopyBufferToTexture {
            src: src.raw,
            src_offset,
            dst: dst.raw,
            desc: dst.desc,
            region,
            byte_size,
        });
        Ok(())
    }

    fn generate_mipmaps(&mut self, _texture: &dyn Texture) -> Result<()> {
        self.tracker.require_outside_render_pass("generate_mipmaps")?;
        Err(Error::not_implemented(BACKEND, "generate_mipmaps"))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
