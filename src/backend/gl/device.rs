// OpenGL device
//
// GL has one implicit queue: every call lands in the context's command
// stream in order, so "submission" is just replaying a list. Blocking
// uploads need no staging either, the driver copies client memory before
// the call returns.

use super::buffer::GlBuffer;
use super::command::GlCommandList;
use super::descriptor::{GlDescriptorLayout, GlDescriptorSet};
use super::framebuffer::{AttachmentKey, FramebufferCache};
use super::instance::GlSurface;
use super::pipeline::GlPipeline;
use super::sampler::GlSampler;
use super::shader::GlShaderModule;
use super::swapchain::GlSwapchain;
use super::texture::GlTexture;
use super::{cast, cast_mut, GlCheck, BACKEND};
use crate::buffer::{Buffer, BufferInfo};
use crate::command::CommandList;
use crate::descriptor::{Descriptor, DescriptorLayout, DescriptorLayoutInfo, DescriptorSet};
use crate::device::Device;
use crate::diagnostics::targets;
use crate::error::{Error, NativeCode, Result};
use crate::geometry::Region3D;
use crate::instance::{Adapter, Backend, GlContext};
use crate::pipeline::{GraphicsPipelineInfo, Pipeline};
use crate::sampler::{Sampler, SamplerInfo};
use crate::shader::{ShaderMappingInfo, ShaderModule, ShaderStage};
use crate::swapchain::{Swapchain, SwapchainInfo};
use crate::texture::{Texture, TextureInfo};
use glow::HasContext;
use std::cell::RefCell;
use std::ptr::NonNull;
use std::rc::Rc;

const MAX_TEXTURE_MAX_ANISOTROPY: u32 = 0x84FF;

/// Context state shared by the device and every resource it creates.
pub(super) struct GlShared {
    pub gl: Rc<glow::Context>,
    pub context: GlContext,
    /// Sampler anisotropy limit, `None` when filtering is unavailable.
    pub max_anisotropy: Option<f32>,
    framebuffers: RefCell<FramebufferCache<glow::Framebuffer>>,
}

impl GlShared {
    /// Framebuffer with `attachments` bound to consecutive color slots.
    pub fn framebuffer(&self, attachments: &[(u64, glow::Texture)]) -> Result<glow::Framebuffer> {
        let key = AttachmentKey::new(attachments.iter().map(|(id, _)| *id));
        let gl = &self.gl;
        self.framebuffers.borrow_mut().get_or_create(key, || {
            let framebuffer = unsafe { gl.create_framebuffer() }.check("glGenFramebuffers")?;
            unsafe {
                gl.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer));
                for (i, (_, texture)) in attachments.iter().enumerate() {
                    gl.framebuffer_texture_2d(
                        glow::FRAMEBUFFER,
                        glow::COLOR_ATTACHMENT0 + i as u32,
                        glow::TEXTURE_2D,
                        Some(*texture),
                        0,
                    );
                }
                let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
                gl.bind_framebuffer(glow::FRAMEBUFFER, None);
                if status != glow::FRAMEBUFFER_COMPLETE {
                    gl.delete_framebuffer(framebuffer);
                    return Err(Error::operation_failed("glCheckFramebufferStatus", NativeCode::Gl(status)));
                }
            }
            Ok(framebuffer)
        })
    }

    /// Drop cached framebuffers that attach a destroyed texture.
    /// Texture names are recycled by GL, so a cache that only emptied at
    /// device destruction could hand out a framebuffer bound to a new texture.
    pub fn forget_texture(&self, texture_id: u64) {
        for framebuffer in self.framebuffers.borrow_mut().evict(texture_id) {
            unsafe { self.gl.delete_framebuffer(framebuffer) };
        }
    }
}

impl Drop for GlShared {
    fn drop(&mut self) {
        log::info!(target: targets::GENERAL, "Destroying OpenGL device...");
        for framebuffer in self.framebuffers.get_mut().drain() {
            unsafe { self.gl.delete_framebuffer(framebuffer) };
        }
    }
}

fn query_max_anisotropy(gl: &glow::Context) -> Option<f32> {
    let version = gl.version();
    let available = (version.major, version.minor) >= (4, 6)
        || gl.supported_extensions().contains("GL_EXT_texture_filter_anisotropic")
        || gl.supported_extensions().contains("GL_ARB_texture_filter_anisotropic");
    if !available {
        return None;
    }
    let max = unsafe { gl.get_parameter_f32(MAX_TEXTURE_MAX_ANISOTROPY) };
    (max >= 1.0).then_some(max)
}

pub struct GlDevice {
    shared: Rc<GlShared>,
    adapter: Adapter,
    has_surface: bool,
}

impl GlDevice {
    pub(super) fn new(gl: Rc<glow::Context>, context: GlContext, adapter: Adapter, has_surface: bool) -> Result<Self> {
        let max_anisotropy = query_max_anisotropy(&gl);
        log::info!(
            target: targets::GENERAL,
            "OpenGL device ready on {} (anisotropy: {:?}, surface: {})",
            adapter.name,
            max_anisotropy,
            has_surface
        );

        Ok(Self {
            shared: Rc::new(GlShared {
                gl,
                context,
                max_anisotropy,
                framebuffers: RefCell::new(FramebufferCache::new()),
            }),
            adapter,
            has_surface,
        })
    }
}

impl Device for GlDevice {
    fn backend(&self) -> Backend {
        BACKEND
    }

    fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    fn create_swapchain(&self, info: &SwapchainInfo<'_>) -> Result<Box<dyn Swapchain>> {
        info.validate()?;
        cast::<GlSurface>(info.surface.as_any(), "surface")?;
        if !self.has_surface {
            return Err(Error::invalid_usage("the device was created without a surface"));
        }
        Ok(Box::new(GlSwapchain::new(self.shared.clone(), info)?))
    }

    fn create_command_list(&self) -> Result<Box<dyn CommandList>> {
        Ok(Box::new(GlCommandList::new(self.shared.clone())))
    }

    fn create_shader_module(
        &self,
        stage: ShaderStage,
        code: &[u8],
        entry_point: &str,
        mapping: Option<&ShaderMappingInfo>,
    ) -> Result<Box<dyn ShaderModule>> {
        crate::shader::require_single_stage(stage)?;
        Ok(Box::new(GlShaderModule::new(
            self.shared.clone(),
            stage,
            code,
            entry_point,
            mapping,
        )?))
    }

    fn create_graphics_pipeline(&self, info: &GraphicsPipelineInfo<'_>) -> Result<Box<dyn Pipeline>> {
        info.validate()?;
        Ok(Box::new(GlPipeline::new(self.shared.clone(), info)?))
    }

    fn create_buffer(&self, info: &BufferInfo, data: Option<&[u8]>) -> Result<Box<dyn Buffer>> {
        Ok(Box::new(GlBuffer::new(self.shared.clone(), info, data)?))
    }

    fn create_texture(&self, info: &TextureInfo, data: Option<&[u8]>) -> Result<Box<dyn Texture>> {
        let texture = GlTexture::new(self.shared.clone(), info)?;
        if let Some(data) = data {
            texture.upload(&Region3D::whole(info.size), data)?;
        }
        Ok(Box::new(texture))
    }

    fn create_sampler(&self, info: &SamplerInfo) -> Result<Box<dyn Sampler>> {
        Ok(Box::new(GlSampler::new(self.shared.clone(), info)?))
    }

    fn create_descriptor_layout(&self, info: &DescriptorLayoutInfo) -> Result<Box<dyn DescriptorLayout>> {
        Ok(Box::new(GlDescriptorLayout::new(info)?))
    }

    fn create_descriptor_set(
        &self,
        layout: &dyn DescriptorLayout,
        descriptors: &[Descriptor<'_>],
    ) -> Result<Box<dyn DescriptorSet>> {
        let layout = cast::<GlDescriptorLayout>(layout.as_any(), "descriptor layout")?;
        Ok(Box::new(GlDescriptorSet::new(layout, descriptors)?))
    }

    fn execute_command_list(&self, list: &mut dyn CommandList) -> Result<()> {
        cast_mut::<GlCommandList>(list.as_any_mut(), "command list")?.execute()
    }

    fn update_buffer(&self, buffer: &dyn Buffer, offset: u32, data: &[u8]) -> Result<()> {
        cast::<GlBuffer>(buffer.as_any(), "buffer")?.upload(offset, data)
    }

    fn update_texture(&self, texture: &dyn Texture, region: &Region3D, data: &[u8]) -> Result<()> {
        cast::<GlTexture>(texture.as_any(), "texture")?.upload(region, data)
    }

    fn map_buffer(&self, buffer: &dyn Buffer) -> Result<NonNull<u8>> {
        cast::<GlBuffer>(buffer.as_any(), "buffer")?.map()
    }

    fn unmap_buffer(&self, buffer: &dyn Buffer) -> Result<()> {
        cast::<GlBuffer>(buffer.as_any(), "buffer")?.unmap()
    }

    fn wait_idle(&self) -> Result<()> {
        unsafe { self.shared.gl.finish() };
        Ok(())
    }
}
