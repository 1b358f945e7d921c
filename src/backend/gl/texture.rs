// OpenGL textures
//
// Immutable storage (glTexStorage2D) sized for the full mip count. Each
// texture gets a process-unique id for framebuffer cache keys, since GL
// names are recycled as soon as a texture is deleted.

use super::conv::{self, FormatDesc};
use super::device::GlShared;
use super::{check_error, GlCheck};
use crate::error::{Error, Result};
use crate::format::Format;
use crate::geometry::Region3D;
use crate::texture::{Texture, TextureInfo, TextureType};
use glow::HasContext;
use std::any::Any;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

pub struct GlTexture {
    shared: Rc<GlShared>,
    pub(super) raw: glow::Texture,
    pub(super) id: u64,
    pub(super) desc: FormatDesc,
    info: TextureInfo,
}

impl GlTexture {
    pub(super) fn new(shared: Rc<GlShared>, info: &TextureInfo) -> Result<Self> {
        info.validate()?;
        match info.ty {
            TextureType::Texture2D if info.array_size == 1 => {}
            _ => return Err(Error::unsupported("OpenGL textures are limited to single-layer 2D")),
        }

        let desc = conv::format(info.format)?;
        let mip_levels = info.resolved_mip_levels();
        let gl = &shared.gl;

        let raw = unsafe { gl.create_texture() }.check("glGenTextures")?;
        unsafe {
            gl.bind_texture(glow::TEXTURE_2D, Some(raw));
            gl.tex_storage_2d(
                glow::TEXTURE_2D,
                mip_levels as i32,
                desc.internal,
                info.size.width as i32,
                info.size.height as i32,
            );
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAX_LEVEL, mip_levels as i32 - 1);
            if info.format == Format::A8_UNorm {
                gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_SWIZZLE_R, glow::ZERO as i32);
                gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_SWIZZLE_G, glow::ZERO as i32);
                gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_SWIZZLE_B, glow::ZERO as i32);
                gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_SWIZZLE_A, glow::RED as i32);
            }
            gl.bind_texture(glow::TEXTURE_2D, None);
        }
        if let Err(e) = check_error(gl, "glTexStorage2D") {
            unsafe { gl.delete_texture(raw) };
            return Err(e);
        }

        let mut info = *info;
        info.mip_levels = mip_levels;

        Ok(Self {
            shared,
            raw,
            id: NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed),
            desc,
            info,
        })
    }

    /// Write tightly packed texels into mip 0.
    pub(super) fn upload(&self, region: &Region3D, data: &[u8]) -> Result<()> {
        if !region.fits_within(self.info.size) {
            return Err(Error::invalid_usage(format!(
                "region {:?} is outside a texture of {:?}",
                region, self.info.size
            )));
        }
        let expected = self.info.format.data_size(region.size);
        if data.len() != expected {
            return Err(Error::invalid_usage(format!(
                "texture upload needs {} bytes for {:?}, got {}",
                expected, region.size, data.len()
            )));
        }

        let gl = &self.shared.gl;
        unsafe {
            gl.bind_texture(glow::TEXTURE_2D, Some(self.raw));
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            if self.desc.is_compressed() {
                gl.compressed_tex_sub_image_2d(
                    glow::TEXTURE_2D,
                    0,
                    region.offset.x,
                    region.offset.y,
                    region.size.width as i32,
                    region.size.height as i32,
                    self.desc.internal,
                    glow::CompressedPixelUnpackData::Slice(data),
                );
            } else {
                gl.tex_sub_image_2d(
                    glow::TEXTURE_2D,
                    0,
                    region.offset.x,
                    region.offset.y,
                    region.size.width as i32,
                    region.size.height as i32,
                    self.desc.format,
                    self.desc.ty,
                    glow::PixelUnpackData::Slice(data),
                );
            }
            gl.bind_texture(glow::TEXTURE_2D, None);
        }
        check_error(gl, "glTexSubImage2D")
    }
}

impl Texture for GlTexture {
    fn info(&self) -> &TextureInfo {
        &self.info
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for GlTexture {
    fn drop(&mut self) {
        self.shared.forget_texture(self.id);
        unsafe { self.shared.gl.delete_texture(self.raw) };
    }
}
