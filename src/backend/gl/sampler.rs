use super::conv;
use super::device::GlShared;
use super::{check_error, GlCheck};
use crate::error::{Error, Result};
use crate::sampler::{Sampler, SamplerInfo};
use glow::HasContext;
use std::any::Any;
use std::rc::Rc;

// EXT_texture_filter_anisotropic / GL 4.6 core share this value.
const TEXTURE_MAX_ANISOTROPY: u32 = 0x84FE;

pub struct GlSampler {
    shared: Rc<GlShared>,
    pub(super) raw: glow::Sampler,
    info: SamplerInfo,
}

impl GlSampler {
    pub(super) fn new(shared: Rc<GlShared>, info: &SamplerInfo) -> Result<Self> {
        info.validate()?;
        if info.anisotropy_enabled() && shared.max_anisotropy.is_none() {
            return Err(Error::unsupported("anisotropic filtering is not available on this context"));
        }

        let gl = &shared.gl;
        let raw = unsafe { gl.create_sampler() }.check("glGenSamplers")?;
        unsafe {
            gl.sampler_parameter_i32(raw, glow::TEXTURE_MIN_FILTER, conv::min_filter(info.min_filter, info.mip_filter) as i32);
            gl.sampler_parameter_i32(raw, glow::TEXTURE_MAG_FILTER, conv::mag_filter(info.mag_filter) as i32);
            gl.sampler_parameter_i32(raw, glow::TEXTURE_WRAP_S, conv::address_mode(info.address_u) as i32);
            gl.sampler_parameter_i32(raw, glow::TEXTURE_WRAP_T, conv::address_mode(info.address_v) as i32);
            gl.sampler_parameter_i32(raw, glow::TEXTURE_WRAP_R, conv::address_mode(info.address_w) as i32);
            gl.sampler_parameter_f32(raw, glow::TEXTURE_MIN_LOD, info.min_lod);
            gl.sampler_parameter_f32(raw, glow::TEXTURE_MAX_LOD, info.max_lod);
            if let (true, Some(limit)) = (info.anisotropy_enabled(), shared.max_anisotropy) {
                gl.sampler_parameter_f32(raw, TEXTURE_MAX_ANISOTROPY, (info.max_anisotropy as f32).min(limit));
            }
        }
        if let Err(e) = check_error(gl, "glSamplerParameter") {
            unsafe { gl.delete_sampler(raw) };
            return Err(e);
        }

        Ok(Self {
            shared,
            raw,
            info: *info,
        })
    }
}

impl Sampler for GlSampler {
    fn info(&self) -> &SamplerInfo {
        &self.info
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for GlSampler {
    fn drop(&mut self) {
        unsafe { self.shared.gl.delete_sampler(self.raw) };
    }
}
