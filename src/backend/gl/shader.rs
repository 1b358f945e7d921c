// GLSL shader objects
//
// Code is GLSL source text. GL has a single `main` per shader object, so
// the entry point is only recorded for the trait.

use super::device::GlShared;
use super::GlCheck;
use crate::error::{Error, NativeCode, Result};
use crate::shader::{ShaderMappingInfo, ShaderModule, ShaderStage};
use glow::HasContext;
use std::any::Any;
use std::rc::Rc;

/// Compile one shader object, returning the info log on failure.
pub(super) fn compile(gl: &glow::Context, ty: u32, source: &str) -> Result<glow::Shader> {
    let shader = unsafe { gl.create_shader(ty) }.check("glCreateShader")?;
    unsafe {
        gl.shader_source(shader, source);
        gl.compile_shader(shader);
        if !gl.get_shader_compile_status(shader) {
            let log = gl.get_shader_info_log(shader);
            gl.delete_shader(shader);
            return Err(Error::operation_failed("glCompileShader", NativeCode::Message(log)));
        }
    }
    Ok(shader)
}

pub struct GlShaderModule {
    shared: Rc<GlShared>,
    pub(super) raw: glow::Shader,
    stage: ShaderStage,
    entry_point: String,
    mapping: Option<ShaderMappingInfo>,
}

impl GlShaderModule {
    pub(super) fn new(
        shared: Rc<GlShared>,
        stage: ShaderStage,
        code: &[u8],
        entry_point: &str,
        mapping: Option<&ShaderMappingInfo>,
    ) -> Result<Self> {
        let source = std::str::from_utf8(code)
            .map_err(|e| Error::invalid_usage(format!("GLSL source is not UTF-8: {}", e)))?;
        let ty = if stage == ShaderStage::VERTEX {
            glow::VERTEX_SHADER
        } else {
            glow::FRAGMENT_SHADER
        };
        let raw = compile(&shared.gl, ty, source)?;

        Ok(Self {
            shared,
            raw,
            stage,
            entry_point: entry_point.to_owned(),
            mapping: mapping.cloned(),
        })
    }
}

impl ShaderModule for GlShaderModule {
    fn stage(&self) -> ShaderStage {
        self.stage
    }

    fn entry_point(&self) -> &str {
        &self.entry_point
    }

    fn mapping(&self) -> Option<&ShaderMappingInfo> {
        self.mapping.as_ref()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for GlShaderModule {
    fn drop(&mut self) {
        unsafe { self.shared.gl.delete_shader(self.raw) };
    }
}
