// Programs and vertex array objects
//
// A pipeline is a linked program plus a VAO describing the input layout
// with separate attribute formats (GL 4.3), so strides and buffers come in
// at bind time. Fixed-function blend state is recorded per color target
// and applied when the pipeline is bound.

use super::device::GlShared;
use super::shader::GlShaderModule;
use super::{cast, check_error, GlCheck};
use crate::descriptor::DescriptorLayoutInfo;
use crate::error::{Error, NativeCode, Result};
use crate::pipeline::{vertex_component_count, BlendStateDescription, DescriptorRemap, GraphicsPipelineInfo, Pipeline};
use glow::HasContext;
use std::any::Any;
use std::rc::Rc;

pub struct GlPipeline {
    shared: Rc<GlShared>,
    pub(super) program: glow::Program,
    pub(super) vao: glow::VertexArray,
    pub(super) blends: Vec<BlendStateDescription>,
    remap: DescriptorRemap,
    descriptor_layouts: Vec<DescriptorLayoutInfo>,
}

impl GlPipeline {
    pub(super) fn new(shared: Rc<GlShared>, info: &GraphicsPipelineInfo<'_>) -> Result<Self> {
        let vertex_shader = cast::<GlShaderModule>(info.vertex_shader.as_any(), "vertex shader")?;
        let pixel_shader = cast::<GlShaderModule>(info.pixel_shader.as_any(), "pixel shader")?;
        let remap = DescriptorRemap::merged(&[info.vertex_shader.mapping(), info.pixel_shader.mapping()])?;

        let program = link(&shared.gl, &[vertex_shader.raw, pixel_shader.raw])?;
        let vao = match create_vertex_array(&shared.gl, info) {
            Ok(vao) => vao,
            Err(e) => {
                unsafe { shared.gl.delete_program(program) };
                return Err(e);
            }
        };

        Ok(Self {
            shared,
            program,
            vao,
            blends: info.color_targets.iter().map(|target| target.blend).collect(),
            remap,
            descriptor_layouts: info.layout_infos(),
        })
    }

    /// GL binding point for `binding` of the layout at `slot`. Without
    /// mapping info, bindings are used as binding points directly.
    pub(super) fn binding_point(&self, slot: u32, binding: u32) -> Result<u32> {
        if self.remap.is_empty() {
            return Ok(binding);
        }
        self.remap.slot(slot, binding).ok_or_else(|| {
            Error::invalid_usage(format!(
                "set {} binding {} has no slot in the shader mapping",
                slot, binding
            ))
        })
    }
}

pub(super) fn link(gl: &glow::Context, shaders: &[glow::Shader]) -> Result<glow::Program> {
    let program = unsafe { gl.create_program() }.check("glCreateProgram")?;
    unsafe {
        for &shader in shaders {
            gl.attach_shader(program, shader);
        }
        gl.link_program(program);
        for &shader in shaders {
            gl.detach_shader(program, shader);
        }
        if !gl.get_program_link_status(program) {
            let log = gl.get_program_info_log(program);
            gl.delete_program(program);
            return Err(Error::operation_failed("glLinkProgram", NativeCode::Message(log)));
        }
    }
    Ok(program)
}

fn create_vertex_array(gl: &glow::Context, info: &GraphicsPipelineInfo<'_>) -> Result<glow::VertexArray> {
    let attributes = info
        .input_layout
        .iter()
        .map(|element| {
            vertex_component_count(element.format)
                .map(|components| (element, components as i32))
                .ok_or_else(|| {
                    Error::unsupported(format!("{:?} is not a supported vertex attribute format", element.format))
                })
        })
        .collect::<Result<Vec<_>>>()?;

    let vao = unsafe { gl.create_vertex_array() }.check("glGenVertexArrays")?;
    unsafe {
        gl.bind_vertex_array(Some(vao));
        for (element, components) in attributes {
            gl.enable_vertex_attrib_array(element.location);
            gl.vertex_attrib_format_f32(element.location, components, glow::FLOAT, false, element.offset);
            gl.vertex_attrib_binding(element.location, element.slot);
        }
        gl.bind_vertex_array(None);
    }
    if let Err(e) = check_error(gl, "glVertexAttribFormat") {
        unsafe { gl.delete_vertex_array(vao) };
        return Err(e);
    }
    Ok(vao)
}

impl Pipeline for GlPipeline {
    fn descriptor_layouts(&self) -> &[DescriptorLayoutInfo] {
        &self.descriptor_layouts
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for GlPipeline {
    fn drop(&mut self) {
        unsafe {
            self.shared.gl.delete_vertex_array(self.vao);
            self.shared.gl.delete_program(self.program);
        }
    }
}
