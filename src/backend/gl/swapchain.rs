// OpenGL swapchain
//
// The default framebuffer cannot be attached to a user framebuffer object,
// so frames are rendered into an offscreen texture and blitted to it with a
// fullscreen triangle on present. Buffer swapping belongs to the host,
// reached through `GlContext::present`.

use super::device::GlShared;
use super::pipeline::link;
use super::shader::compile;
use super::texture::GlTexture;
use super::{check_error, GlCheck, BACKEND};
use crate::diagnostics::targets;
use crate::error::{Error, Result};
use crate::format::Format;
use crate::geometry::Size2D;
use crate::swapchain::{PresentMode, Swapchain, SwapchainInfo};
use crate::texture::{Texture, TextureInfo, TextureUsage};
use glow::HasContext;
use std::rc::Rc;

const BLIT_VS: &str = r#"#version 430 core
out vec2 v_uv;
void main() {
    vec2 uv = vec2((gl_VertexID << 1) & 2, gl_VertexID & 2);
    v_uv = uv;
    gl_Position = vec4(uv * 2.0 - 1.0, 0.0, 1.0);
}
"#;

const BLIT_FS: &str = r#"#version 430 core
layout(binding = 0) uniform sampler2D u_frame;
in vec2 v_uv;
out vec4 o_color;
void main() {
    o_color = texture(u_frame, v_uv);
}
"#;

pub struct GlSwapchain {
    shared: Rc<GlShared>,
    texture: GlTexture,
    program: glow::Program,
    vao: glow::VertexArray,
    format: Format,
    size: Size2D,
    present_mode: PresentMode,
    num_buffers: u32,
}

impl GlSwapchain {
    pub(super) fn new(shared: Rc<GlShared>, info: &SwapchainInfo<'_>) -> Result<Self> {
        let texture = create_frame(&shared, info.format, info.size)?;
        let program = create_blit_program(&shared.gl)?;
        let vao = match unsafe { shared.gl.create_vertex_array() }.check("glGenVertexArrays") {
            Ok(vao) => vao,
            Err(e) => {
                unsafe { shared.gl.delete_program(program) };
                return Err(e);
            }
        };

        log::info!(
            target: targets::GENERAL,
            "Created {} swapchain: {}x{} {:?}, {:?}",
            BACKEND,
            info.size.width,
            info.size.height,
            info.format,
            info.present_mode
        );

        Ok(Self {
            shared,
            texture,
            program,
            vao,
            format: info.format,
            size: info.size,
            present_mode: info.present_mode,
            num_buffers: info.num_buffers,
        })
    }
}

fn create_frame(shared: &Rc<GlShared>, format: Format, size: Size2D) -> Result<GlTexture> {
    let info = TextureInfo::texture_2d(
        format,
        size.width,
        size.height,
        1,
        TextureUsage::COLOR_TARGET | TextureUsage::SHADER_RESOURCE,
    );
    let texture = GlTexture::new(shared.clone(), &info)?;
    let gl = &shared.gl;
    unsafe {
        gl.bind_texture(glow::TEXTURE_2D, Some(texture.raw));
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::NEAREST as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::NEAREST as i32);
        gl.bind_texture(glow::TEXTURE_2D, None);
    }
    Ok(texture)
}

fn create_blit_program(gl: &glow::Context) -> Result<glow::Program> {
    let vs = compile(gl, glow::VERTEX_SHADER, BLIT_VS)?;
    let fs = match compile(gl, glow::FRAGMENT_SHADER, BLIT_FS) {
        Ok(fs) => fs,
        Err(e) => {
            unsafe { gl.delete_shader(vs) };
            return Err(e);
        }
    };
    let program = link(gl, &[vs, fs]);
    unsafe {
        gl.delete_shader(vs);
        gl.delete_shader(fs);
    }
    program
}

impl Swapchain for GlSwapchain {
    fn size(&self) -> Size2D {
        self.size
    }

    fn format(&self) -> Format {
        self.format
    }

    fn present_mode(&self) -> PresentMode {
        self.present_mode
    }

    fn buffer_count(&self) -> u32 {
        self.num_buffers
    }

    fn get_next_texture(&mut self) -> Result<&dyn Texture> {
        Ok(&self.texture)
    }

    fn present(&mut self) -> Result<()> {
        let gl = &self.shared.gl;
        unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            gl.viewport(0, 0, self.size.width as i32, self.size.height as i32);
            gl.disable(glow::SCISSOR_TEST);
            gl.disable_draw_buffer(glow::BLEND, 0);
            gl.color_mask_draw_buffer(0, true, true, true, true);
            gl.use_program(Some(self.program));
            gl.bind_vertex_array(Some(self.vao));
            gl.active_texture(glow::TEXTURE0);
            gl.bind_texture(glow::TEXTURE_2D, Some(self.texture.raw));
            gl.bind_sampler(0, None);
            gl.draw_arrays(glow::TRIANGLES, 0, 3);
            gl.bind_vertex_array(None);
            gl.use_program(None);
        }
        check_error(gl, "swapchain blit")?;

        (self.shared.context.present)(self.present_mode.swap_interval());
        Ok(())
    }

    fn resize(&mut self, size: Size2D) -> Result<()> {
        if size.is_empty() {
            return Err(Error::invalid_usage(format!(
                "cannot resize a swapchain to {}x{}",
                size.width, size.height
            )));
        }
        if size == self.size {
            return Ok(());
        }
        self.texture = create_frame(&self.shared, self.format, size)?;
        self.size = size;
        log::debug!(target: targets::GENERAL, "{} swapchain resized to {}x{}", BACKEND, size.width, size.height);
        Ok(())
    }
}

impl Drop for GlSwapchain {
    fn drop(&mut self) {
        unsafe {
            self.shared.gl.delete_vertex_array(self.vao);
            self.shared.gl.delete_program(self.program);
        }
    }
}
