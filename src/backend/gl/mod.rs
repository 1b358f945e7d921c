// OpenGL backend
//
// Targets desktop GL 4.3 core through `glow`. The host owns the window and
// the context; it hands over a loader and a swap callback in `GlContext`
// and keeps the context current on the thread that drives the device.
//
// GL has no command buffers, so command lists record `Instruction`s and
// replay them against the global state machine on execute. Render passes
// resolve to framebuffer objects cached per attachment set.

mod buffer;
mod command;
mod conv;
mod descriptor;
mod device;
mod framebuffer;
mod instance;
mod pipeline;
mod sampler;
mod shader;
mod swapchain;
mod texture;

pub use buffer::GlBuffer;
pub use command::GlCommandList;
pub use descriptor::{GlDescriptorLayout, GlDescriptorSet};
pub use device::GlDevice;
pub use instance::{GlInstance, GlSurface};
pub use pipeline::GlPipeline;
pub use sampler::GlSampler;
pub use shader::GlShaderModule;
pub use swapchain::GlSwapchain;
pub use texture::GlTexture;

use crate::error::{Error, NativeCode, Result};
use crate::instance::{Backend, BackendFactory, Instance, InstanceInfo};
use glow::HasContext;
use std::any::Any;

const BACKEND: Backend = Backend::OpenGL;

/// Factory to register on a `BackendRegistry`. Needs `InstanceInfo::gl`.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenGlBackend;

impl BackendFactory for OpenGlBackend {
    fn name(&self) -> &str {
        "OpenGL"
    }

    fn backend(&self) -> Backend {
        BACKEND
    }

    fn create_instance(&self, info: &InstanceInfo) -> Result<Box<dyn Instance>> {
        Ok(Box::new(GlInstance::new(info)?))
    }
}

/// Attach the failing entry point to a glow object-creation result.
pub(crate) trait GlCheck<T> {
    fn check(self, operation: &'static str) -> Result<T>;
}

impl<T> GlCheck<T> for std::result::Result<T, String> {
    fn check(self, operation: &'static str) -> Result<T> {
        self.map_err(|message| Error::operation_failed(operation, NativeCode::Message(message)))
    }
}

/// Drain the GL error queue, reporting the first error against `operation`.
pub(crate) fn check_error(gl: &glow::Context, operation: &'static str) -> Result<()> {
    let first = unsafe { gl.get_error() };
    if first == glow::NO_ERROR {
        return Ok(());
    }
    // Flags stay set until read; clear the rest so they are not blamed on the next call.
    for _ in 0..16 {
        if unsafe { gl.get_error() } == glow::NO_ERROR {
            break;
        }
    }
    Err(Error::operation_failed(operation, NativeCode::Gl(first)))
}

fn cast<'a, T: 'static>(any: &'a dyn Any, what: &str) -> Result<&'a T> {
    super::downcast(any, BACKEND, what)
}

fn cast_mut<'a, T: 'static>(any: &'a mut dyn Any, what: &str) -> Result<&'a mut T> {
    super::downcast_mut(any, BACKEND, what)
}
