// Direct3D 11 backend
//
// Feature level 11.1 through the `windows` crate. Each command list records
// into its own deferred context and is replayed on the immediate context
// by `execute_command_list`. D3D11 tracks hazards itself, so there are no
// barriers or layouts to manage here.

mod buffer;
mod command;
mod conv;
mod descriptor;
mod device;
mod instance;
mod pipeline;
mod sampler;
mod shader;
mod swapchain;
mod texture;

pub use buffer::D3D11Buffer;
pub use command::D3D11CommandList;
pub use descriptor::{D3D11DescriptorLayout, D3D11DescriptorSet};
pub use device::D3D11Device;
pub use instance::{D3D11Instance, D3D11Surface};
pub use pipeline::D3D11Pipeline;
pub use sampler::D3D11Sampler;
pub use shader::D3D11ShaderModule;
pub use swapchain::D3D11Swapchain;
pub use texture::D3D11Texture;

use crate::error::{Error, NativeCode, Result};
use crate::instance::{Backend, BackendFactory, Instance, InstanceInfo};
use std::any::Any;

const BACKEND: Backend = Backend::D3D11;

#[derive(Debug, Default, Clone, Copy)]
pub struct D3D11Backend;

impl BackendFactory for D3D11Backend {
    fn name(&self) -> &str {
        "D3D11"
    }

    fn backend(&self) -> Backend {
        BACKEND
    }

    fn create_instance(&self, info: &InstanceInfo) -> Result<Box<dyn Instance>> {
        Ok(Box::new(D3D11Instance::new(info)?))
    }
}

/// Attach the failing call to a `windows` error.
pub(crate) trait HrCheck<T> {
    fn check(self, operation: &'static str) -> Result<T>;
}

impl<T> HrCheck<T> for windows::core::Result<T> {
    fn check(self, operation: &'static str) -> Result<T> {
        self.map_err(|e| Error::operation_failed(operation, NativeCode::Hresult(e.code().0)))
    }
}

/// Unwrap the out-parameter of a successful create call.
pub(crate) fn created<T>(object: Option<T>, operation: &'static str) -> Result<T> {
    object.ok_or_else(|| Error::operation_failed(operation, NativeCode::Message("no object returned".into())))
}

fn cast<'a, T: 'static>(any: &'a dyn Any, what: &str) -> Result<&'a T> {
    super::downcast(any, BACKEND, what)
}

fn cast_mut<'a, T: 'static>(any: &'a mut dyn Any, what: &str) -> Result<&'a mut T> {
    super::downcast_mut(any, BACKEND, what)
}
