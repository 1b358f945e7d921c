// Backend adapters
//
// One module per native API. Each provides a `BackendFactory` to register
// and one concrete type per resource trait.

use crate::error::{Error, Result};
use crate::instance::Backend;
use std::any::Any;

pub mod gl;
pub mod vulkan;

#[cfg(windows)]
pub mod d3d11;

pub use gl::OpenGlBackend;
pub use vulkan::VulkanBackend;

#[cfg(windows)]
pub use d3d11::D3D11Backend;

/// Recover a backend's concrete type from a trait object.
pub(crate) fn downcast<'a, T: 'static>(any: &'a dyn Any, backend: Backend, what: &str) -> Result<&'a T> {
    any.downcast_ref::<T>().ok_or_else(|| {
        Error::invalid_usage(format!("{} was not created by the {} backend", what, backend))
    })
}

pub(crate) fn downcast_mut<'a, T: 'static>(any: &'a mut dyn Any, backend: Backend, what: &str) -> Result<&'a mut T> {
    any.downcast_mut::<T>().ok_or_else(|| {
        Error::invalid_usage(format!("{} was not created by the {} backend", what, backend))
    })
}
