// Vulkan backend
//
// Requires Vulkan 1.3: rendering uses dynamic rendering (no render pass or
// framebuffer objects) and vertex strides are set at bind time.
//
// Native objects are shared through two Arc'd contexts:
// - InstanceShared: loader, instance, surface functions, debug messenger
// - DeviceShared: logical device, allocator, queue, upload context
// Every resource holds the context it was created from, so drop order
// between resources and their device never matters.

mod buffer;
mod command;
mod conv;
mod descriptor;
mod device;
mod instance;
mod pipeline;
mod sampler;
mod shader;
mod surface;
mod swapchain;
mod sync;
mod texture;

pub use buffer::VulkanBuffer;
pub use command::VulkanCommandList;
pub use descriptor::{VulkanDescriptorLayout, VulkanDescriptorSet};
pub use device::VulkanDevice;
pub use instance::VulkanInstance;
pub use pipeline::VulkanPipeline;
pub use sampler::VulkanSampler;
pub use shader::VulkanShaderModule;
pub use surface::VulkanSurface;
pub use swapchain::VulkanSwapchain;
pub use texture::VulkanTexture;

use crate::error::{Error, NativeCode, Result};
use crate::instance::{Backend, BackendFactory, Instance, InstanceInfo};
use ash::prelude::VkResult;
use std::any::Any;

const BACKEND: Backend = Backend::Vulkan;

/// Factory to register on a `BackendRegistry`.
#[derive(Debug, Default, Clone, Copy)]
pub struct VulkanBackend;

impl BackendFactory for VulkanBackend {
    fn name(&self) -> &str {
        "Vulkan"
    }

    fn backend(&self) -> Backend {
        BACKEND
    }

    fn create_instance(&self, info: &InstanceInfo) -> Result<Box<dyn Instance>> {
        Ok(Box::new(VulkanInstance::new(info)?))
    }
}

/// Attach the failing entry point to a raw `VkResult`.
pub(crate) trait VkCheck<T> {
    fn check(self, operation: &'static str) -> Result<T>;
}

impl<T> VkCheck<T> for VkResult<T> {
    fn check(self, operation: &'static str) -> Result<T> {
        self.map_err(|code| Error::operation_failed(operation, NativeCode::Vulkan(code)))
    }
}

fn allocator_error(operation: &'static str, e: gpu_allocator::AllocationError) -> Error {
    Error::operation_failed(operation, NativeCode::Allocator(e.to_string()))
}

fn cast<'a, T: 'static>(any: &'a dyn Any, what: &str) -> Result<&'a T> {
    super::downcast(any, BACKEND, what)
}

fn cast_mut<'a, T: 'static>(any: &'a mut dyn Any, what: &str) -> Result<&'a mut T> {
    super::downcast_mut(any, BACKEND, what)
}
