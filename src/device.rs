// Device - resource factory and submission point
//
// A device belongs to one backend and one adapter. It creates every GPU
// resource and is the only place command lists are submitted. It is not
// safe for concurrent use; one thread drives a device at a time.
//
// Creation and update calls that carry data block until the data is
// visible on the GPU. `execute_command_list` only queues work.

use crate::buffer::{Buffer, BufferInfo, BufferMapping};
use crate::command::CommandList;
use crate::descriptor::{Descriptor, DescriptorLayout, DescriptorLayoutInfo, DescriptorSet};
use crate::error::Result;
use crate::geometry::Region3D;
use crate::instance::{Adapter, Backend};
use crate::pipeline::{GraphicsPipelineInfo, Pipeline};
use crate::sampler::{Sampler, SamplerInfo};
use crate::shader::{ShaderMappingInfo, ShaderModule, ShaderStage};
use crate::swapchain::{Swapchain, SwapchainInfo};
use crate::texture::{Texture, TextureInfo};
use std::ptr::NonNull;

pub trait Device {
    fn backend(&self) -> Backend;

    fn adapter(&self) -> &Adapter;

    fn create_swapchain(&self, info: &SwapchainInfo<'_>) -> Result<Box<dyn Swapchain>>;

    fn create_command_list(&self) -> Result<Box<dyn CommandList>>;

    /// `code` is whatever the backend consumes: SPIR-V, DXBC or GLSL text.
    fn create_shader_module(
        &self,
        stage: ShaderStage,
        code: &[u8],
        entry_point: &str,
        mapping: Option<&ShaderMappingInfo>,
    ) -> Result<Box<dyn ShaderModule>>;

    fn create_graphics_pipeline(&self, info: &GraphicsPipelineInfo<'_>) -> Result<Box<dyn Pipeline>>;

    /// With `data`, the contents are visible as soon as this returns.
    fn create_buffer(&self, info: &BufferInfo, data: Option<&[u8]>) -> Result<Box<dyn Buffer>>;

    /// `data` fills mip 0, array layer 0.
    fn create_texture(&self, info: &TextureInfo, data: Option<&[u8]>) -> Result<Box<dyn Texture>>;

    fn create_sampler(&self, info: &SamplerInfo) -> Result<Box<dyn Sampler>>;

    fn create_descriptor_layout(&self, info: &DescriptorLayoutInfo) -> Result<Box<dyn DescriptorLayout>>;

    fn create_descriptor_set(
        &self,
        layout: &dyn DescriptorLayout,
        descriptors: &[Descriptor<'_>],
    ) -> Result<Box<dyn DescriptorSet>>;

    /// Queue a recorded list. Lists run in submission order.
    fn execute_command_list(&self, list: &mut dyn CommandList) -> Result<()>;

    fn update_buffer(&self, buffer: &dyn Buffer, offset: u32, data: &[u8]) -> Result<()>;

    fn update_texture(&self, texture: &dyn Texture, region: &Region3D, data: &[u8]) -> Result<()>;

    /// Raw mapping. Prefer [`map`](#method.map), which unmaps on drop.
    ///
    /// The pointer covers `size_in_bytes` bytes and is valid until
    /// `unmap_buffer`.
    fn map_buffer(&self, buffer: &dyn Buffer) -> Result<NonNull<u8>>;

    fn unmap_buffer(&self, buffer: &dyn Buffer) -> Result<()>;

    /// Block until all submitted work has finished.
    fn wait_idle(&self) -> Result<()>;
}

impl<'d> dyn Device + 'd {
    /// Map a buffer for CPU access for the lifetime of the returned guard.
    pub fn map<'a>(&'a self, buffer: &'a dyn Buffer) -> Result<BufferMapping<'a>> {
        BufferMapping::new(self, buffer)
    }

    /// `update_buffer` for typed data, `offset` in bytes.
    pub fn write_slice<T: bytemuck::Pod>(&self, buffer: &dyn Buffer, offset: u32, data: &[T]) -> Result<()> {
        self.update_buffer(buffer, offset, bytemuck::cast_slice(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Callers hold devices as `&dyn Device` borrowed from a box; the helpers
    // must not demand a `'static` trait object.
    fn first_byte<'d>(device: &(dyn Device + 'd), buffer: &dyn Buffer) -> Result<u8> {
        device.write_slice(buffer, 0, &[7u8])?;
        let mapping = device.map(buffer)?;
        Ok(mapping[0])
    }

    #[test]
    fn helpers_accept_borrowed_devices() {
        let read: for<'d> fn(&(dyn Device + 'd), &dyn Buffer) -> Result<u8> = first_byte;
        let _ = read;
    }
}
