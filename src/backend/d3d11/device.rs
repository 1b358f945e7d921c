// D3D11 device
//
// Owns the ID3D11Device1 and its immediate context. The immediate context
// does all blocking work (initial data, updates, maps) and replays the
// deferred command lists.

use super::buffer::D3D11Buffer;
use super::command::D3D11CommandList;
use super::descriptor::{D3D11DescriptorLayout, D3D11DescriptorSet};
use super::instance::D3D11Surface;
use super::pipeline::D3D11Pipeline;
use super::sampler::D3D11Sampler;
use super::shader::D3D11ShaderModule;
use super::swapchain::D3D11Swapchain;
use super::texture::D3D11Texture;
use super::{cast, cast_mut, created, HrCheck, BACKEND};
use crate::buffer::{Buffer, BufferInfo};
use crate::command::CommandList;
use crate::descriptor::{Descriptor, DescriptorLayout, DescriptorLayoutInfo, DescriptorSet};
use crate::device::Device;
use crate::diagnostics::targets;
use crate::error::Result;
use crate::geometry::Region3D;
use crate::instance::{Adapter, Backend};
use crate::pipeline::{GraphicsPipelineInfo, Pipeline};
use crate::sampler::{Sampler, SamplerInfo};
use crate::shader::{ShaderMappingInfo, ShaderModule, ShaderStage};
use crate::swapchain::{Swapchain, SwapchainInfo};
use crate::texture::{Texture, TextureInfo};
use std::ptr::NonNull;
use std::rc::Rc;
use windows::core::Interface;
use windows::Win32::Foundation::HMODULE;
use windows::Win32::Graphics::Direct3D::{D3D_DRIVER_TYPE_UNKNOWN, D3D_FEATURE_LEVEL_11_1};
use windows::Win32::Graphics::Direct3D11::*;
use windows::Win32::Graphics::Dxgi::{IDXGIAdapter, IDXGIAdapter1, IDXGIFactory1};

/// Native state shared by the device and every resource it creates.
pub(super) struct DeviceShared {
    pub factory: IDXGIFactory1,
    pub device: ID3D11Device1,
    pub context: ID3D11DeviceContext1,
}

impl Drop for DeviceShared {
    fn drop(&mut self) {
        log::info!(target: targets::GENERAL, "Destroying D3D11 device...");
        unsafe {
            self.context.ClearState();
            self.context.Flush();
        }
    }
}

pub struct D3D11Device {
    shared: Rc<DeviceShared>,
    adapter: Adapter,
    has_surface: bool,
}

impl D3D11Device {
    pub(super) fn new(
        factory: IDXGIFactory1,
        adapter: &IDXGIAdapter1,
        info: Adapter,
        debug: bool,
        has_surface: bool,
    ) -> Result<Self> {
        let mut flags = D3D11_CREATE_DEVICE_BGRA_SUPPORT;
        if debug {
            flags |= D3D11_CREATE_DEVICE_DEBUG;
        }

        let adapter: IDXGIAdapter = adapter.cast().check("IDXGIAdapter1::QueryInterface")?;
        let mut device = None;
        let mut context = None;
        unsafe {
            D3D11CreateDevice(
                &adapter,
                D3D_DRIVER_TYPE_UNKNOWN,
                HMODULE::default(),
                flags,
                Some(&[D3D_FEATURE_LEVEL_11_1]),
                D3D11_SDK_VERSION,
                Some(&mut device),
                None,
                Some(&mut context),
            )
        }
        .check("D3D11CreateDevice")?;

        let device: ID3D11Device = created(device, "D3D11CreateDevice")?;
        let context: ID3D11DeviceContext = created(context, "D3D11CreateDevice")?;
        let device: ID3D11Device1 = device.cast().check("ID3D11Device::QueryInterface")?;
        let context: ID3D11DeviceContext1 = context.cast().check("ID3D11DeviceContext::QueryInterface")?;

        log::info!(
            target: targets::GENERAL,
            "D3D11 device ready (feature level 11.1, debug layer: {})",
            debug
        );

        Ok(Self {
            shared: Rc::new(DeviceShared {
                factory,
                device,
                context,
            }),
            adapter: info,
            has_surface,
        })
    }
}

impl Device for D3D11Device {
    fn backend(&self) -> Backend {
        BACKEND
    }

    fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    fn create_swapchain(&self, info: &SwapchainInfo<'_>) -> Result<Box<dyn Swapchain>> {
        info.validate()?;
        let surface = cast::<D3D11Surface>(info.surface.as_any(), "surface")?;
        if !self.has_surface {
            return Err(crate::Error::invalid_usage("the device was created without a surface"));
        }
        Ok(Box::new(D3D11Swapchain::new(self.shared.clone(), surface, info)?))
    }

    fn create_command_list(&self) -> Result<Box<dyn CommandList>> {
        Ok(Box::new(D3D11CommandList::new(self.shared.clone())?))
    }

    fn create_shader_module(
        &self,
        stage: ShaderStage,
        code: &[u8],
        entry_point: &str,
        mapping: Option<&ShaderMappingInfo>,
    ) -> Result<Box<dyn ShaderModule>> {
        crate::shader::require_single_stage(stage)?;
        Ok(Box::new(D3D11ShaderModule::new(&self.shared, stage, code, entry_point, mapping)?))
    }

    fn create_graphics_pipeline(&self, info: &GraphicsPipelineInfo<'_>) -> Result<Box<dyn Pipeline>> {
        info.validate()?;
        Ok(Box::new(D3D11Pipeline::new(&self.shared, info)?))
    }

    fn create_buffer(&self, info: &BufferInfo, data: Option<&[u8]>) -> Result<Box<dyn Buffer>> {
        Ok(Box::new(D3D11Buffer::new(self.shared.clone(), info, data)?))
    }

    fn create_texture(&self, info: &TextureInfo, data: Option<&[u8]>) -> Result<Box<dyn Texture>> {
        let texture = D3D11Texture::new(self.shared.clone(), info)?;
        if let Some(data) = data {
            texture.upload(&Region3D::whole(info.size), data)?;
        }
        Ok(Box::new(texture))
    }

    fn create_sampler(&self, info: &SamplerInfo) -> Result<Box<dyn Sampler>> {
        Ok(Box::new(D3D11Sampler::new(&self.shared, info)?))
    }

    fn create_descriptor_layout(&self, info: &DescriptorLayoutInfo) -> Result<Box<dyn DescriptorLayout>> {
        Ok(Box::new(D3D11DescriptorLayout::new(info)?))
    }

    fn create_descriptor_set(
        &self,
        layout: &dyn DescriptorLayout,
        descriptors: &[Descriptor<'_>],
    ) -> Result<Box<dyn DescriptorSet>> {
        let layout = cast::<D3D11DescriptorLayout>(layout.as_any(), "descriptor layout")?;
        Ok(Box::new(D3D11DescriptorSet::new(layout, descriptors)?))
    }

    fn execute_command_list(&self, list: &mut dyn CommandList) -> Result<()> {
        cast_mut::<D3D11CommandList>(list.as_any_mut(), "command list")?.execute()
    }

    fn update_buffer(&self, buffer: &dyn Buffer, offset: u32, data: &[u8]) -> Result<()> {
        cast::<D3D11Buffer>(buffer.as_any(), "buffer")?.upload(offset, data)
    }

    fn update_texture(&self, texture: &dyn Texture, region: &Region3D, data: &[u8]) -> Result<()> {
        cast::<D3D11Texture>(texture.as_any(), "texture")?.upload(region, data)
    }

    fn map_buffer(&self, buffer: &dyn Buffer) -> Result<NonNull<u8>> {
        cast::<D3D11Buffer>(buffer.as_any(), "buffer")?.map()
    }

    fn unmap_buffer(&self, buffer: &dyn Buffer) -> Result<()> {
        cast::<D3D11Buffer>(buffer.as_any(), "buffer")?.unmap()
    }

    fn wait_idle(&self) -> Result<()> {
        wait_for_gpu(&self.shared)
    }
}

/// Flush the immediate context and spin on an event query until the GPU
/// has caught up.
pub(super) fn wait_for_gpu(shared: &DeviceShared) -> Result<()> {
    let desc = D3D11_QUERY_DESC {
        Query: D3D11_QUERY_EVENT,
        MiscFlags: 0,
    };
    let mut query = None;
    unsafe { shared.device.CreateQuery(&desc, Some(&mut query)) }.check("ID3D11Device::CreateQuery")?;
    let query: ID3D11Query = created(query, "ID3D11Device::CreateQuery")?;

    unsafe {
        shared.context.End(&query);
        shared.context.Flush();
    }
    loop {
        let mut done = 0u32;
        let status = unsafe {
            shared.context.GetData(
                &query,
                Some(&mut done as *mut u32 as *mut _),
                std::mem::size_of::<u32>() as u32,
                0,
            )
        };
        status.check("ID3D11DeviceContext::GetData")?;
        if done != 0 {
            return Ok(());
        }
        std::thread::yield_now();
    }
}
