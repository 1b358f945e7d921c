// DXGI swapchain
//
// A classic discard-model swapchain. Only buffer 0 is ever rendered to:
// DXGI rotates the buffers behind it on Present.

use super::device::DeviceShared;
use super::instance::D3D11Surface;
use super::texture::D3D11Texture;
use super::{conv, HrCheck, BACKEND};
use crate::diagnostics::targets;
use crate::error::{Error, Result};
use crate::format::Format;
use crate::geometry::Size2D;
use crate::surface::SurfaceInfo;
use crate::swapchain::{PresentMode, Swapchain, SwapchainInfo};
use crate::texture::{Texture, TextureInfo, TextureUsage};
use std::rc::Rc;
use windows::Win32::Foundation::{HWND, TRUE};
use windows::Win32::Graphics::Direct3D11::ID3D11Texture2D;
use windows::Win32::Graphics::Dxgi::Common::{DXGI_FORMAT_UNKNOWN, DXGI_MODE_DESC, DXGI_SAMPLE_DESC};
use windows::Win32::Graphics::Dxgi::{
    IDXGISwapChain, DXGI_PRESENT, DXGI_SWAP_CHAIN_DESC, DXGI_SWAP_CHAIN_FLAG, DXGI_SWAP_EFFECT_DISCARD,
    DXGI_USAGE_RENDER_TARGET_OUTPUT,
};

pub struct D3D11Swapchain {
    shared: Rc<DeviceShared>,
    raw: IDXGISwapChain,
    texture: Option<D3D11Texture>,
    format: Format,
    size: Size2D,
    present_mode: PresentMode,
    num_buffers: u32,
}

impl D3D11Swapchain {
    pub(super) fn new(shared: Rc<DeviceShared>, surface: &D3D11Surface, info: &SwapchainInfo<'_>) -> Result<Self> {
        let SurfaceInfo::Win32 { hwnd, .. } = surface.info else {
            return Err(Error::PlatformNotSupported(format!(
                "D3D11 cannot present to a {} surface",
                surface.info.kind()
            )));
        };

        let desc = DXGI_SWAP_CHAIN_DESC {
            BufferDesc: DXGI_MODE_DESC {
                Width: info.size.width,
                Height: info.size.height,
                Format: conv::format(info.format)?,
                ..Default::default()
            },
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
            BufferCount: info.num_buffers,
            OutputWindow: HWND(hwnd),
            Windowed: TRUE,
            SwapEffect: DXGI_SWAP_EFFECT_DISCARD,
            Flags: 0,
        };

        let mut raw = None;
        unsafe { shared.factory.CreateSwapChain(&shared.device, &desc, &mut raw) }
            .ok()
            .check("IDXGIFactory::CreateSwapChain")?;
        let raw = super::created(raw, "IDXGIFactory::CreateSwapChain")?;

        let texture = back_buffer(&shared, &raw, info.format, info.size)?;

        log::info!(
            target: targets::GENERAL,
            "Created {} swapchain: {}x{} {:?}, {:?}, {} buffers",
            BACKEND,
            info.size.width,
            info.size.height,
            info.format,
            info.present_mode,
            info.num_buffers
        );

        Ok(Self {
            shared,
            raw,
            texture: Some(texture),
            format: info.format,
            size: info.size,
            present_mode: info.present_mode,
            num_buffers: info.num_buffers,
        })
    }
}

fn back_buffer(shared: &Rc<DeviceShared>, raw: &IDXGISwapChain, format: Format, size: Size2D) -> Result<D3D11Texture> {
    let buffer: ID3D11Texture2D = unsafe { raw.GetBuffer(0) }.check("IDXGISwapChain::GetBuffer")?;
    let info = TextureInfo::texture_2d(format, size.width, size.height, 1, TextureUsage::COLOR_TARGET);
    D3D11Texture::from_swapchain(shared.clone(), buffer, info)
}

impl Swapchain for D3D11Swapchain {
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
        match &self.texture {
            Some(texture) => Ok(texture),
            None => Err(Error::invalid_usage("swapchain lost its back buffer during a failed resize")),
        }
    }

    fn present(&mut self) -> Result<()> {
        unsafe { self.raw.Present(self.present_mode.swap_interval(), DXGI_PRESENT(0)) }
            .ok()
            .check("IDXGISwapChain::Present")
    }

    fn resize(&mut self, size: Size2D) -> Result<()> {
        if size.is_empty() {
            return Err(Error::invalid_usage(format!(
                "cannot resize a swapchain to {}x{}",
                size.width, size.height
            )));
        }
        if size == self.size && self.texture.is_some() {
            return Ok(());
        }

        // Every reference to the back buffer has to be gone before DXGI
        // will resize it, including the immediate context's bindings.
        self.texture = None;
        unsafe {
            self.shared.context.ClearState();
            self.shared.context.Flush();
            self.raw
                .ResizeBuffers(0, size.width, size.height, DXGI_FORMAT_UNKNOWN, DXGI_SWAP_CHAIN_FLAG(0))
        }
        .check("IDXGISwapChain::ResizeBuffers")?;

        self.texture = Some(back_buffer(&self.shared, &self.raw, self.format, size)?);
        self.size = size;
        log::debug!(target: targets::GENERAL, "{} swapchain resized to {}x{}", BACKEND, size.width, size.height);
        Ok(())
    }
}
