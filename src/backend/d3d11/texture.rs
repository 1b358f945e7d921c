// D3D11 textures
//
// Views are created up front from the usage flags, so binding a texture
// never allocates. Swapchain back buffers are wrapped with a render target
// view only.

use super::conv;
use super::device::DeviceShared;
use super::{created, HrCheck};
use crate::error::{Error, Result};
use crate::geometry::Region3D;
use crate::texture::{Texture, TextureInfo, TextureUsage};
use std::any::Any;
use std::rc::Rc;
use windows::Win32::Graphics::Direct3D11::*;
use windows::Win32::Graphics::Dxgi::Common::DXGI_SAMPLE_DESC;

fn bind_flags(usage: TextureUsage) -> u32 {
    let mut flags = 0;
    if usage.intersects(TextureUsage::SHADER_RESOURCE | TextureUsage::GENERATE_MIPS) {
        flags |= D3D11_BIND_SHADER_RESOURCE.0 as u32;
    }
    if usage.intersects(TextureUsage::COLOR_TARGET | TextureUsage::GENERATE_MIPS) {
        flags |= D3D11_BIND_RENDER_TARGET.0 as u32;
    }
    if usage.contains(TextureUsage::DEPTH_STENCIL_TARGET) {
        flags |= D3D11_BIND_DEPTH_STENCIL.0 as u32;
    }
    flags
}

pub struct D3D11Texture {
    pub(super) raw: ID3D11Texture2D,
    pub(super) srv: Option<ID3D11ShaderResourceView>,
    pub(super) rtv: Option<ID3D11RenderTargetView>,
    shared: Rc<DeviceShared>,
    info: TextureInfo,
}

impl D3D11Texture {
    pub(super) fn new(shared: Rc<DeviceShared>, info: &TextureInfo) -> Result<Self> {
        info.validate()?;
        if info.usage.contains(TextureUsage::DEPTH_STENCIL_TARGET)
            && info.usage.intersects(TextureUsage::SHADER_RESOURCE | TextureUsage::GENERATE_MIPS)
        {
            return Err(Error::unsupported(
                "D3D11 depth-stencil targets cannot also be sampled (typeless formats are not exposed)",
            ));
        }

        let mip_levels = info.resolved_mip_levels();
        let desc = D3D11_TEXTURE2D_DESC {
            Width: info.size.width,
            Height: info.size.height,
            MipLevels: mip_levels,
            ArraySize: info.array_size,
            Format: conv::format(info.format)?,
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            Usage: D3D11_USAGE_DEFAULT,
            BindFlags: bind_flags(info.usage),
            CPUAccessFlags: 0,
            MiscFlags: if info.usage.contains(TextureUsage::GENERATE_MIPS) {
                D3D11_RESOURCE_MISC_GENERATE_MIPS.0 as u32
            } else {
                0
            },
        };

        let mut raw = None;
        unsafe { shared.device.CreateTexture2D(&desc, None, Some(&mut raw)) }
            .check("ID3D11Device::CreateTexture2D")?;
        let raw: ID3D11Texture2D = created(raw, "ID3D11Device::CreateTexture2D")?;

        let device = &shared.device;
        let srv = if desc.BindFlags & D3D11_BIND_SHADER_RESOURCE.0 as u32 != 0 {
            let mut view = None;
            unsafe { device.CreateShaderResourceView(&raw, None, Some(&mut view)) }
                .check("ID3D11Device::CreateShaderResourceView")?;
            Some(created(view, "ID3D11Device::CreateShaderResourceView")?)
        } else {
            None
        };
        let rtv = if info.usage.contains(TextureUsage::COLOR_TARGET) {
            Some(create_rtv(device, &raw)?)
        } else {
            None
        };

        let mut info = *info;
        info.mip_levels = mip_levels;

        Ok(Self {
            raw,
            srv,
            rtv,
            shared,
            info,
        })
    }

    /// Wrap a swapchain back buffer.
    pub(super) fn from_swapchain(shared: Rc<DeviceShared>, raw: ID3D11Texture2D, info: TextureInfo) -> Result<Self> {
        let rtv = create_rtv(&shared.device, &raw)?;
        Ok(Self {
            raw,
            srv: None,
            rtv: Some(rtv),
            shared,
            info,
        })
    }

    /// Write tightly packed texels into mip 0.
    pub(super) fn upload(&self, region: &Region3D, data: &[u8]) -> Result<()> {
        if !region.fits_within(self.info.size) {
            return Err(Error::invalid_usage(format!(
                "region {:?} is outside a texture of {:?}",
                region, self.info.size
            )));
        }
        let format = self.info.format;
        let expected = format.data_size(region.size);
        if data.len() != expected {
            return Err(Error::invalid_usage(format!(
                "texture upload needs {} bytes for {:?}, got {}",
                expected, region.size, data.len()
            )));
        }

        let row_pitch = format.row_pitch(region.size.width);
        let dst = D3D11_BOX {
            left: region.offset.x as u32,
            top: region.offset.y as u32,
            front: 0,
            right: region.offset.x as u32 + region.size.width,
            bottom: region.offset.y as u32 + region.size.height,
            back: 1,
        };
        unsafe {
            self.shared.context.UpdateSubresource(
                &self.raw,
                0,
                Some(&dst),
                data.as_ptr().cast(),
                row_pitch,
                row_pitch * format.row_count(region.size.height),
            );
        }
        Ok(())
    }
}

fn create_rtv(device: &ID3D11Device1, raw: &ID3D11Texture2D) -> Result<ID3D11RenderTargetView> {
    let mut view = None;
    unsafe { device.CreateRenderTargetView(raw, None, Some(&mut view)) }
        .check("ID3D11Device::CreateRenderTargetView")?;
    created(view, "ID3D11Device::CreateRenderTargetView")
}

impl Texture for D3D11Texture {
    fn info(&self) -> &TextureInfo {
        &self.info
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_generation_needs_render_target_binding() {
        let flags = bind_flags(TextureUsage::SHADER_RESOURCE | TextureUsage::GENERATE_MIPS);
        assert_ne!(flags & D3D11_BIND_RENDER_TARGET.0 as u32, 0);
        assert_ne!(flags & D3D11_BIND_SHADER_RESOURCE.0 as u32, 0);
    }

    #[test]
    fn depth_targets_bind_depth_only() {
        assert_eq!(
            bind_flags(TextureUsage::DEPTH_STENCIL_TARGET),
            D3D11_BIND_DEPTH_STENCIL.0 as u32
        );
    }
}
