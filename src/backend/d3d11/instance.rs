// D3D11 instance: a DXGI factory and its adapters

use super::device::D3D11Device;
use super::{cast, HrCheck, BACKEND};
use crate::device::Device;
use crate::diagnostics::targets;
use crate::error::{Error, Result};
use crate::instance::{Adapter, Backend, Instance, InstanceInfo};
use crate::surface::{Surface, SurfaceInfo};
use std::any::Any;
use windows::Win32::Foundation::LUID;
use windows::Win32::Graphics::Dxgi::{CreateDXGIFactory1, IDXGIAdapter1, IDXGIFactory1, DXGI_ERROR_NOT_FOUND};

fn luid_handle(luid: LUID) -> u64 {
    ((luid.HighPart as u32 as u64) << 32) | luid.LowPart as u64
}

fn adapter_name(description: &[u16]) -> String {
    let len = description.iter().position(|&c| c == 0).unwrap_or(description.len());
    String::from_utf16_lossy(&description[..len])
}

pub struct D3D11Instance {
    factory: IDXGIFactory1,
    debug: bool,
}

impl D3D11Instance {
    pub fn new(info: &InstanceInfo) -> Result<Self> {
        log::info!(target: targets::GENERAL, "Creating D3D11 instance: {}", info.app_name);
        let factory: IDXGIFactory1 = unsafe { CreateDXGIFactory1() }.check("CreateDXGIFactory1")?;
        Ok(Self {
            factory,
            debug: info.debug,
        })
    }

    fn adapters(&self) -> Result<Vec<(IDXGIAdapter1, Adapter)>> {
        let mut adapters = Vec::new();
        for index in 0.. {
            let adapter = match unsafe { self.factory.EnumAdapters1(index) } {
                Ok(adapter) => adapter,
                Err(e) if e.code() == DXGI_ERROR_NOT_FOUND => break,
                Err(e) => return Err(e).check("IDXGIFactory1::EnumAdapters1"),
            };
            let desc = unsafe { adapter.GetDesc1() }.check("IDXGIAdapter1::GetDesc1")?;
            let info = Adapter {
                handle: luid_handle(desc.AdapterLuid),
                index,
                name: adapter_name(&desc.Description),
            };
            adapters.push((adapter, info));
        }
        Ok(adapters)
    }
}

impl Instance for D3D11Instance {
    fn backend(&self) -> Backend {
        BACKEND
    }

    fn enumerate_adapters(&self) -> Result<Vec<Adapter>> {
        Ok(self.adapters()?.into_iter().map(|(_, adapter)| adapter).collect())
    }

    fn create_surface(&self, info: &SurfaceInfo) -> Result<Box<dyn Surface>> {
        match info {
            SurfaceInfo::Win32 { .. } => Ok(Box::new(D3D11Surface { info: *info })),
            other => Err(Error::PlatformNotSupported(format!(
                "D3D11 can only present to Win32 windows, not {}",
                other.kind()
            ))),
        }
    }

    fn create_device(&self, surface: Option<&dyn Surface>, adapter: Option<&Adapter>) -> Result<Box<dyn Device>> {
        if let Some(surface) = surface {
            cast::<D3D11Surface>(surface.as_any(), "surface")?;
        }

        let mut adapters = self.adapters()?;
        let index = match adapter {
            Some(requested) => adapters
                .iter()
                .position(|(_, a)| a == requested)
                .ok_or_else(|| {
                    Error::invalid_usage(format!("adapter '{}' does not belong to this instance", requested.name))
                })?,
            None if adapters.is_empty() => return Err(Error::unsupported("no DXGI adapter found")),
            None => 0,
        };
        let (raw, adapter) = adapters.swap_remove(index);
        log::info!(target: targets::GENERAL, "Selected GPU: {}", adapter.name);

        Ok(Box::new(D3D11Device::new(
            self.factory.clone(),
            &raw,
            adapter,
            self.debug,
            surface.is_some(),
        )?))
    }
}

/// A Win32 window; the DXGI swapchain is created against its HWND.
pub struct D3D11Surface {
    pub(super) info: SurfaceInfo,
}

impl Surface for D3D11Surface {
    fn backend(&self) -> Backend {
        BACKEND
    }

    fn info(&self) -> &SurfaceInfo {
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
    fn luid_packs_high_and_low() {
        let luid = LUID {
            LowPart: 0x1234,
            HighPart: 1,
        };
        assert_eq!(luid_handle(luid), 0x1_0000_1234);
    }

    #[test]
    fn adapter_name_stops_at_nul() {
        let mut description = [0u16; 128];
        for (i, c) in "Test GPU".encode_utf16().enumerate() {
            description[i] = c;
        }
        assert_eq!(adapter_name(&description), "Test GPU");
    }
}
