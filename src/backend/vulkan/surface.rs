// Vulkan surfaces from native window handles

use super::instance::InstanceShared;
use super::{VkCheck, BACKEND};
use crate::error::{Error, Result};
use crate::instance::Backend;
use crate::surface::{Surface, SurfaceInfo};
use ash::extensions::khr;
use ash::vk;
use std::any::Any;
use std::ffi::CStr;
use std::sync::Arc;

pub struct VulkanSurface {
    instance: Arc<InstanceShared>,
    pub(super) raw: vk::SurfaceKHR,
    info: SurfaceInfo,
}

impl VulkanSurface {
    pub(super) fn new(instance: Arc<InstanceShared>, info: &SurfaceInfo) -> Result<Self> {
        let require = |name: &CStr| {
            if instance.has_surface_extension(name) {
                Ok(())
            } else {
                Err(Error::PlatformNotSupported(format!(
                    "{} surfaces need {}, which the Vulkan loader does not offer",
                    info.kind(),
                    name.to_string_lossy()
                )))
            }
        };

        let raw = match *info {
            SurfaceInfo::Win32 { hinstance, hwnd } => {
                require(khr::Win32Surface::name())?;
                let create_info = vk::Win32SurfaceCreateInfoKHR::builder()
                    .hinstance(hinstance.cast_const())
                    .hwnd(hwnd.cast_const());
                let loader = khr::Win32Surface::new(&instance.entry, &instance.instance);
                unsafe { loader.create_win32_surface(&create_info, None) }.check("vkCreateWin32SurfaceKHR")?
            }
            SurfaceInfo::Xlib { display, window } => {
                require(khr::XlibSurface::name())?;
                let create_info = vk::XlibSurfaceCreateInfoKHR::builder()
                    .dpy(display.cast())
                    .window(window as vk::Window);
                let loader = khr::XlibSurface::new(&instance.entry, &instance.instance);
                unsafe { loader.create_xlib_surface(&create_info, None) }.check("vkCreateXlibSurfaceKHR")?
            }
            SurfaceInfo::Xcb { connection, window } => {
                require(khr::XcbSurface::name())?;
                let create_info = vk::XcbSurfaceCreateInfoKHR::builder()
                    .connection(connection.cast())
                    .window(window);
                let loader = khr::XcbSurface::new(&instance.entry, &instance.instance);
                unsafe { loader.create_xcb_surface(&create_info, None) }.check("vkCreateXcbSurfaceKHR")?
            }
            SurfaceInfo::Wayland { display, surface } => {
                require(khr::WaylandSurface::name())?;
                let create_info = vk::WaylandSurfaceCreateInfoKHR::builder()
                    .display(display.cast())
                    .surface(surface.cast());
                let loader = khr::WaylandSurface::new(&instance.entry, &instance.instance);
                unsafe { loader.create_wayland_surface(&create_info, None) }.check("vkCreateWaylandSurfaceKHR")?
            }
        };

        log::debug!(target: crate::diagnostics::targets::GENERAL, "Created {} surface", info.kind());

        Ok(Self {
            instance,
            raw,
            info: *info,
        })
    }
}

impl Surface for VulkanSurface {
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

impl Drop for VulkanSurface {
    fn drop(&mut self) {
        unsafe { self.instance.surface_fn.destroy_surface(self.raw, None) };
    }
}
