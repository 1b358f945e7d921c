// Surfaces - native window handles handed in by the host application
//
// The crate never creates windows. The host passes one of the handle pairs
// below, usually via `SurfaceInfo::from_window` on a winit window.

use crate::error::{Error, Result};
use crate::instance::Backend;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};
use std::any::Any;
use std::ffi::c_void;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceInfo {
    Win32 {
        hinstance: *mut c_void,
        hwnd: *mut c_void,
    },
    Xlib {
        display: *mut c_void,
        window: u64,
    },
    Xcb {
        connection: *mut c_void,
        window: u32,
    },
    Wayland {
        display: *mut c_void,
        surface: *mut c_void,
    },
}

impl SurfaceInfo {
    pub fn kind(&self) -> &'static str {
        match self {
            SurfaceInfo::Win32 { .. } => "Win32",
            SurfaceInfo::Xlib { .. } => "Xlib",
            SurfaceInfo::Xcb { .. } => "Xcb",
            SurfaceInfo::Wayland { .. } => "Wayland",
        }
    }

    /// Build from raw-window-handle values.
    pub fn from_raw_handles(display: RawDisplayHandle, window: RawWindowHandle) -> Result<Self> {
        match (display, window) {
            (_, RawWindowHandle::Win32(handle)) => Ok(SurfaceInfo::Win32 {
                hinstance: handle.hinstance.map_or(0, |h| h.get()) as *mut c_void,
                hwnd: handle.hwnd.get() as *mut c_void,
            }),
            (RawDisplayHandle::Xlib(display), RawWindowHandle::Xlib(window)) => {
                let display = display.display.ok_or_else(|| {
                    Error::PlatformNotSupported("Xlib display handle is missing".into())
                })?;
                Ok(SurfaceInfo::Xlib {
                    display: display.as_ptr(),
                    window: window.window as u64,
                })
            }
            (RawDisplayHandle::Xcb(display), RawWindowHandle::Xcb(window)) => {
                let connection = display.connection.ok_or_else(|| {
                    Error::PlatformNotSupported("XCB connection handle is missing".into())
                })?;
                Ok(SurfaceInfo::Xcb {
                    connection: connection.as_ptr(),
                    window: window.window.get(),
                })
            }
            (RawDisplayHandle::Wayland(display), RawWindowHandle::Wayland(window)) => {
                Ok(SurfaceInfo::Wayland {
                    display: display.display.as_ptr(),
                    surface: window.surface.as_ptr(),
                })
            }
            (display, window) => Err(Error::PlatformNotSupported(format!(
                "unsupported window handle combination: {:?} / {:?}",
                display, window
            ))),
        }
    }

    pub fn from_window<W>(window: &W) -> Result<Self>
    where
        W: HasWindowHandle + HasDisplayHandle + ?Sized,
    {
        let window_handle = window
            .window_handle()
            .map_err(|e| Error::PlatformNotSupported(format!("no window handle: {}", e)))?
            .as_raw();
        let display_handle = window
            .display_handle()
            .map_err(|e| Error::PlatformNotSupported(format!("no display handle: {}", e)))?
            .as_raw();
        Self::from_raw_handles(display_handle, window_handle)
    }
}

pub trait Surface {
    fn backend(&self) -> Backend;

    fn info(&self) -> &SurfaceInfo;

    fn as_any(&self) -> &dyn Any;
}

#[cfg(test)]
mod tests {
    use super::*;
    use raw_window_handle::{
        WaylandDisplayHandle, WaylandWindowHandle, Win32WindowHandle, WindowsDisplayHandle,
        XcbDisplayHandle, XcbWindowHandle,
    };
    use std::num::{NonZeroIsize, NonZeroU32};
    use std::ptr::NonNull;

    #[test]
    fn win32_handles() {
        let hwnd = NonZeroIsize::new(0x1000).unwrap();
        let mut window = Win32WindowHandle::new(hwnd);
        window.hinstance = NonZeroIsize::new(0x2000);

        let info = SurfaceInfo::from_raw_handles(
            RawDisplayHandle::Windows(WindowsDisplayHandle::new()),
            RawWindowHandle::Win32(window),
        )
        .unwrap();

        assert_eq!(
            info,
            SurfaceInfo::Win32 {
                hinstance: 0x2000 as *mut c_void,
                hwnd: 0x1000 as *mut c_void,
            }
        );
    }

    #[test]
    fn xcb_requires_connection() {
        let window = XcbWindowHandle::new(NonZeroU32::new(7).unwrap());
        let display = XcbDisplayHandle::new(None, 0);
        let err = SurfaceInfo::from_raw_handles(RawDisplayHandle::Xcb(display), RawWindowHandle::Xcb(window));
        assert!(matches!(err, Err(Error::PlatformNotSupported(_))));
    }

    #[test]
    fn wayland_handles() {
        let mut display_obj = 1u8;
        let mut surface_obj = 2u8;
        let display = WaylandDisplayHandle::new(NonNull::from(&mut display_obj).cast());
        let window = WaylandWindowHandle::new(NonNull::from(&mut surface_obj).cast());

        let info = SurfaceInfo::from_raw_handles(RawDisplayHandle::Wayland(display), RawWindowHandle::Wayland(window)).unwrap();
        assert_eq!(info.kind(), "Wayland");
    }

    #[test]
    fn mismatched_pairs_are_rejected() {
        let window = XcbWindowHandle::new(NonZeroU32::new(7).unwrap());
        let err = SurfaceInfo::from_raw_handles(
            RawDisplayHandle::Windows(WindowsDisplayHandle::new()),
            RawWindowHandle::Xcb(window),
        );
        assert!(err.is_err());
    }
}
