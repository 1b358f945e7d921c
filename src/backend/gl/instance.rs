// OpenGL instance and surface
//
// The context already exists when the instance is created, so the
// instance's job is loading entry points and checking the version. There
// is exactly one adapter: whatever renderer the context runs on.

use super::device::GlDevice;
use super::{cast, BACKEND};
use crate::device::Device;
use crate::diagnostics::targets;
use crate::error::{Error, Result};
use crate::instance::{Adapter, Backend, GlContext, Instance, InstanceInfo};
use crate::surface::{Surface, SurfaceInfo};
use glow::HasContext;
use std::any::Any;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

const REQUIRED_VERSION: (u32, u32) = (4, 3);

/// Reject contexts older than GL 4.3 or running OpenGL ES.
pub(super) fn ensure_version(major: u32, minor: u32, embedded: bool) -> Result<()> {
    if embedded {
        return Err(Error::PlatformNotSupported("OpenGL ES contexts are not supported".into()));
    }
    if (major, minor) < REQUIRED_VERSION {
        return Err(Error::PlatformNotSupported(format!(
            "OpenGL {}.{} is required, the context provides {}.{}",
            REQUIRED_VERSION.0, REQUIRED_VERSION.1, major, minor
        )));
    }
    Ok(())
}

pub struct GlInstance {
    gl: Rc<glow::Context>,
    context: GlContext,
    adapter: Adapter,
}

impl GlInstance {
    pub fn new(info: &InstanceInfo) -> Result<Self> {
        let context = info
            .gl
            .clone()
            .ok_or_else(|| Error::unsupported("the OpenGL backend needs InstanceInfo::gl (a current context)"))?;

        log::info!(target: targets::GENERAL, "Creating OpenGL instance: {}", info.app_name);

        let loader = context.get_proc_address.clone();
        let mut gl = unsafe { glow::Context::from_loader_function(|name| loader(name)) };

        let version = gl.version();
        ensure_version(version.major, version.minor, version.is_embedded)?;

        let renderer = unsafe { gl.get_parameter_string(glow::RENDERER) };
        let vendor = unsafe { gl.get_parameter_string(glow::VENDOR) };
        log::info!(
            target: targets::GENERAL,
            "OpenGL {}.{} on {} ({})",
            version.major,
            version.minor,
            renderer,
            vendor
        );

        if info.debug {
            install_debug_callback(&mut gl);
        }

        let mut hasher = DefaultHasher::new();
        renderer.hash(&mut hasher);
        vendor.hash(&mut hasher);
        let adapter = Adapter {
            handle: hasher.finish(),
            index: 0,
            name: renderer,
        };

        Ok(Self {
            gl: Rc::new(gl),
            context,
            adapter,
        })
    }
}

/// Route KHR_debug messages (core since 4.3) into the log targets.
fn install_debug_callback(gl: &mut glow::Context) {
    unsafe {
        gl.enable(glow::DEBUG_OUTPUT);
        gl.enable(glow::DEBUG_OUTPUT_SYNCHRONOUS);
        gl.debug_message_callback(|_source, ty, id, severity, message| {
            let target = match ty {
                glow::DEBUG_TYPE_PERFORMANCE => targets::PERFORMANCE,
                glow::DEBUG_TYPE_ERROR
                | glow::DEBUG_TYPE_UNDEFINED_BEHAVIOR
                | glow::DEBUG_TYPE_DEPRECATED_BEHAVIOR
                | glow::DEBUG_TYPE_PORTABILITY => targets::VALIDATION,
                _ => targets::GENERAL,
            };
            let level = match severity {
                glow::DEBUG_SEVERITY_HIGH => log::Level::Error,
                glow::DEBUG_SEVERITY_MEDIUM => log::Level::Warn,
                glow::DEBUG_SEVERITY_LOW => log::Level::Info,
                _ => log::Level::Debug,
            };
            log::log!(target: target, level, "[GL {}] {}", id, message);
        });
    }
    log::info!(target: targets::GENERAL, "OpenGL debug output enabled");
}

impl Instance for GlInstance {
    fn backend(&self) -> Backend {
        BACKEND
    }

    fn enumerate_adapters(&self) -> Result<Vec<Adapter>> {
        Ok(vec![self.adapter.clone()])
    }

    fn create_surface(&self, info: &SurfaceInfo) -> Result<Box<dyn Surface>> {
        // The context was made for this window by the host; nothing to create.
        log::debug!(target: targets::GENERAL, "Created {} surface (GL)", info.kind());
        Ok(Box::new(GlSurface { info: *info }))
    }

    fn create_device(&self, surface: Option<&dyn Surface>, adapter: Option<&Adapter>) -> Result<Box<dyn Device>> {
        if let Some(surface) = surface {
            cast::<GlSurface>(surface.as_any(), "surface")?;
        }
        if let Some(adapter) = adapter {
            if *adapter != self.adapter {
                return Err(Error::invalid_usage(format!(
                    "adapter '{}' does not belong to this OpenGL context",
                    adapter.name
                )));
            }
        }
        Ok(Box::new(GlDevice::new(
            self.gl.clone(),
            self.context.clone(),
            self.adapter.clone(),
            surface.is_some(),
        )?))
    }
}

/// A window the host already bound the GL context to.
pub struct GlSurface {
    info: SurfaceInfo,
}

impl Surface for GlSurface {
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
    fn version_gate() {
        assert!(ensure_version(4, 3, false).is_ok());
        assert!(ensure_version(4, 6, false).is_ok());
        assert!(matches!(ensure_version(4, 1, false), Err(Error::PlatformNotSupported(_))));
        assert!(matches!(ensure_version(3, 3, false), Err(Error::PlatformNotSupported(_))));
        assert!(ensure_version(3, 2, true).is_err());
    }

    #[test]
    fn missing_context_is_unsupported() {
        let err = GlInstance::new(&InstanceInfo::new("test", false)).err().unwrap();
        assert!(matches!(err, Error::UnsupportedFeature(_)));
    }
}
