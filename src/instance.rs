// Instance and backend registry
//
// An application registers the backends it wants, in order of preference,
// on an explicit `BackendRegistry`. `create_instance` tries each one and
// keeps the first that initializes; failures are logged and skipped.

use crate::device::Device;
use crate::error::{Error, Result};
use crate::surface::{Surface, SurfaceInfo};
use serde::{Deserialize, Serialize};
use std::ffi::c_void;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Vulkan,
    D3D11,
    #[serde(rename = "opengl")]
    OpenGL,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Backend::Vulkan => "Vulkan",
            Backend::D3D11 => "D3D11",
            Backend::OpenGL => "OpenGL",
        })
    }
}

impl FromStr for Backend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "vulkan" | "vk" => Ok(Backend::Vulkan),
            "d3d11" | "dx11" => Ok(Backend::D3D11),
            "opengl" | "gl" => Ok(Backend::OpenGL),
            other => Err(Error::invalid_usage(format!("unknown backend '{}'", other))),
        }
    }
}

/// Snapshot of a physical GPU. Two adapters are equal if they refer to the
/// same native handle.
#[derive(Debug, Clone)]
pub struct Adapter {
    pub handle: u64,
    pub index: u32,
    pub name: String,
}

impl PartialEq for Adapter {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl Eq for Adapter {}

/// Entry points an OpenGL host must supply. The context has to be current
/// on the thread that drives the device.
#[derive(Clone)]
pub struct GlContext {
    pub get_proc_address: Arc<dyn Fn(&str) -> *const c_void>,
    /// Swap buffers with the given interval.
    pub present: Arc<dyn Fn(u32)>,
}

impl GlContext {
    pub fn new(
        get_proc_address: impl Fn(&str) -> *const c_void + 'static,
        present: impl Fn(u32) + 'static,
    ) -> Self {
        Self {
            get_proc_address: Arc::new(get_proc_address),
            present: Arc::new(present),
        }
    }
}

impl fmt::Debug for GlContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlContext").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct InstanceInfo {
    pub app_name: String,
    /// Enables validation layers / debug devices where the backend has them.
    pub debug: bool,
    pub gl: Option<GlContext>,
}

impl InstanceInfo {
    pub fn new(app_name: impl Into<String>, debug: bool) -> Self {
        Self {
            app_name: app_name.into(),
            debug,
            gl: None,
        }
    }

    pub fn with_gl_context(mut self, context: GlContext) -> Self {
        self.gl = Some(context);
        self
    }
}

pub trait Instance {
    fn backend(&self) -> Backend;

    fn enumerate_adapters(&self) -> Result<Vec<Adapter>>;

    fn create_surface(&self, info: &SurfaceInfo) -> Result<Box<dyn Surface>>;

    /// `surface` selects a queue that can present to it; without one the
    /// device is headless. `adapter` defaults to the first suitable one.
    fn create_device(
        &self,
        surface: Option<&dyn Surface>,
        adapter: Option<&Adapter>,
    ) -> Result<Box<dyn Device>>;
}

pub trait BackendFactory {
    fn name(&self) -> &str;

    fn backend(&self) -> Backend;

    fn create_instance(&self, info: &InstanceInfo) -> Result<Box<dyn Instance>>;
}

/// Ordered list of backend factories.
#[derive(Default)]
pub struct BackendRegistry {
    factories: Vec<Box<dyn BackendFactory>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, factory: impl BackendFactory + 'static) -> &mut Self {
        log::debug!(target: crate::diagnostics::targets::GENERAL, "Registered backend: {}", factory.name());
        self.factories.push(Box::new(factory));
        self
    }

    pub fn backends(&self) -> Vec<Backend> {
        self.factories.iter().map(|f| f.backend()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Create an instance from the first backend that initializes.
    pub fn create_instance(&self, info: &InstanceInfo) -> Result<Box<dyn Instance>> {
        let mut failures = Vec::new();

        for factory in &self.factories {
            log::info!(target: crate::diagnostics::targets::GENERAL, "Trying backend: {}", factory.name());
            match factory.create_instance(info) {
                Ok(instance) => {
                    log::info!(target: crate::diagnostics::targets::GENERAL, "Using backend: {}", factory.name());
                    return Ok(instance);
                }
                Err(e) => {
                    log::warn!(
                        target: crate::diagnostics::targets::GENERAL,
                        "Failed to create {} instance: {}",
                        factory.name(),
                        e
                    );
                    failures.push(format!("{}: {}", factory.name(), e));
                }
            }
        }

        if failures.is_empty() {
            return Err(Error::PlatformNotSupported("no backends are registered".into()));
        }
        Err(Error::PlatformNotSupported(format!(
            "no backend could be initialized ({})",
            failures.join("; ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct FakeInstance(Backend);

    impl Instance for FakeInstance {
        fn backend(&self) -> Backend {
            self.0
        }

        fn enumerate_adapters(&self) -> Result<Vec<Adapter>> {
            Ok(Vec::new())
        }

        fn create_surface(&self, _info: &SurfaceInfo) -> Result<Box<dyn Surface>> {
            Err(Error::not_implemented(self.0, "create_surface"))
        }

        fn create_device(&self, _: Option<&dyn Surface>, _: Option<&Adapter>) -> Result<Box<dyn Device>> {
            Err(Error::not_implemented(self.0, "create_device"))
        }
    }

    struct FakeFactory {
        backend: Backend,
        works: bool,
        calls: Rc<RefCell<Vec<Backend>>>,
    }

    impl BackendFactory for FakeFactory {
        fn name(&self) -> &str {
            "fake"
        }

        fn backend(&self) -> Backend {
            self.backend
        }

        fn create_instance(&self, _info: &InstanceInfo) -> Result<Box<dyn Instance>> {
            self.calls.borrow_mut().push(self.backend);
            if self.works {
                Ok(Box::new(FakeInstance(self.backend)))
            } else {
                Err(Error::unsupported("not on this machine"))
            }
        }
    }

    fn registry(entries: &[(Backend, bool)]) -> (BackendRegistry, Rc<RefCell<Vec<Backend>>>) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut registry = BackendRegistry::new();
        for &(backend, works) in entries {
            registry.register(FakeFactory {
                backend,
                works,
                calls: calls.clone(),
            });
        }
        (registry, calls)
    }

    #[test]
    fn first_working_backend_wins() {
        let (registry, calls) = registry(&[
            (Backend::OpenGL, false),
            (Backend::D3D11, true),
            (Backend::Vulkan, true),
        ]);

        let instance = registry.create_instance(&InstanceInfo::new("test", false)).unwrap();
        assert_eq!(instance.backend(), Backend::D3D11);
        assert_eq!(*calls.borrow(), vec![Backend::OpenGL, Backend::D3D11]);
    }

    #[test]
    fn all_failures_are_platform_not_supported() {
        let (registry, calls) = registry(&[(Backend::Vulkan, false), (Backend::OpenGL, false)]);

        let err = registry.create_instance(&InstanceInfo::new("test", false)).err().unwrap();
        assert!(matches!(err, Error::PlatformNotSupported(_)));
        assert_eq!(calls.borrow().len(), 2);
    }

    #[test]
    fn empty_registry_is_platform_not_supported() {
        let registry = BackendRegistry::new();
        assert!(matches!(
            registry.create_instance(&InstanceInfo::new("test", false)),
            Err(Error::PlatformNotSupported(_))
        ));
    }

    #[test]
    fn adapters_compare_by_handle() {
        let a = Adapter { handle: 7, index: 0, name: "GPU".into() };
        let b = Adapter { handle: 7, index: 1, name: "Same GPU, renamed".into() };
        let c = Adapter { handle: 8, index: 0, name: "GPU".into() };
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn backend_names_parse() {
        assert_eq!("Vulkan".parse::<Backend>().unwrap(), Backend::Vulkan);
        assert_eq!("gl".parse::<Backend>().unwrap(), Backend::OpenGL);
        assert!("metal".parse::<Backend>().is_err());
    }
}
