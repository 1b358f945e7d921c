use std::cell::Cell;
use std::rc::Rc;
use tessera::backend::OpenGlBackend;
use tessera::config::Config;
use tessera::{
    Adapter, Backend, BackendFactory, BackendRegistry, Device, Error, Instance, InstanceInfo, Surface, SurfaceInfo,
};

struct StubInstance(Backend);

impl Instance for StubInstance {
    fn backend(&self) -> Backend {
        self.0
    }

    fn enumerate_adapters(&self) -> tessera::Result<Vec<Adapter>> {
        Ok(Vec::new())
    }

    fn create_surface(&self, _info: &SurfaceInfo) -> tessera::Result<Box<dyn Surface>> {
        Err(Error::unsupported("stub instance has no surfaces"))
    }

    fn create_device(&self, _: Option<&dyn Surface>, _: Option<&Adapter>) -> tessera::Result<Box<dyn Device>> {
        Err(Error::unsupported("stub instance has no devices"))
    }
}

/// Factory that counts its attempts and succeeds only when told to.
struct StubFactory {
    backend: Backend,
    works: bool,
    attempts: Rc<Cell<u32>>,
}

impl BackendFactory for StubFactory {
    fn name(&self) -> &str {
        "stub"
    }

    fn backend(&self) -> Backend {
        self.backend
    }

    fn create_instance(&self, _info: &InstanceInfo) -> tessera::Result<Box<dyn Instance>> {
        self.attempts.set(self.attempts.get() + 1);
        if self.works {
            Ok(Box::new(StubInstance(self.backend)))
        } else {
            Err(Error::PlatformNotSupported(format!("{} is unavailable", self.backend)))
        }
    }
}

fn info() -> InstanceInfo {
    InstanceInfo::new("registry-tests", false)
}

#[test]
fn empty_registry_has_no_platform() {
    let registry = BackendRegistry::new();
    assert!(registry.is_empty());
    assert!(matches!(registry.create_instance(&info()), Err(Error::PlatformNotSupported(_))));
}

#[test]
fn falls_through_to_the_first_working_backend() {
    let attempts = Rc::new(Cell::new(0));
    let mut registry = BackendRegistry::new();
    registry
        .register(StubFactory {
            backend: Backend::Vulkan,
            works: false,
            attempts: attempts.clone(),
        })
        .register(StubFactory {
            backend: Backend::OpenGL,
            works: true,
            attempts: attempts.clone(),
        })
        .register(StubFactory {
            backend: Backend::D3D11,
            works: true,
            attempts: attempts.clone(),
        });

    let instance = registry.create_instance(&info()).unwrap();
    assert_eq!(instance.backend(), Backend::OpenGL);
    // Nothing after the winner is tried.
    assert_eq!(attempts.get(), 2);
}

#[test]
fn opengl_without_a_context_is_skipped() {
    let mut registry = BackendRegistry::new();
    registry.register(OpenGlBackend).register(StubFactory {
        backend: Backend::Vulkan,
        works: true,
        attempts: Rc::new(Cell::new(0)),
    });

    let instance = registry.create_instance(&info()).unwrap();
    assert_eq!(instance.backend(), Backend::Vulkan);
}

#[test]
fn every_failure_is_reported() {
    let mut registry = BackendRegistry::new();
    registry.register(OpenGlBackend);

    match registry.create_instance(&info()) {
        Err(Error::PlatformNotSupported(message)) => assert!(message.contains("InstanceInfo::gl"), "{}", message),
        Err(other) => panic!("unexpected error: {:?}", other),
        Ok(_) => panic!("OpenGL cannot start without a context"),
    }
}

#[test]
fn config_order_drives_registration() {
    let mut config = Config::default();
    config.graphics.backends = vec!["gl".to_string(), "vulkan".to_string()];

    let mut registry = BackendRegistry::new();
    config.register_backends(&mut registry).unwrap();
    assert_eq!(registry.backends(), vec![Backend::OpenGL, Backend::Vulkan]);
}
