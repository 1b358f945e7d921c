// Vulkan instance
//
// Responsibilities:
// - Loader and instance creation, API version gate (1.3)
// - Validation layer + debug messenger when InstanceInfo::debug is set
// - Physical device enumeration for Adapter snapshots

use super::device::VulkanDevice;
use super::surface::VulkanSurface;
use super::{cast, VkCheck, BACKEND};
use crate::diagnostics::targets;
use crate::error::{Error, Result};
use crate::instance::{Adapter, Backend, Instance, InstanceInfo};
use crate::surface::{Surface, SurfaceInfo};
use ash::extensions::{ext, khr};
use ash::vk::{self, Handle};
use ash::Entry;
use std::ffi::{c_void, CStr, CString};
use std::sync::Arc;

pub(super) const REQUIRED_API_VERSION: u32 = vk::API_VERSION_1_3;

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Reject loaders and devices older than the required API version.
pub(super) fn ensure_api_version(what: &str, version: u32) -> Result<()> {
    if version < REQUIRED_API_VERSION {
        return Err(Error::unsupported(format!(
            "{} supports Vulkan {}.{}, but 1.3 is required",
            what,
            vk::api_version_major(version),
            vk::api_version_minor(version)
        )));
    }
    Ok(())
}

/// Native instance state shared by the instance, its surfaces and devices.
pub(super) struct InstanceShared {
    pub entry: Entry,
    pub instance: ash::Instance,
    pub surface_fn: khr::Surface,
    /// Window-system surface extensions that were enabled.
    pub surface_extensions: Vec<&'static CStr>,
    debug_utils: Option<(ext::DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl InstanceShared {
    pub fn has_surface_extension(&self, name: &CStr) -> bool {
        self.surface_extensions.contains(&name)
    }
}

impl Drop for InstanceShared {
    fn drop(&mut self) {
        log::info!(target: targets::GENERAL, "Destroying Vulkan instance...");
        unsafe {
            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

pub struct VulkanInstance {
    shared: Arc<InstanceShared>,
}

impl VulkanInstance {
    pub fn new(info: &InstanceInfo) -> Result<Self> {
        log::info!(target: targets::GENERAL, "Creating Vulkan instance: {}", info.app_name);

        // Step 1: Load Vulkan library
        let entry = unsafe { Entry::load() }.map_err(|e| {
            Error::PlatformNotSupported(format!("failed to load the Vulkan library: {}", e))
        })?;

        // Step 2: Check loader version
        let version = entry
            .try_enumerate_instance_version()
            .check("vkEnumerateInstanceVersion")?
            .unwrap_or(vk::API_VERSION_1_0);
        ensure_api_version("the Vulkan loader", version)?;

        // Step 3: Pick extensions and layers
        let available = entry
            .enumerate_instance_extension_properties(None)
            .check("vkEnumerateInstanceExtensionProperties")?;
        let has = |name: &CStr| {
            available
                .iter()
                .any(|ext| unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) } == name)
        };

        if !has(khr::Surface::name()) {
            return Err(Error::unsupported("VK_KHR_surface is not available"));
        }
        let surface_extensions: Vec<&'static CStr> = [
            khr::Win32Surface::name(),
            khr::XlibSurface::name(),
            khr::XcbSurface::name(),
            khr::WaylandSurface::name(),
        ]
        .into_iter()
        .filter(|name| has(name))
        .collect();

        let enable_debug_utils = info.debug && has(ext::DebugUtils::name());
        let enable_validation = info.debug && Self::has_validation_layer(&entry)?;
        if info.debug && !enable_validation {
            log::warn!(target: targets::GENERAL, "Vulkan validation layer requested but not installed");
        }

        let mut extensions = vec![khr::Surface::name().as_ptr()];
        extensions.extend(surface_extensions.iter().map(|name| name.as_ptr()));
        if enable_debug_utils {
            extensions.push(ext::DebugUtils::name().as_ptr());
        }
        let layers = if enable_validation {
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            vec![]
        };

        // Step 4: Create instance
        let app_name = CString::new(info.app_name.as_str())
            .map_err(|_| Error::invalid_usage("application name contains a NUL byte"))?;
        let engine_name = c"tessera";

        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(engine_name)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(REQUIRED_API_VERSION);

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);

        let instance = unsafe { entry.create_instance(&create_info, None) }.check("vkCreateInstance")?;

        // Step 5: Debug messenger
        let debug_utils = if enable_debug_utils {
            match Self::setup_debug_messenger(&entry, &instance) {
                Ok(messenger) => Some(messenger),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        let surface_fn = khr::Surface::new(&entry, &instance);

        log::info!(
            target: targets::GENERAL,
            "Vulkan instance ready (validation: {}, surface extensions: {:?})",
            enable_validation,
            surface_extensions
        );

        Ok(Self {
            shared: Arc::new(InstanceShared {
                entry,
                instance,
                surface_fn,
                surface_extensions,
                debug_utils,
            }),
        })
    }

    fn has_validation_layer(entry: &Entry) -> Result<bool> {
        let layers = entry
            .enumerate_instance_layer_properties()
            .check("vkEnumerateInstanceLayerProperties")?;
        Ok(layers
            .iter()
            .any(|layer| unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) } == VALIDATION_LAYER))
    }

    fn setup_debug_messenger(
        entry: &Entry,
        instance: &ash::Instance,
    ) -> Result<(ext::DebugUtils, vk::DebugUtilsMessengerEXT)> {
        let debug_utils = ext::DebugUtils::new(entry, instance);

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                    | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }
            .check("vkCreateDebugUtilsMessengerEXT")?;

        Ok((debug_utils, messenger))
    }

    /// Physical devices that meet the API version, paired with their snapshot.
    pub(super) fn suitable_devices(shared: &InstanceShared) -> Result<Vec<(vk::PhysicalDevice, Adapter)>> {
        let devices = unsafe { shared.instance.enumerate_physical_devices() }.check("vkEnumeratePhysicalDevices")?;

        let mut adapters = Vec::new();
        for (index, device) in devices.into_iter().enumerate() {
            let props = unsafe { shared.instance.get_physical_device_properties(device) };
            let name = unsafe { CStr::from_ptr(props.device_name.as_ptr()) }
                .to_string_lossy()
                .into_owned();

            if let Err(e) = ensure_api_version(&name, props.api_version) {
                log::info!(target: targets::GENERAL, "Skipping adapter: {}", e);
                continue;
            }

            adapters.push((
                device,
                Adapter {
                    handle: device.as_raw(),
                    index: index as u32,
                    name,
                },
            ));
        }
        Ok(adapters)
    }
}

impl Instance for VulkanInstance {
    fn backend(&self) -> Backend {
        BACKEND
    }

    fn enumerate_adapters(&self) -> Result<Vec<Adapter>> {
        Ok(Self::suitable_devices(&self.shared)?
            .into_iter()
            .map(|(_, adapter)| adapter)
            .collect())
    }

    fn create_surface(&self, info: &SurfaceInfo) -> Result<Box<dyn Surface>> {
        Ok(Box::new(VulkanSurface::new(self.shared.clone(), info)?))
    }

    fn create_device(&self, surface: Option<&dyn Surface>, adapter: Option<&Adapter>) -> Result<Box<dyn crate::Device>> {
        let surface = surface
            .map(|s| cast::<VulkanSurface>(s.as_any(), "surface"))
            .transpose()?;
        Ok(Box::new(VulkanDevice::new(self.shared.clone(), surface, adapter)?))
    }
}

// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() || (*p_callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*p_callback_data).p_message).to_string_lossy();

    let target = if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        targets::VALIDATION
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        targets::PERFORMANCE
    } else {
        targets::GENERAL
    };

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => log::error!(target: target, "[Vulkan] {}", message),
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => log::warn!(target: target, "[Vulkan] {}", message),
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => log::info!(target: target, "[Vulkan] {}", message),
        _ => log::debug!(target: target, "[Vulkan] {}", message),
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_version_gate() {
        assert!(ensure_api_version("loader", vk::API_VERSION_1_3).is_ok());
        assert!(ensure_api_version("loader", vk::make_api_version(0, 1, 3, 250)).is_ok());

        let err = ensure_api_version("old GPU", vk::API_VERSION_1_2).unwrap_err();
        assert!(err.is_capability_gap());
        assert!(err.to_string().contains("1.2"));
    }
}
