// Vulkan Device - Core GPU interface
//
// Responsibilities:
// - Physical device selection (explicit adapter, else prefer discrete GPU)
// - Logical device + queue creation (one queue for graphics and present)
// - Memory allocator setup
// - One-shot upload submissions for the blocking create/update calls

use super::buffer::VulkanBuffer;
use super::command::VulkanCommandList;
use super::descriptor::{VulkanDescriptorLayout, VulkanDescriptorSet};
use super::instance::{InstanceShared, VulkanInstance};
use super::pipeline::VulkanPipeline;
use super::sampler::VulkanSampler;
use super::shader::VulkanShaderModule;
use super::surface::VulkanSurface;
use super::swapchain::VulkanSwapchain;
use super::texture::VulkanTexture;
use super::{allocator_error, cast, cast_mut, VkCheck, BACKEND};
use crate::buffer::{Buffer, BufferInfo};
use crate::command::CommandList;
use crate::descriptor::{Descriptor, DescriptorLayout, DescriptorLayoutInfo, DescriptorSet};
use crate::device::Device;
use crate::diagnostics::targets;
use crate::error::{Error, Result};
use crate::geometry::Region3D;
use crate::instance::{Adapter, Backend};
use crate::pipeline::{GraphicsPipelineInfo, Pipeline};
use crate::sampler::{Sampler, SamplerInfo};
use crate::shader::{ShaderMappingInfo, ShaderModule, ShaderStage};
use crate::swapchain::{Swapchain, SwapchainInfo};
use crate::texture::{Texture, TextureInfo};
use ash::extensions::khr;
use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc};
use gpu_allocator::MemoryLocation;
use parking_lot::Mutex;
use std::ffi::CStr;
use std::mem::ManuallyDrop;
use std::ptr::NonNull;
use std::sync::Arc;

/// Command pool + buffer reused by every blocking upload.
struct UploadContext {
    pool: vk::CommandPool,
    cmd: vk::CommandBuffer,
}

/// Native device state shared by the device and every resource it creates.
pub(super) struct DeviceShared {
    pub instance: Arc<InstanceShared>,
    pub physical_device: vk::PhysicalDevice,
    pub device: ash::Device,
    // Dropped by hand before the device is destroyed.
    allocator: ManuallyDrop<Mutex<Allocator>>,
    pub queue: vk::Queue,
    pub queue_family: u32,
    pub swapchain_fn: Option<khr::Swapchain>,
    pub push_descriptor_fn: Option<khr::PushDescriptor>,
    pub sampler_anisotropy: bool,
    pub limits: vk::PhysicalDeviceLimits,
    upload: Mutex<UploadContext>,
}

impl DeviceShared {
    pub fn allocate(
        &self,
        name: &str,
        requirements: vk::MemoryRequirements,
        location: MemoryLocation,
        linear: bool,
    ) -> Result<Allocation> {
        self.allocator
            .lock()
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location,
                linear,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| allocator_error("allocate memory", e))
    }

    pub fn free(&self, allocation: Allocation) {
        if let Err(e) = self.allocator.lock().free(allocation) {
            log::error!(target: targets::GENERAL, "Failed to free GPU memory: {}", e);
        }
    }

    pub fn format_properties(&self, format: vk::Format) -> vk::FormatProperties {
        unsafe {
            self.instance
                .instance
                .get_physical_device_format_properties(self.physical_device, format)
        }
    }

    /// Record with `record`, submit, and block until the queue is idle.
    pub fn one_shot(&self, record: impl FnOnce(vk::CommandBuffer) -> Result<()>) -> Result<()> {
        let upload = self.upload.lock();
        let begin_info = vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        unsafe {
            self.device
                .reset_command_pool(upload.pool, vk::CommandPoolResetFlags::empty())
                .check("vkResetCommandPool")?;
            self.device
                .begin_command_buffer(upload.cmd, &begin_info)
                .check("vkBeginCommandBuffer")?;
        }

        record(upload.cmd)?;

        let command_buffers = [upload.cmd];
        let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);
        unsafe {
            self.device.end_command_buffer(upload.cmd).check("vkEndCommandBuffer")?;
            self.device
                .queue_submit(self.queue, &[submit_info.build()], vk::Fence::null())
                .check("vkQueueSubmit")?;
            self.device.queue_wait_idle(self.queue).check("vkQueueWaitIdle")
        }
    }

    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }.check("vkDeviceWaitIdle")
    }
}

impl Drop for DeviceShared {
    fn drop(&mut self) {
        log::info!(target: targets::GENERAL, "Destroying Vulkan device...");

        if let Err(e) = self.wait_idle() {
            log::warn!(target: targets::GENERAL, "Device did not go idle before destruction: {}", e);
        }

        unsafe {
            self.device.destroy_command_pool(self.upload.get_mut().pool, None);
            ManuallyDrop::drop(&mut self.allocator);
            self.device.destroy_device(None);
        }
    }
}

/// A physical device that passed selection.
struct Candidate {
    physical_device: vk::PhysicalDevice,
    adapter: Adapter,
    queue_family: u32,
    score: u32,
}

pub struct VulkanDevice {
    shared: Arc<DeviceShared>,
    adapter: Adapter,
}

impl VulkanDevice {
    pub(super) fn new(
        instance: Arc<InstanceShared>,
        surface: Option<&VulkanSurface>,
        adapter: Option<&Adapter>,
    ) -> Result<Self> {
        // Step 1: Pick physical device (GPU)
        let candidate = Self::pick_physical_device(&instance, surface, adapter)?;
        let physical_device = candidate.physical_device;

        let props = unsafe { instance.instance.get_physical_device_properties(physical_device) };
        log::info!(target: targets::GENERAL, "Selected GPU: {}", candidate.adapter.name);
        log::info!(
            target: targets::GENERAL,
            "API Version: {}.{}.{}",
            vk::api_version_major(props.api_version),
            vk::api_version_minor(props.api_version),
            vk::api_version_patch(props.api_version)
        );

        // Step 2: Create logical device
        let (base_features, _) = query_features(&instance.instance, physical_device);
        let sampler_anisotropy = base_features.sampler_anisotropy == vk::TRUE;

        let available = unsafe {
            instance
                .instance
                .enumerate_device_extension_properties(physical_device)
        }
        .check("vkEnumerateDeviceExtensionProperties")?;
        let has = |name: &CStr| {
            available
                .iter()
                .any(|ext| unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) } == name)
        };

        let has_swapchain = has(khr::Swapchain::name());
        if surface.is_some() && !has_swapchain {
            return Err(Error::unsupported("VK_KHR_swapchain is not available on this adapter"));
        }
        let has_push_descriptor = has(khr::PushDescriptor::name());

        let mut extensions = Vec::new();
        if has_swapchain {
            extensions.push(khr::Swapchain::name().as_ptr());
        }
        if has_push_descriptor {
            extensions.push(khr::PushDescriptor::name().as_ptr());
        }

        let queue_priorities = [1.0];
        let queue_create_info = vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(candidate.queue_family)
            .queue_priorities(&queue_priorities)
            .build();

        let features = vk::PhysicalDeviceFeatures {
            sampler_anisotropy: sampler_anisotropy.into(),
            ..Default::default()
        };
        let mut features13 = vk::PhysicalDeviceVulkan13Features {
            dynamic_rendering: vk::TRUE,
            ..Default::default()
        };

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(std::slice::from_ref(&queue_create_info))
            .enabled_extension_names(&extensions)
            .enabled_features(&features)
            .push_next(&mut features13);

        let device = unsafe {
            instance
                .instance
                .create_device(physical_device, &create_info, None)
        }
        .check("vkCreateDevice")?;

        let queue = unsafe { device.get_device_queue(candidate.queue_family, 0) };

        // Step 3: Create memory allocator
        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.instance.clone(),
            device: device.clone(),
            physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        });
        let allocator = match allocator {
            Ok(allocator) => allocator,
            Err(e) => {
                unsafe { device.destroy_device(None) };
                return Err(allocator_error("create allocator", e));
            }
        };

        // Step 4: Upload context
        let upload = match Self::create_upload_context(&device, candidate.queue_family) {
            Ok(upload) => upload,
            Err(e) => {
                drop(allocator);
                unsafe { device.destroy_device(None) };
                return Err(e);
            }
        };

        let swapchain_fn = has_swapchain.then(|| khr::Swapchain::new(&instance.instance, &device));
        let push_descriptor_fn = has_push_descriptor.then(|| khr::PushDescriptor::new(&instance.instance, &device));

        log::info!(
            target: targets::GENERAL,
            "Vulkan device ready (push descriptors: {}, anisotropy: {})",
            has_push_descriptor,
            sampler_anisotropy
        );

        Ok(Self {
            shared: Arc::new(DeviceShared {
                instance,
                physical_device,
                device,
                allocator: ManuallyDrop::new(Mutex::new(allocator)),
                queue,
                queue_family: candidate.queue_family,
                swapchain_fn,
                push_descriptor_fn,
                sampler_anisotropy,
                limits: props.limits,
                upload: Mutex::new(upload),
            }),
            adapter: candidate.adapter,
        })
    }

    fn pick_physical_device(
        instance: &InstanceShared,
        surface: Option<&VulkanSurface>,
        requested: Option<&Adapter>,
    ) -> Result<Candidate> {
        let mut devices = VulkanInstance::suitable_devices(instance)?;

        if let Some(requested) = requested {
            devices.retain(|(_, adapter)| adapter == requested);
            if devices.is_empty() {
                return Err(Error::invalid_usage(format!(
                    "adapter '{}' does not belong to this instance or lacks Vulkan 1.3",
                    requested.name
                )));
            }
        }

        if devices.is_empty() {
            return Err(Error::unsupported("no Vulkan 1.3 capable GPU found"));
        }

        // Score each device
        let mut best: Option<Candidate> = None;
        let mut last_error = None;

        for (physical_device, adapter) in devices {
            let (_, dynamic_rendering) = query_features(&instance.instance, physical_device);
            if !dynamic_rendering {
                log::info!(target: targets::GENERAL, "Skipping {}: no dynamic rendering", adapter.name);
                continue;
            }

            let queue_family = match Self::find_queue_family(instance, physical_device, surface) {
                Ok(Some(family)) => family,
                Ok(None) => {
                    log::info!(target: targets::GENERAL, "Skipping {}: no usable queue family", adapter.name);
                    continue;
                }
                Err(e) => {
                    log::info!(target: targets::GENERAL, "Skipping {}: {}", adapter.name, e);
                    last_error = Some(e);
                    continue;
                }
            };

            let props = unsafe { instance.instance.get_physical_device_properties(physical_device) };
            let score = match props.device_type {
                vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
                vk::PhysicalDeviceType::INTEGRATED_GPU => 100,
                _ => 1,
            };

            if best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(Candidate {
                    physical_device,
                    adapter,
                    queue_family,
                    score,
                });
            }
        }

        best.ok_or_else(|| last_error.unwrap_or_else(|| Error::unsupported("no suitable GPU found")))
    }

    /// A queue family with graphics support that can also present to
    /// `surface`, when one is given.
    fn find_queue_family(
        instance: &InstanceShared,
        physical_device: vk::PhysicalDevice,
        surface: Option<&VulkanSurface>,
    ) -> Result<Option<u32>> {
        let families = unsafe {
            instance
                .instance
                .get_physical_device_queue_family_properties(physical_device)
        };

        let graphics: Vec<u32> = families
            .iter()
            .enumerate()
            .filter(|(_, props)| props.queue_flags.contains(vk::QueueFlags::GRAPHICS))
            .map(|(i, _)| i as u32)
            .collect();

        let Some(surface) = surface else {
            return Ok(graphics.first().copied());
        };

        let supports_present = |family: u32| {
            unsafe {
                instance
                    .surface_fn
                    .get_physical_device_surface_support(physical_device, family, surface.raw)
            }
            .check("vkGetPhysicalDeviceSurfaceSupportKHR")
        };

        for &family in &graphics {
            if supports_present(family)? {
                return Ok(Some(family));
            }
        }

        for family in 0..families.len() as u32 {
            if supports_present(family)? {
                return Err(Error::not_implemented(BACKEND, "separate graphics and present queues"));
            }
        }

        Ok(None)
    }

    fn create_upload_context(device: &ash::Device, queue_family: u32) -> Result<UploadContext> {
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::TRANSIENT)
            .queue_family_index(queue_family);
        let pool = unsafe { device.create_command_pool(&pool_info, None) }.check("vkCreateCommandPool")?;

        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        match unsafe { device.allocate_command_buffers(&alloc_info) }.check("vkAllocateCommandBuffers") {
            Ok(buffers) => Ok(UploadContext { pool, cmd: buffers[0] }),
            Err(e) => {
                unsafe { device.destroy_command_pool(pool, None) };
                Err(e)
            }
        }
    }
}

/// Core features plus whether dynamic rendering is supported.
fn query_features(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> (vk::PhysicalDeviceFeatures, bool) {
    let mut features13 = vk::PhysicalDeviceVulkan13Features::default();
    let mut features2 = vk::PhysicalDeviceFeatures2::builder().push_next(&mut features13);
    unsafe { instance.get_physical_device_features2(physical_device, &mut features2) };
    let base = features2.features;
    (base, features13.dynamic_rendering == vk::TRUE)
}

impl Device for VulkanDevice {
    fn backend(&self) -> Backend {
        BACKEND
    }

    fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    fn create_swapchain(&self, info: &SwapchainInfo<'_>) -> Result<Box<dyn Swapchain>> {
        info.validate()?;
        let surface = cast::<VulkanSurface>(info.surface.as_any(), "surface")?;
        Ok(Box::new(VulkanSwapchain::new(self.shared.clone(), surface, info)?))
    }

    fn create_command_list(&self) -> Result<Box<dyn CommandList>> {
        Ok(Box::new(VulkanCommandList::new(self.shared.clone())?))
    }

    fn create_shader_module(
        &self,
        stage: ShaderStage,
        code: &[u8],
        entry_point: &str,
        mapping: Option<&ShaderMappingInfo>,
    ) -> Result<Box<dyn ShaderModule>> {
        crate::shader::require_single_stage(stage)?;
        Ok(Box::new(VulkanShaderModule::new(
            self.shared.clone(),
            stage,
            code,
            entry_point,
            mapping,
        )?))
    }

    fn create_graphics_pipeline(&self, info: &GraphicsPipelineInfo<'_>) -> Result<Box<dyn Pipeline>> {
        info.validate()?;
        Ok(Box::new(VulkanPipeline::new(self.shared.clone(), info)?))
    }

    fn create_buffer(&self, info: &BufferInfo, data: Option<&[u8]>) -> Result<Box<dyn Buffer>> {
        let buffer = VulkanBuffer::new(self.shared.clone(), info)?;
        if let Some(data) = data {
            buffer.upload(0, data)?;
        }
        Ok(Box::new(buffer))
    }

    fn create_texture(&self, info: &TextureInfo, data: Option<&[u8]>) -> Result<Box<dyn Texture>> {
        let texture = VulkanTexture::new(self.shared.clone(), info)?;
        match data {
            Some(data) => texture.upload(&Region3D::whole(info.size), data)?,
            None => texture.prepare_for_sampling()?,
        }
        Ok(Box::new(texture))
    }

    fn create_sampler(&self, info: &SamplerInfo) -> Result<Box<dyn Sampler>> {
        Ok(Box::new(VulkanSampler::new(self.shared.clone(), info)?))
    }

    fn create_descriptor_layout(&self, info: &DescriptorLayoutInfo) -> Result<Box<dyn DescriptorLayout>> {
        Ok(Box::new(VulkanDescriptorLayout::new(self.shared.clone(), info)?))
    }

    fn create_descriptor_set(
        &self,
        layout: &dyn DescriptorLayout,
        descriptors: &[Descriptor<'_>],
    ) -> Result<Box<dyn DescriptorSet>> {
        let layout = cast::<VulkanDescriptorLayout>(layout.as_any(), "descriptor layout")?;
        Ok(Box::new(VulkanDescriptorSet::new(self.shared.clone(), layout, descriptors)?))
    }

    fn execute_command_list(&self, list: &mut dyn CommandList) -> Result<()> {
        cast_mut::<VulkanCommandList>(list.as_any_mut(), "command list")?.submit()
    }

    fn update_buffer(&self, buffer: &dyn Buffer, offset: u32, data: &[u8]) -> Result<()> {
        cast::<VulkanBuffer>(buffer.as_any(), "buffer")?.upload(offset, data)
    }

    fn update_texture(&self, texture: &dyn Texture, region: &Region3D, data: &[u8]) -> Result<()> {
        cast::<VulkanTexture>(texture.as_any(), "texture")?.upload(region, data)
    }

    fn map_buffer(&self, buffer: &dyn Buffer) -> Result<NonNull<u8>> {
        cast::<VulkanBuffer>(buffer.as_any(), "buffer")?.mapped_ptr()
    }

    fn unmap_buffer(&self, buffer: &dyn Buffer) -> Result<()> {
        // Mappable buffers stay persistently mapped; only the usage is checked.
        cast::<VulkanBuffer>(buffer.as_any(), "buffer")?.mapped_ptr().map(|_| ())
    }

    fn wait_idle(&self) -> Result<()> {
        self.shared.wait_idle()
    }
}
