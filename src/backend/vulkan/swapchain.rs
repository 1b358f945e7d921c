// Swapchain - Window presentation
//
// Acquisition waits on a fence, so the returned texture is ready for
// recording as soon as `get_next_texture` returns. Each image has its own
// render-finished semaphore. `present` signals it behind all work
// submitted so far and the presentation engine waits on it.
//
// OUT_OF_DATE / SUBOPTIMAL trigger a rebuild with the same settings:
// wait idle, create the new swapchain (old one as a hint), release the
// per-image resources, destroy the old swapchain.

use super::device::DeviceShared;
use super::surface::VulkanSurface;
use super::texture::{self, VulkanTexture};
use super::{conv, sync, VkCheck};
use crate::diagnostics::targets;
use crate::error::{Error, NativeCode, Result};
use crate::format::Format;
use crate::geometry::Size2D;
use crate::swapchain::{choose_present_mode, clamp_image_count, clamp_size, PresentMode, Swapchain, SwapchainInfo};
use crate::texture::{Texture, TextureInfo, TextureUsage};
use ash::extensions::khr;
use ash::vk;
use std::sync::Arc;

pub struct VulkanSwapchain {
    device: Arc<DeviceShared>,
    loader: khr::Swapchain,
    surface: vk::SurfaceKHR,
    raw: vk::SwapchainKHR,
    images: Vec<VulkanTexture>,
    render_finished: Vec<vk::Semaphore>,
    acquire_fence: vk::Fence,
    current: Option<u32>,
    format: Format,
    surface_format: vk::SurfaceFormatKHR,
    present_mode: PresentMode,
    native_present_mode: vk::PresentModeKHR,
    requested_size: Size2D,
    requested_buffers: u32,
    size: Size2D,
    needs_rebuild: bool,
}

impl VulkanSwapchain {
    pub(super) fn new(device: Arc<DeviceShared>, surface: &VulkanSurface, info: &SwapchainInfo<'_>) -> Result<Self> {
        log::info!(
            target: targets::GENERAL,
            "Creating swapchain: {}x{} {:?}",
            info.size.width,
            info.size.height,
            info.format
        );

        let loader = device
            .swapchain_fn
            .clone()
            .ok_or_else(|| Error::invalid_usage("device was created without swapchain support"))?;

        let surface_fn = &device.instance.surface_fn;
        let supported = unsafe {
            surface_fn.get_physical_device_surface_support(device.physical_device, device.queue_family, surface.raw)
        }
        .check("vkGetPhysicalDeviceSurfaceSupportKHR")?;
        if !supported {
            return Err(Error::unsupported("the device queue cannot present to this surface"));
        }

        // Query supported formats
        let wanted = conv::format(info.format)?;
        let formats = unsafe { surface_fn.get_physical_device_surface_formats(device.physical_device, surface.raw) }
            .check("vkGetPhysicalDeviceSurfaceFormatsKHR")?;
        let surface_format = formats
            .iter()
            .copied()
            .find(|f| f.format == wanted)
            .ok_or_else(|| Error::unsupported(format!("surface cannot present {:?}", info.format)))?;

        // Query supported present modes
        let native_modes =
            unsafe { surface_fn.get_physical_device_surface_present_modes(device.physical_device, surface.raw) }
                .check("vkGetPhysicalDeviceSurfacePresentModesKHR")?;
        let available: Vec<PresentMode> = native_modes.iter().copied().filter_map(conv::present_mode_from_vk).collect();
        let present_mode = choose_present_mode(info.present_mode, &available)?;
        let native_present_mode = conv::present_mode(present_mode).unwrap_or(vk::PresentModeKHR::FIFO);
        log::info!(target: targets::GENERAL, "Present mode: {:?}", present_mode);

        let acquire_fence = sync::create_fence(&device.device, false)?;

        let mut swapchain = Self {
            device,
            loader,
            surface: surface.raw,
            raw: vk::SwapchainKHR::null(),
            images: Vec::new(),
            render_finished: Vec::new(),
            acquire_fence,
            current: None,
            format: info.format,
            surface_format,
            present_mode,
            native_present_mode,
            requested_size: info.size,
            requested_buffers: info.num_buffers,
            size: info.size,
            needs_rebuild: false,
        };

        // Drop releases the fence if this fails.
        let (raw, size) = swapchain.create_raw(vk::SwapchainKHR::null())?;
        swapchain.raw = raw;
        swapchain.size = size;
        swapchain.create_images()?;

        Ok(swapchain)
    }

    fn create_raw(&self, old: vk::SwapchainKHR) -> Result<(vk::SwapchainKHR, Size2D)> {
        let caps = unsafe {
            self.device
                .instance
                .surface_fn
                .get_physical_device_surface_capabilities(self.device.physical_device, self.surface)
        }
        .check("vkGetPhysicalDeviceSurfaceCapabilitiesKHR")?;

        let size = clamp_size(
            self.requested_size,
            Size2D::new(caps.min_image_extent.width, caps.min_image_extent.height),
            Size2D::new(caps.max_image_extent.width, caps.max_image_extent.height),
        );
        if size.is_empty() {
            return Err(Error::invalid_usage("surface has no drawable area (window minimized?)"));
        }
        let image_count = clamp_image_count(self.requested_buffers, caps.min_image_count, caps.max_image_count);

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(self.surface)
            .min_image_count(image_count)
            .image_format(self.surface_format.format)
            .image_color_space(self.surface_format.color_space)
            .image_extent(vk::Extent2D {
                width: size.width,
                height: size.height,
            })
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(self.native_present_mode)
            .clipped(true)
            .old_swapchain(old);

        let raw = unsafe { self.loader.create_swapchain(&create_info, None) }.check("vkCreateSwapchainKHR")?;
        Ok((raw, size))
    }

    fn create_images(&mut self) -> Result<()> {
        let images = unsafe { self.loader.get_swapchain_images(self.raw) }.check("vkGetSwapchainImagesKHR")?;
        let info = TextureInfo::texture_2d(self.format, self.size.width, self.size.height, 1, TextureUsage::COLOR_TARGET);

        for image in images {
            self.images.push(VulkanTexture::from_swapchain_image(
                self.device.clone(),
                image,
                self.surface_format.format,
                info,
            )?);
            self.render_finished.push(sync::create_semaphore(&self.device.device)?);
        }

        log::info!(
            target: targets::GENERAL,
            "Created swapchain with {} images ({}x{})",
            self.images.len(),
            self.size.width,
            self.size.height
        );
        Ok(())
    }

    fn destroy_images(&mut self) {
        self.images.clear();
        for semaphore in self.render_finished.drain(..) {
            unsafe { self.device.device.destroy_semaphore(semaphore, None) };
        }
    }

    fn rebuild(&mut self) -> Result<()> {
        self.device.wait_idle()?;

        let old = self.raw;
        let (raw, size) = self.create_raw(old)?;

        self.destroy_images();
        unsafe { self.loader.destroy_swapchain(old, None) };

        self.raw = raw;
        self.size = size;
        self.current = None;
        self.needs_rebuild = false;
        self.create_images()
    }
}

impl Swapchain for VulkanSwapchain {
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
        self.images.len() as u32
    }

    fn get_next_texture(&mut self) -> Result<&dyn Texture> {
        if self.needs_rebuild {
            self.rebuild()?;
        }

        let mut attempts = 0;
        let index = loop {
            let result = unsafe {
                self.loader
                    .acquire_next_image(self.raw, u64::MAX, vk::Semaphore::null(), self.acquire_fence)
            };
            match result {
                Ok((index, suboptimal)) => {
                    sync::wait_and_reset(&self.device.device, self.acquire_fence)?;
                    if suboptimal {
                        // Usable now, rebuilt after it is presented.
                        self.needs_rebuild = true;
                    }
                    break index;
                }
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) if attempts == 0 => {
                    attempts += 1;
                    self.rebuild()?;
                }
                Err(e) => return Err(Error::operation_failed("vkAcquireNextImageKHR", NativeCode::Vulkan(e))),
            }
        };

        let image = acquired(&self.images, index, "vkAcquireNextImageKHR")?;
        self.current = Some(index);
        Ok(image)
    }

    fn present(&mut self) -> Result<()> {
        let index = self
            .current
            .take()
            .ok_or_else(|| Error::invalid_usage("present called without get_next_texture"))?;
        let image = acquired(&self.images, index, "vkQueuePresentKHR")?;
        let semaphore = *acquired(&self.render_finished, index, "vkQueuePresentKHR")?;

        // An image acquired but never rendered still has to be presentable.
        if image.state.layout() != vk::ImageLayout::PRESENT_SRC_KHR {
            self.device.one_shot(|cmd| {
                texture::transition(&self.device.device, cmd, &image.state, vk::ImageLayout::PRESENT_SRC_KHR, false);
                Ok(())
            })?;
        }

        let signal = [semaphore];
        let submit_info = vk::SubmitInfo::builder().signal_semaphores(&signal);
        unsafe {
            self.device
                .device
                .queue_submit(self.device.queue, &[submit_info.build()], vk::Fence::null())
        }
        .check("vkQueueSubmit")?;

        let swapchains = [self.raw];
        let image_indices = [index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&signal)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe { self.loader.queue_present(self.device.queue, &present_info) };
        match result {
            Ok(suboptimal) if suboptimal || self.needs_rebuild => self.rebuild(),
            Ok(_) => Ok(()),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => self.rebuild(),
            Err(e) => Err(Error::operation_failed("vkQueuePresentKHR", NativeCode::Vulkan(e))),
        }
    }

    fn resize(&mut self, size: Size2D) -> Result<()> {
        if size.is_empty() {
            return Err(Error::invalid_usage("cannot resize a swapchain to an empty size"));
        }
        self.requested_size = size;
        self.rebuild()
    }
}

/// Per-image state for `index`. A rebuild that failed partway leaves the
/// lists shorter than the driver's image count.
fn acquired<'a, T>(items: &'a [T], index: u32, operation: &'static str) -> Result<&'a T> {
    items.get(index as usize).ok_or_else(|| {
        Error::operation_failed(
            operation,
            NativeCode::Message(format!("image {} of {} is not available", index, items.len())),
        )
    })
}

impl Drop for VulkanSwapchain {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            log::warn!(target: targets::GENERAL, "Swapchain destroyed without idle device: {}", e);
        }
        self.destroy_images();
        unsafe {
            self.device.device.destroy_fence(self.acquire_fence, None);
            if self.raw != vk::SwapchainKHR::null() {
                self.loader.destroy_swapchain(self.raw, None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquired_index_must_have_an_image() {
        let semaphores = [vk::Semaphore::null(); 2];
        assert!(acquired(&semaphores, 1, "vkQueuePresentKHR").is_ok());

        let err = acquired(&semaphores, 2, "vkAcquireNextImageKHR").unwrap_err();
        match err {
            Error::OperationFailed { operation, .. } => assert_eq!(operation, "vkAcquireNextImageKHR"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(acquired::<vk::Semaphore>(&[], 0, "vkQueuePresentKHR").is_err());
    }
}
