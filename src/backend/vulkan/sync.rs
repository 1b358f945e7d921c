// Synchronization primitives
//
// Fences for CPU-GPU sync, semaphores for GPU-presentation sync.

use super::VkCheck;
use crate::error::Result;
use ash::vk;

pub fn create_fence(device: &ash::Device, signaled: bool) -> Result<vk::Fence> {
    let flags = if signaled {
        vk::FenceCreateFlags::SIGNALED
    } else {
        vk::FenceCreateFlags::empty()
    };
    let fence_info = vk::FenceCreateInfo::builder().flags(flags);
    unsafe { device.create_fence(&fence_info, None) }.check("vkCreateFence")
}

pub fn create_semaphore(device: &ash::Device) -> Result<vk::Semaphore> {
    let semaphore_info = vk::SemaphoreCreateInfo::builder();
    unsafe { device.create_semaphore(&semaphore_info, None) }.check("vkCreateSemaphore")
}

/// Block on `fence`, then return it to the unsignaled state.
pub fn wait_and_reset(device: &ash::Device, fence: vk::Fence) -> Result<()> {
    unsafe {
        device
            .wait_for_fences(&[fence], true, u64::MAX)
            .check("vkWaitForFences")?;
        device.reset_fences(&[fence]).check("vkResetFences")
    }
}
