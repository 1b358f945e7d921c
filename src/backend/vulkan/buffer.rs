// Buffer management
//
// Device-local buffers are filled through a staging copy. Mappable buffers
// (TRANSFER_BUFFER / MAP_WRITE) live in host-visible memory that stays
// persistently mapped, so map/unmap never touch the driver.

use super::device::DeviceShared;
use super::VkCheck;
use crate::buffer::{Buffer, BufferInfo, BufferUsage};
use crate::error::{Error, Result};
use ash::vk;
use gpu_allocator::vulkan::Allocation;
use gpu_allocator::MemoryLocation;
use std::any::Any;
use std::ptr::NonNull;
use std::sync::Arc;

pub struct VulkanBuffer {
    device: Arc<DeviceShared>,
    pub(super) raw: vk::Buffer,
    allocation: Option<Allocation>,
    info: BufferInfo,
}

fn usage_flags(usage: BufferUsage) -> vk::BufferUsageFlags {
    // Every buffer can be a copy source and destination.
    let mut flags = vk::BufferUsageFlags::TRANSFER_SRC | vk::BufferUsageFlags::TRANSFER_DST;
    if usage.contains(BufferUsage::VERTEX_BUFFER) {
        flags |= vk::BufferUsageFlags::VERTEX_BUFFER;
    }
    if usage.contains(BufferUsage::INDEX_BUFFER) {
        flags |= vk::BufferUsageFlags::INDEX_BUFFER;
    }
    if usage.contains(BufferUsage::CONSTANT_BUFFER) {
        flags |= vk::BufferUsageFlags::UNIFORM_BUFFER;
    }
    if usage.contains(BufferUsage::STRUCTURED_BUFFER) {
        flags |= vk::BufferUsageFlags::STORAGE_BUFFER;
    }
    flags
}

impl VulkanBuffer {
    pub(super) fn new(device: Arc<DeviceShared>, info: &BufferInfo) -> Result<Self> {
        if info.size_in_bytes == 0 {
            return Err(Error::invalid_usage("buffer size must be greater than zero"));
        }

        let buffer_info = vk::BufferCreateInfo::builder()
            .size(info.size_in_bytes as u64)
            .usage(usage_flags(info.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let raw = unsafe { device.device.create_buffer(&buffer_info, None) }.check("vkCreateBuffer")?;

        let requirements = unsafe { device.device.get_buffer_memory_requirements(raw) };
        let location = if info.usage.is_mappable() {
            MemoryLocation::CpuToGpu
        } else {
            MemoryLocation::GpuOnly
        };

        let allocation = match device.allocate("buffer", requirements, location, true) {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.device.destroy_buffer(raw, None) };
                return Err(e);
            }
        };

        // Wrap before binding so a bind failure still frees everything.
        let buffer = Self {
            device,
            raw,
            allocation: Some(allocation),
            info: *info,
        };

        if let Some(allocation) = &buffer.allocation {
            unsafe {
                buffer
                    .device
                    .device
                    .bind_buffer_memory(raw, allocation.memory(), allocation.offset())
            }
            .check("vkBindBufferMemory")?;
        }

        Ok(buffer)
    }

    /// Persistent CPU pointer of a mappable buffer.
    pub(super) fn mapped_ptr(&self) -> Result<NonNull<u8>> {
        if !self.info.usage.is_mappable() {
            return Err(Error::invalid_usage(
                "only TRANSFER_BUFFER or MAP_WRITE buffers can be mapped",
            ));
        }
        self.allocation
            .as_ref()
            .and_then(|allocation| allocation.mapped_ptr())
            .map(|ptr| ptr.cast::<u8>())
            .ok_or_else(|| Error::unsupported("host-visible memory is not mapped"))
    }

    /// Write `data` at `offset`. Blocks until the bytes are on the GPU.
    pub(super) fn upload(&self, offset: u32, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        self.info.check_range(offset, data.len())?;

        if self.info.usage.is_mappable() {
            let ptr = self.mapped_ptr()?;
            // SAFETY: the range was checked against the buffer size and the
            // mapping covers the whole allocation.
            unsafe {
                std::ptr::copy_nonoverlapping(data.as_ptr(), ptr.as_ptr().add(offset as usize), data.len());
            }
            return Ok(());
        }

        let staging = Self::staging(self.device.clone(), data)?;
        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: offset as u64,
            size: data.len() as u64,
        };
        self.device.one_shot(|cmd| {
            unsafe {
                self.device
                    .device
                    .cmd_copy_buffer(cmd, staging.raw, self.raw, &[region])
            };
            Ok(())
        })
    }

    /// Host-visible buffer pre-filled with `data`.
    pub(super) fn staging(device: Arc<DeviceShared>, data: &[u8]) -> Result<Self> {
        let size = u32::try_from(data.len())
            .map_err(|_| Error::invalid_usage(format!("{} bytes do not fit one upload", data.len())))?;
        let staging = Self::new(device, &BufferInfo::new(BufferUsage::TRANSFER_BUFFER, size))?;
        staging.upload(0, data)?;
        Ok(staging)
    }
}

impl Buffer for VulkanBuffer {
    fn info(&self) -> &BufferInfo {
        &self.info
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanBuffer {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            self.device.free(allocation);
        }
        unsafe { self.device.device.destroy_buffer(self.raw, None) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_buffer_is_a_copy_endpoint() {
        let flags = usage_flags(BufferUsage::VERTEX_BUFFER);
        assert!(flags.contains(vk::BufferUsageFlags::TRANSFER_SRC | vk::BufferUsageFlags::TRANSFER_DST));
        assert!(!flags.contains(vk::BufferUsageFlags::INDEX_BUFFER));
    }

    #[test]
    fn constant_buffers_are_uniform_buffers() {
        let flags = usage_flags(BufferUsage::CONSTANT_BUFFER | BufferUsage::STRUCTURED_BUFFER);
        assert!(flags.contains(vk::BufferUsageFlags::UNIFORM_BUFFER));
        assert!(flags.contains(vk::BufferUsageFlags::STORAGE_BUFFER));
    }
}
