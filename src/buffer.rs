// Buffers - linear GPU memory
//
// A buffer's `BufferInfo` is fixed at creation. Buffers created with
// TRANSFER_BUFFER or MAP_WRITE are mappable: `Device::map` hands out a
// scoped guard, so the CPU pointer cannot outlive the mapping.

use crate::device::Device;
use crate::error::Result;
use bitflags::bitflags;
use std::any::Any;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BufferUsage: u32 {
        const VERTEX_BUFFER = 1 << 0;
        const INDEX_BUFFER = 1 << 1;
        const CONSTANT_BUFFER = 1 << 2;
        const STRUCTURED_BUFFER = 1 << 3;
        const TRANSFER_BUFFER = 1 << 4;

        const MAP_WRITE = 1 << 8;
    }
}

impl BufferUsage {
    /// Usage flags that allow `map_buffer`.
    pub const MAPPABLE: BufferUsage = BufferUsage::TRANSFER_BUFFER.union(BufferUsage::MAP_WRITE);

    pub fn is_mappable(self) -> bool {
        self.intersects(Self::MAPPABLE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferInfo {
    pub usage: BufferUsage,
    pub size_in_bytes: u32,
}

impl BufferInfo {
    pub const fn new(usage: BufferUsage, size_in_bytes: u32) -> Self {
        Self { usage, size_in_bytes }
    }

    /// Checks that `len` bytes at `offset` fit inside the buffer.
    pub fn check_range(&self, offset: u32, len: usize) -> Result<()> {
        let end = offset as u64 + len as u64;
        if end > self.size_in_bytes as u64 {
            return Err(crate::Error::invalid_usage(format!(
                "range {}..{} is outside a buffer of {} bytes",
                offset, end, self.size_in_bytes
            )));
        }
        Ok(())
    }
}

pub trait Buffer {
    fn info(&self) -> &BufferInfo;

    fn as_any(&self) -> &dyn Any;
}

/// A mapped view of a buffer. Unmaps when dropped.
pub struct BufferMapping<'a> {
    device: &'a dyn Device,
    buffer: &'a dyn Buffer,
    ptr: NonNull<u8>,
    len: usize,
}

impl<'a> BufferMapping<'a> {
    pub(crate) fn new(device: &'a dyn Device, buffer: &'a dyn Buffer) -> Result<Self> {
        let ptr = device.map_buffer(buffer)?;
        Ok(Self {
            device,
            buffer,
            ptr,
            len: buffer.info().size_in_bytes as usize,
        })
    }
}

impl Deref for BufferMapping<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // SAFETY: map_buffer returns a pointer valid for `size_in_bytes` bytes
        // until unmap_buffer, which only runs in Drop.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl DerefMut for BufferMapping<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        // SAFETY: see Deref; the guard holds the only handle to the mapping.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for BufferMapping<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.device.unmap_buffer(self.buffer) {
            log::error!(target: crate::diagnostics::targets::GENERAL, "Failed to unmap buffer: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mappable_usages() {
        assert!(BufferUsage::MAP_WRITE.is_mappable());
        assert!((BufferUsage::TRANSFER_BUFFER | BufferUsage::VERTEX_BUFFER).is_mappable());
        assert!(!(BufferUsage::CONSTANT_BUFFER | BufferUsage::INDEX_BUFFER).is_mappable());
        assert!(!BufferUsage::empty().is_mappable());
    }

    #[test]
    fn default_usage_is_none() {
        assert_eq!(BufferInfo::default().usage, BufferUsage::empty());
    }

    #[test]
    fn range_checks() {
        let info = BufferInfo::new(BufferUsage::VERTEX_BUFFER, 64);
        assert!(info.check_range(0, 64).is_ok());
        assert!(info.check_range(60, 4).is_ok());
        assert!(info.check_range(60, 5).is_err());
        assert!(info.check_range(u32::MAX, 1).is_err());
    }
}
