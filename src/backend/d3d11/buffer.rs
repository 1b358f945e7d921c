// D3D11 buffers
//
// The usage picks one of three storage kinds:
//   - TRANSFER_BUFFER: STAGING, no bind flags, mapped natively
//   - MAP_WRITE: DYNAMIC, mapped through a CPU shadow copy that is
//     re-uploaded with WRITE_DISCARD on unmap
//   - everything else: DEFAULT, written with UpdateSubresource

use super::device::DeviceShared;
use super::{created, HrCheck};
use crate::buffer::{Buffer, BufferInfo, BufferUsage};
use crate::error::{Error, NativeCode, Result};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::ptr::NonNull;
use std::rc::Rc;
use windows::Win32::Graphics::Direct3D11::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StorageKind {
    Default,
    Dynamic,
    Staging,
}

fn storage_kind(usage: BufferUsage) -> Result<StorageKind> {
    if usage.contains(BufferUsage::STRUCTURED_BUFFER) {
        return Err(Error::unsupported("structured buffers are not supported by the D3D11 backend"));
    }
    if usage.contains(BufferUsage::TRANSFER_BUFFER) {
        let bound = BufferUsage::VERTEX_BUFFER | BufferUsage::INDEX_BUFFER | BufferUsage::CONSTANT_BUFFER;
        if usage.intersects(bound) {
            return Err(Error::unsupported(
                "D3D11 staging buffers cannot also be bound to the pipeline",
            ));
        }
        return Ok(StorageKind::Staging);
    }
    if usage.contains(BufferUsage::MAP_WRITE) {
        Ok(StorageKind::Dynamic)
    } else {
        Ok(StorageKind::Default)
    }
}

fn bind_flags(usage: BufferUsage) -> u32 {
    let mut flags = 0;
    if usage.contains(BufferUsage::VERTEX_BUFFER) {
        flags |= D3D11_BIND_VERTEX_BUFFER.0 as u32;
    }
    if usage.contains(BufferUsage::INDEX_BUFFER) {
        flags |= D3D11_BIND_INDEX_BUFFER.0 as u32;
    }
    if usage.contains(BufferUsage::CONSTANT_BUFFER) {
        flags |= D3D11_BIND_CONSTANT_BUFFER.0 as u32;
    }
    flags
}

/// Constant buffers must be sized in whole 16-byte registers.
fn byte_width(info: &BufferInfo) -> u32 {
    if info.usage.contains(BufferUsage::CONSTANT_BUFFER) {
        (info.size_in_bytes + 15) & !15
    } else {
        info.size_in_bytes
    }
}

pub struct D3D11Buffer {
    shared: Rc<DeviceShared>,
    pub(super) raw: ID3D11Buffer,
    kind: StorageKind,
    shadow: RefCell<Vec<u8>>,
    mapped: Cell<bool>,
    info: BufferInfo,
}

impl D3D11Buffer {
    pub(super) fn new(shared: Rc<DeviceShared>, info: &BufferInfo, data: Option<&[u8]>) -> Result<Self> {
        if info.size_in_bytes == 0 {
            return Err(Error::invalid_usage("buffer size must not be zero"));
        }
        if let Some(data) = data {
            info.check_range(0, data.len())?;
        }
        let kind = storage_kind(info.usage)?;

        let width = byte_width(info);
        let (usage, cpu_access) = match kind {
            StorageKind::Default => (D3D11_USAGE_DEFAULT, 0),
            StorageKind::Dynamic => (D3D11_USAGE_DYNAMIC, D3D11_CPU_ACCESS_WRITE.0 as u32),
            StorageKind::Staging => (
                D3D11_USAGE_STAGING,
                (D3D11_CPU_ACCESS_READ.0 | D3D11_CPU_ACCESS_WRITE.0) as u32,
            ),
        };
        let desc = D3D11_BUFFER_DESC {
            ByteWidth: width,
            Usage: usage,
            BindFlags: if kind == StorageKind::Staging { 0 } else { bind_flags(info.usage) },
            CPUAccessFlags: cpu_access,
            MiscFlags: 0,
            StructureByteStride: 0,
        };

        // Initial data must cover the whole resource.
        let mut contents = vec![0u8; width as usize];
        if let Some(data) = data {
            contents[..data.len()].copy_from_slice(data);
        }
        let initial = D3D11_SUBRESOURCE_DATA {
            pSysMem: contents.as_ptr().cast(),
            SysMemPitch: 0,
            SysMemSlicePitch: 0,
        };

        let mut raw = None;
        unsafe { shared.device.CreateBuffer(&desc, Some(&initial), Some(&mut raw)) }
            .check("ID3D11Device::CreateBuffer")?;
        let raw = created(raw, "ID3D11Device::CreateBuffer")?;

        let shadow = if kind == StorageKind::Dynamic {
            contents
        } else {
            Vec::new()
        };

        Ok(Self {
            shared,
            raw,
            kind,
            shadow: RefCell::new(shadow),
            mapped: Cell::new(false),
            info: *info,
        })
    }

    pub(super) fn upload(&self, offset: u32, data: &[u8]) -> Result<()> {
        self.info.check_range(offset, data.len())?;
        if self.mapped.get() {
            return Err(Error::invalid_usage("buffer is mapped; unmap it before updating"));
        }
        if data.is_empty() {
            return Ok(());
        }

        match self.kind {
            StorageKind::Default => {
                let dst = D3D11_BOX {
                    left: offset,
                    top: 0,
                    front: 0,
                    right: offset + data.len() as u32,
                    bottom: 1,
                    back: 1,
                };
                unsafe {
                    self.shared
                        .context
                        .UpdateSubresource(&self.raw, 0, Some(&dst), data.as_ptr().cast(), 0, 0);
                }
                Ok(())
            }
            StorageKind::Dynamic => {
                let start = offset as usize;
                self.shadow.borrow_mut()[start..start + data.len()].copy_from_slice(data);
                self.flush_shadow()
            }
            StorageKind::Staging => {
                let ptr = self.map_native(D3D11_MAP_WRITE)?;
                unsafe {
                    std::ptr::copy_nonoverlapping(data.as_ptr(), ptr.as_ptr().add(offset as usize), data.len());
                    self.shared.context.Unmap(&self.raw, 0);
                }
                Ok(())
            }
        }
    }

    pub(super) fn map(&self) -> Result<NonNull<u8>> {
        if !self.info.usage.is_mappable() {
            return Err(Error::invalid_usage(
                "only TRANSFER_BUFFER or MAP_WRITE buffers can be mapped",
            ));
        }
        if self.mapped.get() {
            return Err(Error::invalid_usage("buffer is already mapped"));
        }

        let ptr = match self.kind {
            StorageKind::Staging => self.map_native(D3D11_MAP_READ_WRITE)?,
            _ => {
                let mut shadow = self.shadow.borrow_mut();
                NonNull::new(shadow.as_mut_ptr()).ok_or_else(|| {
                    Error::operation_failed("ID3D11DeviceContext::Map", NativeCode::Message("empty shadow".into()))
                })?
            }
        };
        self.mapped.set(true);
        Ok(ptr)
    }

    pub(super) fn unmap(&self) -> Result<()> {
        if !self.mapped.get() {
            return Err(Error::invalid_usage("buffer is not mapped"));
        }
        self.mapped.set(false);
        match self.kind {
            StorageKind::Staging => {
                unsafe { self.shared.context.Unmap(&self.raw, 0) };
                Ok(())
            }
            _ => self.flush_shadow(),
        }
    }

    fn map_native(&self, map_type: D3D11_MAP) -> Result<NonNull<u8>> {
        let mut mapped = D3D11_MAPPED_SUBRESOURCE::default();
        unsafe { self.shared.context.Map(&self.raw, 0, map_type, 0, Some(&mut mapped)) }
            .check("ID3D11DeviceContext::Map")?;
        NonNull::new(mapped.pData.cast::<u8>()).ok_or_else(|| {
            Error::operation_failed("ID3D11DeviceContext::Map", NativeCode::Message("null mapping".into()))
        })
    }

    /// Replace the dynamic buffer's contents with the shadow copy.
    fn flush_shadow(&self) -> Result<()> {
        let ptr = self.map_native(D3D11_MAP_WRITE_DISCARD)?;
        let shadow = self.shadow.borrow();
        unsafe {
            std::ptr::copy_nonoverlapping(shadow.as_ptr(), ptr.as_ptr(), shadow.len());
            self.shared.context.Unmap(&self.raw, 0);
        }
        Ok(())
    }
}

impl Buffer for D3D11Buffer {
    fn info(&self) -> &BufferInfo {
        &self.info
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for D3D11Buffer {
    fn drop(&mut self) {
        if self.mapped.get() && self.kind == StorageKind::Staging {
            unsafe { self.shared.context.Unmap(&self.raw, 0) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_kinds() {
        assert_eq!(storage_kind(BufferUsage::VERTEX_BUFFER).unwrap(), StorageKind::Default);
        assert_eq!(
            storage_kind(BufferUsage::CONSTANT_BUFFER | BufferUsage::MAP_WRITE).unwrap(),
            StorageKind::Dynamic
        );
        assert_eq!(storage_kind(BufferUsage::TRANSFER_BUFFER).unwrap(), StorageKind::Staging);
        assert!(storage_kind(BufferUsage::TRANSFER_BUFFER | BufferUsage::VERTEX_BUFFER).is_err());
        assert!(matches!(
            storage_kind(BufferUsage::STRUCTURED_BUFFER),
            Err(Error::UnsupportedFeature(_))
        ));
    }

    #[test]
    fn constant_buffers_round_to_registers() {
        assert_eq!(byte_width(&BufferInfo::new(BufferUsage::CONSTANT_BUFFER, 20)), 32);
        assert_eq!(byte_width(&BufferInfo::new(BufferUsage::CONSTANT_BUFFER, 64)), 64);
        assert_eq!(byte_width(&BufferInfo::new(BufferUsage::VERTEX_BUFFER, 20)), 20);
    }

    #[test]
    fn bind_flags_follow_usage() {
        let flags = bind_flags(BufferUsage::VERTEX_BUFFER | BufferUsage::INDEX_BUFFER);
        assert_eq!(flags, (D3D11_BIND_VERTEX_BUFFER.0 | D3D11_BIND_INDEX_BUFFER.0) as u32);
        assert_eq!(bind_flags(BufferUsage::TRANSFER_BUFFER), 0);
    }
}
