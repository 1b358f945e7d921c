// OpenGL buffers
//
// All buffers are untyped GL buffer objects; the usage only picks the
// driver hint. Uploads and mapping go through COPY_WRITE_BUFFER so the
// VAO's element binding and the UBO bindings are never disturbed.

use super::device::GlShared;
use super::{check_error, GlCheck};
use crate::buffer::{Buffer, BufferInfo, BufferUsage};
use crate::error::{Error, NativeCode, Result};
use glow::HasContext;
use std::any::Any;
use std::cell::Cell;
use std::ptr::NonNull;
use std::rc::Rc;

fn usage_hint(usage: BufferUsage) -> u32 {
    if usage.contains(BufferUsage::TRANSFER_BUFFER) {
        glow::STREAM_COPY
    } else if usage.contains(BufferUsage::MAP_WRITE) {
        glow::DYNAMIC_DRAW
    } else {
        glow::STATIC_DRAW
    }
}

pub struct GlBuffer {
    shared: Rc<GlShared>,
    pub(super) raw: glow::Buffer,
    mapped: Cell<bool>,
    info: BufferInfo,
}

impl GlBuffer {
    pub(super) fn new(shared: Rc<GlShared>, info: &BufferInfo, data: Option<&[u8]>) -> Result<Self> {
        if info.size_in_bytes == 0 {
            return Err(Error::invalid_usage("buffer size must not be zero"));
        }
        if let Some(data) = data {
            info.check_range(0, data.len())?;
        }

        let gl = &shared.gl;
        let raw = unsafe { gl.create_buffer() }.check("glGenBuffers")?;
        unsafe {
            gl.bind_buffer(glow::COPY_WRITE_BUFFER, Some(raw));
            gl.buffer_data_size(glow::COPY_WRITE_BUFFER, info.size_in_bytes as i32, usage_hint(info.usage));
            if let Some(data) = data {
                gl.buffer_sub_data_u8_slice(glow::COPY_WRITE_BUFFER, 0, data);
            }
            gl.bind_buffer(glow::COPY_WRITE_BUFFER, None);
        }
        if let Err(e) = check_error(gl, "glBufferData") {
            unsafe { gl.delete_buffer(raw) };
            return Err(e);
        }

        Ok(Self {
            shared,
            raw,
            mapped: Cell::new(false),
            info: *info,
        })
    }

    pub(super) fn upload(&self, offset: u32, data: &[u8]) -> Result<()> {
        self.info.check_range(offset, data.len())?;
        if self.mapped.get() {
            return Err(Error::invalid_usage("buffer is mapped; unmap it before updating"));
        }
        let gl = &self.shared.gl;
        unsafe {
            gl.bind_buffer(glow::COPY_WRITE_BUFFER, Some(self.raw));
            gl.buffer_sub_data_u8_slice(glow::COPY_WRITE_BUFFER, offset as i32, data);
            gl.bind_buffer(glow::COPY_WRITE_BUFFER, None);
        }
        check_error(gl, "glBufferSubData")
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

        let gl = &self.shared.gl;
        let ptr = unsafe {
            gl.bind_buffer(glow::COPY_WRITE_BUFFER, Some(self.raw));
            let ptr = gl.map_buffer_range(
                glow::COPY_WRITE_BUFFER,
                0,
                self.info.size_in_bytes as i32,
                glow::MAP_READ_BIT | glow::MAP_WRITE_BIT,
            );
            gl.bind_buffer(glow::COPY_WRITE_BUFFER, None);
            ptr
        };
        check_error(gl, "glMapBufferRange")?;
        let ptr = NonNull::new(ptr).ok_or_else(|| {
            Error::operation_failed("glMapBufferRange", NativeCode::Message("null mapping".into()))
        })?;
        self.mapped.set(true);
        Ok(ptr)
    }

    pub(super) fn unmap(&self) -> Result<()> {
        if !self.mapped.get() {
            return Err(Error::invalid_usage("buffer is not mapped"));
        }
        let gl = &self.shared.gl;
        unsafe {
            gl.bind_buffer(glow::COPY_WRITE_BUFFER, Some(self.raw));
            gl.unmap_buffer(glow::COPY_WRITE_BUFFER);
            gl.bind_buffer(glow::COPY_WRITE_BUFFER, None);
        }
        self.mapped.set(false);
        check_error(gl, "glUnmapBuffer")
    }
}

impl Buffer for GlBuffer {
    fn info(&self) -> &BufferInfo {
        &self.info
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for GlBuffer {
    fn drop(&mut self) {
        // Deleting a mapped buffer unmaps it.
        unsafe { self.shared.gl.delete_buffer(self.raw) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_hints() {
        assert_eq!(usage_hint(BufferUsage::VERTEX_BUFFER), glow::STATIC_DRAW);
        assert_eq!(usage_hint(BufferUsage::CONSTANT_BUFFER | BufferUsage::MAP_WRITE), glow::DYNAMIC_DRAW);
        assert_eq!(usage_hint(BufferUsage::TRANSFER_BUFFER), glow::STREAM_COPY);
    }
}
