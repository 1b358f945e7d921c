// Command lists
//
// Every backend records differently (native command buffer, deferred
// context, replayable instruction list) but they all share the recording
// state machine in `CommandTracker`:
//
//   Unrecorded --begin--> Recording --end--> Recorded --execute--> Executed
//        ^                    |  ^                                     |
//        +------ begin -------+--+------------------ begin ------------+
//
// Inside Recording there is a render-pass sub-state. Draw and bind calls
// need an open pass; transfers need no open pass.

use crate::buffer::Buffer;
use crate::descriptor::{Descriptor, DescriptorSet};
use crate::error::{Error, Result};
use crate::geometry::{ColorF, Region3D};
use crate::pipeline::Pipeline;
use crate::texture::{Texture, TextureUsage};
use std::any::Any;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoadOp {
    #[default]
    Clear,
    Load,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StoreOp {
    #[default]
    Store,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    U16,
    U32,
}

impl IndexFormat {
    pub const fn size_in_bytes(self) -> u32 {
        match self {
            IndexFormat::U16 => 2,
            IndexFormat::U32 => 4,
        }
    }
}

#[derive(Clone, Copy)]
pub struct ColorAttachmentInfo<'a> {
    pub texture: &'a dyn Texture,
    pub clear_color: ColorF,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
}

impl<'a> ColorAttachmentInfo<'a> {
    pub fn clear(texture: &'a dyn Texture, clear_color: ColorF) -> Self {
        Self {
            texture,
            clear_color,
            load_op: LoadOp::Clear,
            store_op: StoreOp::Store,
        }
    }

    pub fn load(texture: &'a dyn Texture) -> Self {
        Self {
            texture,
            clear_color: ColorF::TRANSPARENT,
            load_op: LoadOp::Load,
            store_op: StoreOp::Store,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordingState {
    Unrecorded,
    Recording,
    Recorded,
    Executed,
}

/// Recording state shared by every backend's command list.
#[derive(Debug, Clone)]
pub struct CommandTracker {
    state: RecordingState,
    in_render_pass: bool,
    pipeline_set: bool,
    index_set: bool,
}

impl Default for CommandTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandTracker {
    pub const fn new() -> Self {
        Self {
            state: RecordingState::Unrecorded,
            in_render_pass: false,
            pipeline_set: false,
            index_set: false,
        }
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn in_render_pass(&self) -> bool {
        self.in_render_pass
    }

    /// Start a fresh recording. Returns the state that was discarded so the
    /// backend can release whatever native work it still holds.
    pub fn begin(&mut self) -> RecordingState {
        let previous = self.state;
        if previous == RecordingState::Recording {
            log::debug!(
                target: crate::diagnostics::targets::VALIDATION,
                "Command list restarted while recording; previous commands discarded"
            );
        }
        self.state = RecordingState::Recording;
        self.in_render_pass = false;
        self.pipeline_set = false;
        self.index_set = false;
        previous
    }

    pub fn end(&mut self) -> Result<()> {
        self.require_recording("end")?;
        if self.in_render_pass {
            return Err(Error::invalid_usage("end called with a render pass still open"));
        }
        self.state = RecordingState::Recorded;
        Ok(())
    }

    pub fn require_recording(&self, operation: &str) -> Result<()> {
        if self.state != RecordingState::Recording {
            return Err(Error::invalid_usage(format!(
                "{} called on a command list in state {:?}; call begin first",
                operation, self.state
            )));
        }
        Ok(())
    }

    pub fn require_render_pass(&self, operation: &str) -> Result<()> {
        self.require_recording(operation)?;
        if !self.in_render_pass {
            return Err(Error::invalid_usage(format!(
                "{} is only valid inside a render pass",
                operation
            )));
        }
        Ok(())
    }

    pub fn require_outside_render_pass(&self, operation: &str) -> Result<()> {
        self.require_recording(operation)?;
        if self.in_render_pass {
            return Err(Error::invalid_usage(format!(
                "{} is a transfer operation and is not valid inside a render pass",
                operation
            )));
        }
        Ok(())
    }

    pub fn begin_render_pass(&mut self) -> Result<()> {
        self.require_outside_render_pass("begin_render_pass")?;
        self.in_render_pass = true;
        Ok(())
    }

    pub fn end_render_pass(&mut self) -> Result<()> {
        self.require_render_pass("end_render_pass")?;
        self.in_render_pass = false;
        Ok(())
    }

    /// Bound state lasts until the next `begin`, across render passes.
    pub fn pipeline_bound(&mut self) {
        self.pipeline_set = true;
    }

    pub fn index_buffer_bound(&mut self) {
        self.index_set = true;
    }

    /// Checks shared by `draw` and `draw_indexed`.
    pub fn require_draw(&self, operation: &str, indexed: bool) -> Result<()> {
        self.require_render_pass(operation)?;
        if !self.pipeline_set {
            return Err(Error::invalid_usage(format!(
                "{} called before set_graphics_pipeline",
                operation
            )));
        }
        if indexed && !self.index_set {
            return Err(Error::invalid_usage(format!(
                "{} called before set_index_buffer",
                operation
            )));
        }
        Ok(())
    }

    /// Mark the list as submitted. Lists are single-use: a second execute
    /// without a new `begin` is rejected.
    pub fn submit(&mut self) -> Result<()> {
        match self.state {
            RecordingState::Recorded => {
                self.state = RecordingState::Executed;
                Ok(())
            }
            RecordingState::Executed => Err(Error::invalid_usage(
                "command list was already executed; record it again with begin/end",
            )),
            state => Err(Error::invalid_usage(format!(
                "only a recorded command list can be executed (state {:?})",
                state
            ))),
        }
    }
}

/// Check the attachments passed to `begin_render_pass`.
pub(crate) fn validate_attachments(attachments: &[ColorAttachmentInfo<'_>]) -> Result<()> {
    if attachments.is_empty() {
        return Err(Error::invalid_usage("begin_render_pass needs at least one color attachment"));
    }
    if attachments.len() > crate::pipeline::MAX_COLOR_TARGETS {
        return Err(Error::invalid_usage(format!(
            "at most {} color attachments are supported",
            crate::pipeline::MAX_COLOR_TARGETS
        )));
    }
    let size = attachments[0].texture.info().size;
    for attachment in attachments {
        let info = attachment.texture.info();
        if !info.usage.contains(TextureUsage::COLOR_TARGET) {
            return Err(Error::invalid_usage(format!(
                "{:?} texture without COLOR_TARGET usage used as a color attachment",
                info.format
            )));
        }
        if info.size.width != size.width || info.size.height != size.height {
            return Err(Error::invalid_usage("color attachments must share one extent"));
        }
    }
    Ok(())
}

pub trait CommandList {
    fn state(&self) -> RecordingState;

    fn begin(&mut self) -> Result<()>;

    fn end(&mut self) -> Result<()>;

    fn begin_render_pass(&mut self, attachments: &[ColorAttachmentInfo<'_>]) -> Result<()>;

    fn end_render_pass(&mut self) -> Result<()>;

    fn set_graphics_pipeline(&mut self, pipeline: &dyn Pipeline) -> Result<()>;

    fn set_descriptor_set(&mut self, slot: u32, pipeline: &dyn Pipeline, set: &dyn DescriptorSet) -> Result<()>;

    fn push_descriptors(&mut self, slot: u32, pipeline: &dyn Pipeline, descriptors: &[Descriptor<'_>]) -> Result<()>;

    fn set_vertex_buffer(&mut self, slot: u32, buffer: &dyn Buffer, stride: u32, offset: u32) -> Result<()>;

    fn set_index_buffer(&mut self, buffer: &dyn Buffer, format: IndexFormat, offset: u32) -> Result<()>;

    fn draw(&mut self, num_vertices: u32, first_vertex: u32) -> Result<()>;

    /// `base_vertex` is added to every fetched index.
    fn draw_indexed(&mut self, num_indices: u32, first_index: u32, base_vertex: i32) -> Result<()>;

    /// Copies `size` bytes, or the rest of `src` after `src_offset` when
    /// `size` is `None`.
    fn copy_buffer_to_buffer(
        &mut self,
        src: &dyn Buffer,
        src_offset: u32,
        dst: &dyn Buffer,
        dst_offset: u32,
        size: Option<u32>,
    ) -> Result<()>;

    /// Copies tightly packed texels into mip 0 of `dst`. `region` defaults
    /// to the whole texture.
    fn copy_buffer_to_texture(
        &mut self,
        src: &dyn Buffer,
        src_offset: u32,
        dst: &dyn Texture,
        region: Option<Region3D>,
    ) -> Result<()>;

    fn generate_mipmaps(&mut self, texture: &dyn Texture) -> Result<()>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Resolved byte count of a buffer-to-buffer copy, bounds-checked.
pub(crate) fn resolve_copy_size(
    src: &dyn Buffer,
    src_offset: u32,
    dst: &dyn Buffer,
    dst_offset: u32,
    size: Option<u32>,
) -> Result<u32> {
    let size = match size {
        Some(size) => size,
        None => src.info().size_in_bytes.checked_sub(src_offset).ok_or_else(|| {
            Error::invalid_usage(format!(
                "source offset {} is past the end of a {} byte buffer",
                src_offset,
                src.info().size_in_bytes
            ))
        })?,
    };
    if size == 0 {
        return Err(Error::invalid_usage("buffer copy of zero bytes"));
    }
    src.info().check_range(src_offset, size as usize)?;
    dst.info().check_range(dst_offset, size as usize)?;
    Ok(size)
}

/// Resolved region of a buffer-to-texture copy plus its byte size.
pub(crate) fn resolve_texture_copy(
    src: &dyn Buffer,
    src_offset: u32,
    dst: &dyn Texture,
    region: Option<Region3D>,
) -> Result<Region3D> {
    let info = dst.info();
    let region = region.unwrap_or(Region3D::whole(info.size));
    if !region.fits_within(info.size) {
        return Err(Error::invalid_usage(format!(
            "copy region {:?} is outside a texture of {:?}",
            region, info.size
        )));
    }
    src.info()
        .check_range(src_offset, info.format.data_size(region.size))?;
    Ok(region)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{BufferInfo, BufferUsage};
    use crate::descriptor::tests::{FakeBuffer, FakeTexture};
    use crate::format::Format;
    use crate::texture::TextureInfo;

    #[test]
    fn full_cycle() {
        let mut tracker = CommandTracker::new();
        assert_eq!(tracker.state(), RecordingState::Unrecorded);

        tracker.begin();
        tracker.begin_render_pass().unwrap();
        tracker.require_render_pass("draw").unwrap();
        tracker.end_render_pass().unwrap();
        tracker.end().unwrap();
        assert_eq!(tracker.state(), RecordingState::Recorded);

        tracker.submit().unwrap();
        assert_eq!(tracker.state(), RecordingState::Executed);
    }

    #[test]
    fn operations_outside_recording_fail() {
        let tracker = CommandTracker::new();
        assert!(matches!(tracker.require_recording("draw"), Err(Error::InvalidUsage(_))));

        let mut tracker = CommandTracker::new();
        assert!(tracker.end().is_err());
        assert!(tracker.begin_render_pass().is_err());
    }

    #[test]
    fn draw_needs_render_pass() {
        let mut tracker = CommandTracker::new();
        tracker.begin();
        assert!(matches!(
            tracker.require_render_pass("draw"),
            Err(Error::InvalidUsage(_))
        ));
        assert!(tracker.require_render_pass("set_vertex_buffer").is_err());
    }

    #[test]
    fn draws_need_bound_pipeline_and_indices() {
        let mut tracker = CommandTracker::new();
        tracker.begin();
        tracker.begin_render_pass().unwrap();
        assert!(matches!(tracker.require_draw("draw", false), Err(Error::InvalidUsage(_))));

        tracker.pipeline_bound();
        tracker.require_draw("draw", false).unwrap();
        assert!(matches!(tracker.require_draw("draw_indexed", true), Err(Error::InvalidUsage(_))));

        tracker.index_buffer_bound();
        tracker.require_draw("draw_indexed", true).unwrap();

        // Bindings survive the pass but not a new recording.
        tracker.end_render_pass().unwrap();
        assert!(tracker.require_draw("draw", false).is_err());
        tracker.begin_render_pass().unwrap();
        tracker.require_draw("draw_indexed", true).unwrap();

        tracker.begin();
        tracker.begin_render_pass().unwrap();
        assert!(tracker.require_draw("draw", false).is_err());
        tracker.pipeline_bound();
        assert!(tracker.require_draw("draw_indexed", true).is_err());
    }

    #[test]
    fn transfers_are_rejected_inside_render_pass() {
        let mut tracker = CommandTracker::new();
        tracker.begin();
        tracker.begin_render_pass().unwrap();
        assert!(tracker.require_outside_render_pass("copy_buffer_to_buffer").is_err());
        assert!(tracker.begin_render_pass().is_err());
        assert!(tracker.end().is_err());
    }

    #[test]
    fn begin_twice_resets() {
        let mut tracker = CommandTracker::new();
        tracker.begin();
        tracker.begin_render_pass().unwrap();

        assert_eq!(tracker.begin(), RecordingState::Recording);
        assert_eq!(tracker.state(), RecordingState::Recording);
        assert!(!tracker.in_render_pass());
        tracker.end().unwrap();
    }

    #[test]
    fn lists_are_single_use() {
        let mut tracker = CommandTracker::new();
        assert!(tracker.submit().is_err());

        tracker.begin();
        assert!(tracker.submit().is_err());
        tracker.end().unwrap();
        tracker.submit().unwrap();
        assert!(matches!(tracker.submit(), Err(Error::InvalidUsage(_))));

        assert_eq!(tracker.begin(), RecordingState::Executed);
        tracker.end().unwrap();
        assert!(tracker.submit().is_ok());
    }

    #[test]
    fn copy_size_defaults_to_rest_of_source() {
        let src = FakeBuffer(BufferInfo::new(BufferUsage::TRANSFER_BUFFER, 128));
        let dst = FakeBuffer(BufferInfo::new(BufferUsage::VERTEX_BUFFER, 256));

        assert_eq!(resolve_copy_size(&src, 0, &dst, 0, None).unwrap(), 128);
        assert_eq!(resolve_copy_size(&src, 32, &dst, 0, None).unwrap(), 96);
        assert!(resolve_copy_size(&src, 0, &dst, 200, None).is_err());
        assert!(resolve_copy_size(&src, 129, &dst, 0, None).is_err());
    }

    #[test]
    fn texture_copy_checks_source_size() {
        let texture = FakeTexture(TextureInfo::texture_2d(
            Format::R8G8B8A8_UNorm,
            8,
            8,
            1,
            TextureUsage::SHADER_RESOURCE,
        ));
        let enough = FakeBuffer(BufferInfo::new(BufferUsage::TRANSFER_BUFFER, 256));
        let short = FakeBuffer(BufferInfo::new(BufferUsage::TRANSFER_BUFFER, 255));

        assert!(resolve_texture_copy(&enough, 0, &texture, None).is_ok());
        assert!(resolve_texture_copy(&short, 0, &texture, None).is_err());
        assert!(resolve_texture_copy(&enough, 0, &texture, Some(Region3D::new(4, 4, 0, 8, 8, 1))).is_err());
    }

    #[test]
    fn attachments_need_color_target_usage() {
        let target = FakeTexture(TextureInfo::texture_2d(
            Format::B8G8R8A8_UNorm,
            8,
            8,
            1,
            TextureUsage::COLOR_TARGET,
        ));
        let sampled = FakeTexture(TextureInfo::texture_2d(
            Format::B8G8R8A8_UNorm,
            8,
            8,
            1,
            TextureUsage::SHADER_RESOURCE,
        ));

        assert!(validate_attachments(&[ColorAttachmentInfo::clear(&target, ColorF::BLACK)]).is_ok());
        assert!(validate_attachments(&[ColorAttachmentInfo::load(&sampled)]).is_err());
        assert!(validate_attachments(&[]).is_err());
    }
}
