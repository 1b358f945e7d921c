// Swapchain - presentable image ring
//
// Creation clamps the requested size and buffer count to what the surface
// allows; the clamped values are what `size()`/`buffer_count()` report.

use crate::error::{Error, Result};
use crate::format::Format;
use crate::geometry::Size2D;
use crate::surface::Surface;
use crate::texture::Texture;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentMode {
    Immediate,
    Mailbox,
    #[default]
    Fifo,
    FifoRelaxed,
    /// Mailbox if available, otherwise Fifo.
    VSyncOn,
    /// Immediate if available, otherwise Fifo.
    VSyncOff,
}

impl PresentMode {
    /// Concrete modes to try, in order of preference.
    pub const fn candidates(self) -> &'static [PresentMode] {
        match self {
            PresentMode::Immediate => &[PresentMode::Immediate],
            PresentMode::Mailbox => &[PresentMode::Mailbox],
            PresentMode::Fifo => &[PresentMode::Fifo],
            PresentMode::FifoRelaxed => &[PresentMode::FifoRelaxed],
            PresentMode::VSyncOn => &[PresentMode::Mailbox, PresentMode::Fifo],
            PresentMode::VSyncOff => &[PresentMode::Immediate, PresentMode::Fifo],
        }
    }

    /// Sync interval for APIs that present with an interval instead of a mode.
    pub const fn swap_interval(self) -> u32 {
        match self {
            PresentMode::Immediate | PresentMode::Mailbox | PresentMode::VSyncOff => 0,
            PresentMode::Fifo | PresentMode::FifoRelaxed | PresentMode::VSyncOn => 1,
        }
    }
}

impl FromStr for PresentMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "immediate" => Ok(PresentMode::Immediate),
            "mailbox" => Ok(PresentMode::Mailbox),
            "fifo" => Ok(PresentMode::Fifo),
            "fifo_relaxed" => Ok(PresentMode::FifoRelaxed),
            "vsync" | "vsync_on" => Ok(PresentMode::VSyncOn),
            "vsync_off" => Ok(PresentMode::VSyncOff),
            other => Err(Error::invalid_usage(format!("unknown present mode '{}'", other))),
        }
    }
}

/// Pick the first candidate of `requested` found in `available`.
pub fn choose_present_mode(requested: PresentMode, available: &[PresentMode]) -> Result<PresentMode> {
    requested
        .candidates()
        .iter()
        .copied()
        .find(|mode| available.contains(mode))
        .ok_or_else(|| {
            Error::unsupported(format!(
                "present mode {:?} is not supported by the surface (available: {:?})",
                requested, available
            ))
        })
}

/// Clamp a requested extent into the surface's supported range.
pub fn clamp_size(requested: Size2D, min: Size2D, max: Size2D) -> Size2D {
    requested.clamp(min, max)
}

/// Clamp a requested image count. `max == 0` means no upper bound.
pub fn clamp_image_count(requested: u32, min: u32, max: u32) -> u32 {
    let count = requested.max(min);
    if max > 0 {
        count.min(max)
    } else {
        count
    }
}

pub struct SwapchainInfo<'a> {
    pub surface: &'a dyn Surface,
    pub format: Format,
    pub size: Size2D,
    pub present_mode: PresentMode,
    pub num_buffers: u32,
}

impl SwapchainInfo<'_> {
    pub fn validate(&self) -> Result<()> {
        if self.size.is_empty() {
            return Err(Error::invalid_usage(format!(
                "swapchain size {}x{} is empty",
                self.size.width, self.size.height
            )));
        }
        if self.num_buffers == 0 {
            return Err(Error::invalid_usage("a swapchain needs at least one buffer"));
        }
        if self.format == Format::Unknown || self.format.is_depth() || self.format.is_compressed() {
            return Err(Error::invalid_usage(format!(
                "{:?} is not a presentable format",
                self.format
            )));
        }
        Ok(())
    }
}

pub trait Swapchain {
    fn size(&self) -> Size2D;

    fn format(&self) -> Format;

    fn present_mode(&self) -> PresentMode;

    fn buffer_count(&self) -> u32;

    /// Acquire the texture to render the next frame into.
    fn get_next_texture(&mut self) -> Result<&dyn Texture>;

    fn present(&mut self) -> Result<()>;

    /// Rebuild the swapchain images for a new surface size.
    fn resize(&mut self, size: Size2D) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_request_clamps_to_surface_max() {
        let size = clamp_size(Size2D::new(4000, 4000), Size2D::new(1, 1), Size2D::new(2048, 2048));
        assert_eq!(size, Size2D::new(2048, 2048));
    }

    #[test]
    fn image_count_clamps() {
        assert_eq!(clamp_image_count(2, 2, 8), 2);
        assert_eq!(clamp_image_count(1, 2, 8), 2);
        assert_eq!(clamp_image_count(10, 2, 8), 8);
        assert_eq!(clamp_image_count(10, 2, 0), 10);
    }

    #[test]
    fn vsync_modes_fall_back_to_fifo() {
        let fifo_only = [PresentMode::Fifo];
        assert_eq!(choose_present_mode(PresentMode::VSyncOn, &fifo_only).unwrap(), PresentMode::Fifo);
        assert_eq!(choose_present_mode(PresentMode::VSyncOff, &fifo_only).unwrap(), PresentMode::Fifo);

        let all = [PresentMode::Fifo, PresentMode::Mailbox, PresentMode::Immediate];
        assert_eq!(choose_present_mode(PresentMode::VSyncOn, &all).unwrap(), PresentMode::Mailbox);
        assert_eq!(choose_present_mode(PresentMode::VSyncOff, &all).unwrap(), PresentMode::Immediate);
    }

    #[test]
    fn missing_mode_is_unsupported() {
        let err = choose_present_mode(PresentMode::Mailbox, &[PresentMode::Fifo]).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFeature(_)));
    }

    #[test]
    fn parses_config_names() {
        assert_eq!("FIFO_RELAXED".parse::<PresentMode>().unwrap(), PresentMode::FifoRelaxed);
        assert_eq!("vsync".parse::<PresentMode>().unwrap(), PresentMode::VSyncOn);
        assert!("triple".parse::<PresentMode>().is_err());
    }
}
