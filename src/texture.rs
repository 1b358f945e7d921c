// Textures

use crate::format::{calculate_mip_levels, Format};
use crate::geometry::Size3D;
use bitflags::bitflags;
use std::any::Any;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureType {
    #[default]
    Texture2D,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TextureUsage: u32 {
        const SHADER_RESOURCE = 1 << 0;
        const COLOR_TARGET = 1 << 1;
        const DEPTH_STENCIL_TARGET = 1 << 2;

        const GENERATE_MIPS = 1 << 16;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureInfo {
    pub ty: TextureType,
    pub format: Format,
    pub size: Size3D,
    /// 0 requests a full mip chain.
    pub mip_levels: u32,
    pub array_size: u32,
    pub usage: TextureUsage,
}

impl Default for TextureInfo {
    fn default() -> Self {
        Self {
            ty: TextureType::Texture2D,
            format: Format::Unknown,
            size: Size3D::new(1, 1, 1),
            mip_levels: 1,
            array_size: 1,
            usage: TextureUsage::empty(),
        }
    }
}

impl TextureInfo {
    pub fn texture_2d(format: Format, width: u32, height: u32, mip_levels: u32, usage: TextureUsage) -> Self {
        Self {
            ty: TextureType::Texture2D,
            format,
            size: Size3D::new(width, height, 1),
            mip_levels,
            array_size: 1,
            usage,
        }
    }

    /// Mip count with the "0 means full chain" rule applied.
    pub fn resolved_mip_levels(&self) -> u32 {
        if self.mip_levels == 0 {
            calculate_mip_levels(self.size.width, self.size.height)
        } else {
            self.mip_levels
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.format == Format::Unknown {
            return Err(crate::Error::invalid_usage("texture format must not be Unknown"));
        }
        if self.size.width == 0 || self.size.height == 0 {
            return Err(crate::Error::invalid_usage(format!(
                "texture extent {}x{} is empty",
                self.size.width, self.size.height
            )));
        }
        if self.array_size == 0 {
            return Err(crate::Error::invalid_usage("texture array size must be at least 1"));
        }
        let full_chain = calculate_mip_levels(self.size.width, self.size.height);
        if self.mip_levels > full_chain {
            return Err(crate::Error::invalid_usage(format!(
                "{} mip levels requested but a {}x{} texture has at most {}",
                self.mip_levels, self.size.width, self.size.height, full_chain
            )));
        }
        if self.usage.contains(TextureUsage::DEPTH_STENCIL_TARGET) && !self.format.is_depth() {
            return Err(crate::Error::invalid_usage(format!(
                "{:?} cannot be used as a depth-stencil target",
                self.format
            )));
        }
        Ok(())
    }
}

pub trait Texture {
    fn info(&self) -> &TextureInfo;

    fn as_any(&self) -> &dyn Any;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_mips_means_full_chain() {
        let info = TextureInfo::texture_2d(Format::R8G8B8A8_UNorm, 300, 200, 0, TextureUsage::SHADER_RESOURCE);
        assert_eq!(info.resolved_mip_levels(), 9);

        let info = TextureInfo { mip_levels: 3, ..info };
        assert_eq!(info.resolved_mip_levels(), 3);
    }

    #[test]
    fn validation_rejects_bad_descriptions() {
        let good = TextureInfo::texture_2d(Format::R8G8B8A8_UNorm, 16, 16, 1, TextureUsage::SHADER_RESOURCE);
        assert!(good.validate().is_ok());

        assert!(TextureInfo { format: Format::Unknown, ..good }.validate().is_err());
        assert!(TextureInfo { size: Size3D::new(0, 16, 1), ..good }.validate().is_err());
        assert!(TextureInfo { usage: TextureUsage::DEPTH_STENCIL_TARGET, ..good }.validate().is_err());
    }

    #[test]
    fn mip_count_cannot_exceed_full_chain() {
        let usage = TextureUsage::SHADER_RESOURCE | TextureUsage::GENERATE_MIPS;
        let full = TextureInfo::texture_2d(Format::R8G8B8A8_UNorm, 256, 256, 9, usage);
        assert!(full.validate().is_ok());

        let err = TextureInfo { mip_levels: 10, ..full }.validate().unwrap_err();
        assert!(matches!(err, crate::Error::InvalidUsage(_)));
        assert!(TextureInfo { mip_levels: 40, ..full }.validate().is_err());
    }
}
