// Plain value types: sizes, offsets, regions, viewports and colors

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Size2D {
    pub width: u32,
    pub height: u32,
}

impl Size2D {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Component-wise clamp into `[min, max]`.
    pub fn clamp(self, min: Size2D, max: Size2D) -> Size2D {
        Size2D {
            width: self.width.clamp(min.width, max.width.max(min.width)),
            height: self.height.clamp(min.height, max.height.max(min.height)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Size3D {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl Size3D {
    pub const fn new(width: u32, height: u32, depth: u32) -> Self {
        Self { width, height, depth }
    }

    /// Extent of mip `level`, never smaller than one texel.
    pub fn mip(self, level: u32) -> Size3D {
        Size3D {
            width: self.width.checked_shr(level).unwrap_or(0).max(1),
            height: self.height.checked_shr(level).unwrap_or(0).max(1),
            depth: self.depth.checked_shr(level).unwrap_or(0).max(1),
        }
    }
}

impl From<Size2D> for Size3D {
    fn from(size: Size2D) -> Self {
        Size3D::new(size.width, size.height, 1)
    }
}

impl From<Size3D> for Size2D {
    fn from(size: Size3D) -> Self {
        Size2D::new(size.width, size.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Offset2D {
    pub x: i32,
    pub y: i32,
}

impl Offset2D {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Offset3D {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Offset3D {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect2D {
    pub offset: Offset2D,
    pub size: Size2D,
}

impl Rect2D {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            offset: Offset2D::new(x, y),
            size: Size2D::new(width, height),
        }
    }
}

/// A box inside a texture: an origin plus an extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Region3D {
    pub offset: Offset3D,
    pub size: Size3D,
}

impl Region3D {
    pub const fn new(x: i32, y: i32, z: i32, width: u32, height: u32, depth: u32) -> Self {
        Self {
            offset: Offset3D::new(x, y, z),
            size: Size3D::new(width, height, depth),
        }
    }

    /// The region covering a whole texture of `size`.
    pub const fn whole(size: Size3D) -> Self {
        Self {
            offset: Offset3D::new(0, 0, 0),
            size,
        }
    }

    /// True when the region lies inside an image of `extent`.
    pub fn fits_within(&self, extent: Size3D) -> bool {
        let inside = |offset: i32, len: u32, max: u32| {
            offset >= 0 && (offset as u64 + len as u64) <= max as u64
        };
        inside(self.offset.x, self.size.width, extent.width)
            && inside(self.offset.y, self.size.height, extent.height)
            && inside(self.offset.z, self.size.depth, extent.depth.max(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    pub fn from_size(size: Size2D) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: size.width as f32,
            height: size.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// Linear RGBA color with float channels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ColorF {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl ColorF {
    pub const BLACK: ColorF = ColorF::new(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: ColorF = ColorF::new(1.0, 1.0, 1.0, 1.0);
    pub const TRANSPARENT: ColorF = ColorF::new(0.0, 0.0, 0.0, 0.0);
    pub const CORNFLOWER_BLUE: ColorF = ColorF::new(100.0 / 255.0, 149.0 / 255.0, 237.0 / 255.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl From<[f32; 4]> for ColorF {
    fn from([r, g, b, a]: [f32; 4]) -> Self {
        Self { r, g, b, a }
    }
}

impl From<glam::Vec4> for ColorF {
    fn from(v: glam::Vec4) -> Self {
        Self::from(v.to_array())
    }
}

impl From<ColorF> for glam::Vec4 {
    fn from(c: ColorF) -> Self {
        glam::Vec4::from_array(c.to_array())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colors_convert_through_glam() {
        let color = ColorF::new(0.25, 0.5, 0.75, 1.0);
        let v: glam::Vec4 = color.into();
        assert_eq!(v, glam::Vec4::new(0.25, 0.5, 0.75, 1.0));
        assert_eq!(ColorF::from(v.lerp(glam::Vec4::ONE, 1.0)), ColorF::WHITE);
    }

    #[test]
    fn clamp_limits_each_axis() {
        let clamped = Size2D::new(4000, 4000).clamp(Size2D::new(1, 1), Size2D::new(2048, 2048));
        assert_eq!(clamped, Size2D::new(2048, 2048));

        let clamped = Size2D::new(0, 600).clamp(Size2D::new(1, 1), Size2D::new(2048, 2048));
        assert_eq!(clamped, Size2D::new(1, 600));
    }

    #[test]
    fn mip_extent_never_reaches_zero() {
        let size = Size3D::new(300, 20, 1);
        assert_eq!(size.mip(1), Size3D::new(150, 10, 1));
        assert_eq!(size.mip(8), Size3D::new(1, 1, 1));
        assert_eq!(size.mip(39), Size3D::new(1, 1, 1));
    }

    #[test]
    fn region_bounds() {
        let extent = Size3D::new(64, 64, 1);
        assert!(Region3D::whole(extent).fits_within(extent));
        assert!(Region3D::new(32, 32, 0, 32, 32, 1).fits_within(extent));
        assert!(!Region3D::new(33, 0, 0, 32, 32, 1).fits_within(extent));
        assert!(!Region3D::new(-1, 0, 0, 1, 1, 1).fits_within(extent));
    }
}
