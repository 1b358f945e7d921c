// Pixel formats
//
// A backend-neutral format list. Every backend translates these to its own
// native enum; the bit sizes here are the single source of truth for upload
// sizing on all of them.

use crate::geometry::Size3D;
use serde::{Deserialize, Serialize};

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Format {
    #[default]
    Unknown,

    A8_UNorm,
    R8_UNorm,
    R8_UInt,
    R8_SNorm,
    R8_SInt,

    B5G6R5_UNorm,
    B5G5R5A1_UNorm,
    R8G8_UNorm,
    R8G8_UInt,
    R8G8_SNorm,
    R8G8_SInt,
    R16_Float,
    R16_UNorm,
    R16_UInt,
    R16_SNorm,
    R16_SInt,
    D16_UNorm,

    R8G8B8A8_UNorm,
    R8G8B8A8_UNorm_SRGB,
    R8G8B8A8_UInt,
    R8G8B8A8_SNorm,
    R8G8B8A8_SInt,
    B8G8R8A8_UNorm,
    B8G8R8A8_UNorm_SRGB,
    R10G10B10A2_UNorm,
    R10G10B10A2_UInt,
    R16G16_Float,
    R16G16_UNorm,
    R16G16_UInt,
    R16G16_SNorm,
    R16G16_SInt,
    R32_Float,
    R32_UInt,
    R32_SInt,
    D24_UNorm_S8_UInt,
    D32_Float,

    R16G16B16A16_Float,
    R16G16B16A16_UNorm,
    R16G16B16A16_UInt,
    R16G16B16A16_SNorm,
    R16G16B16A16_SInt,
    R32G32_Float,
    R32G32_UInt,
    R32G32_SInt,

    R32G32B32_Float,
    R32G32B32_UInt,
    R32G32B32_SInt,

    R32G32B32A32_Float,
    R32G32B32A32_UInt,
    R32G32B32A32_SInt,

    BC1_UNorm,
    BC1_UNorm_SRGB,
    BC2_UNorm,
    BC2_UNorm_SRGB,
    BC3_UNorm,
    BC3_UNorm_SRGB,
    BC4_UNorm,
    BC4_SNorm,
    BC5_UNorm,
    BC5_SNorm,
    BC6H_UF16,
    BC6H_SF16,
    BC7_UNorm,
    BC7_UNorm_SRGB,
}

impl Format {
    /// Every format, in declaration order.
    pub const ALL: [Format; 65] = {
        use Format::*;
        [
            Unknown,
            A8_UNorm, R8_UNorm, R8_UInt, R8_SNorm, R8_SInt,
            B5G6R5_UNorm, B5G5R5A1_UNorm, R8G8_UNorm, R8G8_UInt, R8G8_SNorm, R8G8_SInt,
            R16_Float, R16_UNorm, R16_UInt, R16_SNorm, R16_SInt, D16_UNorm,
            R8G8B8A8_UNorm, R8G8B8A8_UNorm_SRGB, R8G8B8A8_UInt, R8G8B8A8_SNorm, R8G8B8A8_SInt,
            B8G8R8A8_UNorm, B8G8R8A8_UNorm_SRGB, R10G10B10A2_UNorm, R10G10B10A2_UInt,
            R16G16_Float, R16G16_UNorm, R16G16_UInt, R16G16_SNorm, R16G16_SInt,
            R32_Float, R32_UInt, R32_SInt, D24_UNorm_S8_UInt, D32_Float,
            R16G16B16A16_Float, R16G16B16A16_UNorm, R16G16B16A16_UInt, R16G16B16A16_SNorm,
            R16G16B16A16_SInt, R32G32_Float, R32G32_UInt, R32G32_SInt,
            R32G32B32_Float, R32G32B32_UInt, R32G32B32_SInt,
            R32G32B32A32_Float, R32G32B32A32_UInt, R32G32B32A32_SInt,
            BC1_UNorm, BC1_UNorm_SRGB, BC2_UNorm, BC2_UNorm_SRGB, BC3_UNorm, BC3_UNorm_SRGB,
            BC4_UNorm, BC4_SNorm, BC5_UNorm, BC5_SNorm, BC6H_UF16, BC6H_SF16,
            BC7_UNorm, BC7_UNorm_SRGB,
        ]
    };

    /// Bits per pixel. Block-compressed formats report the average over a
    /// 4x4 block (BC1 = 4, BC3 = 8).
    pub const fn bits_per_pixel(self) -> u32 {
        use Format::*;
        match self {
            Unknown => 0,

            A8_UNorm | R8_UNorm | R8_UInt | R8_SNorm | R8_SInt => 8,

            B5G6R5_UNorm | B5G5R5A1_UNorm | R8G8_UNorm | R8G8_UInt | R8G8_SNorm | R8G8_SInt
            | R16_Float | R16_UNorm | R16_UInt | R16_SNorm | R16_SInt | D16_UNorm => 16,

            R8G8B8A8_UNorm | R8G8B8A8_UNorm_SRGB | R8G8B8A8_UInt | R8G8B8A8_SNorm
            | R8G8B8A8_SInt | B8G8R8A8_UNorm | B8G8R8A8_UNorm_SRGB | R10G10B10A2_UNorm
            | R10G10B10A2_UInt | R16G16_Float | R16G16_UNorm | R16G16_UInt | R16G16_SNorm
            | R16G16_SInt | R32_Float | R32_UInt | R32_SInt | D24_UNorm_S8_UInt | D32_Float => 32,

            R16G16B16A16_Float | R16G16B16A16_UNorm | R16G16B16A16_UInt | R16G16B16A16_SNorm
            | R16G16B16A16_SInt | R32G32_Float | R32G32_UInt | R32G32_SInt => 64,

            R32G32B32_Float | R32G32B32_UInt | R32G32B32_SInt => 96,

            R32G32B32A32_Float | R32G32B32A32_UInt | R32G32B32A32_SInt => 128,

            BC1_UNorm | BC1_UNorm_SRGB | BC4_UNorm | BC4_SNorm => 4,

            BC2_UNorm | BC2_UNorm_SRGB | BC3_UNorm | BC3_UNorm_SRGB | BC5_UNorm | BC5_SNorm
            | BC6H_UF16 | BC6H_SF16 | BC7_UNorm | BC7_UNorm_SRGB => 8,
        }
    }

    pub const fn is_depth(self) -> bool {
        matches!(
            self,
            Format::D16_UNorm | Format::D24_UNorm_S8_UInt | Format::D32_Float
        )
    }

    pub const fn has_stencil(self) -> bool {
        matches!(self, Format::D24_UNorm_S8_UInt)
    }

    pub const fn is_compressed(self) -> bool {
        use Format::*;
        matches!(
            self,
            BC1_UNorm
                | BC1_UNorm_SRGB
                | BC2_UNorm
                | BC2_UNorm_SRGB
                | BC3_UNorm
                | BC3_UNorm_SRGB
                | BC4_UNorm
                | BC4_SNorm
                | BC5_UNorm
                | BC5_SNorm
                | BC6H_UF16
                | BC6H_SF16
                | BC7_UNorm
                | BC7_UNorm_SRGB
        )
    }

    pub const fn is_srgb(self) -> bool {
        use Format::*;
        matches!(
            self,
            R8G8B8A8_UNorm_SRGB
                | B8G8R8A8_UNorm_SRGB
                | BC1_UNorm_SRGB
                | BC2_UNorm_SRGB
                | BC3_UNorm_SRGB
                | BC7_UNorm_SRGB
        )
    }

    /// Bytes in one row of `width` pixels. Compressed formats count rows of
    /// 4x4 blocks.
    pub const fn row_pitch(self, width: u32) -> u32 {
        if self.is_compressed() {
            let blocks = (width + 3) / 4;
            blocks * self.bits_per_pixel() * 16 / 8
        } else {
            (width * self.bits_per_pixel() + 7) / 8
        }
    }

    /// Number of rows `row_pitch` describes for an image `height` pixels tall.
    pub const fn row_count(self, height: u32) -> u32 {
        if self.is_compressed() {
            (height + 3) / 4
        } else {
            height
        }
    }

    /// Tightly packed byte size of a region of this format.
    pub fn data_size(self, size: Size3D) -> usize {
        self.row_pitch(size.width) as usize
            * self.row_count(size.height) as usize
            * size.depth.max(1) as usize
    }
}

/// Number of levels in a full mip chain: `floor(log2(max(w, h))) + 1`.
///
/// A zero-sized extent still gets one level.
pub const fn calculate_mip_levels(width: u32, height: u32) -> u32 {
    let largest = if width > height { width } else { height };
    if largest == 0 {
        1
    } else {
        u32::BITS - largest.leading_zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_per_pixel_matches_native_sizes() {
        assert_eq!(Format::R8G8B8A8_UNorm.bits_per_pixel(), 32);
        assert_eq!(Format::BC1_UNorm.bits_per_pixel(), 4);
        assert_eq!(Format::BC7_UNorm_SRGB.bits_per_pixel(), 8);
        assert_eq!(Format::R32G32B32_Float.bits_per_pixel(), 96);
        assert_eq!(Format::R32G32B32A32_SInt.bits_per_pixel(), 128);
        assert_eq!(Format::D16_UNorm.bits_per_pixel(), 16);
        assert_eq!(Format::Unknown.bits_per_pixel(), 0);
    }

    #[test]
    fn every_known_format_has_a_size() {
        for format in Format::ALL.iter().skip(1) {
            assert!(format.bits_per_pixel() > 0, "{:?} has no size", format);
        }
    }

    #[test]
    fn all_formats_are_distinct() {
        let unique: std::collections::HashSet<_> = Format::ALL.iter().collect();
        assert_eq!(unique.len(), Format::ALL.len());
    }

    #[test]
    fn mip_levels_follow_log2() {
        assert_eq!(calculate_mip_levels(1, 1), 1);
        assert_eq!(calculate_mip_levels(256, 256), 9);
        assert_eq!(calculate_mip_levels(300, 200), 9);
        assert_eq!(calculate_mip_levels(1, 1024), 11);
        assert_eq!(calculate_mip_levels(0, 0), 1);

        for w in 1..=513u32 {
            let expected = (w as f64).log2().floor() as u32 + 1;
            assert_eq!(calculate_mip_levels(w, 1), expected, "width {}", w);
        }
    }

    #[test]
    fn data_size_handles_blocks() {
        let size = Size3D::new(64, 64, 1);
        assert_eq!(Format::R8G8B8A8_UNorm.data_size(size), 64 * 64 * 4);
        // 16x16 blocks of 8 bytes
        assert_eq!(Format::BC1_UNorm.data_size(size), 16 * 16 * 8);
        assert_eq!(Format::BC3_UNorm.data_size(size), 16 * 16 * 16);
        // partial blocks round up
        assert_eq!(Format::BC1_UNorm.data_size(Size3D::new(2, 2, 1)), 8);
    }
}
