// Samplers

use std::any::Any;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    Point,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Wrap,
    Mirror,
    ClampToEdge,
    ClampToBorder,
}

pub const MAX_ANISOTROPY: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerInfo {
    pub min_filter: Filter,
    pub mag_filter: Filter,
    pub mip_filter: Filter,
    pub address_u: AddressMode,
    pub address_v: AddressMode,
    pub address_w: AddressMode,
    /// 0 disables anisotropic filtering.
    pub max_anisotropy: u32,
    pub min_lod: f32,
    pub max_lod: f32,
}

impl SamplerInfo {
    pub const fn new(filter: Filter, address: AddressMode, max_anisotropy: u32) -> Self {
        Self {
            min_filter: filter,
            mag_filter: filter,
            mip_filter: filter,
            address_u: address,
            address_v: address,
            address_w: address,
            max_anisotropy,
            min_lod: 0.0,
            max_lod: 1000.0,
        }
    }

    pub const POINT_WRAP: SamplerInfo = SamplerInfo::new(Filter::Point, AddressMode::Wrap, 0);
    pub const POINT_CLAMP: SamplerInfo = SamplerInfo::new(Filter::Point, AddressMode::ClampToEdge, 0);
    pub const LINEAR_WRAP: SamplerInfo = SamplerInfo::new(Filter::Linear, AddressMode::Wrap, 0);
    pub const LINEAR_CLAMP: SamplerInfo = SamplerInfo::new(Filter::Linear, AddressMode::ClampToEdge, 0);
    pub const ANISOTROPIC: SamplerInfo = SamplerInfo::new(Filter::Linear, AddressMode::Wrap, MAX_ANISOTROPY);

    pub fn anisotropy_enabled(&self) -> bool {
        self.max_anisotropy > 0
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.max_anisotropy > MAX_ANISOTROPY {
            return Err(crate::Error::invalid_usage(format!(
                "max anisotropy {} exceeds {}",
                self.max_anisotropy, MAX_ANISOTROPY
            )));
        }
        if self.min_lod > self.max_lod {
            return Err(crate::Error::invalid_usage(format!(
                "min lod {} is above max lod {}",
                self.min_lod, self.max_lod
            )));
        }
        Ok(())
    }
}

impl Default for SamplerInfo {
    fn default() -> Self {
        Self::LINEAR_WRAP
    }
}

pub trait Sampler {
    fn info(&self) -> &SamplerInfo;

    fn as_any(&self) -> &dyn Any;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets() {
        assert!(!SamplerInfo::LINEAR_CLAMP.anisotropy_enabled());
        assert!(SamplerInfo::ANISOTROPIC.anisotropy_enabled());
        assert_eq!(SamplerInfo::POINT_CLAMP.address_w, AddressMode::ClampToEdge);
        assert_eq!(SamplerInfo::default().max_lod, 1000.0);
    }

    #[test]
    fn validation() {
        assert!(SamplerInfo::ANISOTROPIC.validate().is_ok());
        let too_much = SamplerInfo { max_anisotropy: 32, ..SamplerInfo::ANISOTROPIC };
        assert!(too_much.validate().is_err());
        let inverted = SamplerInfo { min_lod: 4.0, max_lod: 1.0, ..SamplerInfo::LINEAR_WRAP };
        assert!(inverted.validate().is_err());
    }
}
