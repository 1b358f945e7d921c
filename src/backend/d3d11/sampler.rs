use super::conv;
use super::device::DeviceShared;
use super::{created, HrCheck};
use crate::error::Result;
use crate::sampler::{Sampler, SamplerInfo};
use std::any::Any;
use windows::Win32::Graphics::Direct3D11::*;

pub struct D3D11Sampler {
    pub(super) raw: ID3D11SamplerState,
    info: SamplerInfo,
}

impl D3D11Sampler {
    pub(super) fn new(shared: &DeviceShared, info: &SamplerInfo) -> Result<Self> {
        info.validate()?;

        let desc = D3D11_SAMPLER_DESC {
            Filter: conv::filter(info),
            AddressU: conv::address_mode(info.address_u),
            AddressV: conv::address_mode(info.address_v),
            AddressW: conv::address_mode(info.address_w),
            MipLODBias: 0.0,
            // Feature level 11 always supports 16x.
            MaxAnisotropy: info.max_anisotropy.max(1),
            ComparisonFunc: D3D11_COMPARISON_NEVER,
            BorderColor: [0.0; 4],
            MinLOD: info.min_lod,
            MaxLOD: info.max_lod,
        };

        let mut raw = None;
        unsafe { shared.device.CreateSamplerState(&desc, Some(&mut raw)) }
            .check("ID3D11Device::CreateSamplerState")?;

        Ok(Self {
            raw: created(raw, "ID3D11Device::CreateSamplerState")?,
            info: *info,
        })
    }
}

impl Sampler for D3D11Sampler {
    fn info(&self) -> &SamplerInfo {
        &self.info
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
