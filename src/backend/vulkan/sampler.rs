use super::device::DeviceShared;
use super::{conv, VkCheck};
use crate::error::{Error, Result};
use crate::sampler::{Sampler, SamplerInfo};
use ash::vk;
use std::any::Any;
use std::sync::Arc;

pub struct VulkanSampler {
    device: Arc<DeviceShared>,
    pub(super) raw: vk::Sampler,
    info: SamplerInfo,
}

impl VulkanSampler {
    pub(super) fn new(device: Arc<DeviceShared>, info: &SamplerInfo) -> Result<Self> {
        info.validate()?;

        let anisotropy = info.anisotropy_enabled();
        if anisotropy && !device.sampler_anisotropy {
            return Err(Error::unsupported("anisotropic filtering is not supported by this device"));
        }
        let max_anisotropy = (info.max_anisotropy as f32).min(device.limits.max_sampler_anisotropy);

        let create_info = vk::SamplerCreateInfo::builder()
            .min_filter(conv::filter(info.min_filter))
            .mag_filter(conv::filter(info.mag_filter))
            .mipmap_mode(conv::mipmap_mode(info.mip_filter))
            .address_mode_u(conv::address_mode(info.address_u))
            .address_mode_v(conv::address_mode(info.address_v))
            .address_mode_w(conv::address_mode(info.address_w))
            .anisotropy_enable(anisotropy)
            .max_anisotropy(if anisotropy { max_anisotropy } else { 1.0 })
            .min_lod(info.min_lod)
            .max_lod(info.max_lod)
            .border_color(vk::BorderColor::FLOAT_TRANSPARENT_BLACK)
            .unnormalized_coordinates(false);

        let raw = unsafe { device.device.create_sampler(&create_info, None) }.check("vkCreateSampler")?;

        Ok(Self {
            device,
            raw,
            info: *info,
        })
    }
}

impl Sampler for VulkanSampler {
    fn info(&self) -> &SamplerInfo {
        &self.info
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanSampler {
    fn drop(&mut self) {
        unsafe { self.device.device.destroy_sampler(self.raw, None) };
    }
}
