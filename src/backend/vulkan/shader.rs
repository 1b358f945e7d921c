// Shader module loading
//
// Vulkan consumes SPIR-V directly. The bytes are re-read into 4-byte words
// so callers can pass unaligned buffers (e.g. `include_bytes!`).

use super::device::DeviceShared;
use super::VkCheck;
use crate::error::{Error, Result};
use crate::shader::{ShaderMappingInfo, ShaderModule, ShaderStage};
use ash::vk;
use std::any::Any;
use std::ffi::{CStr, CString};
use std::io::Cursor;
use std::sync::Arc;

pub struct VulkanShaderModule {
    device: Arc<DeviceShared>,
    pub(super) raw: vk::ShaderModule,
    stage: ShaderStage,
    entry_point: String,
    entry_point_c: CString,
    mapping: Option<ShaderMappingInfo>,
}

impl VulkanShaderModule {
    pub(super) fn new(
        device: Arc<DeviceShared>,
        stage: ShaderStage,
        code: &[u8],
        entry_point: &str,
        mapping: Option<&ShaderMappingInfo>,
    ) -> Result<Self> {
        let words = ash::util::read_spv(&mut Cursor::new(code))
            .map_err(|e| Error::invalid_usage(format!("shader code is not valid SPIR-V: {}", e)))?;
        let entry_point_c = CString::new(entry_point)
            .map_err(|_| Error::invalid_usage("shader entry point contains a NUL byte"))?;

        let create_info = vk::ShaderModuleCreateInfo::builder().code(&words);
        let raw = unsafe { device.device.create_shader_module(&create_info, None) }.check("vkCreateShaderModule")?;

        Ok(Self {
            device,
            raw,
            stage,
            entry_point: entry_point.to_owned(),
            entry_point_c,
            mapping: mapping.cloned(),
        })
    }

    pub(super) fn entry_point_c(&self) -> &CStr {
        &self.entry_point_c
    }
}

impl ShaderModule for VulkanShaderModule {
    fn stage(&self) -> ShaderStage {
        self.stage
    }

    fn entry_point(&self) -> &str {
        &self.entry_point
    }

    fn mapping(&self) -> Option<&ShaderMappingInfo> {
        self.mapping.as_ref()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanShaderModule {
    fn drop(&mut self) {
        unsafe { self.device.device.destroy_shader_module(self.raw, None) };
    }
}
