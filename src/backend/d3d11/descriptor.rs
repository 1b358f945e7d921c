// Descriptor layouts and sets
//
// D3D11 has no descriptor objects. A set resolves each descriptor to the
// native views it binds plus the stages that see it; the command list
// assigns register slots through the pipeline's per-stage remap tables.

use super::buffer::D3D11Buffer;
use super::cast;
use super::sampler::D3D11Sampler;
use super::texture::D3D11Texture;
use crate::descriptor::{
    validate_descriptors, Descriptor, DescriptorLayout, DescriptorLayoutInfo, DescriptorSet, DescriptorType,
};
use crate::error::{Error, Result};
use crate::shader::ShaderStage;
use std::any::Any;
use windows::Win32::Graphics::Direct3D11::{ID3D11Buffer, ID3D11SamplerState, ID3D11ShaderResourceView};

/// `*SetConstantBuffers1` offsets and sizes count 16-byte constants, and
/// both must be multiples of 16 constants.
const CONSTANT_SIZE: u32 = 16;
const CONSTANT_ALIGNMENT: u32 = 256;

/// (first constant, number of constants) covering `range` bytes at `offset`.
pub(super) fn constant_window(offset: u32, range: u32) -> Result<(u32, u32)> {
    if offset % CONSTANT_ALIGNMENT != 0 {
        return Err(Error::invalid_usage(format!(
            "constant buffer offset {} is not a multiple of {} bytes",
            offset, CONSTANT_ALIGNMENT
        )));
    }
    let padded = range.div_ceil(CONSTANT_ALIGNMENT) * CONSTANT_ALIGNMENT;
    Ok((offset / CONSTANT_SIZE, padded / CONSTANT_SIZE))
}

#[derive(Clone)]
pub(super) enum BoundResource {
    ConstantBuffer {
        buffer: ID3D11Buffer,
        first_constant: u32,
        num_constants: u32,
    },
    Texture {
        view: ID3D11ShaderResourceView,
        sampler: ID3D11SamplerState,
    },
}

#[derive(Clone)]
pub(super) struct ResolvedBinding {
    pub binding: u32,
    pub stages: ShaderStage,
    pub resource: BoundResource,
}

/// Native views for validated descriptors.
pub(super) fn resolve(layout: &DescriptorLayoutInfo, descriptors: &[Descriptor<'_>]) -> Result<Vec<ResolvedBinding>> {
    descriptors
        .iter()
        .map(|descriptor| {
            let stages = layout
                .binding(descriptor.binding)
                .map(|b| b.stages)
                .ok_or_else(|| Error::invalid_usage(format!("binding {} is not in the layout", descriptor.binding)))?;

            let resource = match descriptor.ty {
                DescriptorType::ConstantBuffer => {
                    let buffer = descriptor
                        .buffer
                        .ok_or_else(|| Error::invalid_usage("constant buffer descriptor without a buffer"))?;
                    let (first_constant, num_constants) =
                        constant_window(descriptor.buffer_offset, descriptor.resolved_range())?;
                    BoundResource::ConstantBuffer {
                        buffer: cast::<D3D11Buffer>(buffer.as_any(), "buffer")?.raw.clone(),
                        first_constant,
                        num_constants,
                    }
                }
                DescriptorType::Texture => {
                    let (texture, sampler) = descriptor
                        .texture
                        .zip(descriptor.sampler)
                        .ok_or_else(|| Error::invalid_usage("texture descriptor needs a texture and a sampler"))?;
                    let texture = cast::<D3D11Texture>(texture.as_any(), "texture")?;
                    BoundResource::Texture {
                        view: texture
                            .srv
                            .clone()
                            .ok_or_else(|| Error::invalid_usage("texture has no shader resource view"))?,
                        sampler: cast::<D3D11Sampler>(sampler.as_any(), "sampler")?.raw.clone(),
                    }
                }
            };

            Ok(ResolvedBinding {
                binding: descriptor.binding,
                stages,
                resource,
            })
        })
        .collect()
}

pub struct D3D11DescriptorLayout {
    info: DescriptorLayoutInfo,
}

impl D3D11DescriptorLayout {
    pub(super) fn new(info: &DescriptorLayoutInfo) -> Result<Self> {
        info.validate()?;
        Ok(Self { info: info.clone() })
    }
}

impl DescriptorLayout for D3D11DescriptorLayout {
    fn info(&self) -> &DescriptorLayoutInfo {
        &self.info
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct D3D11DescriptorSet {
    layout_info: DescriptorLayoutInfo,
    pub(super) bindings: Vec<ResolvedBinding>,
}

impl D3D11DescriptorSet {
    pub(super) fn new(layout: &D3D11DescriptorLayout, descriptors: &[Descriptor<'_>]) -> Result<Self> {
        if layout.info.push_descriptor {
            return Err(Error::invalid_usage(
                "push descriptor layouts are bound with push_descriptors, not descriptor sets",
            ));
        }
        validate_descriptors(&layout.info, descriptors)?;
        Ok(Self {
            layout_info: layout.info.clone(),
            bindings: resolve(&layout.info, descriptors)?,
        })
    }
}

impl DescriptorSet for D3D11DescriptorSet {
    fn layout_info(&self) -> &DescriptorLayoutInfo {
        &self.layout_info
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_windows_are_register_aligned() {
        assert_eq!(constant_window(0, 64).unwrap(), (0, 16));
        assert_eq!(constant_window(256, 300).unwrap(), (16, 32));
        assert!(matches!(constant_window(16, 64), Err(Error::InvalidUsage(_))));
    }
}
