// Descriptor layouts and sets
//
// GL binds resources to flat binding points, so a "set" is just the list
// of resolved native handles. Slot numbers are assigned when the set is
// bound, through the pipeline's remap table.

use super::buffer::GlBuffer;
use super::sampler::GlSampler;
use super::texture::GlTexture;
use super::cast;
use crate::descriptor::{validate_descriptors, Descriptor, DescriptorLayout, DescriptorLayoutInfo, DescriptorSet, DescriptorType};
use crate::error::{Error, Result};
use std::any::Any;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum BoundResource {
    UniformBuffer {
        buffer: glow::Buffer,
        offset: u32,
        size: u32,
    },
    Texture {
        texture: glow::Texture,
        sampler: glow::Sampler,
    },
}

/// Native handles for validated descriptors, keyed by layout binding.
pub(super) fn resolve(descriptors: &[Descriptor<'_>]) -> Result<Vec<(u32, BoundResource)>> {
    descriptors
        .iter()
        .map(|descriptor| {
            let resource = match descriptor.ty {
                DescriptorType::ConstantBuffer => {
                    let buffer = descriptor
                        .buffer
                        .ok_or_else(|| Error::invalid_usage("constant buffer descriptor without a buffer"))?;
                    BoundResource::UniformBuffer {
                        buffer: cast::<GlBuffer>(buffer.as_any(), "buffer")?.raw,
                        offset: descriptor.buffer_offset,
                        size: descriptor.resolved_range(),
                    }
                }
                DescriptorType::Texture => {
                    let (texture, sampler) = descriptor
                        .texture
                        .zip(descriptor.sampler)
                        .ok_or_else(|| Error::invalid_usage("texture descriptor needs a texture and a sampler"))?;
                    BoundResource::Texture {
                        texture: cast::<GlTexture>(texture.as_any(), "texture")?.raw,
                        sampler: cast::<GlSampler>(sampler.as_any(), "sampler")?.raw,
                    }
                }
            };
            Ok((descriptor.binding, resource))
        })
        .collect()
}

pub struct GlDescriptorLayout {
    info: DescriptorLayoutInfo,
}

impl GlDescriptorLayout {
    pub(super) fn new(info: &DescriptorLayoutInfo) -> Result<Self> {
        info.validate()?;
        Ok(Self { info: info.clone() })
    }
}

impl DescriptorLayout for GlDescriptorLayout {
    fn info(&self) -> &DescriptorLayoutInfo {
        &self.info
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct GlDescriptorSet {
    layout_info: DescriptorLayoutInfo,
    pub(super) resources: Vec<(u32, BoundResource)>,
}

impl GlDescriptorSet {
    pub(super) fn new(layout: &GlDescriptorLayout, descriptors: &[Descriptor<'_>]) -> Result<Self> {
        if layout.info.push_descriptor {
            return Err(Error::invalid_usage(
                "push descriptor layouts are bound with push_descriptors, not descriptor sets",
            ));
        }
        validate_descriptors(&layout.info, descriptors)?;
        Ok(Self {
            layout_info: layout.info.clone(),
            resources: resolve(descriptors)?,
        })
    }
}

impl DescriptorSet for GlDescriptorSet {
    fn layout_info(&self) -> &DescriptorLayoutInfo {
        &self.layout_info
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
