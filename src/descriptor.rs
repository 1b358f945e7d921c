// Descriptor layouts and sets
//
// A layout is the shape (binding number, type, visible stages); a set or a
// push-descriptor call binds concrete resources to that shape. Both paths
// run `validate_descriptors` before touching native state, so a missing
// sampler or a mismatched type is reported up front on every backend.

use crate::buffer::{Buffer, BufferUsage};
use crate::error::{Error, Result};
use crate::sampler::Sampler;
use crate::shader::ShaderStage;
use crate::texture::{Texture, TextureUsage};
use std::any::Any;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorType {
    ConstantBuffer,
    /// A sampled texture. Always paired with a sampler.
    Texture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorBinding {
    pub binding: u32,
    pub ty: DescriptorType,
    pub stages: ShaderStage,
}

impl DescriptorBinding {
    pub const fn new(binding: u32, ty: DescriptorType, stages: ShaderStage) -> Self {
        Self { binding, ty, stages }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptorLayoutInfo {
    pub bindings: Vec<DescriptorBinding>,
    /// Bindings are streamed through `CommandList::push_descriptors`
    /// instead of a persistent set.
    pub push_descriptor: bool,
}

impl DescriptorLayoutInfo {
    pub fn new(bindings: Vec<DescriptorBinding>) -> Self {
        Self {
            bindings,
            push_descriptor: false,
        }
    }

    pub fn push(bindings: Vec<DescriptorBinding>) -> Self {
        Self {
            bindings,
            push_descriptor: true,
        }
    }

    pub fn binding(&self, binding: u32) -> Option<&DescriptorBinding> {
        self.bindings.iter().find(|b| b.binding == binding)
    }

    pub fn count_of(&self, ty: DescriptorType) -> u32 {
        self.bindings.iter().filter(|b| b.ty == ty).count() as u32
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for binding in &self.bindings {
            if !seen.insert(binding.binding) {
                return Err(Error::invalid_usage(format!(
                    "binding {} is declared twice in a descriptor layout",
                    binding.binding
                )));
            }
            if binding.stages.is_empty() {
                return Err(Error::invalid_usage(format!(
                    "binding {} is not visible to any shader stage",
                    binding.binding
                )));
            }
        }
        Ok(())
    }
}

/// One resource bound to one binding.
#[derive(Clone, Copy)]
pub struct Descriptor<'a> {
    pub binding: u32,
    pub ty: DescriptorType,
    pub buffer: Option<&'a dyn Buffer>,
    pub texture: Option<&'a dyn Texture>,
    pub sampler: Option<&'a dyn Sampler>,
    pub buffer_offset: u32,
    /// `None` binds everything from `buffer_offset` to the end.
    pub buffer_range: Option<u32>,
}

impl<'a> Descriptor<'a> {
    pub fn constant_buffer(binding: u32, buffer: &'a dyn Buffer) -> Self {
        Self {
            binding,
            ty: DescriptorType::ConstantBuffer,
            buffer: Some(buffer),
            texture: None,
            sampler: None,
            buffer_offset: 0,
            buffer_range: None,
        }
    }

    pub fn constant_buffer_range(binding: u32, buffer: &'a dyn Buffer, offset: u32, range: u32) -> Self {
        Self {
            buffer_offset: offset,
            buffer_range: Some(range),
            ..Self::constant_buffer(binding, buffer)
        }
    }

    pub fn texture(binding: u32, texture: &'a dyn Texture, sampler: &'a dyn Sampler) -> Self {
        Self {
            binding,
            ty: DescriptorType::Texture,
            buffer: None,
            texture: Some(texture),
            sampler: Some(sampler),
            buffer_offset: 0,
            buffer_range: None,
        }
    }

    /// Byte length bound for a buffer descriptor.
    pub fn resolved_range(&self) -> u32 {
        let size = self.buffer.map_or(0, |b| b.info().size_in_bytes);
        self.buffer_range
            .unwrap_or_else(|| size.saturating_sub(self.buffer_offset))
    }
}

impl std::fmt::Debug for Descriptor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Descriptor")
            .field("binding", &self.binding)
            .field("ty", &self.ty)
            .field("buffer", &self.buffer.map(|b| *b.info()))
            .field("texture", &self.texture.map(|t| *t.info()))
            .field("sampler", &self.sampler.is_some())
            .field("buffer_offset", &self.buffer_offset)
            .field("buffer_range", &self.buffer_range)
            .finish()
    }
}

pub trait DescriptorLayout {
    fn info(&self) -> &DescriptorLayoutInfo;

    fn as_any(&self) -> &dyn Any;
}

pub trait DescriptorSet {
    fn layout_info(&self) -> &DescriptorLayoutInfo;

    fn as_any(&self) -> &dyn Any;
}

/// Check `descriptors` against `layout` before any native binding happens.
pub fn validate_descriptors(layout: &DescriptorLayoutInfo, descriptors: &[Descriptor<'_>]) -> Result<()> {
    let mut seen = HashSet::new();

    for descriptor in descriptors {
        let binding = descriptor.binding;
        if !seen.insert(binding) {
            return Err(Error::invalid_usage(format!("binding {} is written twice", binding)));
        }

        let declared = layout.binding(binding).ok_or_else(|| {
            Error::invalid_usage(format!("binding {} is not declared by the layout", binding))
        })?;

        if declared.ty != descriptor.ty {
            return Err(Error::invalid_usage(format!(
                "binding {} is declared as {:?} but a {:?} descriptor was given",
                binding, declared.ty, descriptor.ty
            )));
        }

        match descriptor.ty {
            DescriptorType::ConstantBuffer => {
                let buffer = descriptor.buffer.ok_or_else(|| {
                    Error::invalid_usage(format!("constant buffer binding {} has no buffer", binding))
                })?;
                let info = buffer.info();
                if !info.usage.contains(BufferUsage::CONSTANT_BUFFER) {
                    return Err(Error::invalid_usage(format!(
                        "buffer bound at {} lacks CONSTANT_BUFFER usage",
                        binding
                    )));
                }
                let range = descriptor.resolved_range();
                if range == 0 {
                    return Err(Error::invalid_usage(format!("binding {} has an empty range", binding)));
                }
                info.check_range(descriptor.buffer_offset, range as usize)?;
            }
            DescriptorType::Texture => {
                let texture = descriptor.texture.ok_or_else(|| {
                    Error::invalid_usage(format!("texture binding {} has no texture", binding))
                })?;
                if descriptor.sampler.is_none() {
                    return Err(Error::invalid_usage(format!(
                        "texture binding {} has no sampler",
                        binding
                    )));
                }
                if !texture.info().usage.contains(TextureUsage::SHADER_RESOURCE) {
                    return Err(Error::invalid_usage(format!(
                        "texture bound at {} lacks SHADER_RESOURCE usage",
                        binding
                    )));
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::buffer::BufferInfo;
    use crate::format::Format;
    use crate::sampler::SamplerInfo;
    use crate::texture::TextureInfo;

    pub struct FakeBuffer(pub BufferInfo);

    impl Buffer for FakeBuffer {
        fn info(&self) -> &BufferInfo {
            &self.0
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    pub struct FakeTexture(pub TextureInfo);

    impl Texture for FakeTexture {
        fn info(&self) -> &TextureInfo {
            &self.0
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    pub struct FakeSampler(pub SamplerInfo);

    impl Sampler for FakeSampler {
        fn info(&self) -> &SamplerInfo {
            &self.0
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn layout() -> DescriptorLayoutInfo {
        DescriptorLayoutInfo::new(vec![
            DescriptorBinding::new(0, DescriptorType::ConstantBuffer, ShaderStage::VERTEX),
            DescriptorBinding::new(1, DescriptorType::Texture, ShaderStage::PIXEL),
        ])
    }

    fn constants() -> FakeBuffer {
        FakeBuffer(BufferInfo::new(BufferUsage::CONSTANT_BUFFER, 256))
    }

    fn texture() -> FakeTexture {
        FakeTexture(TextureInfo::texture_2d(
            Format::R8G8B8A8_UNorm,
            4,
            4,
            1,
            crate::texture::TextureUsage::SHADER_RESOURCE,
        ))
    }

    #[test]
    fn complete_set_is_accepted() {
        let (buffer, texture, sampler) = (constants(), texture(), FakeSampler(SamplerInfo::LINEAR_CLAMP));
        let descriptors = [
            Descriptor::constant_buffer(0, &buffer),
            Descriptor::texture(1, &texture, &sampler),
        ];
        assert!(validate_descriptors(&layout(), &descriptors).is_ok());
    }

    #[test]
    fn missing_sampler_is_invalid_usage() {
        let (buffer, texture) = (constants(), texture());
        let descriptors = [
            Descriptor::constant_buffer(0, &buffer),
            Descriptor {
                binding: 1,
                ty: DescriptorType::Texture,
                buffer: None,
                texture: Some(&texture),
                sampler: None,
                buffer_offset: 0,
                buffer_range: None,
            },
        ];
        let err = validate_descriptors(&layout(), &descriptors).unwrap_err();
        assert!(matches!(err, Error::InvalidUsage(_)), "{}", err);
    }

    #[test]
    fn type_mismatch_and_unknown_binding() {
        let buffer = constants();
        let wrong_slot = [Descriptor::constant_buffer(1, &buffer)];
        assert!(matches!(
            validate_descriptors(&layout(), &wrong_slot),
            Err(Error::InvalidUsage(_))
        ));

        let undeclared = [Descriptor::constant_buffer(7, &buffer)];
        assert!(matches!(
            validate_descriptors(&layout(), &undeclared),
            Err(Error::InvalidUsage(_))
        ));
    }

    #[test]
    fn buffer_ranges_are_checked() {
        let buffer = constants();
        assert!(validate_descriptors(&layout(), &[Descriptor::constant_buffer_range(0, &buffer, 128, 128)]).is_ok());
        assert!(validate_descriptors(&layout(), &[Descriptor::constant_buffer_range(0, &buffer, 192, 128)]).is_err());

        let whole_tail = Descriptor { buffer_offset: 64, ..Descriptor::constant_buffer(0, &buffer) };
        assert_eq!(whole_tail.resolved_range(), 192);
    }

    #[test]
    fn constant_buffer_needs_matching_usage() {
        let vertices = FakeBuffer(BufferInfo::new(BufferUsage::VERTEX_BUFFER, 256));
        assert!(validate_descriptors(&layout(), &[Descriptor::constant_buffer(0, &vertices)]).is_err());
    }

    #[test]
    fn layout_rejects_duplicates() {
        let info = DescriptorLayoutInfo::new(vec![
            DescriptorBinding::new(0, DescriptorType::ConstantBuffer, ShaderStage::VERTEX),
            DescriptorBinding::new(0, DescriptorType::Texture, ShaderStage::PIXEL),
        ]);
        assert!(info.validate().is_err());
        assert!(layout().validate().is_ok());
        assert_eq!(layout().count_of(DescriptorType::Texture), 1);
    }
}
