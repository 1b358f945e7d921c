// Graphics pipelines
//
// A pipeline links one vertex and one pixel shader with an input layout,
// the descriptor layouts it reads, and one blend state per color target.
// Descriptor slots used by command lists are indices into
// `GraphicsPipelineInfo::descriptors`; backends with a flat binding model
// resolve them through a `DescriptorRemap` built from the shader mapping.

use crate::descriptor::{DescriptorLayout, DescriptorLayoutInfo};
use crate::error::{Error, Result};
use crate::format::Format;
use crate::shader::{ShaderMappingInfo, ShaderModule, ShaderStage};
use std::any::Any;
use std::collections::HashMap;

pub const MAX_COLOR_TARGETS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DestColor,
    OneMinusDestColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DestAlpha,
    OneMinusDestAlpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendOp {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendStateDescription {
    pub enabled: bool,
    pub src_color: BlendFactor,
    pub dest_color: BlendFactor,
    pub color_op: BlendOp,
    pub src_alpha: BlendFactor,
    pub dest_alpha: BlendFactor,
    pub alpha_op: BlendOp,
}

impl BlendStateDescription {
    pub const NO_BLEND: BlendStateDescription = BlendStateDescription {
        enabled: false,
        src_color: BlendFactor::One,
        dest_color: BlendFactor::Zero,
        color_op: BlendOp::Add,
        src_alpha: BlendFactor::One,
        dest_alpha: BlendFactor::Zero,
        alpha_op: BlendOp::Add,
    };

    pub const NON_PREMULTIPLIED_ALPHA: BlendStateDescription = BlendStateDescription {
        enabled: true,
        src_color: BlendFactor::SrcAlpha,
        dest_color: BlendFactor::OneMinusSrcAlpha,
        color_op: BlendOp::Add,
        src_alpha: BlendFactor::One,
        dest_alpha: BlendFactor::OneMinusSrcAlpha,
        alpha_op: BlendOp::Add,
    };
}

impl Default for BlendStateDescription {
    fn default() -> Self {
        Self::NO_BLEND
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorTargetInfo {
    pub format: Format,
    pub blend: BlendStateDescription,
}

impl ColorTargetInfo {
    pub const fn new(format: Format) -> Self {
        Self {
            format,
            blend: BlendStateDescription::NO_BLEND,
        }
    }

    pub const fn with_blend(format: Format, blend: BlendStateDescription) -> Self {
        Self { format, blend }
    }
}

/// One vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputElementDescription {
    pub format: Format,
    /// Byte offset inside the vertex.
    pub offset: u32,
    /// Shader input location.
    pub location: u32,
    /// Vertex buffer slot the attribute is fetched from.
    pub slot: u32,
}

impl InputElementDescription {
    pub const fn new(format: Format, offset: u32, location: u32, slot: u32) -> Self {
        Self {
            format,
            offset,
            location,
            slot,
        }
    }
}

/// Number of float components for a vertex attribute format.
pub(crate) fn vertex_component_count(format: Format) -> Option<u32> {
    match format {
        Format::R32_Float => Some(1),
        Format::R32G32_Float => Some(2),
        Format::R32G32B32_Float => Some(3),
        Format::R32G32B32A32_Float => Some(4),
        _ => None,
    }
}

pub struct GraphicsPipelineInfo<'a> {
    pub vertex_shader: &'a dyn ShaderModule,
    pub pixel_shader: &'a dyn ShaderModule,
    pub color_targets: &'a [ColorTargetInfo],
    pub input_layout: &'a [InputElementDescription],
    pub descriptors: &'a [&'a dyn DescriptorLayout],
}

impl GraphicsPipelineInfo<'_> {
    /// Backend-independent checks, run before any native object is created.
    pub fn validate(&self) -> Result<()> {
        if self.vertex_shader.stage() != ShaderStage::VERTEX {
            return Err(Error::invalid_usage("vertex_shader is not a vertex stage module"));
        }
        if self.pixel_shader.stage() != ShaderStage::PIXEL {
            return Err(Error::invalid_usage("pixel_shader is not a pixel stage module"));
        }
        if self.color_targets.is_empty() || self.color_targets.len() > MAX_COLOR_TARGETS {
            return Err(Error::invalid_usage(format!(
                "a pipeline needs 1..={} color targets, got {}",
                MAX_COLOR_TARGETS,
                self.color_targets.len()
            )));
        }
        for element in self.input_layout {
            if vertex_component_count(element.format).is_none() {
                return Err(Error::unsupported(format!(
                    "{:?} is not a supported vertex attribute format",
                    element.format
                )));
            }
        }
        let push_layouts = self
            .descriptors
            .iter()
            .filter(|layout| layout.info().push_descriptor)
            .count();
        if push_layouts > 1 {
            return Err(Error::invalid_usage(format!(
                "a pipeline may use at most one push descriptor layout, got {}",
                push_layouts
            )));
        }
        Ok(())
    }

    pub fn layout_infos(&self) -> Vec<DescriptorLayoutInfo> {
        self.descriptors.iter().map(|layout| layout.info().clone()).collect()
    }
}

pub trait Pipeline {
    /// Descriptor layouts, indexed by pipeline slot.
    fn descriptor_layouts(&self) -> &[DescriptorLayoutInfo];

    fn as_any(&self) -> &dyn Any;
}

/// Resolve `slot` on `pipeline`, checking it is of the expected kind.
pub(crate) fn layout_at_slot(
    pipeline: &dyn Pipeline,
    slot: u32,
    push: bool,
) -> Result<&DescriptorLayoutInfo> {
    let layout = pipeline
        .descriptor_layouts()
        .get(slot as usize)
        .ok_or_else(|| {
            Error::invalid_usage(format!(
                "descriptor slot {} is out of range for a pipeline with {} layouts",
                slot,
                pipeline.descriptor_layouts().len()
            ))
        })?;

    match (push, layout.push_descriptor) {
        (true, false) => Err(Error::invalid_usage(format!(
            "slot {} is not a push descriptor layout",
            slot
        ))),
        (false, true) => Err(Error::invalid_usage(format!(
            "slot {} is a push descriptor layout and cannot take a descriptor set",
            slot
        ))),
        _ => Ok(layout),
    }
}

/// (set, binding) -> native slot table built from shader mapping info.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptorRemap {
    slots: HashMap<(u32, u32), u32>,
}

impl DescriptorRemap {
    pub fn from_mapping(mapping: Option<&ShaderMappingInfo>) -> Self {
        let slots = mapping
            .map(|m| {
                m.descriptors
                    .iter()
                    .map(|d| ((d.set, d.binding), d.slot))
                    .collect()
            })
            .unwrap_or_default();
        Self { slots }
    }

    /// One table for a whole program. Both stages must agree on any
    /// (set, binding) they share.
    pub fn merged(mappings: &[Option<&ShaderMappingInfo>]) -> Result<Self> {
        let mut slots = HashMap::new();
        for mapping in mappings.iter().flatten() {
            for d in &mapping.descriptors {
                match slots.insert((d.set, d.binding), d.slot) {
                    Some(previous) if previous != d.slot => {
                        return Err(Error::invalid_usage(format!(
                            "set {} binding {} maps to slot {} in one stage and {} in another",
                            d.set, d.binding, previous, d.slot
                        )));
                    }
                    _ => {}
                }
            }
        }
        Ok(Self { slots })
    }

    pub fn slot(&self, set: u32, binding: u32) -> Option<u32> {
        self.slots.get(&(set, binding)).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::DescriptorMapping;

    fn mapping(entries: &[(u32, u32, u32)]) -> ShaderMappingInfo {
        ShaderMappingInfo {
            vertex_inputs: Vec::new(),
            descriptors: entries
                .iter()
                .map(|&(set, binding, slot)| DescriptorMapping { set, binding, slot })
                .collect(),
        }
    }

    #[test]
    fn remap_looks_up_set_and_binding() {
        let remap = DescriptorRemap::from_mapping(Some(&mapping(&[(0, 0, 2), (1, 0, 0), (1, 3, 5)])));
        assert_eq!(remap.slot(0, 0), Some(2));
        assert_eq!(remap.slot(1, 3), Some(5));
        assert_eq!(remap.slot(2, 0), None);
        assert!(DescriptorRemap::from_mapping(None).is_empty());
    }

    #[test]
    fn merged_remap_requires_agreement() {
        let vs = mapping(&[(0, 0, 0)]);
        let ps = mapping(&[(0, 0, 0), (0, 1, 1)]);
        let merged = DescriptorRemap::merged(&[Some(&vs), Some(&ps)]).unwrap();
        assert_eq!(merged.len(), 2);

        let conflicting = mapping(&[(0, 0, 3)]);
        assert!(DescriptorRemap::merged(&[Some(&vs), Some(&conflicting)]).is_err());
    }

    #[test]
    fn vertex_formats() {
        assert_eq!(vertex_component_count(Format::R32G32B32_Float), Some(3));
        assert_eq!(vertex_component_count(Format::R8G8B8A8_UNorm), None);
    }
}
