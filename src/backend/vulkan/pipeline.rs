// Graphics pipeline creation
//
// Pipelines target dynamic rendering: color formats go into
// PipelineRenderingCreateInfo instead of a render pass. Viewport, scissor
// and vertex strides are dynamic state, set by the command list.

use super::descriptor::VulkanDescriptorLayout;
use super::device::DeviceShared;
use super::shader::VulkanShaderModule;
use super::{cast, conv, VkCheck};
use crate::descriptor::DescriptorLayoutInfo;
use crate::error::Result;
use crate::pipeline::{GraphicsPipelineInfo, InputElementDescription, Pipeline};
use ash::vk;
use std::any::Any;
use std::collections::BTreeSet;
use std::sync::Arc;

pub struct VulkanPipeline {
    device: Arc<DeviceShared>,
    pub(super) raw: vk::Pipeline,
    pub(super) layout: vk::PipelineLayout,
    descriptor_layouts: Vec<DescriptorLayoutInfo>,
}

/// One binding per vertex buffer slot, stride left to bind time.
fn vertex_input(
    elements: &[InputElementDescription],
) -> Result<(Vec<vk::VertexInputBindingDescription>, Vec<vk::VertexInputAttributeDescription>)> {
    let slots: BTreeSet<u32> = elements.iter().map(|e| e.slot).collect();
    let bindings = slots
        .into_iter()
        .map(|slot| {
            vk::VertexInputBindingDescription::builder()
                .binding(slot)
                .stride(0)
                .input_rate(vk::VertexInputRate::VERTEX)
                .build()
        })
        .collect();

    let attributes = elements
        .iter()
        .map(|element| {
            Ok(vk::VertexInputAttributeDescription::builder()
                .binding(element.slot)
                .location(element.location)
                .format(conv::format(element.format)?)
                .offset(element.offset)
                .build())
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((bindings, attributes))
}

impl VulkanPipeline {
    pub(super) fn new(device: Arc<DeviceShared>, info: &GraphicsPipelineInfo<'_>) -> Result<Self> {
        let vertex_shader = cast::<VulkanShaderModule>(info.vertex_shader.as_any(), "vertex shader")?;
        let pixel_shader = cast::<VulkanShaderModule>(info.pixel_shader.as_any(), "pixel shader")?;

        // Pipeline layout
        let set_layouts = info
            .descriptors
            .iter()
            .map(|layout| cast::<VulkanDescriptorLayout>(layout.as_any(), "descriptor layout").map(|l| l.raw))
            .collect::<Result<Vec<_>>>()?;

        let layout_info = vk::PipelineLayoutCreateInfo::builder().set_layouts(&set_layouts);
        let layout = unsafe { device.device.create_pipeline_layout(&layout_info, None) }
            .check("vkCreatePipelineLayout")?;

        match Self::create_pipeline(&device, info, vertex_shader, pixel_shader, layout) {
            Ok(raw) => Ok(Self {
                device,
                raw,
                layout,
                descriptor_layouts: info.layout_infos(),
            }),
            Err(e) => {
                unsafe { device.device.destroy_pipeline_layout(layout, None) };
                Err(e)
            }
        }
    }

    fn create_pipeline(
        device: &DeviceShared,
        info: &GraphicsPipelineInfo<'_>,
        vertex_shader: &VulkanShaderModule,
        pixel_shader: &VulkanShaderModule,
        layout: vk::PipelineLayout,
    ) -> Result<vk::Pipeline> {
        // Shader stages
        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vertex_shader.raw)
                .name(vertex_shader.entry_point_c())
                .build(),
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(pixel_shader.raw)
                .name(pixel_shader.entry_point_c())
                .build(),
        ];

        // Vertex input
        let (bindings, attributes) = vertex_input(info.input_layout)?;
        let vertex_input_info = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        // Input assembly
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        // Viewport and scissor are dynamic; only the counts are fixed.
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);

        let mut dynamic_states = vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        if !info.input_layout.is_empty() {
            dynamic_states.push(vk::DynamicState::VERTEX_INPUT_BINDING_STRIDE);
        }
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

        // Rasterization
        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::NONE)
            .front_face(vk::FrontFace::CLOCKWISE)
            .depth_bias_enable(false);

        // Multisampling (disabled)
        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        // Color blending, one attachment per target
        let color_blend_attachments: Vec<_> = info
            .color_targets
            .iter()
            .map(|target| conv::blend_attachment(&target.blend))
            .collect();
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let color_formats = info
            .color_targets
            .iter()
            .map(|target| conv::format(target.format))
            .collect::<Result<Vec<_>>>()?;
        let mut rendering_info = vk::PipelineRenderingCreateInfo::builder().color_attachment_formats(&color_formats);

        // Create pipeline
        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_info)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .push_next(&mut rendering_info)
            .build();

        let pipelines = unsafe {
            device
                .device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
                .map_err(|(_, e)| e)
        }
        .check("vkCreateGraphicsPipelines")?;

        Ok(pipelines[0])
    }
}

impl Pipeline for VulkanPipeline {
    fn descriptor_layouts(&self) -> &[DescriptorLayoutInfo] {
        &self.descriptor_layouts
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for VulkanPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_pipeline(self.raw, None);
            self.device.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Format;

    #[test]
    fn one_binding_per_slot() {
        let elements = [
            InputElementDescription::new(Format::R32G32B32_Float, 0, 0, 0),
            InputElementDescription::new(Format::R32G32_Float, 12, 1, 0),
            InputElementDescription::new(Format::R32G32B32A32_Float, 0, 2, 3),
        ];
        let (bindings, attributes) = vertex_input(&elements).unwrap();

        let slots: Vec<u32> = bindings.iter().map(|b| b.binding).collect();
        assert_eq!(slots, vec![0, 3]);
        assert!(bindings.iter().all(|b| b.stride == 0));

        assert_eq!(attributes.len(), 3);
        assert_eq!(attributes[1].offset, 12);
        assert_eq!(attributes[1].format, vk::Format::R32G32_SFLOAT);
        assert_eq!(attributes[2].binding, 3);
    }

    #[test]
    fn empty_layout_has_no_bindings() {
        let (bindings, attributes) = vertex_input(&[]).unwrap();
        assert!(bindings.is_empty());
        assert!(attributes.is_empty());
    }
}
