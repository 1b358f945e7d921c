// D3D11 pipelines
//
// Everything D3D11 splits into separate state objects is created here and
// bound together by `set_graphics_pipeline`. Register slots are remapped
// per stage, since the transpiler numbers each stage's registers on its own.

use super::conv;
use super::device::DeviceShared;
use super::shader::{D3D11ShaderModule, NativeShader};
use super::{cast, created, HrCheck};
use crate::descriptor::DescriptorLayoutInfo;
use crate::error::{Error, Result};
use crate::pipeline::{BlendStateDescription, DescriptorRemap, GraphicsPipelineInfo, Pipeline, MAX_COLOR_TARGETS};
use crate::shader::{ShaderStage, VertexInputMapping};
use std::any::Any;
use windows::Win32::Foundation::{FALSE, TRUE};
use windows::Win32::Graphics::Direct3D11::*;

pub struct D3D11Pipeline {
    pub(super) vertex_shader: ID3D11VertexShader,
    pub(super) pixel_shader: ID3D11PixelShader,
    pub(super) input_layout: Option<ID3D11InputLayout>,
    pub(super) blend: ID3D11BlendState,
    pub(super) rasterizer: ID3D11RasterizerState,
    pub(super) depth_stencil: ID3D11DepthStencilState,
    vertex_remap: DescriptorRemap,
    pixel_remap: DescriptorRemap,
    descriptor_layouts: Vec<DescriptorLayoutInfo>,
}

impl D3D11Pipeline {
    pub(super) fn new(shared: &DeviceShared, info: &GraphicsPipelineInfo<'_>) -> Result<Self> {
        let vs = cast::<D3D11ShaderModule>(info.vertex_shader.as_any(), "vertex shader")?;
        let ps = cast::<D3D11ShaderModule>(info.pixel_shader.as_any(), "pixel shader")?;
        let (NativeShader::Vertex(vertex_shader), NativeShader::Pixel(pixel_shader)) = (&vs.native, &ps.native) else {
            return Err(Error::invalid_usage("pipeline shaders are bound to the wrong stages"));
        };

        let device = &shared.device;
        let input_layout = create_input_layout(device, info, vs)?;

        let blend_desc = blend_desc(info);
        let mut blend = None;
        unsafe { device.CreateBlendState(&blend_desc, Some(&mut blend)) }.check("ID3D11Device::CreateBlendState")?;

        let rasterizer_desc = D3D11_RASTERIZER_DESC {
            FillMode: D3D11_FILL_SOLID,
            CullMode: D3D11_CULL_NONE,
            FrontCounterClockwise: FALSE,
            DepthBias: 0,
            DepthBiasClamp: 0.0,
            SlopeScaledDepthBias: 0.0,
            DepthClipEnable: TRUE,
            ScissorEnable: TRUE,
            MultisampleEnable: FALSE,
            AntialiasedLineEnable: FALSE,
        };
        let mut rasterizer = None;
        unsafe { device.CreateRasterizerState(&rasterizer_desc, Some(&mut rasterizer)) }
            .check("ID3D11Device::CreateRasterizerState")?;

        let keep = D3D11_DEPTH_STENCILOP_DESC {
            StencilFailOp: D3D11_STENCIL_OP_KEEP,
            StencilDepthFailOp: D3D11_STENCIL_OP_KEEP,
            StencilPassOp: D3D11_STENCIL_OP_KEEP,
            StencilFunc: D3D11_COMPARISON_ALWAYS,
        };
        let depth_desc = D3D11_DEPTH_STENCIL_DESC {
            DepthEnable: FALSE,
            DepthWriteMask: D3D11_DEPTH_WRITE_MASK_ZERO,
            DepthFunc: D3D11_COMPARISON_ALWAYS,
            StencilEnable: FALSE,
            StencilReadMask: 0xff,
            StencilWriteMask: 0xff,
            FrontFace: keep,
            BackFace: keep,
        };
        let mut depth_stencil = None;
        unsafe { device.CreateDepthStencilState(&depth_desc, Some(&mut depth_stencil)) }
            .check("ID3D11Device::CreateDepthStencilState")?;

        Ok(Self {
            vertex_shader: vertex_shader.clone(),
            pixel_shader: pixel_shader.clone(),
            input_layout,
            blend: created(blend, "ID3D11Device::CreateBlendState")?,
            rasterizer: created(rasterizer, "ID3D11Device::CreateRasterizerState")?,
            depth_stencil: created(depth_stencil, "ID3D11Device::CreateDepthStencilState")?,
            vertex_remap: DescriptorRemap::from_mapping(vs.mapping()),
            pixel_remap: DescriptorRemap::from_mapping(ps.mapping()),
            descriptor_layouts: info.layout_infos(),
        })
    }

    /// Register for `binding` of the layout at `slot` in one stage, or
    /// `None` when that stage's shader does not reference it. Without
    /// mapping info, bindings are used as registers directly.
    pub(super) fn register(&self, stage: ShaderStage, slot: u32, binding: u32) -> Option<u32> {
        let remap = if stage == ShaderStage::VERTEX {
            &self.vertex_remap
        } else {
            &self.pixel_remap
        };
        if remap.is_empty() {
            Some(binding)
        } else {
            remap.slot(slot, binding)
        }
    }
}

/// Pair each input element with the vertex shader's semantic for it.
fn input_elements(info: &GraphicsPipelineInfo<'_>, inputs: &[VertexInputMapping]) -> Result<Vec<D3D11_INPUT_ELEMENT_DESC>> {
    if inputs.len() != info.input_layout.len() {
        return Err(Error::invalid_usage(format!(
            "input layout has {} elements but the vertex shader maps {} inputs",
            info.input_layout.len(),
            inputs.len()
        )));
    }
    info.input_layout
        .iter()
        .zip(inputs)
        .map(|(element, input)| {
            Ok(D3D11_INPUT_ELEMENT_DESC {
                SemanticName: conv::semantic(input.semantic),
                SemanticIndex: input.index,
                Format: conv::format(element.format)?,
                InputSlot: element.slot,
                AlignedByteOffset: element.offset,
                InputSlotClass: D3D11_INPUT_PER_VERTEX_DATA,
                InstanceDataStepRate: 0,
            })
        })
        .collect()
}

fn create_input_layout(
    device: &ID3D11Device1,
    info: &GraphicsPipelineInfo<'_>,
    vs: &D3D11ShaderModule,
) -> Result<Option<ID3D11InputLayout>> {
    if info.input_layout.is_empty() {
        return Ok(None);
    }
    let inputs = vs.mapping().map(|m| m.vertex_inputs.as_slice()).unwrap_or_default();
    let elements = input_elements(info, inputs)?;

    let mut layout = None;
    unsafe { device.CreateInputLayout(&elements, &vs.bytecode, Some(&mut layout)) }
        .check("ID3D11Device::CreateInputLayout")?;
    Ok(Some(created(layout, "ID3D11Device::CreateInputLayout")?))
}

fn target_blend(blend: &BlendStateDescription) -> D3D11_RENDER_TARGET_BLEND_DESC {
    D3D11_RENDER_TARGET_BLEND_DESC {
        BlendEnable: blend.enabled.into(),
        SrcBlend: conv::blend_factor(blend.src_color),
        DestBlend: conv::blend_factor(blend.dest_color),
        BlendOp: conv::blend_op(blend.color_op),
        SrcBlendAlpha: conv::blend_factor(blend.src_alpha),
        DestBlendAlpha: conv::blend_factor(blend.dest_alpha),
        BlendOpAlpha: conv::blend_op(blend.alpha_op),
        RenderTargetWriteMask: D3D11_COLOR_WRITE_ENABLE_ALL.0 as u8,
    }
}

fn blend_desc(info: &GraphicsPipelineInfo<'_>) -> D3D11_BLEND_DESC {
    let mut targets = [target_blend(&BlendStateDescription::NO_BLEND); MAX_COLOR_TARGETS];
    for (target, color) in targets.iter_mut().zip(info.color_targets) {
        *target = target_blend(&color.blend);
    }
    D3D11_BLEND_DESC {
        AlphaToCoverageEnable: FALSE,
        IndependentBlendEnable: TRUE,
        RenderTarget: targets,
    }
}

impl Pipeline for D3D11Pipeline {
    fn descriptor_layouts(&self) -> &[DescriptorLayoutInfo] {
        &self.descriptor_layouts
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
