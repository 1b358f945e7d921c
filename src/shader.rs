// Shader modules and the transpiler boundary
//
// Shader translation is not done here. A `Transpiler` turns one SPIR-V
// module into whatever the active backend consumes (SPIR-V, DXBC, GLSL) and
// reports how descriptor (set, binding) pairs and vertex inputs were
// assigned. That mapping rides along on the `ShaderModule` until pipeline
// creation consumes it.

use crate::device::Device;
use crate::error::Result;
use crate::instance::Backend;
use bitflags::bitflags;
use std::any::Any;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShaderStage: u32 {
        const VERTEX = 1 << 0;
        const PIXEL = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Semantic {
    Position,
    TexCoord,
    Color,
    Normal,
    Tangent,
    Bitangent,
}

impl Semantic {
    /// HLSL semantic name.
    pub const fn name(self) -> &'static str {
        match self {
            Semantic::Position => "POSITION",
            Semantic::TexCoord => "TEXCOORD",
            Semantic::Color => "COLOR",
            Semantic::Normal => "NORMAL",
            Semantic::Tangent => "TANGENT",
            Semantic::Bitangent => "BITANGENT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexInputMapping {
    pub semantic: Semantic,
    pub index: u32,
}

/// Where a (set, binding) pair landed in the backend's flat slot space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorMapping {
    pub set: u32,
    pub binding: u32,
    pub slot: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderMappingInfo {
    /// One entry per vertex input, in input-layout order.
    pub vertex_inputs: Vec<VertexInputMapping>,
    pub descriptors: Vec<DescriptorMapping>,
}

pub trait ShaderModule {
    fn stage(&self) -> ShaderStage;

    fn entry_point(&self) -> &str;

    fn mapping(&self) -> Option<&ShaderMappingInfo>;

    fn as_any(&self) -> &dyn Any;
}

/// Output of a [`Transpiler`].
#[derive(Debug, Clone, Default)]
pub struct TranspiledShader {
    pub code: Vec<u8>,
    /// Entry point in the translated code, which may be renamed.
    pub entry_point: String,
    pub mapping: Option<ShaderMappingInfo>,
}

/// Cross-compiler from SPIR-V to a backend's shader language.
pub trait Transpiler {
    fn transpile(
        &self,
        spirv: &[u8],
        stage: ShaderStage,
        entry_point: &str,
        backend: Backend,
    ) -> Result<TranspiledShader>;
}

/// Translate `spirv` for `device`'s backend and create the shader module.
pub fn create_shader_module_from_spirv(
    device: &dyn Device,
    transpiler: &dyn Transpiler,
    stage: ShaderStage,
    spirv: &[u8],
    entry_point: &str,
) -> Result<Box<dyn ShaderModule>> {
    let backend = device.backend();
    let translated = transpiler.transpile(spirv, stage, entry_point, backend)?;

    log::debug!(
        target: crate::diagnostics::targets::GENERAL,
        "Transpiled {:?} shader '{}' for {}: {} bytes, mapping: {}",
        stage,
        entry_point,
        backend,
        translated.code.len(),
        translated.mapping.is_some()
    );

    device.create_shader_module(
        stage,
        &translated.code,
        &translated.entry_point,
        translated.mapping.as_ref(),
    )
}

pub(crate) fn require_single_stage(stage: ShaderStage) -> Result<()> {
    if stage == ShaderStage::VERTEX || stage == ShaderStage::PIXEL {
        Ok(())
    } else {
        Err(crate::Error::invalid_usage(format!(
            "a shader module needs exactly one stage, got {:?}",
            stage
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semantic_names() {
        assert_eq!(Semantic::TexCoord.name(), "TEXCOORD");
        assert_eq!(Semantic::Bitangent.name(), "BITANGENT");
    }

    #[test]
    fn single_stage_only() {
        assert!(require_single_stage(ShaderStage::VERTEX).is_ok());
        assert!(require_single_stage(ShaderStage::PIXEL).is_ok());
        assert!(require_single_stage(ShaderStage::VERTEX | ShaderStage::PIXEL).is_err());
        assert!(require_single_stage(ShaderStage::empty()).is_err());
    }
}
