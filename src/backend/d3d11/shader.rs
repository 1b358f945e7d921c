// D3D11 shader modules
//
// Code is compiled DXBC. The vertex shader's bytecode is kept because
// input layouts are validated against its signature at pipeline creation.

use super::device::DeviceShared;
use super::{created, HrCheck};
use crate::error::{Error, Result};
use crate::shader::{ShaderMappingInfo, ShaderModule, ShaderStage};
use std::any::Any;
use windows::Win32::Graphics::Direct3D11::*;

pub(super) enum NativeShader {
    Vertex(ID3D11VertexShader),
    Pixel(ID3D11PixelShader),
}

fn check_container(code: &[u8]) -> Result<()> {
    if code.len() < 32 || &code[..4] != b"DXBC" {
        return Err(Error::invalid_usage("D3D11 shader code must be a compiled DXBC container"));
    }
    Ok(())
}

pub struct D3D11ShaderModule {
    pub(super) native: NativeShader,
    pub(super) bytecode: Vec<u8>,
    stage: ShaderStage,
    entry_point: String,
    mapping: Option<ShaderMappingInfo>,
}

impl D3D11ShaderModule {
    pub(super) fn new(
        shared: &DeviceShared,
        stage: ShaderStage,
        code: &[u8],
        entry_point: &str,
        mapping: Option<&ShaderMappingInfo>,
    ) -> Result<Self> {
        check_container(code)?;

        let native = if stage == ShaderStage::VERTEX {
            let mut shader = None;
            unsafe {
                shared
                    .device
                    .CreateVertexShader(code, None::<&ID3D11ClassLinkage>, Some(&mut shader))
            }
            .check("ID3D11Device::CreateVertexShader")?;
            NativeShader::Vertex(created(shader, "ID3D11Device::CreateVertexShader")?)
        } else {
            let mut shader = None;
            unsafe {
                shared
                    .device
                    .CreatePixelShader(code, None::<&ID3D11ClassLinkage>, Some(&mut shader))
            }
            .check("ID3D11Device::CreatePixelShader")?;
            NativeShader::Pixel(created(shader, "ID3D11Device::CreatePixelShader")?)
        };

        Ok(Self {
            native,
            bytecode: code.to_vec(),
            stage,
            entry_point: entry_point.to_owned(),
            mapping: mapping.cloned(),
        })
    }
}

impl ShaderModule for D3D11ShaderModule {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_dxbc_code() {
        assert!(check_container(b"#version 430\nvoid main() {}").is_err());
        assert!(check_container(&[]).is_err());

        let mut header = vec![0u8; 32];
        header[..4].copy_from_slice(b"DXBC");
        assert!(check_container(&header).is_ok());
    }
}
