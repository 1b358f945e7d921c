// Error types shared by every backend
//
// Four failure families:
// - OperationFailed: a native call returned a non-success status
// - UnsupportedFeature / PlatformNotSupported: a capability is missing
// - InvalidUsage: caller misuse, reported instead of degrading silently
// - NotImplemented: a documented gap in one backend

use crate::instance::Backend;
use ash::vk;
use std::fmt;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("graphics operation '{operation}' failed: {code}")]
    OperationFailed {
        operation: &'static str,
        code: NativeCode,
    },

    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    #[error("invalid usage: {0}")]
    InvalidUsage(String),

    #[error("'{operation}' is not implemented on the {backend} backend")]
    NotImplemented {
        backend: Backend,
        operation: &'static str,
    },

    #[error("platform not supported: {0}")]
    PlatformNotSupported(String),
}

/// The native status that caused an [`Error::OperationFailed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeCode {
    Vulkan(vk::Result),
    Hresult(i32),
    Gl(u32),
    Allocator(String),
    Message(String),
}

impl fmt::Display for NativeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vulkan(result) => write!(f, "VkResult {:?} ({})", result, result.as_raw()),
            Self::Hresult(hr) => write!(f, "HRESULT 0x{:08x}", *hr as u32),
            Self::Gl(code) => write!(f, "GL error 0x{:04x}", code),
            Self::Allocator(message) => write!(f, "allocator: {}", message),
            Self::Message(message) => f.write_str(message),
        }
    }
}

impl Error {
    pub fn operation_failed(operation: &'static str, code: NativeCode) -> Self {
        Self::OperationFailed { operation, code }
    }

    pub fn invalid_usage(message: impl Into<String>) -> Self {
        Self::InvalidUsage(message.into())
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedFeature(message.into())
    }

    pub fn not_implemented(backend: Backend, operation: &'static str) -> Self {
        Self::NotImplemented { backend, operation }
    }

    /// True for failures that describe a missing capability rather than a
    /// broken call, which lets callers branch on backend capability.
    pub fn is_capability_gap(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFeature(_) | Self::NotImplemented { .. } | Self::PlatformNotSupported(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_failed_mentions_operation_and_code() {
        let err = Error::operation_failed(
            "vkCreateBuffer",
            NativeCode::Vulkan(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY),
        );
        let text = err.to_string();
        assert!(text.contains("vkCreateBuffer"));
        assert!(text.contains("ERROR_OUT_OF_DEVICE_MEMORY"));
    }

    #[test]
    fn hresult_is_formatted_as_hex() {
        let code = NativeCode::Hresult(0x887A0005u32 as i32);
        assert_eq!(code.to_string(), "HRESULT 0x887a0005");
    }

    #[test]
    fn capability_gaps_are_distinct_from_misuse() {
        assert!(Error::not_implemented(Backend::D3D11, "copy_buffer_to_texture").is_capability_gap());
        assert!(Error::unsupported("push descriptors").is_capability_gap());
        assert!(!Error::invalid_usage("not recording").is_capability_gap());
    }
}
