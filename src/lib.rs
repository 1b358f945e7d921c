// =============================================================================
// TESSERA - one GPU API over Vulkan, Direct3D 11 and OpenGL
// =============================================================================
//
// ARCHITECTURE OVERVIEW:
// ┌─────────────────────────────────────────────────────────────────┐
// │  BackendRegistry (ordered factories, first success wins)        │
// │    └── Instance (adapters, surfaces)                            │
// │          └── Device (resources, submission)                     │
// │                ├── Buffer / Texture / Sampler / ShaderModule    │
// │                ├── DescriptorLayout / DescriptorSet / Pipeline  │
// │                ├── CommandList (Begin → passes → End)           │
// │                └── Swapchain (GetNextTexture → Present)         │
// └─────────────────────────────────────────────────────────────────┘
//
// The traits in this crate root are the whole public contract. Each
// backend under `backend/` supplies one concrete type per trait.
//
// =============================================================================

pub mod backend;
pub mod buffer;
pub mod command;
pub mod config;
pub mod descriptor;
pub mod device;
pub mod diagnostics;
pub mod error;
pub mod format;
pub mod geometry;
pub mod instance;
pub mod pipeline;
pub mod sampler;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod texture;

pub use buffer::{Buffer, BufferInfo, BufferMapping, BufferUsage};
pub use command::{ColorAttachmentInfo, CommandList, IndexFormat, LoadOp, RecordingState, StoreOp};
pub use descriptor::{
    Descriptor, DescriptorBinding, DescriptorLayout, DescriptorLayoutInfo, DescriptorSet, DescriptorType,
};
pub use device::Device;
pub use error::{Error, NativeCode, Result};
pub use format::{calculate_mip_levels, Format};
pub use geometry::{ColorF, Offset2D, Offset3D, Rect2D, Region3D, Size2D, Size3D, Viewport};
pub use instance::{Adapter, Backend, BackendFactory, BackendRegistry, GlContext, Instance, InstanceInfo};
pub use pipeline::{
    BlendFactor, BlendOp, BlendStateDescription, ColorTargetInfo, GraphicsPipelineInfo, InputElementDescription,
    Pipeline,
};
pub use sampler::{AddressMode, Filter, Sampler, SamplerInfo};
pub use shader::{
    DescriptorMapping, Semantic, ShaderMappingInfo, ShaderModule, ShaderStage, Transpiler, VertexInputMapping,
};
pub use surface::{Surface, SurfaceInfo};
pub use swapchain::{PresentMode, Swapchain, SwapchainInfo};
pub use texture::{Texture, TextureInfo, TextureType, TextureUsage};
