//! Handles, constant buffer layouts and scene inputs.

mod constants;
mod handles;
mod scene;

pub use constants::{
    AmbientOcclusionConstants, FrameConstants, MaterialConstants, ObjectConstants,
};
pub use handles::{
    BufferHandle, CommandAllocatorHandle, CommandListHandle, DescriptorHandle, FenceHandle,
    Handle, PipelineHandle, TextureHandle,
};
pub(crate) use handles::require;
pub use scene::{
    DrawableItem, EnvironmentMaps, FrameTargets, GBufferTargets, GeometryData, MaterialProperties,
    MaterialTextures, TextureSlots,
};
