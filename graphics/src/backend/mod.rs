//! GPU backend abstraction layer.
//!
//! The pipeline core never talks to a graphics API directly. Everything it
//! needs from the GPU is expressed by [`GpuBackend`]: command allocators and
//! command lists, submission to the single GPU queue, fences, upload buffers,
//! pipeline objects and descriptor tables.
//!
//! # Available Backends
//!
//! - [`DummyBackend`]: simulated GPU for tests, benchmarks and the headless app.
//!   It validates object lifecycles, records an ordered event log and lets the
//!   caller decide when fence values complete.
//!
//! # Threading
//!
//! Backends are shared as `Arc<dyn GpuBackend>` between recorder worker
//! threads, the executor thread and the frame pacing thread, so every method
//! takes `&self` and implementations synchronize internally.

pub mod dummy;

pub use dummy::{BackendEvent, DummyBackend, GpuSimulation};

use crate::command::GpuCommand;
use crate::error::GraphicsError;
use crate::types::{
    BufferHandle, CommandAllocatorHandle, CommandListHandle, DescriptorHandle, FenceHandle,
    PipelineHandle, TextureHandle,
};

/// A resource referenced by a descriptor table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorResource {
    /// Shader resource view of a texture.
    Texture(TextureHandle),
    /// Constant or structured buffer view.
    Buffer(BufferHandle),
}

/// Description of a pipeline state object.
///
/// The shader and fixed-function state are backend concerns; the core only
/// names the technique and the number of render targets it writes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineDescriptor {
    /// Unique technique name, also the registry key.
    pub label: String,
    /// Number of color render targets written.
    pub color_targets: u32,
    /// Whether a depth buffer is bound.
    pub depth: bool,
}

impl PipelineDescriptor {
    /// Create a descriptor for a technique writing `color_targets` targets.
    pub fn new(label: impl Into<String>, color_targets: u32) -> Self {
        Self {
            label: label.into(),
            color_targets,
            depth: false,
        }
    }

    /// Enable the depth buffer.
    pub fn with_depth(mut self) -> Self {
        self.depth = true;
        self
    }
}

/// GPU backend trait for abstracting different GPU APIs.
pub trait GpuBackend: Send + Sync + 'static {
    /// Get the backend name.
    fn name(&self) -> &'static str;

    /// Create a command allocator (the memory a command list records into).
    fn create_command_allocator(&self) -> Result<CommandAllocatorHandle, GraphicsError>;

    /// Reclaim all memory of an allocator.
    ///
    /// The caller guarantees the GPU has finished every list recorded into it.
    fn reset_command_allocator(
        &self,
        allocator: CommandAllocatorHandle,
    ) -> Result<(), GraphicsError>;

    /// Create a command list. The list starts closed.
    fn create_command_list(
        &self,
        allocator: CommandAllocatorHandle,
    ) -> Result<CommandListHandle, GraphicsError>;

    /// Reopen a closed command list for recording against `allocator`.
    fn reset_command_list(
        &self,
        list: CommandListHandle,
        allocator: CommandAllocatorHandle,
    ) -> Result<(), GraphicsError>;

    /// Append a command to an open command list.
    fn record_command(
        &self,
        list: CommandListHandle,
        command: &GpuCommand,
    ) -> Result<(), GraphicsError>;

    /// Finish recording. The list becomes immutable until the next reset.
    fn close_command_list(&self, list: CommandListHandle) -> Result<(), GraphicsError>;

    /// Submit a closed command list to the GPU queue (fire and forget).
    fn submit(&self, list: CommandListHandle) -> Result<(), GraphicsError>;

    /// Present the current back buffer. Ordered on the GPU queue like a submission.
    fn present(&self) -> Result<(), GraphicsError>;

    /// Create a fence whose completed value starts at `initial_value`.
    fn create_fence(&self, initial_value: u64) -> Result<FenceHandle, GraphicsError>;

    /// Enqueue a GPU-side signal of `value` after all previously submitted work.
    fn signal_fence(&self, fence: FenceHandle, value: u64) -> Result<(), GraphicsError>;

    /// Last value the GPU has reported complete.
    fn completed_fence_value(&self, fence: FenceHandle) -> u64;

    /// Block the calling thread until the fence reaches `value`.
    ///
    /// There is no timeout: a GPU that never signals is a device hang.
    fn wait_fence(&self, fence: FenceHandle, value: u64);

    /// Create a CPU-writable buffer of `element_count` elements of `element_size` bytes.
    fn create_upload_buffer(
        &self,
        element_size: u64,
        element_count: u32,
    ) -> Result<BufferHandle, GraphicsError>;

    /// Copy `data` into an upload buffer at byte `offset`.
    fn write_upload_buffer(
        &self,
        buffer: BufferHandle,
        offset: u64,
        data: &[u8],
    ) -> Result<(), GraphicsError>;

    /// Create a pipeline state object.
    fn create_pipeline(
        &self,
        descriptor: &PipelineDescriptor,
    ) -> Result<PipelineHandle, GraphicsError>;

    /// Create a contiguous descriptor table over `resources`.
    fn create_descriptor_table(
        &self,
        resources: &[DescriptorResource],
    ) -> Result<DescriptorHandle, GraphicsError>;
}
