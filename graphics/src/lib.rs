//! # Deferred Graphics
//!
//! Frame pipeline of a deferred renderer: command lists are recorded in
//! parallel, handed to one executor thread that owns the GPU queue, and the
//! CPU is paced against the GPU with a monotonically increasing fence.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`GpuBackend`] - Trait for the GPU queue, command lists, fences and resources
//! - [`DummyBackend`] - Simulated GPU for tests and headless runs
//! - [`CommandListRecorder`] - One recorder per rendering technique
//! - [`RenderPass`] - Stages of recorders separated by execution barriers
//! - [`CommandListExecutor`] - Single submission thread
//! - [`FrameOrchestrator`] - Drives whole frames
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use deferred_graphics::{DummyBackend, FrameOrchestrator, RendererConfig};
//!
//! let backend = Arc::new(DummyBackend::new());
//! let mut renderer = FrameOrchestrator::new(backend, RendererConfig::default(), scene)?;
//! for _ in 0..100 {
//!     renderer.render_frame()?;
//! }
//! renderer.shutdown()?;
//! ```

pub mod backend;
pub mod command;
pub mod context;
pub mod error;
pub mod pass;
pub mod pipeline;
pub mod profiling;
pub mod recorder;
pub mod registry;
pub mod renderer;
pub mod resources;
pub mod scheduler;
pub mod thread_pool;
pub mod types;

// Re-export main types for convenience
pub use backend::{
    BackendEvent, DescriptorResource, DummyBackend, GpuBackend, GpuSimulation, PipelineDescriptor,
};
pub use command::{ClosedCommandList, CommandListPerFrame, FrameSlotAllocator, RecordingBuffer};
pub use context::GraphicsContext;
pub use error::GraphicsError;
pub use pass::{PassOrdering, PassStage, PassState, RenderPass};
pub use pipeline::FramePipeline;
pub use recorder::{CommandListRecorder, GeometryTechnique};
pub use registry::{PipelineRegistry, Registry};
pub use renderer::{
    FrameOrchestrator, FrameTime, FrameTimer, RendererConfig, SceneDescription, SceneSource,
};
pub use resources::UploadBuffer;
pub use scheduler::{
    CommandListExecutor, CommandListSink, FenceTicket, GpuCompletionCounter,
    PendingCommandListQueue, PendingWork, SubmissionCounter,
};
pub use thread_pool::WorkerPool;
pub use types::{
    AmbientOcclusionConstants, DrawableItem, EnvironmentMaps, FrameConstants, FrameTargets,
    GBufferTargets, GeometryData, MaterialProperties, MaterialTextures,
};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the graphics subsystem.
///
/// Only logs the version; call it once at startup after the logger is set up.
pub fn init() {
    log::info!("Deferred Graphics v{} initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_dummy_backend_is_a_gpu_backend() {
        let backend: std::sync::Arc<dyn GpuBackend> = std::sync::Arc::new(DummyBackend::new());
        assert!(GpuCompletionCounter::new(backend).is_ok());
    }
}
