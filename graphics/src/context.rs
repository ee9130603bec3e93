//! Shared state handed to every recorder constructor.

use std::sync::Arc;

use crate::backend::{GpuBackend, PipelineDescriptor};
use crate::error::GraphicsError;
use crate::registry::PipelineRegistry;
use crate::types::PipelineHandle;

/// Backend, pipeline registry and the number of queued frames.
///
/// Passed by reference to everything created at load time; there is no
/// process-wide state.
pub struct GraphicsContext {
    backend: Arc<dyn GpuBackend>,
    pipelines: PipelineRegistry,
    queued_frame_count: usize,
}

impl GraphicsContext {
    /// Create a context.
    ///
    /// # Panics
    ///
    /// Panics if `queued_frame_count` is 0.
    pub fn new(backend: Arc<dyn GpuBackend>, queued_frame_count: usize) -> Self {
        assert!(
            queued_frame_count > 0,
            "queued_frame_count must be at least 1"
        );
        log::debug!(
            "Graphics context on {} backend, {} queued frames",
            backend.name(),
            queued_frame_count
        );
        Self {
            backend,
            pipelines: PipelineRegistry::new("pipelines"),
            queued_frame_count,
        }
    }

    pub fn backend(&self) -> &Arc<dyn GpuBackend> {
        &self.backend
    }

    /// Number of frame slots every per-frame resource rotates over.
    pub fn queued_frame_count(&self) -> usize {
        self.queued_frame_count
    }

    pub fn pipelines(&self) -> &PipelineRegistry {
        &self.pipelines
    }

    /// Get or create the pipeline for `descriptor`.
    pub fn pipeline(
        &self,
        descriptor: &PipelineDescriptor,
    ) -> Result<PipelineHandle, GraphicsError> {
        self.pipelines.pipeline(self.backend.as_ref(), descriptor)
    }
}

impl std::fmt::Debug for GraphicsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsContext")
            .field("backend", &self.backend.name())
            .field("pipelines", &self.pipelines)
            .field("queued_frame_count", &self.queued_frame_count)
            .finish()
    }
}

static_assertions::assert_impl_all!(GraphicsContext: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;

    #[test]
    fn test_context_pipelines() {
        let context = GraphicsContext::new(Arc::new(DummyBackend::new()), 3);
        assert_eq!(context.queued_frame_count(), 3);
        let a = context.pipeline(&PipelineDescriptor::new("blur", 1)).unwrap();
        let b = context.pipeline(&PipelineDescriptor::new("blur", 1)).unwrap();
        assert_eq!(a, b);
        assert_eq!(context.pipelines().len(), 1);
    }

    #[test]
    #[should_panic(expected = "queued_frame_count must be at least 1")]
    fn test_zero_queued_frames_panics() {
        let _ = GraphicsContext::new(Arc::new(DummyBackend::new()), 0);
    }
}
