//! Frame orchestration.
//!
//! [`FrameOrchestrator`] owns everything one renderer needs (the graphics
//! context, the executor thread, the recording worker pool, the frame pacing
//! and the passes) and drives one frame per [`render_frame`] call:
//!
//! ```text
//! begin_frame (wait for slot f mod N)
//!   → timer tick → scene update
//!   → geometry → ambient → environment light → sky box → tone mapping
//!   → present → fence signal → end_frame
//! ```
//!
//! [`render_frame`]: FrameOrchestrator::render_frame

use std::sync::Arc;
use std::time::Instant;

use crate::backend::GpuBackend;
use crate::context::GraphicsContext;
use crate::error::GraphicsError;
use crate::pass::{
    PassOrdering, RenderPass, ambient_pass, environment_light_pass, geometry_pass, sky_box_pass,
    tone_mapping_pass,
};
use crate::pipeline::FramePipeline;
use crate::scheduler::{
    CommandListExecutor, DEFAULT_EXECUTOR_THREAD_NAME, PendingCommandListQueue,
};
use crate::thread_pool::{WorkerPool, default_thread_count};
use crate::types::{
    AmbientOcclusionConstants, DrawableItem, EnvironmentMaps, FrameConstants, FrameTargets,
    GeometryData,
};

/// Renderer configuration.
///
/// # Example
///
/// ```
/// use deferred_graphics::{PassOrdering, RendererConfig};
///
/// let config = RendererConfig::default()
///     .with_queued_frame_count(3)
///     .with_ambient_occlusion(false)
///     .with_dependency_ordering(PassOrdering::Submission);
/// assert_eq!(config.queued_frame_count, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererConfig {
    /// Frames the CPU may record ahead of the GPU (N).
    pub queued_frame_count: usize,
    /// Threads recording command lists.
    pub worker_threads: usize,
    pub ambient_occlusion: bool,
    pub sky_box: bool,
    pub executor_thread_name: String,
    /// Barrier after stages whose output a later stage samples.
    ///
    /// [`PassOrdering::Submission`] is enough on a single in-order queue and
    /// avoids a CPU wait per stage.
    pub dependency_ordering: PassOrdering,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            queued_frame_count: 2,
            worker_threads: default_thread_count(),
            ambient_occlusion: true,
            sky_box: true,
            executor_thread_name: DEFAULT_EXECUTOR_THREAD_NAME.to_string(),
            dependency_ordering: PassOrdering::GpuCompletion,
        }
    }
}

impl RendererConfig {
    pub fn with_queued_frame_count(mut self, count: usize) -> Self {
        self.queued_frame_count = count;
        self
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    pub fn with_ambient_occlusion(mut self, enabled: bool) -> Self {
        self.ambient_occlusion = enabled;
        self
    }

    pub fn with_sky_box(mut self, enabled: bool) -> Self {
        self.sky_box = enabled;
        self
    }

    pub fn with_executor_thread_name(mut self, name: impl Into<String>) -> Self {
        self.executor_thread_name = name.into();
        self
    }

    pub fn with_dependency_ordering(mut self, ordering: PassOrdering) -> Self {
        self.dependency_ordering = ordering;
        self
    }

    fn validate(&self) -> Result<(), GraphicsError> {
        if self.queued_frame_count == 0 {
            return Err(GraphicsError::InvalidParameter(
                "queued_frame_count must be at least 1".to_string(),
            ));
        }
        if self.worker_threads == 0 {
            return Err(GraphicsError::InvalidParameter(
                "worker_threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Timing of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameTime {
    /// Zero-based index of the frame.
    pub frame_index: u64,
    /// Seconds since the previous tick.
    pub delta_time: f32,
    /// Seconds since the timer started.
    pub total_time: f32,
}

/// Wall clock frame timer.
#[derive(Debug, Clone)]
pub struct FrameTimer {
    start: Instant,
    last: Instant,
    frame_index: u64,
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameTimer {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last: now,
            frame_index: 0,
        }
    }

    /// Start a new frame and return its timing.
    pub fn tick(&mut self) -> FrameTime {
        let now = Instant::now();
        let time = FrameTime {
            frame_index: self.frame_index,
            delta_time: now.duration_since(self.last).as_secs_f32(),
            total_time: now.duration_since(self.start).as_secs_f32(),
        };
        self.last = now;
        self.frame_index += 1;
        time
    }

    /// Frames ticked so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_index
    }
}

/// Everything the renderer needs to know about the scene at load time.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneDescription {
    pub items: Vec<DrawableItem>,
    pub environment: EnvironmentMaps,
    pub sky_box_mesh: GeometryData,
    pub targets: FrameTargets,
    pub ambient_occlusion: AmbientOcclusionConstants,
}

/// Produces the scene description once and the frame constants every tick.
pub trait SceneSource {
    fn description(&self) -> &SceneDescription;

    /// Advance the scene (camera, animation) and return this frame's
    /// constants.
    fn update(&mut self, time: &FrameTime) -> FrameConstants;
}

/// Drives frames through the passes, the executor and the frame pacing.
pub struct FrameOrchestrator<S: SceneSource> {
    context: GraphicsContext,
    executor: CommandListExecutor,
    pool: WorkerPool,
    pipeline: FramePipeline,
    passes: Vec<RenderPass>,
    scene: S,
    timer: FrameTimer,
    lists_per_frame: u64,
    shut_down: bool,
}

impl<S: SceneSource> FrameOrchestrator<S> {
    /// Build the context, start the executor and construct every recorder.
    pub fn new(
        backend: Arc<dyn GpuBackend>,
        config: RendererConfig,
        scene: S,
    ) -> Result<Self, GraphicsError> {
        config.validate()?;

        let context = GraphicsContext::new(backend.clone(), config.queued_frame_count);
        let passes = build_passes(&context, &config, scene.description())?;
        let lists_per_frame = passes.iter().map(RenderPass::expected_lists).sum();

        let executor = CommandListExecutor::spawn(
            backend,
            PendingCommandListQueue::new(),
            config.executor_thread_name.clone(),
        )?;
        let pool = WorkerPool::new(config.worker_threads)?;
        let pipeline =
            FramePipeline::new(config.queued_frame_count, executor.completion_counter().clone());

        log::info!(
            "Renderer ready: {} passes, {} lists per frame, {} queued frames, {} workers",
            passes.len(),
            lists_per_frame,
            config.queued_frame_count,
            pool.num_threads()
        );

        Ok(Self {
            context,
            executor,
            pool,
            pipeline,
            passes,
            scene,
            timer: FrameTimer::new(),
            lists_per_frame,
            shut_down: false,
        })
    }

    /// Record, submit and present one frame.
    ///
    /// Returns once every list of the frame has been submitted. The GPU may
    /// still be executing it. An error leaves the frame half recorded; the
    /// orchestrator should be shut down.
    pub fn render_frame(&mut self) -> Result<FrameTime, GraphicsError> {
        crate::profile_function!();
        if self.shut_down {
            return Err(GraphicsError::Internal(
                "render_frame after shutdown".to_string(),
            ));
        }

        self.pipeline.begin_frame();
        let time = self.timer.tick();
        let constants = self.scene.update(&time).with_time(
            time.frame_index as u32,
            time.delta_time,
            time.total_time,
        );

        self.executor.reset_submitted_counter();
        for pass in &mut self.passes {
            pass.execute(&constants, &self.executor, &self.pool)?;
        }
        debug_assert_eq!(self.executor.submitted_count(), self.lists_per_frame);

        self.executor.request_present();
        let ticket = self.executor.request_fence_signal();
        self.pipeline.end_frame(ticket);
        crate::frame_mark!();

        log::debug!(
            "Frame {} recorded ({} lists)",
            time.frame_index,
            self.lists_per_frame
        );
        Ok(time)
    }

    /// Wait for the GPU, drain and stop the executor.
    ///
    /// Idempotent. Also performed on drop.
    pub fn shutdown(&mut self) -> Result<(), GraphicsError> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;

        self.pipeline.wait_idle();
        self.executor.shutdown();
        // The executor thread is gone, the frame thread now owns the counter.
        let last = self.executor.completion_counter().flush()?;
        log::info!(
            "Renderer shut down after {} frames (fence at {})",
            self.frame_count(),
            last
        );
        Ok(())
    }

    /// Frames started so far.
    pub fn frame_count(&self) -> u64 {
        self.pipeline.frame_count()
    }

    /// Command lists submitted per frame.
    pub fn lists_per_frame(&self) -> u64 {
        self.lists_per_frame
    }

    pub fn passes(&self) -> &[RenderPass] {
        &self.passes
    }

    pub fn context(&self) -> &GraphicsContext {
        &self.context
    }

    pub fn executor(&self) -> &CommandListExecutor {
        &self.executor
    }

    pub fn scene(&self) -> &S {
        &self.scene
    }
}

impl<S: SceneSource> Drop for FrameOrchestrator<S> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("Renderer shutdown failed: {e}");
        }
    }
}

impl<S: SceneSource> std::fmt::Debug for FrameOrchestrator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameOrchestrator")
            .field("passes", &self.passes)
            .field("pipeline", &self.pipeline)
            .field("lists_per_frame", &self.lists_per_frame)
            .finish_non_exhaustive()
    }
}

/// Passes in dependency order.
fn build_passes(
    context: &GraphicsContext,
    config: &RendererConfig,
    scene: &SceneDescription,
) -> Result<Vec<RenderPass>, GraphicsError> {
    let ordering = config.dependency_ordering;
    let targets = &scene.targets;

    Ok(vec![
        geometry_pass(context, &scene.items, targets.gbuffer, ordering)?,
        ambient_pass(
            context,
            targets,
            scene.ambient_occlusion,
            config.ambient_occlusion,
            ordering,
        )?,
        environment_light_pass(context, targets, &scene.environment, ordering)?,
        sky_box_pass(
            context,
            targets,
            &scene.sky_box_mesh,
            &scene.environment,
            config.sky_box,
            ordering,
        )?,
        tone_mapping_pass(context, targets)?,
    ])
}

static_assertions::assert_impl_all!(RendererConfig: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendEvent, DummyBackend};
    use crate::recorder::test_support::{gbuffer, item, mesh, texture};
    use crate::types::TextureHandle;

    struct StaticScene {
        description: SceneDescription,
        updates: u64,
    }

    impl StaticScene {
        fn new(backend: &DummyBackend) -> Self {
            let description = SceneDescription {
                items: vec![item(), item()],
                environment: EnvironmentMaps {
                    sky_box: texture(backend, "sky"),
                    diffuse_irradiance: texture(backend, "irradiance"),
                    specular_pre_convolved: texture(backend, "specular"),
                },
                sky_box_mesh: mesh(),
                targets: FrameTargets {
                    gbuffer: gbuffer(backend),
                    ambient_occlusion: texture(backend, "ao"),
                    ambient_occlusion_blurred: texture(backend, "ao_blurred"),
                    ambient_occlusion_noise: texture(backend, "ao_noise"),
                    lighting: texture(backend, "lighting"),
                    back_buffer: texture(backend, "back_buffer"),
                },
                ambient_occlusion: AmbientOcclusionConstants::default(),
            };
            Self {
                description,
                updates: 0,
            }
        }
    }

    impl SceneSource for StaticScene {
        fn description(&self) -> &SceneDescription {
            &self.description
        }

        fn update(&mut self, _time: &FrameTime) -> FrameConstants {
            self.updates += 1;
            FrameConstants::default()
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = RendererConfig::default();
        assert_eq!(config.queued_frame_count, 2);
        assert!(config.worker_threads >= 1);
        assert!(config.ambient_occlusion);
        assert!(config.sky_box);
        assert_eq!(config.executor_thread_name, DEFAULT_EXECUTOR_THREAD_NAME);
        assert_eq!(config.dependency_ordering, PassOrdering::GpuCompletion);
    }

    #[test]
    fn test_timer_counts_frames() {
        let mut timer = FrameTimer::new();
        let first = timer.tick();
        let second = timer.tick();
        assert_eq!(first.frame_index, 0);
        assert_eq!(second.frame_index, 1);
        assert!(second.total_time >= first.total_time);
        assert_eq!(timer.frame_count(), 2);
    }

    #[test]
    fn test_renders_frames() {
        let backend = Arc::new(DummyBackend::new());
        let scene = StaticScene::new(&backend);
        let config = RendererConfig::default()
            .with_worker_threads(2)
            .with_dependency_ordering(PassOrdering::Submission);
        let mut renderer = FrameOrchestrator::new(backend.clone(), config, scene).unwrap();

        // clear, geometry, occlusion, blur, ambient, environment, sky box, tone mapping
        assert_eq!(renderer.lists_per_frame(), 8);
        for expected in 0..3 {
            assert_eq!(renderer.render_frame().unwrap().frame_index, expected);
        }
        renderer.shutdown().unwrap();

        assert_eq!(backend.submission_count(), 24);
        assert_eq!(backend.present_count(), 3);
        assert_eq!(renderer.scene().updates, 3);
        assert_eq!(renderer.frame_count(), 3);

        let presented = backend
            .events()
            .iter()
            .position(|e| *e == BackendEvent::Presented)
            .unwrap();
        let first_fence = backend
            .events()
            .iter()
            .position(|e| matches!(e, BackendEvent::FenceSignaled { .. }))
            .unwrap();
        assert!(presented < first_fence);
    }

    #[test]
    fn test_disabled_features_drop_lists() {
        let backend = Arc::new(DummyBackend::new());
        let scene = StaticScene::new(&backend);
        let config = RendererConfig::default()
            .with_worker_threads(1)
            .with_ambient_occlusion(false)
            .with_sky_box(false);
        let renderer = FrameOrchestrator::new(backend, config, scene).unwrap();
        assert_eq!(renderer.lists_per_frame(), 5);
    }

    #[test]
    fn test_executor_thread_takes_configured_name() {
        let backend = Arc::new(DummyBackend::new());
        let scene = StaticScene::new(&backend);
        let config = RendererConfig::default()
            .with_worker_threads(1)
            .with_executor_thread_name("gpu-submit");
        let renderer = FrameOrchestrator::new(backend, config, scene).unwrap();
        assert_eq!(renderer.executor().name(), "gpu-submit");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let backend = Arc::new(DummyBackend::new());
        let scene = StaticScene::new(&backend);
        let config = RendererConfig::default().with_queued_frame_count(0);
        assert!(matches!(
            FrameOrchestrator::new(backend, config, scene),
            Err(GraphicsError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_null_target_fails_construction() {
        let backend = Arc::new(DummyBackend::new());
        let mut scene = StaticScene::new(&backend);
        scene.description.targets.lighting = TextureHandle::NULL;
        let result = FrameOrchestrator::new(backend, RendererConfig::default(), scene);
        assert!(matches!(result, Err(GraphicsError::InvalidHandle(_))));
    }

    #[test]
    fn test_render_after_shutdown_fails() {
        let backend = Arc::new(DummyBackend::new());
        let scene = StaticScene::new(&backend);
        let mut renderer =
            FrameOrchestrator::new(backend, RendererConfig::default(), scene).unwrap();
        renderer.shutdown().unwrap();
        renderer.shutdown().unwrap();
        assert!(renderer.render_frame().is_err());
    }
}
