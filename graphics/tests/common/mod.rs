//! Common utilities for frame pipeline integration tests.
//!
//! Everything here runs against the [`DummyBackend`], whose simulated GPU can
//! complete work immediately, after a fixed latency, or only when the test
//! says so.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use deferred_graphics::types::BufferHandle;
use deferred_graphics::{
    AmbientOcclusionConstants, CommandListPerFrame, CommandListRecorder, CommandListSink,
    DrawableItem, DummyBackend, EnvironmentMaps, FrameConstants, FrameTargets, FrameTime,
    GBufferTargets, GeometryData, GraphicsError, MaterialTextures, SceneDescription, SceneSource,
};
use glam::{Mat4, Vec3};
use parking_lot::Mutex;

/// Install the test logger once per process.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Poll `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}

// ============================================================================
// Scene
// ============================================================================

/// Render targets for one frame, created on `backend`.
pub fn frame_targets(backend: &DummyBackend) -> FrameTargets {
    FrameTargets {
        gbuffer: GBufferTargets {
            color_metalness: backend.create_texture("gbuffer.color_metalness"),
            normal_smoothness: backend.create_texture("gbuffer.normal_smoothness"),
            depth: backend.create_texture("gbuffer.depth"),
        },
        ambient_occlusion: backend.create_texture("ambient_occlusion"),
        ambient_occlusion_blurred: backend.create_texture("ambient_occlusion_blurred"),
        ambient_occlusion_noise: backend.create_texture("ambient_occlusion_noise"),
        lighting: backend.create_texture("lighting"),
        back_buffer: backend.create_texture("back_buffer"),
    }
}

pub fn environment(backend: &DummyBackend) -> EnvironmentMaps {
    EnvironmentMaps {
        sky_box: backend.create_texture("sky_box"),
        diffuse_irradiance: backend.create_texture("diffuse_irradiance"),
        specular_pre_convolved: backend.create_texture("specular_pre_convolved"),
    }
}

/// A cube mesh; buffer contents are irrelevant to the simulated GPU.
pub fn cube() -> GeometryData {
    GeometryData::new(BufferHandle::new(0), BufferHandle::new(1), 36)
}

/// `count` cubes in a row. Every other one is color mapped.
pub fn drawables(backend: &DummyBackend, count: usize) -> Vec<DrawableItem> {
    let albedo = backend.create_texture("albedo");
    (0..count)
        .map(|i| {
            let world = Mat4::from_translation(Vec3::new(i as f32 * 2.0, 0.0, 0.0));
            let item = DrawableItem::new(cube().with_instances(vec![world]));
            if i % 2 == 1 {
                item.with_textures(MaterialTextures {
                    color: Some(albedo),
                    ..Default::default()
                })
            } else {
                item
            }
        })
        .collect()
}

/// A static scene whose update counter is observable from other threads.
pub struct TestScene {
    description: SceneDescription,
    updates: Arc<AtomicU64>,
}

impl TestScene {
    pub fn new(backend: &DummyBackend, objects: usize) -> Self {
        Self {
            description: SceneDescription {
                items: drawables(backend, objects),
                environment: environment(backend),
                sky_box_mesh: cube(),
                targets: frame_targets(backend),
                ambient_occlusion: AmbientOcclusionConstants::default(),
            },
            updates: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Shared count of `update` calls, i.e. frames that passed frame pacing.
    pub fn updates(&self) -> Arc<AtomicU64> {
        self.updates.clone()
    }
}

impl SceneSource for TestScene {
    fn description(&self) -> &SceneDescription {
        &self.description
    }

    fn update(&mut self, time: &FrameTime) -> FrameConstants {
        self.updates.fetch_add(1, Ordering::SeqCst);
        let eye = Vec3::new(0.0, 2.0, 10.0 - time.total_time);
        FrameConstants::new(
            Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y),
            Mat4::perspective_rh(std::f32::consts::FRAC_PI_4, 16.0 / 9.0, 0.1, 100.0),
            eye.extend(1.0),
        )
    }
}

// ============================================================================
// Recorders
// ============================================================================

/// Slots used by a [`SlotRecorder`], one entry per recorded frame.
pub type SlotLog = Arc<Mutex<Vec<usize>>>;

/// Minimal recorder: one draw per frame, remembering which slot it used.
pub struct SlotRecorder {
    list: CommandListPerFrame,
    slots: SlotLog,
}

impl SlotRecorder {
    pub fn new(backend: &Arc<DummyBackend>, slot_count: usize, label: &str) -> Self {
        let list = CommandListPerFrame::new(backend.clone(), slot_count, label)
            .expect("create command list");
        Self {
            list,
            slots: SlotLog::default(),
        }
    }

    /// Handle to the slot history, readable after the recorder moved into a pass.
    pub fn slot_log(&self) -> SlotLog {
        self.slots.clone()
    }
}

impl CommandListRecorder for SlotRecorder {
    fn name(&self) -> &str {
        self.list.label()
    }

    fn record_and_push_command_lists(
        &mut self,
        _constants: &FrameConstants,
        sink: &CommandListSink,
    ) -> Result<(), GraphicsError> {
        let mut recording = self.list.reset_with_next_slot()?;
        self.slots.lock().push(recording.slot());
        recording.draw(3, 1)?;
        sink.push(recording.close()?);
        Ok(())
    }

    fn validate_data(&self) -> bool {
        !self.list.handle().is_null()
    }
}
