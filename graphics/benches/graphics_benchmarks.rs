use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use deferred_graphics::types::BufferHandle;
use deferred_graphics::{
    AmbientOcclusionConstants, CommandListExecutor, CommandListPerFrame, DrawableItem,
    DummyBackend, EnvironmentMaps, FrameConstants, FrameOrchestrator, FrameTargets, FrameTime,
    GBufferTargets, GeometryData, PendingCommandListQueue, PendingWork, RendererConfig,
    SceneDescription, SceneSource,
};

// ---------------------------------------------------------------------------
// Pending queue
// ---------------------------------------------------------------------------

fn bench_queue_push_pop(c: &mut Criterion) {
    let queue = PendingCommandListQueue::new();
    c.bench_function("pending_queue_push_pop_1000", |b| {
        b.iter(|| {
            for _ in 0..1000 {
                queue.push(PendingWork::Present);
            }
            while let Some(work) = queue.try_pop() {
                black_box(work);
            }
        });
    });
}

// ---------------------------------------------------------------------------
// Command list recording
// ---------------------------------------------------------------------------

fn bench_record_and_close(c: &mut Criterion) {
    let backend = Arc::new(DummyBackend::new().without_event_log());
    let mut list = CommandListPerFrame::new(backend, 3, "bench").unwrap();
    c.bench_function("command_list_reset_record_close_64_draws", |b| {
        b.iter(|| {
            let mut recording = list.reset_with_next_slot().unwrap();
            for _ in 0..64 {
                recording.draw(3, 1).unwrap();
            }
            black_box(recording.close().unwrap());
        });
    });
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

fn bench_executor_submit(c: &mut Criterion) {
    let backend = Arc::new(DummyBackend::new().without_event_log());
    let executor =
        CommandListExecutor::spawn(backend.clone(), PendingCommandListQueue::new(), "bench")
            .unwrap();
    let mut lists: Vec<_> = (0..64)
        .map(|i| CommandListPerFrame::new(backend.clone(), 2, format!("list{i}")).unwrap())
        .collect();
    let sink = executor.sink(Default::default());

    c.bench_function("executor_submit_64_lists", |b| {
        b.iter(|| {
            executor.reset_submitted_counter();
            for list in &mut lists {
                sink.push(list.reset_with_next_slot().unwrap().close().unwrap());
            }
            executor.wait_for_submitted(64);
        });
    });
}

// ---------------------------------------------------------------------------
// Whole frames
// ---------------------------------------------------------------------------

struct BenchScene {
    description: SceneDescription,
}

impl BenchScene {
    fn new(backend: &DummyBackend, objects: u32) -> Self {
        let texture = |label: &str| backend.create_texture(label);
        let targets = FrameTargets {
            gbuffer: GBufferTargets {
                color_metalness: texture("gbuffer.color"),
                normal_smoothness: texture("gbuffer.normal"),
                depth: texture("gbuffer.depth"),
            },
            ambient_occlusion: texture("ao"),
            ambient_occlusion_blurred: texture("ao_blurred"),
            ambient_occlusion_noise: texture("ao_noise"),
            lighting: texture("lighting"),
            back_buffer: texture("back_buffer"),
        };
        let environment = EnvironmentMaps {
            sky_box: texture("sky"),
            diffuse_irradiance: texture("irradiance"),
            specular_pre_convolved: texture("specular"),
        };
        let mesh = GeometryData::new(BufferHandle::new(0), BufferHandle::new(1), 36);
        let items = (0..objects)
            .map(|_| DrawableItem::new(mesh.clone()))
            .collect();

        Self {
            description: SceneDescription {
                items,
                environment,
                sky_box_mesh: mesh,
                targets,
                ambient_occlusion: AmbientOcclusionConstants::default(),
            },
        }
    }
}

impl SceneSource for BenchScene {
    fn description(&self) -> &SceneDescription {
        &self.description
    }

    fn update(&mut self, _time: &FrameTime) -> FrameConstants {
        FrameConstants::default()
    }
}

fn bench_render_frame(c: &mut Criterion) {
    let backend = Arc::new(DummyBackend::new().without_event_log());
    let scene = BenchScene::new(&backend, 256);
    let mut renderer =
        FrameOrchestrator::new(backend, RendererConfig::default(), scene).unwrap();

    c.bench_function("render_frame_256_objects", |b| {
        b.iter(|| black_box(renderer.render_frame().unwrap()));
    });
    renderer.shutdown().unwrap();
}

criterion_group!(
    benches,
    bench_queue_push_pop,
    bench_record_and_close,
    bench_executor_submit,
    bench_render_frame,
);
criterion_main!(benches);
