//! Frame loop.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use deferred_graphics::{DummyBackend, FrameOrchestrator, GraphicsError};

use crate::args::AppArgs;
use crate::scene::OrbitScene;

/// What a run did.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub frames: u64,
    pub lists_per_frame: u64,
    pub submissions: u64,
    pub presents: u64,
    pub elapsed: Duration,
}

impl RunSummary {
    /// Average CPU time per frame, including time blocked on frame pacing.
    pub fn frame_time(&self) -> Duration {
        if self.frames == 0 {
            Duration::ZERO
        } else {
            self.elapsed / self.frames as u32
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} frames, {} lists per frame, {} submissions, {} presents in {:.2?} ({:.2?} per frame)",
            self.frames,
            self.lists_per_frame,
            self.submissions,
            self.presents,
            self.elapsed,
            self.frame_time()
        )
    }
}

/// Build the renderer described by `args` and render `args.frames` frames.
pub fn run(args: &AppArgs) -> Result<RunSummary, GraphicsError> {
    let backend = Arc::new(DummyBackend::with_simulation(args.simulation()).without_event_log());
    let scene = OrbitScene::new(&backend, args.objects);
    let mut renderer = FrameOrchestrator::new(backend.clone(), args.renderer_config(), scene)?;

    log::info!(
        "Rendering {} frames ({} objects, {:?})",
        args.frames,
        args.objects,
        args.simulation()
    );

    let start = Instant::now();
    for _ in 0..args.frames {
        let time = renderer.render_frame()?;
        if time.frame_index % 60 == 0 {
            log::debug!(
                "Frame {}: dt {:.3} ms",
                time.frame_index,
                time.delta_time * 1000.0
            );
        }
    }
    renderer.shutdown()?;
    let elapsed = start.elapsed();

    Ok(RunSummary {
        frames: renderer.frame_count(),
        lists_per_frame: renderer.lists_per_frame(),
        submissions: backend.submission_count(),
        presents: backend.present_count(),
        elapsed,
    })
}
