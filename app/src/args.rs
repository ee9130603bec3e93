//! Command line arguments.
//!
//! Uses clap for CLI parsing with help text (`--help`) and validation.

use std::time::Duration;

use clap::Parser;
use deferred_graphics::{GpuSimulation, PassOrdering, RendererConfig};

/// Barrier between dependent stages, as selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CliOrdering {
    /// Wait until the producing stage's lists were handed to the GPU queue.
    Submission,
    /// Also wait until the GPU finished the producing stage.
    #[default]
    GpuCompletion,
}

impl From<CliOrdering> for PassOrdering {
    fn from(cli: CliOrdering) -> Self {
        match cli {
            CliOrdering::Submission => PassOrdering::Submission,
            CliOrdering::GpuCompletion => PassOrdering::GpuCompletion,
        }
    }
}

/// Deferred pipeline application arguments.
///
/// # Examples
///
/// ```bash
/// # Render 300 frames of a 64 object scene, three frames in flight
/// ./deferred-app --frames 300 --objects 64 --queued-frames 3
///
/// # Simulate a slow GPU and order dependent stages by submission only
/// ./deferred-app --gpu-latency-ms 8 --ordering submission
/// ```
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(
    name = "deferred-app",
    about = "Headless deferred renderer on a simulated GPU",
    version
)]
pub struct AppArgs {
    /// Number of frames to render before exiting.
    #[arg(long, default_value_t = 120)]
    pub frames: u64,

    /// Frames the CPU may record ahead of the GPU.
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u64).range(1..=8))]
    pub queued_frames: u64,

    /// Recording worker threads (default: available cores).
    #[arg(long)]
    pub workers: Option<usize>,

    /// Skip the ambient occlusion and blur stages.
    #[arg(long)]
    pub no_ambient_occlusion: bool,

    /// Skip the sky box.
    #[arg(long)]
    pub no_sky_box: bool,

    /// Simulated GPU time per fence value, in milliseconds (0 = immediate).
    #[arg(long, default_value_t = 2)]
    pub gpu_latency_ms: u64,

    /// Number of drawable objects in the synthetic scene.
    #[arg(long, default_value_t = 32)]
    pub objects: usize,

    /// Barrier between dependent stages.
    #[arg(long, default_value = "gpu-completion", value_enum)]
    pub ordering: CliOrdering,
}

impl Default for AppArgs {
    fn default() -> Self {
        Self {
            frames: 120,
            queued_frames: 2,
            workers: None,
            no_ambient_occlusion: false,
            no_sky_box: false,
            gpu_latency_ms: 2,
            objects: 32,
            ordering: CliOrdering::GpuCompletion,
        }
    }
}

impl AppArgs {
    /// Renderer configuration selected by the arguments.
    pub fn renderer_config(&self) -> RendererConfig {
        let mut config = RendererConfig::default()
            .with_queued_frame_count(self.queued_frames as usize)
            .with_ambient_occlusion(!self.no_ambient_occlusion)
            .with_sky_box(!self.no_sky_box)
            .with_dependency_ordering(self.ordering.into());
        if let Some(workers) = self.workers {
            config = config.with_worker_threads(workers.max(1));
        }
        config
    }

    /// GPU completion model of the simulated backend.
    pub fn simulation(&self) -> GpuSimulation {
        match self.gpu_latency_ms {
            0 => GpuSimulation::Immediate,
            ms => GpuSimulation::Latency(Duration::from_millis(ms)),
        }
    }
}
