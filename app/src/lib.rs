//! # Deferred App
//!
//! Headless driver for the deferred frame pipeline. Renders a synthetic scene
//! on the simulated GPU for a fixed number of frames and reports how long the
//! CPU side took.
//!
//! ## Overview
//!
//! - [`AppArgs`] - Command line arguments
//! - [`OrbitScene`] - Synthetic scene source
//! - [`run`] - Build the renderer and drive the frame loop
//!
//! ## Example
//!
//! ```ignore
//! use clap::Parser;
//! use deferred_app::{AppArgs, run};
//!
//! let summary = run(&AppArgs::parse())?;
//! println!("{summary}");
//! ```

mod args;
mod runner;
mod scene;

pub use args::{AppArgs, CliOrdering};
pub use runner::{RunSummary, run};
pub use scene::OrbitScene;

/// App library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
