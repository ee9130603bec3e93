//! Graphics error types.

use std::fmt;

/// Errors that can occur in the frame pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphicsError {
    /// Failed to initialize a component.
    InitializationFailed(String),
    /// The backend failed to create a resource.
    ResourceCreationFailed(String),
    /// An invalid parameter was provided.
    InvalidParameter(String),
    /// A required handle was null or does not name a live backend object.
    InvalidHandle(String),
    /// The backend rejected a command list submission.
    SubmissionFailed(String),
    /// The GPU device was lost.
    DeviceLost,
    /// An internal error occurred.
    Internal(String),
}

impl fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitializationFailed(msg) => write!(f, "initialization failed: {msg}"),
            Self::ResourceCreationFailed(msg) => write!(f, "resource creation failed: {msg}"),
            Self::InvalidParameter(msg) => write!(f, "invalid parameter: {msg}"),
            Self::InvalidHandle(msg) => write!(f, "invalid handle: {msg}"),
            Self::SubmissionFailed(msg) => write!(f, "submission failed: {msg}"),
            Self::DeviceLost => write!(f, "GPU device lost"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for GraphicsError {}

/// Report an unrecoverable backend failure and terminate the process.
///
/// A broken GPU queue or device cannot usefully keep rendering, so there is
/// no retry or degraded mode. The diagnostic is logged before aborting.
pub fn fatal(context: &str, error: &GraphicsError) -> ! {
    log::error!("fatal: {context}: {error}");
    eprintln!("fatal: {context}: {error}");
    std::process::abort()
}
