//! Profiling support via Tracy.
//!
//! Profiling is enabled via the `profiling` Cargo feature:
//!
//! ```bash
//! cargo run -p deferred-app --features deferred-graphics/profiling
//! ```
//!
//! The executor thread, every pass stage and every recorder open a span, and
//! the orchestrator marks frame boundaries, so a connected Tracy client shows
//! recording overlap across worker threads and the submission cadence of the
//! executor.
//!
//! When the feature is disabled (the default) all macros compile to nothing.

#[cfg(feature = "profiling")]
pub use tracy_client::{self, Client, frame_mark as tracy_frame_mark, span};

/// Mark the end of a frame for Tracy's frame analysis.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! frame_mark {
    () => {
        $crate::profiling::tracy_frame_mark()
    };
}

/// Mark the end of a frame (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! frame_mark {
    () => {};
}

/// Create a profiling span for the current scope.
///
/// The span ends when the scope exits.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_scope {
    ($name:expr) => {
        let _profile_span = $crate::profiling::span!($name);
    };
}

/// Create a profiling span (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_scope {
    ($name:expr) => {};
}

/// Create a profiling span named after the enclosing function.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_function {
    () => {
        let _profile_span = $crate::profiling::span!();
    };
}

/// Create a profiling span for function (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_function {
    () => {};
}

/// Name the current thread in Tracy. Accepts any `&str`, so runtime
/// configured names work too.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! set_thread_name {
    ($name:expr) => {
        if let Some(client) = $crate::profiling::Client::running() {
            client.set_thread_name($name);
        }
    };
}

/// Set thread name (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! set_thread_name {
    ($name:expr) => {
        let _: &str = $name;
    };
}

/// Start the Tracy client if profiling is enabled.
///
/// Safe to call more than once.
pub fn start() {
    #[cfg(feature = "profiling")]
    {
        let _client = Client::start();
        log::info!("Tracy profiling client started");
    }
}
