//! GPU resources owned by the pipeline core.
//!
//! - [`UploadBuffer`] - CPU-writable buffer of constant-buffer-aligned elements
//!
//! Textures, geometry buffers and materials are created by the asset layer and
//! only reach the core as handles.

mod upload_buffer;

pub use upload_buffer::{CONSTANT_BUFFER_ALIGNMENT, UploadBuffer};
