//! Upload buffers for per-frame and per-object constants.

use std::sync::Arc;

use bytemuck::Pod;

use crate::backend::GpuBackend;
use crate::error::GraphicsError;
use crate::types::BufferHandle;

/// Required alignment of a constant buffer view.
pub const CONSTANT_BUFFER_ALIGNMENT: u64 = 256;

/// A CPU-writable buffer holding `element_count` constant blocks.
///
/// Each element occupies `align_up(size_of::<T>(), 256)` bytes so that any
/// element can be bound directly as a constant buffer.
///
/// Recorders allocate one element per frame slot and write only the element
/// of the slot they are currently recording, never one the GPU may still read.
pub struct UploadBuffer {
    backend: Arc<dyn GpuBackend>,
    buffer: BufferHandle,
    element_size: u64,
    element_stride: u64,
    element_count: u32,
}

impl UploadBuffer {
    /// Create a buffer for `element_count` elements of `element_size` bytes.
    pub fn new(
        backend: Arc<dyn GpuBackend>,
        element_size: u64,
        element_count: u32,
    ) -> Result<Self, GraphicsError> {
        if element_size == 0 || element_count == 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "upload buffer of {element_count} x {element_size} bytes"
            )));
        }
        let element_stride = align_up(element_size, CONSTANT_BUFFER_ALIGNMENT);
        let buffer = backend.create_upload_buffer(element_stride, element_count)?;

        log::trace!(
            "Created upload buffer {:?}: {} x {} bytes (stride {})",
            buffer,
            element_count,
            element_size,
            element_stride
        );

        Ok(Self {
            backend,
            buffer,
            element_size,
            element_stride,
            element_count,
        })
    }

    /// Create a buffer sized for `element_count` values of `T`.
    pub fn for_type<T: Pod>(
        backend: Arc<dyn GpuBackend>,
        element_count: u32,
    ) -> Result<Self, GraphicsError> {
        Self::new(backend, size_of::<T>() as u64, element_count)
    }

    /// Backend handle.
    pub fn handle(&self) -> BufferHandle {
        self.buffer
    }

    /// Unaligned element size in bytes.
    pub fn element_size(&self) -> u64 {
        self.element_size
    }

    /// Distance between elements in bytes.
    pub fn element_stride(&self) -> u64 {
        self.element_stride
    }

    pub fn element_count(&self) -> u32 {
        self.element_count
    }

    /// Byte offset of element `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn element_offset(&self, index: u32) -> u64 {
        assert!(
            index < self.element_count,
            "element {index} out of range ({} elements)",
            self.element_count
        );
        u64::from(index) * self.element_stride
    }

    /// Copy `value` into element `index`.
    pub fn write<T: Pod>(&self, index: u32, value: &T) -> Result<(), GraphicsError> {
        let bytes = bytemuck::bytes_of(value);
        if bytes.len() as u64 > self.element_size {
            return Err(GraphicsError::InvalidParameter(format!(
                "{} byte value does not fit a {} byte element",
                bytes.len(),
                self.element_size
            )));
        }
        if index >= self.element_count {
            return Err(GraphicsError::InvalidParameter(format!(
                "element {index} out of range ({} elements)",
                self.element_count
            )));
        }
        self.backend
            .write_upload_buffer(self.buffer, self.element_offset(index), bytes)
    }
}

impl std::fmt::Debug for UploadBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadBuffer")
            .field("buffer", &self.buffer)
            .field("element_size", &self.element_size)
            .field("element_stride", &self.element_stride)
            .field("element_count", &self.element_count)
            .finish_non_exhaustive()
    }
}

/// Align a value up to the given alignment.
#[inline]
fn align_up(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

static_assertions::assert_impl_all!(UploadBuffer: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;
    use crate::types::{FrameConstants, MaterialConstants};

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 256), 0);
        assert_eq!(align_up(1, 256), 256);
        assert_eq!(align_up(256, 256), 256);
        assert_eq!(align_up(257, 256), 512);
    }

    #[test]
    fn test_stride_is_aligned() {
        let backend = Arc::new(DummyBackend::new());
        let buffer = UploadBuffer::for_type::<FrameConstants>(backend, 3).unwrap();
        assert_eq!(buffer.element_size(), 224);
        assert_eq!(buffer.element_stride(), 256);
        assert_eq!(buffer.element_offset(2), 512);
    }

    #[test]
    fn test_write_lands_at_element_offset() {
        let backend = Arc::new(DummyBackend::new());
        let buffer = UploadBuffer::for_type::<MaterialConstants>(backend.clone(), 2).unwrap();
        let material = MaterialConstants::new(glam::Vec4::ONE, 0.5, 0.25, 0.0);
        buffer.write(1, &material).unwrap();

        let contents = backend.buffer_contents(buffer.handle());
        assert_eq!(contents.len(), 512);
        assert_eq!(&contents[256..256 + 32], bytemuck::bytes_of(&material));
        assert!(contents[..256].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_write_rejects_bad_input() {
        let backend = Arc::new(DummyBackend::new());
        let buffer = UploadBuffer::for_type::<MaterialConstants>(backend.clone(), 1).unwrap();
        assert!(buffer.write(1, &MaterialConstants::new(glam::Vec4::ONE, 0.0, 0.0, 0.0)).is_err());
        assert!(buffer.write(0, &FrameConstants::default()).is_err());
        assert!(UploadBuffer::new(backend, 0, 1).is_err());
    }
}
