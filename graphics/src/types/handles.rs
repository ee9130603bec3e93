//! Opaque typed handles into backend-owned object tables.
//!
//! Handles are small `Copy` indices rather than native pointers. The backend
//! decides what an index refers to; the pipeline core only stores, compares
//! and forwards them.

/// Common behaviour of every handle type.
pub trait Handle: Copy + std::fmt::Debug {
    /// Check whether this is the null sentinel.
    fn is_null(self) -> bool;
}

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            /// Sentinel value that never names a live object.
            pub const NULL: Self = Self(u32::MAX);

            /// Create a handle from a backend table index.
            pub const fn new(index: u32) -> Self {
                Self(index)
            }

            /// Index into the backend's table for this object kind.
            pub const fn index(self) -> usize {
                self.0 as usize
            }

            /// Check whether this is the null sentinel.
            pub const fn is_null(self) -> bool {
                self.0 == u32::MAX
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::NULL
            }
        }

        impl Handle for $name {
            fn is_null(self) -> bool {
                $name::is_null(self)
            }
        }
    };
}

define_handle!(
    /// Handle to the memory pool a command list records into.
    CommandAllocatorHandle
);
define_handle!(
    /// Handle to a reusable command list (recording buffer).
    CommandListHandle
);
define_handle!(
    /// Handle to a GPU completion fence.
    FenceHandle
);
define_handle!(
    /// Handle to a CPU-writable, GPU-visible buffer.
    BufferHandle
);
define_handle!(
    /// Handle to a texture or render target view.
    TextureHandle
);
define_handle!(
    /// Handle to the first entry of a descriptor table.
    DescriptorHandle
);
define_handle!(
    /// Handle to a pipeline state object.
    PipelineHandle
);

/// Reject a null handle with an error naming the offending input.
pub(crate) fn require<H: Handle>(handle: H, what: &str) -> Result<H, crate::GraphicsError> {
    if handle.is_null() {
        Err(crate::GraphicsError::InvalidHandle(format!("{what} is null")))
    } else {
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_null() {
        assert!(BufferHandle::default().is_null());
        assert!(FenceHandle::NULL.is_null());
        assert!(!TextureHandle::new(0).is_null());
    }

    #[test]
    fn test_index_roundtrip() {
        assert_eq!(CommandListHandle::new(7).index(), 7);
    }

    #[test]
    fn test_require() {
        assert!(require(TextureHandle::new(1), "albedo").is_ok());
        let err = require(TextureHandle::NULL, "albedo").unwrap_err();
        assert_eq!(err.to_string(), "invalid handle: albedo is null");
    }
}
