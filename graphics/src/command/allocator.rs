//! Round-robin frame slot allocator.

use crate::backend::GpuBackend;
use crate::error::GraphicsError;
use crate::types::CommandAllocatorHandle;

/// One of the N rotating per-frame recording resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameSlot {
    /// Slot index, `0..slot_count`.
    pub index: usize,
    /// Command allocator owned by this slot.
    pub allocator: CommandAllocatorHandle,
}

/// Owns N command allocators, one per queued frame, handed out in round robin.
///
/// ```text
/// slot_count = 3
///
/// advance(): 0 ──► 1 ──► 2 ──► 0 ──► 1 ──► ...
/// ```
///
/// The allocator is passive state. Advancing resets the allocator of the
/// target slot, so the caller must already have confirmed (by pacing frames
/// on the GPU fence) that the GPU finished the slot's previous contents.
#[derive(Debug)]
pub struct FrameSlotAllocator {
    allocators: Vec<CommandAllocatorHandle>,
    cursor: usize,
}

impl FrameSlotAllocator {
    /// Create `slot_count` allocators.
    ///
    /// # Panics
    ///
    /// Panics if `slot_count` is 0.
    pub fn new(backend: &dyn GpuBackend, slot_count: usize) -> Result<Self, GraphicsError> {
        assert!(slot_count > 0, "slot_count must be at least 1");

        let allocators = (0..slot_count)
            .map(|_| backend.create_command_allocator())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            allocators,
            // First advance lands on slot 0.
            cursor: slot_count - 1,
        })
    }

    /// Number of slots.
    pub fn slot_count(&self) -> usize {
        self.allocators.len()
    }

    /// Slot index the next [`advance`](Self::advance) will return.
    pub fn next_slot_index(&self) -> usize {
        (self.cursor + 1) % self.allocators.len()
    }

    /// Slot most recently returned by [`advance`](Self::advance).
    pub fn current_slot(&self) -> FrameSlot {
        FrameSlot {
            index: self.cursor,
            allocator: self.allocators[self.cursor],
        }
    }

    /// Allocator of a specific slot, for creating lists against it.
    pub fn allocator(&self, index: usize) -> CommandAllocatorHandle {
        self.allocators[index]
    }

    /// Move to the next slot and reset its allocator.
    pub fn advance(&mut self, backend: &dyn GpuBackend) -> Result<FrameSlot, GraphicsError> {
        self.cursor = self.next_slot_index();
        let slot = self.current_slot();
        backend.reset_command_allocator(slot.allocator)?;
        Ok(slot)
    }
}
