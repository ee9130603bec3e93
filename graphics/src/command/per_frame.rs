//! A command list rotated over the frame slots.

use std::sync::Arc;

use super::{FrameSlotAllocator, RecordingBuffer};
use crate::backend::GpuBackend;
use crate::error::GraphicsError;
use crate::types::CommandListHandle;

/// Pairs one reusable command list with a [`FrameSlotAllocator`].
///
/// Each call to [`reset_with_next_slot`](Self::reset_with_next_slot) moves to
/// the next slot in round robin, resets that slot's allocator and reopens the
/// command list against it. With `slot_count` slots the CPU can record frame
/// K+1 while the GPU still consumes up to `slot_count - 1` older frames.
///
/// At most `slot_count` recordings of this stream may be in flight; the frame
/// pacing one level up (see [`FramePipeline`](crate::pipeline::FramePipeline))
/// is what keeps it that way.
pub struct CommandListPerFrame {
    backend: Arc<dyn GpuBackend>,
    slots: FrameSlotAllocator,
    list: CommandListHandle,
    label: String,
    recorded_frames: u64,
}

impl CommandListPerFrame {
    /// Create the slot allocators and the command list.
    pub fn new(
        backend: Arc<dyn GpuBackend>,
        slot_count: usize,
        label: impl Into<String>,
    ) -> Result<Self, GraphicsError> {
        let slots = FrameSlotAllocator::new(backend.as_ref(), slot_count)?;
        let list = backend.create_command_list(slots.allocator(0))?;
        let label = label.into();

        log::debug!(
            "Created per-frame command list '{}' with {} slots",
            label,
            slot_count
        );

        Ok(Self {
            backend,
            slots,
            list,
            label,
            recorded_frames: 0,
        })
    }

    /// Advance to the next slot and reopen the list for recording.
    ///
    /// The previous contents of the target slot must have been confirmed
    /// complete by the GPU fence, or never used.
    pub fn reset_with_next_slot(&mut self) -> Result<RecordingBuffer<'_>, GraphicsError> {
        let slot = self.slots.advance(self.backend.as_ref())?;
        self.backend.reset_command_list(self.list, slot.allocator)?;
        self.recorded_frames += 1;

        log::trace!("Reset command list '{}' on slot {}", self.label, slot.index);

        Ok(RecordingBuffer::new(
            self.backend.as_ref(),
            self.list,
            slot.index,
            &self.label,
        ))
    }

    /// Slot index the next reset will use.
    pub fn next_slot_index(&self) -> usize {
        self.slots.next_slot_index()
    }

    /// Number of frame slots.
    pub fn slot_count(&self) -> usize {
        self.slots.slot_count()
    }

    /// Number of resets performed so far.
    pub fn recorded_frames(&self) -> u64 {
        self.recorded_frames
    }

    /// Backend handle of the list.
    pub fn handle(&self) -> CommandListHandle {
        self.list
    }

    /// Debug label.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl std::fmt::Debug for CommandListPerFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandListPerFrame")
            .field("label", &self.label)
            .field("list", &self.list)
            .field("slots", &self.slots)
            .field("recorded_frames", &self.recorded_frames)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;

    fn make_list(slot_count: usize) -> (Arc<DummyBackend>, CommandListPerFrame) {
        let backend = Arc::new(DummyBackend::new());
        let list = CommandListPerFrame::new(backend.clone(), slot_count, "test").unwrap();
        (backend, list)
    }

    #[test]
    fn test_slot_cycle_matches_frame_modulo() {
        for slot_count in 1..=4 {
            let (_backend, mut list) = make_list(slot_count);
            for frame in 0..10usize {
                assert_eq!(list.next_slot_index(), frame % slot_count);
                let recording = list.reset_with_next_slot().unwrap();
                assert_eq!(recording.slot(), frame % slot_count);
                recording.close().unwrap();
            }
            assert_eq!(list.next_slot_index(), 10 % slot_count);
        }
    }

    #[test]
    fn test_record_and_close() {
        let (backend, mut list) = make_list(2);
        let mut recording = list.reset_with_next_slot().unwrap();
        recording.draw(3, 1).unwrap();
        recording.draw(3, 1).unwrap();
        let closed = recording.close().unwrap();

        assert_eq!(closed.command_count(), 2);
        assert_eq!(closed.handle(), list.handle());
        assert_eq!(backend.command_count(list.handle()), 2);
        assert_eq!(list.recorded_frames(), 1);
    }

    #[test]
    fn test_reset_discards_previous_commands() {
        let (backend, mut list) = make_list(2);
        let mut recording = list.reset_with_next_slot().unwrap();
        recording.draw(3, 1).unwrap();
        recording.close().unwrap();

        let recording = list.reset_with_next_slot().unwrap();
        recording.close().unwrap();
        assert_eq!(backend.command_count(list.handle()), 0);
    }

    #[test]
    fn test_abandoned_recording_does_not_block_next_reset() {
        let (backend, mut list) = make_list(2);
        {
            let mut recording = list.reset_with_next_slot().unwrap();
            recording.draw(3, 1).unwrap();
            // Dropped without close, as when a recorder bails out with `?`.
        }
        assert!(!backend.is_list_open(list.handle()));

        let mut recording = list.reset_with_next_slot().unwrap();
        assert_eq!(recording.slot(), 1);
        recording.draw(3, 1).unwrap();
        let closed = recording.close().unwrap();
        assert_eq!(closed.command_count(), 1);
        assert_eq!(backend.submission_count(), 0);
    }
}
