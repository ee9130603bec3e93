//! Frame pipeline for managing multiple frames in flight.
//!
//! This module provides [`FramePipeline`], which paces the CPU against the GPU
//! so that frame slot `i mod N` is never reused before the GPU has finished
//! the frame that last used it.
//!
//! # Rendering Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          FrameOrchestrator                              │
//! │  timer tick → scene update → passes in dependency order → present       │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                          FramePipeline                                  │
//! │  One fence ticket per frame slot. begin_frame blocks until the GPU      │
//! │  finished the previous frame recorded into the slot about to be reused. │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                           RenderPass                                    │
//! │  Stages of recorders with a submission (or GPU completion) barrier      │
//! │  between dependent stages.                                              │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                     CommandListExecutor                                 │
//! │  Single thread submitting queued lists, fence signals and presents.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Frame Overlap (Pipelining)
//!
//! With 2 frames in flight, the CPU and GPU work in parallel:
//!
//! ```text
//! Frame 0: [CPU record] [submit] ────────────────────────────────────────────►
//!                                [GPU execute frame 0] ──────────────────────►
//!
//! Frame 1:              [CPU record] [submit] ───────────────────────────────►
//!                                             [GPU execute frame 1] ─────────►
//!
//! Frame 2:                           [wait F0] [CPU record] [submit] ────────►
//!                                                           [GPU execute F2] ►
//!
//! Time ──────────────────────────────────────────────────────────────────────►
//! ```
//!
//! Every per-frame resource (command allocators, frame constant buffers) has
//! exactly N slots and advances once per frame, so the slot index of frame
//! `f` is `f mod N` everywhere and one wait here covers all of them.
//!
//! With a single slot the frame thread waits for the GPU at the start of
//! every frame.

use std::sync::Arc;

use crate::scheduler::{FenceTicket, GpuCompletionCounter};

/// Manages multiple frames in flight for CPU-GPU parallelism.
///
/// ```text
/// frames_in_flight = 2
///
/// Slot 0: [Frame 0] ──► [Frame 2] ──► [Frame 4] ──►
/// Slot 1: [Frame 1] ──► [Frame 3] ──► [Frame 5] ──►
/// ```
///
/// # Thread Safety
///
/// `FramePipeline` should be owned by a single thread (the frame thread).
#[derive(Debug)]
pub struct FramePipeline {
    completion: Arc<GpuCompletionCounter>,

    /// Fence ticket of the last frame that used each slot.
    frame_tickets: Vec<Option<FenceTicket>>,

    current_slot: usize,

    frames_in_flight: usize,

    /// Total frames started.
    frame_count: u64,
}

impl FramePipeline {
    /// Create a new frame pipeline.
    ///
    /// # Panics
    ///
    /// Panics if `frames_in_flight` is 0.
    pub fn new(frames_in_flight: usize, completion: Arc<GpuCompletionCounter>) -> Self {
        assert!(frames_in_flight > 0, "frames_in_flight must be at least 1");

        Self {
            completion,
            frame_tickets: (0..frames_in_flight).map(|_| None).collect(),
            current_slot: 0,
            frames_in_flight,
            frame_count: 0,
        }
    }

    /// Begin a new frame.
    ///
    /// Blocks until the GPU completed the frame that last used the current
    /// slot. Call this before any recorder resets its slot.
    pub fn begin_frame(&mut self) {
        crate::profile_scope!("begin_frame");

        if let Some(ticket) = &self.frame_tickets[self.current_slot] {
            let value = ticket.wait_completed(&self.completion);
            log::trace!("Slot {} released at fence value {}", self.current_slot, value);
        }

        self.frame_count += 1;

        log::trace!(
            "Begin frame {} (slot {})",
            self.frame_count,
            self.current_slot
        );
    }

    /// End the current frame.
    ///
    /// Records the fence ticket covering all of this frame's work and advances
    /// to the next slot.
    pub fn end_frame(&mut self, ticket: FenceTicket) {
        log::trace!(
            "End frame {} (slot {})",
            self.frame_count,
            self.current_slot
        );

        self.frame_tickets[self.current_slot] = Some(ticket);
        self.current_slot = (self.current_slot + 1) % self.frames_in_flight;
    }

    /// Block until every recorded frame ticket completed on the GPU.
    pub fn wait_idle(&self) {
        for ticket in self.frame_tickets.iter().flatten() {
            let value = ticket.wait_completed(&self.completion);
            log::trace!("Fence value {} reached", value);
        }
        log::debug!("All {} frame slots idle", self.frames_in_flight);
    }

    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    /// Current frame slot index, `0..frames_in_flight`.
    pub fn current_slot(&self) -> usize {
        self.current_slot
    }

    /// Total number of frames started.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Check if a specific frame slot is ready (non-blocking).
    ///
    /// A slot is ready if it was never used, or its fence value was published
    /// and the GPU reached it.
    pub fn is_slot_ready(&self, slot: usize) -> bool {
        assert!(slot < self.frames_in_flight, "Invalid slot index");

        match &self.frame_tickets[slot] {
            Some(ticket) => ticket
                .try_value()
                .is_some_and(|value| self.completion.is_complete(value)),
            None => true,
        }
    }

    /// Check if all frame slots are ready (non-blocking).
    pub fn is_idle(&self) -> bool {
        (0..self.frames_in_flight).all(|slot| self.is_slot_ready(slot))
    }
}
