//! CPU/GPU synchronization primitives.
//!
//! - [`GpuCompletionCounter`]: a backend fence with a monotonically
//!   increasing requested value. Answers "has the GPU *finished* this work".
//! - [`SubmissionCounter`]: an atomic count of command lists handed to the
//!   GPU queue. Answers the weaker "has this work *left the pending queue*".
//! - [`FenceTicket`]: the value the executor signalled on behalf of a
//!   requester, published once the signal has actually been enqueued.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::utils::Backoff;
use parking_lot::{Condvar, Mutex};

use crate::backend::GpuBackend;
use crate::error::GraphicsError;
use crate::types::FenceHandle;

/// A monotonically increasing GPU fence.
///
/// Holds two positions: the last value requested from the GPU queue
/// ([`last_requested`](Self::last_requested)) and the last value the GPU
/// reports complete ([`completed_value`](Self::completed_value)).
///
/// Only one thread may issue signals (the executor, or a loader utility that
/// owns its own queue). Any thread may query or wait.
pub struct GpuCompletionCounter {
    backend: Arc<dyn GpuBackend>,
    fence: FenceHandle,
    last_requested: AtomicU64,
}

impl GpuCompletionCounter {
    /// Create the counter and its backend fence, starting at 0.
    pub fn new(backend: Arc<dyn GpuBackend>) -> Result<Self, GraphicsError> {
        let fence = backend.create_fence(0)?;
        log::debug!("Created GPU completion counter on {:?}", fence);
        Ok(Self {
            backend,
            fence,
            last_requested: AtomicU64::new(0),
        })
    }

    /// Backend fence handle.
    pub fn fence(&self) -> FenceHandle {
        self.fence
    }

    /// Enqueue a signal of the next value after all work submitted so far.
    ///
    /// Returns the requested value. Values are strictly increasing.
    pub fn signal_next(&self) -> Result<u64, GraphicsError> {
        let value = self.last_requested.load(Ordering::Acquire) + 1;
        self.backend.signal_fence(self.fence, value)?;
        self.last_requested.store(value, Ordering::Release);
        log::trace!("Signalled {:?} = {}", self.fence, value);
        Ok(value)
    }

    /// Last value requested through [`signal_next`](Self::signal_next).
    pub fn last_requested(&self) -> u64 {
        self.last_requested.load(Ordering::Acquire)
    }

    /// Last value the GPU reports complete.
    pub fn completed_value(&self) -> u64 {
        self.backend.completed_fence_value(self.fence)
    }

    /// Whether the GPU has reached `value`.
    pub fn is_complete(&self, value: u64) -> bool {
        self.completed_value() >= value
    }

    /// Block until the GPU reaches `value`.
    ///
    /// Returns at once if it already has. There is no timeout.
    pub fn wait(&self, value: u64) {
        if self.is_complete(value) {
            return;
        }
        crate::profile_scope!("gpu_wait");
        log::trace!("Waiting for {:?} to reach {}", self.fence, value);
        self.backend.wait_fence(self.fence, value);
    }

    /// Signal a new value and wait for it: drains all submitted GPU work.
    pub fn flush(&self) -> Result<u64, GraphicsError> {
        let value = self.signal_next()?;
        self.wait(value);
        Ok(value)
    }
}

impl std::fmt::Debug for GpuCompletionCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuCompletionCounter")
            .field("fence", &self.fence)
            .field("last_requested", &self.last_requested())
            .finish_non_exhaustive()
    }
}

/// Count of command lists handed to the GPU queue.
///
/// Clones share the same counter.
#[derive(Debug, Clone, Default)]
pub struct SubmissionCounter {
    count: Arc<AtomicU64>,
}

impl SubmissionCounter {
    /// Create a counter at 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the counter back to 0.
    pub fn reset(&self) {
        self.count.store(0, Ordering::Release);
    }

    /// Record one submission. Returns the new count.
    pub fn increment(&self) -> u64 {
        self.count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Current count.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    /// Spin cooperatively until the count reaches `target`.
    ///
    /// A target of 0 returns immediately.
    pub fn wait_for(&self, target: u64) {
        if target == 0 {
            return;
        }
        let backoff = Backoff::new();
        while self.count() < target {
            if backoff.is_completed() {
                std::thread::yield_now();
            } else {
                backoff.snooze();
            }
        }
    }
}

/// One-shot slot for a fence value signalled by the executor.
///
/// The requester keeps a clone and blocks on
/// [`wait_value`](Self::wait_value) or
/// [`wait_completed`](Self::wait_completed).
#[derive(Debug, Clone, Default)]
pub struct FenceTicket {
    inner: Arc<(Mutex<Option<u64>>, Condvar)>,
}

impl FenceTicket {
    /// Create an unpublished ticket.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the signalled value and wake waiters.
    ///
    /// # Panics
    ///
    /// Panics if the ticket was already published.
    pub fn publish(&self, value: u64) {
        let (slot, published) = &*self.inner;
        let mut slot = slot.lock();
        assert!(slot.is_none(), "fence ticket published twice");
        *slot = Some(value);
        published.notify_all();
    }

    /// The value, if already published.
    pub fn try_value(&self) -> Option<u64> {
        *self.inner.0.lock()
    }

    /// Block until the executor publishes the signalled value.
    pub fn wait_value(&self) -> u64 {
        let (slot, published) = &*self.inner;
        let mut slot = slot.lock();
        loop {
            if let Some(value) = *slot {
                return value;
            }
            published.wait(&mut slot);
        }
    }

    /// Block until the value is published and the GPU has reached it.
    pub fn wait_completed(&self, counter: &GpuCompletionCounter) -> u64 {
        let value = self.wait_value();
        counter.wait(value);
        value
    }
}

static_assertions::assert_impl_all!(GpuCompletionCounter: Send, Sync);
static_assertions::assert_impl_all!(SubmissionCounter: Send, Sync);
static_assertions::assert_impl_all!(FenceTicket: Send, Sync);
