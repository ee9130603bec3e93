//! Submission scheduling.
//!
//! Recorders on worker threads push closed command lists into a
//! [`PendingCommandListQueue`]; a single [`CommandListExecutor`] thread pops
//! them and submits them to the GPU queue.
//!
//! # Architecture
//!
//! | Layer | Type | Purpose |
//! |-------|------|---------|
//! | Pipeline | [`FramePipeline`](crate::pipeline::FramePipeline) | Frames in flight, paced on the GPU fence |
//! | Pass | [`RenderPass`](crate::pass::RenderPass) | Barrier between dependent stages |
//! | **Scheduler** | [`CommandListExecutor`] | Ordered submission (this module) |
//! | Recorder | [`CommandListRecorder`](crate::recorder::CommandListRecorder) | One technique's list per frame |
//!
//! # Two kinds of "done"
//!
//! - [`SubmissionCounter`]: the list has left the queue and was handed to
//!   the GPU queue. Cheap; enough to order work on a single queue.
//! - [`GpuCompletionCounter`]: the GPU has finished executing it. Required
//!   before the CPU reuses anything the GPU reads.
//!
//! # Example
//!
//! ```ignore
//! let executor = CommandListExecutor::spawn(backend, queue, "executor")?;
//!
//! let tracker = SubmissionCounter::new();
//! recorder.record_and_push_command_lists(&constants, &executor.sink(tracker.clone()))?;
//! tracker.wait_for(1);
//!
//! let ticket = executor.request_fence_signal();
//! ticket.wait_completed(executor.completion_counter());
//! ```

mod executor;
mod queue;
mod sync;

pub use executor::{CommandListExecutor, DEFAULT_EXECUTOR_THREAD_NAME};
pub use queue::{CommandListSink, PendingCommandListQueue, PendingWork};
pub use sync::{FenceTicket, GpuCompletionCounter, SubmissionCounter};
