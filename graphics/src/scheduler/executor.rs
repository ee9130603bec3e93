//! The single thread that submits work to the GPU queue.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam::utils::Backoff;

use super::queue::{CommandListSink, PendingCommandListQueue, PendingWork};
use super::sync::{FenceTicket, GpuCompletionCounter, SubmissionCounter};
use crate::backend::GpuBackend;
use crate::error::{self, GraphicsError};

/// Sleep between polls once spinning and yielding found nothing.
const IDLE_SLEEP: Duration = Duration::from_micros(50);

/// Default name of the executor thread.
pub const DEFAULT_EXECUTOR_THREAD_NAME: &str = "command-list-executor";

/// Drains the [`PendingCommandListQueue`] on a dedicated thread.
///
/// The executor is the only code that talks to the GPU queue: it submits
/// command lists, signals the [`GpuCompletionCounter`] and presents, in the
/// order the work was popped. Every submitted list increments the global
/// submitted counter and, if present, the tracker of the pass stage that
/// recorded it.
///
/// Any backend failure on this thread is fatal, and so is a panic: producers
/// blocked on a stage barrier would otherwise wait forever.
///
/// ```text
///  recorder ──┐
///  recorder ──┼──► PendingCommandListQueue ──► executor thread ──► GPU queue
///  recorder ──┘                                     │
///                                                   └──► submitted counters
/// ```
pub struct CommandListExecutor {
    queue: PendingCommandListQueue,
    submitted: SubmissionCounter,
    completion: Arc<GpuCompletionCounter>,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    name: String,
}

impl CommandListExecutor {
    /// Create the completion counter and start the executor thread.
    pub fn spawn(
        backend: Arc<dyn GpuBackend>,
        queue: PendingCommandListQueue,
        name: impl Into<String>,
    ) -> Result<Self, GraphicsError> {
        let name = name.into();
        let completion = Arc::new(GpuCompletionCounter::new(backend.clone())?);
        let submitted = SubmissionCounter::new();
        let shutdown = Arc::new(AtomicBool::new(false));

        let worker = Worker {
            backend,
            queue: queue.clone(),
            submitted: submitted.clone(),
            completion: completion.clone(),
            shutdown: shutdown.clone(),
            name: name.clone(),
        };
        let thread = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let name = worker.name.clone();
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| worker.run())) {
                    let err = GraphicsError::Internal(panic_message(payload.as_ref()));
                    error::fatal(&format!("executor thread '{name}' panicked"), &err);
                }
            })
            .map_err(|e| {
                GraphicsError::InitializationFailed(format!(
                    "failed to spawn executor thread '{name}': {e}"
                ))
            })?;

        log::info!("Command list executor '{}' started", name);

        Ok(Self {
            queue,
            submitted,
            completion,
            shutdown,
            thread: Some(thread),
            name,
        })
    }

    /// The queue this executor drains.
    pub fn queue(&self) -> &PendingCommandListQueue {
        &self.queue
    }

    /// A producer handle counted by `tracker`.
    pub fn sink(&self, tracker: SubmissionCounter) -> CommandListSink {
        CommandListSink::new(self.queue.clone(), tracker)
    }

    /// Set the global submitted counter back to 0.
    pub fn reset_submitted_counter(&self) {
        self.submitted.reset();
    }

    /// Lists submitted since the last reset.
    pub fn submitted_count(&self) -> u64 {
        self.submitted.count()
    }

    /// Spin cooperatively until `target` lists were submitted since the last
    /// reset. A target of 0 returns immediately.
    pub fn wait_for_submitted(&self, target: u64) {
        self.submitted.wait_for(target);
    }

    /// Shared handle to the global submitted counter.
    pub fn submitted_counter(&self) -> SubmissionCounter {
        self.submitted.clone()
    }

    /// Ask the executor to signal the completion counter once everything
    /// queued before this call has been submitted.
    pub fn request_fence_signal(&self) -> FenceTicket {
        let ticket = FenceTicket::new();
        self.queue.push(PendingWork::SignalFence(ticket.clone()));
        ticket
    }

    /// Ask the executor to present after everything queued before this call.
    pub fn request_present(&self) {
        self.queue.push(PendingWork::Present);
    }

    /// The GPU queue's completion counter.
    pub fn completion_counter(&self) -> &Arc<GpuCompletionCounter> {
        &self.completion
    }

    /// Name of the executor thread.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the thread is still running.
    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Stop the thread after it drained every item queued before this call.
    pub fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.shutdown.store(true, Ordering::Release);
        if thread.join().is_err() {
            log::error!("Command list executor '{}' panicked", self.name);
        }
        log::info!(
            "Command list executor '{}' stopped ({} submitted since last reset)",
            self.name,
            self.submitted.count()
        );
    }
}

impl Drop for CommandListExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for CommandListExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandListExecutor")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .field("pending", &self.queue.len())
            .field("submitted", &self.submitted.count())
            .finish_non_exhaustive()
    }
}

/// State moved onto the executor thread.
struct Worker {
    backend: Arc<dyn GpuBackend>,
    queue: PendingCommandListQueue,
    submitted: SubmissionCounter,
    completion: Arc<GpuCompletionCounter>,
    shutdown: Arc<AtomicBool>,
    name: String,
}

impl Worker {
    fn run(self) {
        crate::set_thread_name!(self.name.as_str());
        let backoff = Backoff::new();

        loop {
            if let Some(work) = self.queue.try_pop() {
                self.execute(work);
                backoff.reset();
                continue;
            }

            if self.shutdown.load(Ordering::Acquire) {
                // Anything pushed before the flag was raised is visible now.
                while let Some(work) = self.queue.try_pop() {
                    self.execute(work);
                }
                break;
            }

            if backoff.is_completed() {
                std::thread::sleep(IDLE_SLEEP);
            } else {
                backoff.snooze();
            }
        }
    }

    fn execute(&self, work: PendingWork) {
        crate::profile_scope!("executor_submit");
        match work {
            PendingWork::CommandList { list, tracker } => {
                if let Err(e) = self.backend.submit(list.handle()) {
                    error::fatal(&format!("submitting {:?}", list.handle()), &e);
                }
                let total = self.submitted.increment();
                if let Some(tracker) = tracker {
                    tracker.increment();
                }
                log::trace!(
                    "Submitted {:?} (slot {}, {} commands, {} since reset)",
                    list.handle(),
                    list.slot(),
                    list.command_count(),
                    total
                );
            }
            PendingWork::SignalFence(ticket) => match self.completion.signal_next() {
                Ok(value) => ticket.publish(value),
                Err(e) => error::fatal("signalling the completion counter", &e),
            },
            PendingWork::Present => {
                if let Err(e) = self.backend.present() {
                    error::fatal("presenting", &e);
                }
            }
        }
    }
}

/// Text of a panic payload, for the fatal diagnostic.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

static_assertions::assert_impl_all!(CommandListExecutor: Send, Sync);
