//! Pending work queue between recorder threads and the executor thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::queue::SegQueue;

use super::sync::{FenceTicket, SubmissionCounter};
use crate::command::ClosedCommandList;

/// One unit of work for the executor, executed on the GPU queue in pop order.
#[derive(Debug)]
pub enum PendingWork {
    /// Submit a closed command list. `tracker` (the owning pass stage's
    /// counter) is incremented once the list is submitted.
    CommandList {
        list: ClosedCommandList,
        tracker: Option<SubmissionCounter>,
    },
    /// Signal the completion counter and publish the value to the ticket.
    SignalFence(FenceTicket),
    /// Present the back buffer.
    Present,
}

/// Unbounded multi-producer, single-consumer queue of pending GPU work.
///
/// `push` never blocks and never fails. Items pushed by one thread are popped
/// in the order that thread pushed them; items from different producers may
/// interleave arbitrarily.
///
/// Clones share the same queue.
#[derive(Debug, Clone, Default)]
pub struct PendingCommandListQueue {
    inner: Arc<SegQueue<PendingWork>>,
}

impl PendingCommandListQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue any work item.
    pub fn push(&self, work: PendingWork) {
        self.inner.push(work);
    }

    /// Enqueue a closed command list.
    pub fn push_command_list(&self, list: ClosedCommandList, tracker: Option<SubmissionCounter>) {
        log::trace!("Queued {:?} (slot {})", list.handle(), list.slot());
        self.push(PendingWork::CommandList { list, tracker });
    }

    /// Pop the oldest item, if any. Never blocks.
    pub fn try_pop(&self) -> Option<PendingWork> {
        self.inner.pop()
    }

    /// Number of queued items (a snapshot).
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Producer handle handed to recorders.
///
/// Pushes lists into the shared queue, tagged with the tracker of the pass
/// stage that is recording them. Clones share the pushed count.
#[derive(Debug, Clone)]
pub struct CommandListSink {
    queue: PendingCommandListQueue,
    tracker: Option<SubmissionCounter>,
    pushed: Arc<AtomicU64>,
}

impl CommandListSink {
    /// A sink whose lists are counted by `tracker` once submitted.
    pub fn new(queue: PendingCommandListQueue, tracker: SubmissionCounter) -> Self {
        Self {
            queue,
            tracker: Some(tracker),
            pushed: Arc::default(),
        }
    }

    /// A sink whose lists are only counted by the executor's global counter.
    pub fn untracked(queue: PendingCommandListQueue) -> Self {
        Self {
            queue,
            tracker: None,
            pushed: Arc::default(),
        }
    }

    /// Hand a closed list to the executor.
    pub fn push(&self, list: ClosedCommandList) {
        self.queue.push_command_list(list, self.tracker.clone());
        self.pushed.fetch_add(1, Ordering::AcqRel);
    }

    /// Lists pushed through this sink and its clones.
    pub fn pushed(&self) -> u64 {
        self.pushed.load(Ordering::Acquire)
    }

    /// The underlying queue.
    pub fn queue(&self) -> &PendingCommandListQueue {
        &self.queue
    }
}

static_assertions::assert_impl_all!(PendingCommandListQueue: Send, Sync);
static_assertions::assert_impl_all!(CommandListSink: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;
    use crate::command::CommandListPerFrame;

    fn closed_list(per_frame: &mut CommandListPerFrame) -> ClosedCommandList {
        per_frame.reset_with_next_slot().unwrap().close().unwrap()
    }

    #[test]
    fn test_empty_pop() {
        let queue = PendingCommandListQueue::new();
        assert!(queue.try_pop().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_single_producer_fifo() {
        let backend = Arc::new(DummyBackend::new());
        let queue = PendingCommandListQueue::new();
        let mut lists: Vec<_> = (0..4)
            .map(|i| CommandListPerFrame::new(backend.clone(), 1, format!("list{i}")).unwrap())
            .collect();

        let expected: Vec<_> = lists.iter().map(|l| l.handle()).collect();
        for list in &mut lists {
            queue.push_command_list(closed_list(list), None);
        }
        assert_eq!(queue.len(), 4);

        let mut popped = Vec::new();
        while let Some(work) = queue.try_pop() {
            match work {
                PendingWork::CommandList { list, .. } => popped.push(list.handle()),
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(popped, expected);
    }

    #[test]
    fn test_sink_tags_tracker() {
        let backend = Arc::new(DummyBackend::new());
        let mut list = CommandListPerFrame::new(backend, 2, "tracked").unwrap();
        let queue = PendingCommandListQueue::new();
        let tracker = SubmissionCounter::new();
        let sink = CommandListSink::new(queue.clone(), tracker.clone());

        sink.clone().push(closed_list(&mut list));
        assert_eq!(sink.pushed(), 1);
        match queue.try_pop() {
            Some(PendingWork::CommandList {
                tracker: Some(t), ..
            }) => {
                t.increment();
                assert_eq!(tracker.count(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
