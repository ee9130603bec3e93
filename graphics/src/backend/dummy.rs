//! Dummy GPU backend for testing and development.
//!
//! This backend doesn't perform actual GPU work but simulates everything the
//! pipeline core depends on:
//!
//! - object lifecycles (a list is either open or closed; recording into a
//!   closed list, submitting an open list or resetting an open list fails),
//! - a single GPU queue with fences whose completion is driven by a
//!   [`GpuSimulation`] mode,
//! - in-flight tracking per command allocator, so resetting an allocator the
//!   simulated GPU is still executing is reported as an error,
//! - an ordered [`BackendEvent`] log for asserting cross-thread orderings.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Sender};
use parking_lot::{Condvar, Mutex, MutexGuard};

use super::{DescriptorResource, GpuBackend, PipelineDescriptor};
use crate::command::GpuCommand;
use crate::error::GraphicsError;
use crate::types::{
    BufferHandle, CommandAllocatorHandle, CommandListHandle, DescriptorHandle, FenceHandle,
    PipelineHandle, TextureHandle,
};

/// How the simulated GPU completes fence values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuSimulation {
    /// Work completes the instant it is submitted; fence signals complete at once.
    #[default]
    Immediate,
    /// Fence values complete only when the caller invokes
    /// [`DummyBackend::complete_fence`] (or one of its helpers).
    Manual,
    /// A simulated GPU thread completes each signalled value after a delay.
    Latency(Duration),
}

/// Observable backend activity, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    AllocatorReset(CommandAllocatorHandle),
    ListReset {
        list: CommandListHandle,
        allocator: CommandAllocatorHandle,
    },
    ListClosed(CommandListHandle),
    Submitted(CommandListHandle),
    Presented,
    /// A signal was enqueued on the GPU queue.
    FenceSignaled {
        fence: FenceHandle,
        value: u64,
    },
    /// The simulated GPU reached a fence value.
    FenceCompleted {
        fence: FenceHandle,
        value: u64,
    },
}

#[derive(Debug)]
struct ListState {
    allocator: CommandAllocatorHandle,
    open: bool,
    commands: Vec<GpuCommand>,
}

#[derive(Debug, Default)]
struct FenceState {
    completed: u64,
    signaled: u64,
    /// Allocators whose submissions complete when the fence reaches the value.
    batches: VecDeque<(u64, Vec<CommandAllocatorHandle>)>,
}

#[derive(Debug, Default)]
struct State {
    /// In-flight submission count per allocator.
    allocators: Vec<u32>,
    lists: Vec<ListState>,
    fences: Vec<FenceState>,
    buffers: Vec<Vec<u8>>,
    textures: Vec<String>,
    pipelines: Vec<PipelineDescriptor>,
    descriptor_tables: Vec<Vec<DescriptorResource>>,
    /// Submissions not yet followed by any fence signal.
    uncovered: Vec<CommandAllocatorHandle>,
    events: Vec<BackendEvent>,
    record_events: bool,
    submissions: u64,
    presents: u64,
}

impl State {
    fn push_event(&mut self, event: BackendEvent) {
        if self.record_events {
            self.events.push(event);
        }
    }

    fn list_mut(&mut self, list: CommandListHandle) -> Result<&mut ListState, GraphicsError> {
        self.lists
            .get_mut(list.index())
            .ok_or_else(|| GraphicsError::InvalidHandle(format!("{list:?}")))
    }

    fn fence_mut(&mut self, fence: FenceHandle) -> Result<&mut FenceState, GraphicsError> {
        self.fences
            .get_mut(fence.index())
            .ok_or_else(|| GraphicsError::InvalidHandle(format!("{fence:?}")))
    }

    fn check_allocator(&self, allocator: CommandAllocatorHandle) -> Result<(), GraphicsError> {
        if allocator.index() < self.allocators.len() {
            Ok(())
        } else {
            Err(GraphicsError::InvalidHandle(format!("{allocator:?}")))
        }
    }

    fn complete(&mut self, fence: FenceHandle, value: u64) {
        let Ok(state) = self.fence_mut(fence) else {
            return;
        };
        if value <= state.completed {
            return;
        }
        state.completed = value;

        let mut finished = Vec::new();
        while let Some((batch_value, _)) = state.batches.front() {
            if *batch_value > value {
                break;
            }
            if let Some((_, allocators)) = state.batches.pop_front() {
                finished.extend(allocators);
            }
        }
        for allocator in finished {
            if let Some(in_flight) = self.allocators.get_mut(allocator.index()) {
                *in_flight = in_flight.saturating_sub(1);
            }
        }

        self.push_event(BackendEvent::FenceCompleted { fence, value });
    }
}

#[derive(Debug)]
struct Shared {
    state: Mutex<State>,
    fence_changed: Condvar,
    simulation: GpuSimulation,
    fail_next_submission: AtomicBool,
    fail_resource_creation: AtomicBool,
    /// Time each `submit` takes, in microseconds.
    submit_delay_us: AtomicU64,
}

impl Shared {
    fn complete(&self, fence: FenceHandle, value: u64) {
        let mut state = self.state.lock();
        state.complete(fence, value);
        drop(state);
        self.fence_changed.notify_all();
    }
}

/// Dummy GPU backend.
#[derive(Debug)]
pub struct DummyBackend {
    shared: Arc<Shared>,
    gpu_sender: Option<Sender<(FenceHandle, u64)>>,
    gpu_thread: Option<JoinHandle<()>>,
}

impl DummyBackend {
    /// Create a backend whose GPU completes work immediately.
    pub fn new() -> Self {
        Self::with_simulation(GpuSimulation::Immediate)
    }

    /// Create a backend with the given completion model.
    pub fn with_simulation(simulation: GpuSimulation) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                record_events: true,
                ..Default::default()
            }),
            fence_changed: Condvar::new(),
            simulation,
            fail_next_submission: AtomicBool::new(false),
            fail_resource_creation: AtomicBool::new(false),
            submit_delay_us: AtomicU64::new(0),
        });

        let (gpu_sender, gpu_thread) = match simulation {
            GpuSimulation::Latency(latency) => {
                let (sender, receiver) = channel::unbounded::<(FenceHandle, u64)>();
                let gpu = Arc::clone(&shared);
                let thread = std::thread::Builder::new()
                    .name("dummy-gpu".into())
                    .spawn(move || {
                        // Exits once the backend drops the sender.
                        for (fence, value) in receiver {
                            std::thread::sleep(latency);
                            gpu.complete(fence, value);
                        }
                    })
                    .ok();
                (Some(sender), thread)
            }
            GpuSimulation::Immediate | GpuSimulation::Manual => (None, None),
        };

        if matches!(simulation, GpuSimulation::Latency(_)) && gpu_thread.is_none() {
            log::warn!("DummyBackend: failed to spawn GPU thread, falling back to immediate");
        }

        log::trace!("DummyBackend: created with {:?}", simulation);

        Self {
            shared,
            gpu_sender,
            gpu_thread,
        }
    }

    /// Disable the event log (long running sessions).
    pub fn without_event_log(self) -> Self {
        self.state().record_events = false;
        self
    }

    /// The completion model.
    pub fn simulation(&self) -> GpuSimulation {
        self.shared.simulation
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.shared.state.lock()
    }

    fn tracks_in_flight(&self) -> bool {
        !matches!(self.shared.simulation, GpuSimulation::Immediate)
    }

    fn check_creation(&self, what: &str) -> Result<(), GraphicsError> {
        if self.shared.fail_resource_creation.load(Ordering::Acquire) {
            Err(GraphicsError::ResourceCreationFailed(format!(
                "injected failure creating {what}"
            )))
        } else {
            Ok(())
        }
    }

    // ------------------------------------------------------------------------
    // Asset-side helpers (not part of the pipeline core's capability set)
    // ------------------------------------------------------------------------

    /// Create a texture, as the asset loader would.
    pub fn create_texture(&self, label: impl Into<String>) -> TextureHandle {
        let mut state = self.state();
        let handle = TextureHandle::new(state.textures.len() as u32);
        state.textures.push(label.into());
        handle
    }

    /// Label of a texture created with [`create_texture`](Self::create_texture).
    pub fn texture_label(&self, texture: TextureHandle) -> Option<String> {
        self.state().textures.get(texture.index()).cloned()
    }

    // ------------------------------------------------------------------------
    // Simulated GPU control
    // ------------------------------------------------------------------------

    /// Complete a fence value, as the GPU would after executing the work.
    ///
    /// # Panics
    ///
    /// Panics if `value` was never signalled on the queue.
    pub fn complete_fence(&self, fence: FenceHandle, value: u64) {
        {
            let state = self.state();
            let signaled = state.fences.get(fence.index()).map_or(0, |f| f.signaled);
            assert!(
                value <= signaled,
                "cannot complete {fence:?} to {value}: only {signaled} was signalled"
            );
        }
        self.shared.complete(fence, value);
    }

    /// Complete every value signalled so far on every fence.
    pub fn complete_all(&self) {
        let mut state = self.state();
        for index in 0..state.fences.len() {
            let signaled = state.fences[index].signaled;
            state.complete(FenceHandle::new(index as u32), signaled);
        }
        drop(state);
        self.shared.fence_changed.notify_all();
    }

    /// Signalled but not yet completed fence values, oldest first.
    pub fn pending_signals(&self) -> Vec<(FenceHandle, u64)> {
        let state = self.state();
        state
            .fences
            .iter()
            .enumerate()
            .flat_map(|(index, fence)| {
                fence
                    .batches
                    .iter()
                    .filter(move |(value, _)| *value > fence.completed)
                    .map(move |(value, _)| (FenceHandle::new(index as u32), *value))
            })
            .collect()
    }

    /// Block until some fence value is signalled but not completed.
    ///
    /// Returns the oldest such value, or `None` if `timeout` elapses first.
    pub fn wait_pending_signal(&self, timeout: Duration) -> Option<(FenceHandle, u64)> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state();
        loop {
            let pending = state.fences.iter().enumerate().find_map(|(index, fence)| {
                fence
                    .batches
                    .iter()
                    .map(|(value, _)| *value)
                    .find(|value| *value > fence.completed)
                    .map(|value| (FenceHandle::new(index as u32), value))
            });
            if pending.is_some() {
                return pending;
            }
            if self
                .shared
                .fence_changed
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return None;
            }
        }
    }

    /// Make the next [`submit`](GpuBackend::submit) fail.
    pub fn fail_next_submission(&self) {
        self.shared.fail_next_submission.store(true, Ordering::Release);
    }

    /// Make every [`submit`](GpuBackend::submit) block for `delay` first, like
    /// a driver that is slow to accept work.
    pub fn set_submit_delay(&self, delay: Duration) {
        let micros = u64::try_from(delay.as_micros()).unwrap_or(u64::MAX);
        self.shared.submit_delay_us.store(micros, Ordering::Release);
    }

    /// Make every resource creation fail while `fail` is set.
    pub fn fail_resource_creation(&self, fail: bool) {
        self.shared
            .fail_resource_creation
            .store(fail, Ordering::Release);
    }

    // ------------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------------

    /// Snapshot of the event log.
    pub fn events(&self) -> Vec<BackendEvent> {
        self.state().events.clone()
    }

    /// Clear the event log.
    pub fn clear_events(&self) {
        self.state().events.clear();
    }

    /// Lists in submission order.
    pub fn submitted_lists(&self) -> Vec<CommandListHandle> {
        self.state()
            .events
            .iter()
            .filter_map(|event| match event {
                BackendEvent::Submitted(list) => Some(*list),
                _ => None,
            })
            .collect()
    }

    /// Total successful submissions.
    pub fn submission_count(&self) -> u64 {
        self.state().submissions
    }

    /// Total presents.
    pub fn present_count(&self) -> u64 {
        self.state().presents
    }

    /// Commands currently recorded in a list.
    pub fn commands(&self, list: CommandListHandle) -> Vec<GpuCommand> {
        self.state()
            .lists
            .get(list.index())
            .map(|l| l.commands.clone())
            .unwrap_or_default()
    }

    /// Number of commands currently recorded in a list.
    pub fn command_count(&self, list: CommandListHandle) -> usize {
        self.state()
            .lists
            .get(list.index())
            .map_or(0, |l| l.commands.len())
    }

    /// Whether a list is open for recording.
    pub fn is_list_open(&self, list: CommandListHandle) -> bool {
        self.state()
            .lists
            .get(list.index())
            .is_some_and(|l| l.open)
    }

    /// Contents of an upload buffer.
    pub fn buffer_contents(&self, buffer: BufferHandle) -> Vec<u8> {
        self.state()
            .buffers
            .get(buffer.index())
            .cloned()
            .unwrap_or_default()
    }

    /// Number of pipeline objects created.
    pub fn pipeline_count(&self) -> usize {
        self.state().pipelines.len()
    }

    /// Number of command allocators created.
    pub fn allocator_count(&self) -> usize {
        self.state().allocators.len()
    }

    /// Resources referenced by a descriptor table.
    pub fn descriptor_table(&self, table: DescriptorHandle) -> Option<Vec<DescriptorResource>> {
        self.state().descriptor_tables.get(table.index()).cloned()
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DummyBackend {
    fn drop(&mut self) {
        self.gpu_sender.take();
        if let Some(thread) = self.gpu_thread.take() {
            if thread.join().is_err() {
                log::error!("DummyBackend: GPU thread panicked");
            }
        }
    }
}

impl GpuBackend for DummyBackend {
    fn name(&self) -> &'static str {
        "Dummy"
    }

    fn create_command_allocator(&self) -> Result<CommandAllocatorHandle, GraphicsError> {
        self.check_creation("command allocator")?;
        let mut state = self.state();
        let handle = CommandAllocatorHandle::new(state.allocators.len() as u32);
        state.allocators.push(0);
        log::trace!("DummyBackend: created {:?}", handle);
        Ok(handle)
    }

    fn reset_command_allocator(
        &self,
        allocator: CommandAllocatorHandle,
    ) -> Result<(), GraphicsError> {
        let mut state = self.state();
        state.check_allocator(allocator)?;
        if state.allocators[allocator.index()] > 0 {
            return Err(GraphicsError::Internal(format!(
                "{allocator:?} reset while the GPU is still executing its commands"
            )));
        }
        if state
            .lists
            .iter()
            .any(|list| list.open && list.allocator == allocator)
        {
            return Err(GraphicsError::Internal(format!(
                "{allocator:?} reset while a list is recording into it"
            )));
        }
        state.push_event(BackendEvent::AllocatorReset(allocator));
        Ok(())
    }

    fn create_command_list(
        &self,
        allocator: CommandAllocatorHandle,
    ) -> Result<CommandListHandle, GraphicsError> {
        self.check_creation("command list")?;
        let mut state = self.state();
        state.check_allocator(allocator)?;
        let handle = CommandListHandle::new(state.lists.len() as u32);
        state.lists.push(ListState {
            allocator,
            open: false,
            commands: Vec::new(),
        });
        log::trace!("DummyBackend: created {:?}", handle);
        Ok(handle)
    }

    fn reset_command_list(
        &self,
        list: CommandListHandle,
        allocator: CommandAllocatorHandle,
    ) -> Result<(), GraphicsError> {
        let mut state = self.state();
        state.check_allocator(allocator)?;
        let list_state = state.list_mut(list)?;
        if list_state.open {
            return Err(GraphicsError::Internal(format!(
                "{list:?} reset while still open"
            )));
        }
        list_state.open = true;
        list_state.allocator = allocator;
        list_state.commands.clear();
        state.push_event(BackendEvent::ListReset { list, allocator });
        Ok(())
    }

    fn record_command(
        &self,
        list: CommandListHandle,
        command: &GpuCommand,
    ) -> Result<(), GraphicsError> {
        let mut state = self.state();
        let list_state = state.list_mut(list)?;
        if !list_state.open {
            return Err(GraphicsError::Internal(format!(
                "recording into closed {list:?}"
            )));
        }
        list_state.commands.push(command.clone());
        Ok(())
    }

    fn close_command_list(&self, list: CommandListHandle) -> Result<(), GraphicsError> {
        let mut state = self.state();
        let list_state = state.list_mut(list)?;
        if !list_state.open {
            return Err(GraphicsError::Internal(format!("{list:?} closed twice")));
        }
        list_state.open = false;
        state.push_event(BackendEvent::ListClosed(list));
        Ok(())
    }

    fn submit(&self, list: CommandListHandle) -> Result<(), GraphicsError> {
        if self.shared.fail_next_submission.swap(false, Ordering::AcqRel) {
            return Err(GraphicsError::SubmissionFailed(format!(
                "injected failure submitting {list:?}"
            )));
        }
        let delay = self.shared.submit_delay_us.load(Ordering::Acquire);
        if delay > 0 {
            std::thread::sleep(Duration::from_micros(delay));
        }

        let tracks_in_flight = self.tracks_in_flight();
        let mut state = self.state();
        let list_state = state.list_mut(list)?;
        if list_state.open {
            return Err(GraphicsError::SubmissionFailed(format!(
                "{list:?} submitted while open"
            )));
        }
        let allocator = list_state.allocator;
        if tracks_in_flight {
            state.allocators[allocator.index()] += 1;
            state.uncovered.push(allocator);
        }
        state.submissions += 1;
        state.push_event(BackendEvent::Submitted(list));
        log::trace!("DummyBackend: submitted {:?}", list);
        Ok(())
    }

    fn present(&self) -> Result<(), GraphicsError> {
        let mut state = self.state();
        state.presents += 1;
        state.push_event(BackendEvent::Presented);
        Ok(())
    }

    fn create_fence(&self, initial_value: u64) -> Result<FenceHandle, GraphicsError> {
        self.check_creation("fence")?;
        let mut state = self.state();
        let handle = FenceHandle::new(state.fences.len() as u32);
        state.fences.push(FenceState {
            completed: initial_value,
            signaled: initial_value,
            batches: VecDeque::new(),
        });
        log::trace!("DummyBackend: created {:?} at {}", handle, initial_value);
        Ok(handle)
    }

    fn signal_fence(&self, fence: FenceHandle, value: u64) -> Result<(), GraphicsError> {
        let completes_now = match self.shared.simulation {
            GpuSimulation::Immediate => true,
            GpuSimulation::Manual => false,
            GpuSimulation::Latency(_) => self.gpu_thread.is_none(),
        };

        {
            let mut state = self.state();
            let signaled = state.fence_mut(fence)?.signaled;
            if value <= signaled {
                return Err(GraphicsError::InvalidParameter(format!(
                    "{fence:?} signal value {value} is not above {signaled}"
                )));
            }
            let covered = std::mem::take(&mut state.uncovered);
            let fence_state = state.fence_mut(fence)?;
            fence_state.signaled = value;
            fence_state.batches.push_back((value, covered));
            state.push_event(BackendEvent::FenceSignaled { fence, value });

            if completes_now {
                state.complete(fence, value);
            }
        }
        self.shared.fence_changed.notify_all();

        if !completes_now {
            if let Some(sender) = &self.gpu_sender {
                sender
                    .send((fence, value))
                    .map_err(|_| GraphicsError::DeviceLost)?;
            }
        }
        Ok(())
    }

    fn completed_fence_value(&self, fence: FenceHandle) -> u64 {
        self.state()
            .fences
            .get(fence.index())
            .map_or(0, |f| f.completed)
    }

    fn wait_fence(&self, fence: FenceHandle, value: u64) {
        let mut state = self.state();
        loop {
            let Some(fence_state) = state.fences.get(fence.index()) else {
                log::error!("DummyBackend: wait on unknown {:?}", fence);
                return;
            };
            if fence_state.completed >= value {
                return;
            }
            self.shared.fence_changed.wait(&mut state);
        }
    }

    fn create_upload_buffer(
        &self,
        element_size: u64,
        element_count: u32,
    ) -> Result<BufferHandle, GraphicsError> {
        self.check_creation("upload buffer")?;
        if element_size == 0 || element_count == 0 {
            return Err(GraphicsError::InvalidParameter(
                "upload buffer cannot be empty".to_string(),
            ));
        }
        let mut state = self.state();
        let handle = BufferHandle::new(state.buffers.len() as u32);
        state
            .buffers
            .push(vec![0; (element_size * u64::from(element_count)) as usize]);
        log::trace!(
            "DummyBackend: created upload buffer {:?} ({} x {} bytes)",
            handle,
            element_count,
            element_size
        );
        Ok(handle)
    }

    fn write_upload_buffer(
        &self,
        buffer: BufferHandle,
        offset: u64,
        data: &[u8],
    ) -> Result<(), GraphicsError> {
        let mut state = self.state();
        let contents = state
            .buffers
            .get_mut(buffer.index())
            .ok_or_else(|| GraphicsError::InvalidHandle(format!("{buffer:?}")))?;
        let start = offset as usize;
        let end = start + data.len();
        if end > contents.len() {
            return Err(GraphicsError::InvalidParameter(format!(
                "write of {} bytes at {} overflows {:?} ({} bytes)",
                data.len(),
                offset,
                buffer,
                contents.len()
            )));
        }
        contents[start..end].copy_from_slice(data);
        Ok(())
    }

    fn create_pipeline(
        &self,
        descriptor: &PipelineDescriptor,
    ) -> Result<PipelineHandle, GraphicsError> {
        self.check_creation("pipeline")?;
        let mut state = self.state();
        let handle = PipelineHandle::new(state.pipelines.len() as u32);
        state.pipelines.push(descriptor.clone());
        log::trace!("DummyBackend: created pipeline '{}'", descriptor.label);
        Ok(handle)
    }

    fn create_descriptor_table(
        &self,
        resources: &[DescriptorResource],
    ) -> Result<DescriptorHandle, GraphicsError> {
        self.check_creation("descriptor table")?;
        let mut state = self.state();
        for resource in resources {
            let valid = match *resource {
                DescriptorResource::Texture(texture) => texture.index() < state.textures.len(),
                DescriptorResource::Buffer(buffer) => buffer.index() < state.buffers.len(),
            };
            if !valid {
                return Err(GraphicsError::InvalidHandle(format!("{resource:?}")));
            }
        }
        let handle = DescriptorHandle::new(state.descriptor_tables.len() as u32);
        state.descriptor_tables.push(resources.to_vec());
        Ok(handle)
    }
}

static_assertions::assert_impl_all!(DummyBackend: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;

    fn open_list(backend: &DummyBackend) -> (CommandAllocatorHandle, CommandListHandle) {
        let allocator = backend.create_command_allocator().unwrap();
        let list = backend.create_command_list(allocator).unwrap();
        backend.reset_command_list(list, allocator).unwrap();
        (allocator, list)
    }

    #[test]
    fn test_dummy_backend_name() {
        assert_eq!(DummyBackend::new().name(), "Dummy");
    }

    #[test]
    fn test_list_lifecycle() {
        let backend = DummyBackend::new();
        let (allocator, list) = open_list(&backend);
        assert!(backend.is_list_open(list));

        backend
            .record_command(list, &GpuCommand::Draw {
                vertex_count: 3,
                instance_count: 1,
            })
            .unwrap();
        backend.close_command_list(list).unwrap();
        backend.submit(list).unwrap();

        assert_eq!(backend.submission_count(), 1);
        assert_eq!(
            backend.events(),
            vec![
                BackendEvent::ListReset { list, allocator },
                BackendEvent::ListClosed(list),
                BackendEvent::Submitted(list),
            ]
        );
    }

    #[test]
    fn test_lifecycle_violations() {
        let backend = DummyBackend::new();
        let (allocator, list) = open_list(&backend);

        // Open list cannot be submitted, reset, or have its allocator reset.
        assert!(backend.submit(list).is_err());
        assert!(backend.reset_command_list(list, allocator).is_err());
        assert!(backend.reset_command_allocator(allocator).is_err());

        backend.close_command_list(list).unwrap();
        let draw = GpuCommand::Draw {
            vertex_count: 3,
            instance_count: 1,
        };
        assert!(backend.record_command(list, &draw).is_err());
        assert!(backend.close_command_list(list).is_err());
    }

    #[test]
    fn test_immediate_fence() {
        let backend = DummyBackend::new();
        let fence = backend.create_fence(0).unwrap();
        backend.signal_fence(fence, 1).unwrap();
        assert_eq!(backend.completed_fence_value(fence), 1);
        backend.wait_fence(fence, 1);
    }

    #[test]
    fn test_signal_values_must_increase() {
        let backend = DummyBackend::new();
        let fence = backend.create_fence(0).unwrap();
        backend.signal_fence(fence, 2).unwrap();
        assert!(matches!(
            backend.signal_fence(fence, 2),
            Err(GraphicsError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_manual_fence_tracks_in_flight_allocators() {
        let backend = DummyBackend::with_simulation(GpuSimulation::Manual);
        let fence = backend.create_fence(0).unwrap();
        let (allocator, list) = open_list(&backend);
        backend.close_command_list(list).unwrap();
        backend.submit(list).unwrap();
        backend.signal_fence(fence, 1).unwrap();

        assert_eq!(backend.completed_fence_value(fence), 0);
        assert_eq!(backend.pending_signals(), vec![(fence, 1)]);
        assert!(backend.reset_command_allocator(allocator).is_err());

        backend.complete_fence(fence, 1);
        assert!(backend.pending_signals().is_empty());
        backend.reset_command_allocator(allocator).unwrap();
    }

    #[test]
    fn test_manual_wait_unblocks_from_other_thread() {
        let backend = Arc::new(DummyBackend::with_simulation(GpuSimulation::Manual));
        let fence = backend.create_fence(0).unwrap();
        backend.signal_fence(fence, 1).unwrap();

        let gpu = Arc::clone(&backend);
        let handle = std::thread::spawn(move || {
            let (fence, value) = gpu.wait_pending_signal(Duration::from_secs(5)).unwrap();
            gpu.complete_fence(fence, value);
        });

        backend.wait_fence(fence, 1);
        handle.join().unwrap();
        assert_eq!(backend.completed_fence_value(fence), 1);
    }

    #[test]
    fn test_latency_simulation_completes() {
        let backend = DummyBackend::with_simulation(GpuSimulation::Latency(
            Duration::from_millis(2),
        ));
        let fence = backend.create_fence(0).unwrap();
        backend.signal_fence(fence, 1).unwrap();
        backend.signal_fence(fence, 2).unwrap();
        backend.wait_fence(fence, 2);
        assert_eq!(backend.completed_fence_value(fence), 2);
    }

    #[test]
    #[should_panic(expected = "only 0 was signalled")]
    fn test_complete_unsignalled_panics() {
        let backend = DummyBackend::with_simulation(GpuSimulation::Manual);
        let fence = backend.create_fence(0).unwrap();
        backend.complete_fence(fence, 1);
    }

    #[test]
    fn test_upload_buffer_bounds() {
        let backend = DummyBackend::new();
        let buffer = backend.create_upload_buffer(16, 2).unwrap();
        backend.write_upload_buffer(buffer, 16, &[7; 16]).unwrap();
        assert!(backend.write_upload_buffer(buffer, 17, &[7; 16]).is_err());
        assert_eq!(&backend.buffer_contents(buffer)[16..], &[7; 16]);
    }

    #[test]
    fn test_injected_failures() {
        let backend = DummyBackend::new();
        backend.fail_resource_creation(true);
        assert!(matches!(
            backend.create_command_allocator(),
            Err(GraphicsError::ResourceCreationFailed(_))
        ));
        backend.fail_resource_creation(false);

        let (_, list) = open_list(&backend);
        backend.close_command_list(list).unwrap();
        backend.fail_next_submission();
        assert!(backend.submit(list).is_err());
        assert!(backend.submit(list).is_ok());
    }

    #[test]
    fn test_descriptor_table_validates_resources() {
        let backend = DummyBackend::new();
        let texture = backend.create_texture("albedo");
        let table = backend
            .create_descriptor_table(&[DescriptorResource::Texture(texture)])
            .unwrap();
        assert_eq!(
            backend.descriptor_table(table),
            Some(vec![DescriptorResource::Texture(texture)])
        );
        assert!(
            backend
                .create_descriptor_table(&[DescriptorResource::Texture(TextureHandle::new(9))])
                .is_err()
        );
    }
}
