//! Render passes: groups of recorders separated by execution barriers.
//!
//! A [`RenderPass`] is an ordered list of [`PassStage`]s. Recorders inside one
//! stage are independent and record in parallel on the [`WorkerPool`]. A stage
//! does not return until its barrier is satisfied, so a later stage (or pass)
//! never samples output whose commands have not reached the GPU queue yet.
//!
//! ```text
//!             ┌──────── stage ────────┐
//!   Idle ──► Recording ──► AwaitingSubmission ──► Idle ──► next stage
//!             dispatch       wait until the stage's
//!             recorders      lists were submitted
//! ```
//!
//! The barrier strength is an explicit per-stage [`PassOrdering`].

mod builders;

pub use builders::{
    ambient_pass, environment_light_pass, geometry_pass, sky_box_pass, tone_mapping_pass,
};

use crate::error::GraphicsError;
use crate::recorder::CommandListRecorder;
use crate::scheduler::{CommandListExecutor, SubmissionCounter};
use crate::thread_pool::WorkerPool;
use crate::types::FrameConstants;

/// Barrier state of a [`RenderPass`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PassState {
    #[default]
    Idle,
    /// Recorders of the current stage are running.
    Recording,
    /// Waiting for the current stage's lists to be submitted (and, for
    /// [`PassOrdering::GpuCompletion`], executed).
    AwaitingSubmission,
}

/// How strongly a stage is ordered before whatever follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PassOrdering {
    /// Wait until every list of the stage has been handed to the GPU queue.
    ///
    /// Sufficient when later work only needs issue order on the single queue.
    #[default]
    Submission,
    /// Additionally signal the completion counter and wait for the GPU to
    /// finish the stage. Use when the CPU or another queue consumes the
    /// stage's GPU-written output.
    GpuCompletion,
}

/// One barrier-delimited group of independent recorders.
pub struct PassStage {
    name: String,
    ordering: PassOrdering,
    recorders: Vec<Box<dyn CommandListRecorder>>,
    tracker: SubmissionCounter,
}

impl PassStage {
    pub fn new(name: impl Into<String>, ordering: PassOrdering) -> Self {
        Self {
            name: name.into(),
            ordering,
            recorders: Vec::new(),
            tracker: SubmissionCounter::new(),
        }
    }

    /// Add a recorder (builder style).
    pub fn with_recorder(mut self, recorder: impl CommandListRecorder + 'static) -> Self {
        self.push_recorder(Box::new(recorder));
        self
    }

    pub fn push_recorder(&mut self, recorder: Box<dyn CommandListRecorder>) {
        self.recorders.push(recorder);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ordering(&self) -> PassOrdering {
        self.ordering
    }

    pub fn recorders(&self) -> &[Box<dyn CommandListRecorder>] {
        &self.recorders
    }

    pub fn is_empty(&self) -> bool {
        self.recorders.is_empty()
    }

    /// Lists the stage pushes per frame.
    pub fn expected_lists(&self) -> u64 {
        self.recorders
            .iter()
            .map(|r| u64::from(r.command_lists_per_frame()))
            .sum()
    }

    /// Lists of this stage submitted in the current (or last) frame.
    pub fn submitted_lists(&self) -> u64 {
        self.tracker.count()
    }

    /// Run every recorder, in parallel on `pool`.
    ///
    /// The stage tracker is reset before any recorder runs, so every count it
    /// observes afterwards belongs to this dispatch. If a recorder fails, the
    /// lists its siblings already pushed are waited for before returning, so
    /// none of them is counted against the next dispatch.
    fn record(
        &mut self,
        constants: &FrameConstants,
        executor: &CommandListExecutor,
        pool: &WorkerPool,
    ) -> Result<(), GraphicsError> {
        crate::profile_scope!("pass_stage_record");
        self.tracker.reset();
        let sink = executor.sink(self.tracker.clone());

        let mut results: Vec<Result<(), GraphicsError>> = vec![Ok(()); self.recorders.len()];
        if let [recorder] = self.recorders.as_mut_slice() {
            results[0] = recorder.record_and_push_command_lists(constants, &sink);
        } else {
            let jobs: Vec<_> = self.recorders.iter_mut().zip(results.iter_mut()).collect();
            let sink = &sink;
            pool.scope(move |s| {
                for (recorder, result) in jobs {
                    s.spawn(move || {
                        *result = recorder.record_and_push_command_lists(constants, sink);
                    });
                }
            });
        }

        let result: Result<(), GraphicsError> = results.into_iter().collect();
        if let Err(e) = &result {
            let pushed = sink.pushed();
            log::warn!("Stage '{}' failed ({e}), waiting for {pushed} pushed lists", self.name);
            self.tracker.wait_for(pushed);
        }
        result
    }

    /// Block until the stage's barrier is satisfied.
    fn await_submission(&self, executor: &CommandListExecutor) {
        crate::profile_scope!("pass_stage_barrier");
        self.tracker.wait_for(self.expected_lists());

        if self.ordering == PassOrdering::GpuCompletion {
            let value = executor
                .request_fence_signal()
                .wait_completed(executor.completion_counter());
            log::trace!("Stage '{}' completed on GPU at {}", self.name, value);
        }
    }
}

impl std::fmt::Debug for PassStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.recorders.iter().map(|r| r.name()).collect();
        f.debug_struct("PassStage")
            .field("name", &self.name)
            .field("ordering", &self.ordering)
            .field("recorders", &names)
            .finish()
    }
}

/// An ordered list of stages, executed once per frame.
#[derive(Debug)]
pub struct RenderPass {
    name: String,
    stages: Vec<PassStage>,
    state: PassState,
    executed_frames: u64,
}

impl RenderPass {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            state: PassState::Idle,
            executed_frames: 0,
        }
    }

    /// Append a stage (builder style).
    pub fn with_stage(mut self, stage: PassStage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn push_stage(&mut self, stage: PassStage) {
        self.stages.push(stage);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> PassState {
        self.state
    }

    pub fn stages(&self) -> &[PassStage] {
        &self.stages
    }

    /// Total recorders across stages.
    pub fn recorder_count(&self) -> usize {
        self.stages.iter().map(|s| s.recorders.len()).sum()
    }

    /// Total lists pushed per frame across stages.
    pub fn expected_lists(&self) -> u64 {
        self.stages.iter().map(PassStage::expected_lists).sum()
    }

    pub fn executed_frames(&self) -> u64 {
        self.executed_frames
    }

    /// Whether every recorder reports valid data.
    pub fn validate_data(&self) -> bool {
        self.stages
            .iter()
            .flat_map(|s| s.recorders.iter())
            .all(|r| r.validate_data())
    }

    /// Record and submit every stage in order for this frame.
    ///
    /// Returns once the last stage's barrier is satisfied. Stages without
    /// recorders are skipped without waiting.
    pub fn execute(
        &mut self,
        constants: &FrameConstants,
        executor: &CommandListExecutor,
        pool: &WorkerPool,
    ) -> Result<(), GraphicsError> {
        crate::profile_scope!("render_pass");
        assert_eq!(
            self.state,
            PassState::Idle,
            "render pass '{}' executed while {:?}",
            self.name,
            self.state
        );

        for stage in &mut self.stages {
            if stage.is_empty() {
                log::trace!("Pass '{}': stage '{}' is empty", self.name, stage.name);
                continue;
            }

            self.state = PassState::Recording;
            log::debug!("Pass '{}': recording stage '{}'", self.name, stage.name);
            if let Err(e) = stage.record(constants, executor, pool) {
                self.state = PassState::Idle;
                return Err(e);
            }

            self.state = PassState::AwaitingSubmission;
            stage.await_submission(executor);
            self.state = PassState::Idle;
        }

        self.executed_frames += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;
    use crate::scheduler::PendingCommandListQueue;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    /// Records `lists` lists per frame and counts calls.
    struct CountingRecorder {
        per_frame: Vec<crate::command::CommandListPerFrame>,
        calls: Arc<AtomicUsize>,
        fail: Arc<AtomicBool>,
    }

    impl CountingRecorder {
        fn new(backend: &Arc<DummyBackend>, lists: usize, calls: Arc<AtomicUsize>) -> Self {
            let per_frame = (0..lists)
                .map(|i| {
                    crate::command::CommandListPerFrame::new(backend.clone(), 2, format!("c{i}"))
                        .unwrap()
                })
                .collect();
            Self {
                per_frame,
                calls,
                fail: Arc::default(),
            }
        }
    }

    impl CommandListRecorder for CountingRecorder {
        fn name(&self) -> &str {
            "counting"
        }

        fn command_lists_per_frame(&self) -> u32 {
            self.per_frame.len() as u32
        }

        fn record_and_push_command_lists(
            &mut self,
            _constants: &FrameConstants,
            sink: &crate::scheduler::CommandListSink,
        ) -> Result<(), GraphicsError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(GraphicsError::Internal("recorder failed".to_string()));
            }
            for list in &mut self.per_frame {
                let mut recording = list.reset_with_next_slot()?;
                recording.draw(3, 1)?;
                sink.push(recording.close()?);
            }
            Ok(())
        }

        fn validate_data(&self) -> bool {
            true
        }
    }

    fn setup() -> (Arc<DummyBackend>, CommandListExecutor, WorkerPool) {
        let backend = Arc::new(DummyBackend::new());
        let executor =
            CommandListExecutor::spawn(backend.clone(), PendingCommandListQueue::new(), "pass")
                .unwrap();
        (backend, executor, WorkerPool::new(4).unwrap())
    }

    #[test]
    fn test_stages_run_in_order_and_wait() {
        let (backend, executor, pool) = setup();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut pass = RenderPass::new("test")
            .with_stage(
                PassStage::new("first", PassOrdering::Submission)
                    .with_recorder(CountingRecorder::new(&backend, 1, calls.clone()))
                    .with_recorder(CountingRecorder::new(&backend, 2, calls.clone())),
            )
            .with_stage(
                PassStage::new("second", PassOrdering::GpuCompletion)
                    .with_recorder(CountingRecorder::new(&backend, 1, calls.clone())),
            );
        assert_eq!(pass.expected_lists(), 4);
        assert_eq!(pass.recorder_count(), 3);
        assert!(pass.validate_data());

        pass.execute(&FrameConstants::default(), &executor, &WorkerPool::new(2).unwrap()).unwrap();
        pass.execute(&FrameConstants::default(), &executor, &pool).unwrap();

        assert_eq!(pass.state(), PassState::Idle);
        assert_eq!(pass.executed_frames(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 6);
        assert_eq!(pass.stages()[0].submitted_lists(), 3);
        assert_eq!(pass.stages()[1].submitted_lists(), 1);
        assert_eq!(backend.submission_count(), 8);
        // One fence signal per GpuCompletion stage per frame.
        assert_eq!(executor.completion_counter().last_requested(), 2);
    }

    #[test]
    fn test_empty_stage_does_not_wait() {
        let (_backend, executor, pool) = setup();
        let mut pass = RenderPass::new("empty")
            .with_stage(PassStage::new("disabled", PassOrdering::GpuCompletion));
        pass.execute(&FrameConstants::default(), &executor, &pool).unwrap();
        assert_eq!(executor.submitted_count(), 0);
        assert_eq!(executor.completion_counter().last_requested(), 0);
        assert_eq!(pass.expected_lists(), 0);
    }

    #[test]
    fn test_recorder_error_returns_to_idle() {
        let (backend, executor, pool) = setup();
        let calls = Arc::new(AtomicUsize::new(0));
        let failing = CountingRecorder::new(&backend, 1, calls.clone());
        failing.fail.store(true, Ordering::SeqCst);
        let mut pass = RenderPass::new("failing").with_stage(
            PassStage::new("stage", PassOrdering::Submission)
                .with_recorder(failing)
                .with_recorder(CountingRecorder::new(&backend, 1, calls.clone())),
        );

        let result = pass.execute(&FrameConstants::default(), &executor, &pool);
        assert_eq!(
            result,
            Err(GraphicsError::Internal("recorder failed".to_string()))
        );
        assert_eq!(pass.state(), PassState::Idle);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failed_stage_drains_sibling_lists() {
        let (backend, executor, pool) = setup();
        backend.set_submit_delay(Duration::from_millis(50));
        let calls = Arc::new(AtomicUsize::new(0));
        let failing = CountingRecorder::new(&backend, 1, calls.clone());
        let fail = failing.fail.clone();
        fail.store(true, Ordering::SeqCst);
        let mut pass = RenderPass::new("retry").with_stage(
            PassStage::new("stage", PassOrdering::Submission)
                .with_recorder(failing)
                .with_recorder(CountingRecorder::new(&backend, 1, calls.clone())),
        );

        assert!(pass.execute(&FrameConstants::default(), &executor, &pool).is_err());
        // The sibling's list reached the GPU queue before the error surfaced.
        assert_eq!(backend.submission_count(), 1);
        assert_eq!(pass.stages()[0].submitted_lists(), 1);

        fail.store(false, Ordering::SeqCst);
        pass.execute(&FrameConstants::default(), &executor, &pool).unwrap();
        assert_eq!(backend.submission_count(), 3);
        assert_eq!(pass.stages()[0].submitted_lists(), 2);
        assert_eq!(pass.executed_frames(), 1);
    }

    #[test]
    fn test_concurrent_passes_lose_nothing() {
        let (backend, executor, _pool) = setup();
        let executor = Arc::new(executor);

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let backend = backend.clone();
                let executor = executor.clone();
                std::thread::spawn(move || {
                    let pool = WorkerPool::new(2).unwrap();
                    let calls = Arc::new(AtomicUsize::new(0));
                    let mut stage = PassStage::new("stage", PassOrdering::Submission);
                    for _ in 0..3 {
                        stage.push_recorder(Box::new(CountingRecorder::new(
                            &backend,
                            1,
                            calls.clone(),
                        )));
                    }
                    let mut pass = RenderPass::new("concurrent").with_stage(stage);
                    for _ in 0..5 {
                        pass.execute(&FrameConstants::default(), &executor, &pool).unwrap();
                    }
                    pass.stages()[0].submitted_lists()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 3);
        }
        assert_eq!(backend.submission_count(), 2 * 3 * 5);
    }
}
