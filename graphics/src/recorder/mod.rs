//! Command list recorders, one per rendering technique.
//!
//! A recorder is constructed once at load time with everything it needs
//! (geometry, materials, textures, target views). Construction is the
//! one-time initialization: it validates every input handle, allocates one
//! frame-constant slot per queued frame, uploads immutable data and builds
//! descriptor tables. A recorder that exists is therefore always initialized.
//!
//! Each frame, [`CommandListRecorder::record_and_push_command_lists`]:
//!
//! 1. advances to the next frame slot,
//! 2. writes the frame constants into that slot's constant buffer,
//! 3. records the technique's fixed command sequence,
//! 4. closes the list,
//! 5. pushes it to the executor through the [`CommandListSink`].
//!
//! Steps 1, 2, 4 and 5 are shared and live in [`RecorderCore`].
//!
//! | Recorder | Technique |
//! |----------|-----------|
//! | [`GBufferClearRecorder`] | Clears the G-buffer before geometry is drawn |
//! | [`GeometryRecorder`] | G-buffer fill, one [`GeometryTechnique`] per recorder |
//! | [`AmbientOcclusionRecorder`] | Screen space ambient occlusion term |
//! | [`BlurRecorder`] | Blur of the occlusion term |
//! | [`AmbientLightRecorder`] | Ambient composite into the light accumulation target |
//! | [`EnvironmentLightRecorder`] | Image based lighting |
//! | [`SkyBoxRecorder`] | Sky box behind the scene |
//! | [`ToneMappingRecorder`] | HDR to back buffer |

mod ambient;
mod environment;
mod geometry;
mod skybox;
mod tone_mapping;

pub use ambient::{AmbientLightRecorder, AmbientOcclusionRecorder, BlurRecorder};
pub use environment::EnvironmentLightRecorder;
pub use geometry::{GBufferClearRecorder, GeometryRecorder, GeometryTechnique};
pub use skybox::SkyBoxRecorder;
pub use tone_mapping::ToneMappingRecorder;

use crate::backend::{DescriptorResource, PipelineDescriptor};
use crate::command::{CommandListPerFrame, RecordingBuffer, ResourceState};
use crate::context::GraphicsContext;
use crate::error::GraphicsError;
use crate::resources::UploadBuffer;
use crate::scheduler::CommandListSink;
use crate::types::{DescriptorHandle, FrameConstants, Handle, PipelineHandle, TextureHandle};

/// Root parameter holding the per-frame constants.
pub const FRAME_CONSTANTS_SLOT: u32 = 0;
/// Root parameter holding per-object or per-pass constants.
pub const OBJECT_CONSTANTS_SLOT: u32 = 1;
/// Root parameter holding material constants.
pub const MATERIAL_CONSTANTS_SLOT: u32 = 2;
/// Root parameter holding the technique's descriptor table.
pub const DESCRIPTOR_TABLE_SLOT: u32 = 3;

/// Builds and pushes one technique's command lists, once per frame.
///
/// Different recorders may record concurrently; one recorder is only ever
/// driven by one thread at a time (`&mut self`).
pub trait CommandListRecorder: Send {
    /// Debug name, also used for the command list label.
    fn name(&self) -> &str;

    /// Lists pushed by every call to
    /// [`record_and_push_command_lists`](Self::record_and_push_command_lists).
    fn command_lists_per_frame(&self) -> u32 {
        1
    }

    /// Record this frame's work and hand the closed lists to the executor.
    ///
    /// Must be called once per frame, after frame pacing released the slot.
    fn record_and_push_command_lists(
        &mut self,
        constants: &FrameConstants,
        sink: &CommandListSink,
    ) -> Result<(), GraphicsError>;

    /// Whether every required buffer and handle is non-null.
    fn validate_data(&self) -> bool;
}

/// State shared by every recorder: the per-frame command list, the per-slot
/// frame constant buffer and the technique's pipeline.
pub struct RecorderCore {
    command_list: CommandListPerFrame,
    frame_constants: UploadBuffer,
    pipeline: PipelineHandle,
}

impl RecorderCore {
    /// Allocate the command list, the N frame-constant slots and fetch the
    /// pipeline from the registry.
    pub fn new(
        context: &GraphicsContext,
        name: &str,
        pipeline: &PipelineDescriptor,
    ) -> Result<Self, GraphicsError> {
        let slots = context.queued_frame_count();
        let command_list = CommandListPerFrame::new(context.backend().clone(), slots, name)?;
        let frame_constants =
            UploadBuffer::for_type::<FrameConstants>(context.backend().clone(), slots as u32)?;
        let pipeline = context.pipeline(pipeline)?;

        Ok(Self {
            command_list,
            frame_constants,
            pipeline,
        })
    }

    /// Debug name.
    pub fn name(&self) -> &str {
        self.command_list.label()
    }

    pub fn pipeline(&self) -> PipelineHandle {
        self.pipeline
    }

    /// Slot the next frame will record into.
    pub fn next_slot_index(&self) -> usize {
        self.command_list.next_slot_index()
    }

    /// Frames recorded so far.
    pub fn recorded_frames(&self) -> u64 {
        self.command_list.recorded_frames()
    }

    /// Steps 1 and 2: write `constants` into the next slot, reopen the list on
    /// that slot and bind the pipeline and the frame constants.
    pub fn begin_frame(
        &mut self,
        constants: &FrameConstants,
    ) -> Result<RecordingBuffer<'_>, GraphicsError> {
        let slot = self.command_list.next_slot_index() as u32;
        self.frame_constants.write(slot, constants)?;

        let mut recording = self.command_list.reset_with_next_slot()?;
        debug_assert_eq!(recording.slot() as u32, slot);
        recording.set_pipeline(self.pipeline)?;
        recording.set_constant_buffer(
            FRAME_CONSTANTS_SLOT,
            self.frame_constants.handle(),
            self.frame_constants.element_offset(slot),
        )?;
        Ok(recording)
    }

    /// Steps 4 and 5: close the list and push it to the executor.
    pub fn finish(
        recording: RecordingBuffer<'_>,
        sink: &CommandListSink,
    ) -> Result<(), GraphicsError> {
        sink.push(recording.close()?);
        Ok(())
    }

    /// Whether the core's own handles are live.
    pub fn validate_data(&self) -> bool {
        !self.pipeline.is_null()
            && !self.frame_constants.handle().is_null()
            && !self.command_list.handle().is_null()
    }
}

impl std::fmt::Debug for RecorderCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecorderCore")
            .field("command_list", &self.command_list)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

/// Build a descriptor table over `textures`.
pub(crate) fn texture_table(
    context: &GraphicsContext,
    textures: &[TextureHandle],
) -> Result<DescriptorHandle, GraphicsError> {
    let resources: Vec<_> = textures
        .iter()
        .map(|t| DescriptorResource::Texture(*t))
        .collect();
    context.backend().create_descriptor_table(&resources)
}

/// Draw a fullscreen triangle into `target`, sampling `table`.
///
/// The target is transitioned to a render target for the draw and back to a
/// shader resource afterwards, so later stages can sample it.
pub(crate) fn draw_fullscreen(
    recording: &mut RecordingBuffer<'_>,
    target: TextureHandle,
    table: DescriptorHandle,
) -> Result<(), GraphicsError> {
    recording.transition(target, ResourceState::ShaderResource, ResourceState::RenderTarget)?;
    recording.set_render_targets(&[target], None)?;
    recording.set_descriptor_table(DESCRIPTOR_TABLE_SLOT, table)?;
    recording.draw(3, 1)?;
    recording.transition(target, ResourceState::RenderTarget, ResourceState::ShaderResource)
}
