//! Final composite of the HDR light accumulation into the back buffer.

use super::{CommandListRecorder, DESCRIPTOR_TABLE_SLOT, RecorderCore, texture_table};
use crate::backend::PipelineDescriptor;
use crate::command::ResourceState;
use crate::context::GraphicsContext;
use crate::error::GraphicsError;
use crate::scheduler::CommandListSink;
use crate::types::{DescriptorHandle, FrameConstants, Handle, TextureHandle, require};

/// Tone maps the light accumulation target into the presentable back buffer.
pub struct ToneMappingRecorder {
    core: RecorderCore,
    back_buffer: TextureHandle,
    table: DescriptorHandle,
}

impl ToneMappingRecorder {
    pub fn new(
        context: &GraphicsContext,
        source: TextureHandle,
        back_buffer: TextureHandle,
    ) -> Result<Self, GraphicsError> {
        require(source, "tone_mapping.source")?;
        require(back_buffer, "tone_mapping.back_buffer")?;

        let table = texture_table(context, &[source])?;
        let core = RecorderCore::new(
            context,
            "tone_mapping",
            &PipelineDescriptor::new("tone_mapping", 1),
        )?;
        Ok(Self {
            core,
            back_buffer,
            table,
        })
    }
}

impl CommandListRecorder for ToneMappingRecorder {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn record_and_push_command_lists(
        &mut self,
        constants: &FrameConstants,
        sink: &CommandListSink,
    ) -> Result<(), GraphicsError> {
        let (back_buffer, table) = (self.back_buffer, self.table);
        let mut recording = self.core.begin_frame(constants)?;
        recording.transition(back_buffer, ResourceState::Present, ResourceState::RenderTarget)?;
        recording.set_render_targets(&[back_buffer], None)?;
        recording.set_descriptor_table(DESCRIPTOR_TABLE_SLOT, table)?;
        recording.draw(3, 1)?;
        recording.transition(back_buffer, ResourceState::RenderTarget, ResourceState::Present)?;
        RecorderCore::finish(recording, sink)
    }

    fn validate_data(&self) -> bool {
        self.core.validate_data() && !self.back_buffer.is_null() && !self.table.is_null()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::GpuCommand;
    use crate::recorder::test_support::*;

    #[test]
    fn test_back_buffer_returns_to_present() {
        let (backend, context) = context(2);
        let back_buffer = texture(&backend, "back_buffer");
        let mut recorder =
            ToneMappingRecorder::new(&context, texture(&backend, "lighting"), back_buffer).unwrap();
        assert!(recorder.validate_data());

        let (queue, sink) = sink();
        recorder
            .record_and_push_command_lists(&FrameConstants::default(), &sink)
            .unwrap();
        assert_eq!(drain(&queue).len(), 1);

        let commands = backend.commands(recorder.core.command_list.handle());
        assert_eq!(
            commands.last(),
            Some(&GpuCommand::Transition {
                resource: back_buffer,
                before: ResourceState::RenderTarget,
                after: ResourceState::Present,
            })
        );
    }
}
