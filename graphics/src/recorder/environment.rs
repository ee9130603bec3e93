//! Image based environment lighting.

use super::{CommandListRecorder, RecorderCore, draw_fullscreen, texture_table};
use crate::backend::PipelineDescriptor;
use crate::context::GraphicsContext;
use crate::error::GraphicsError;
use crate::scheduler::CommandListSink;
use crate::types::{
    DescriptorHandle, EnvironmentMaps, FrameConstants, GBufferTargets, Handle, TextureHandle,
    require,
};

/// Adds diffuse irradiance and pre-convolved specular lighting to the light
/// accumulation target.
pub struct EnvironmentLightRecorder {
    core: RecorderCore,
    output: TextureHandle,
    table: DescriptorHandle,
}

impl EnvironmentLightRecorder {
    pub fn new(
        context: &GraphicsContext,
        gbuffer: GBufferTargets,
        maps: &EnvironmentMaps,
        output: TextureHandle,
    ) -> Result<Self, GraphicsError> {
        gbuffer.validate()?;
        maps.validate()?;
        require(output, "environment_light.output")?;

        let table = texture_table(
            context,
            &[
                gbuffer.color_metalness,
                gbuffer.normal_smoothness,
                gbuffer.depth,
                maps.diffuse_irradiance,
                maps.specular_pre_convolved,
            ],
        )?;
        let core = RecorderCore::new(
            context,
            "environment_light",
            &PipelineDescriptor::new("environment_light", 1),
        )?;

        Ok(Self {
            core,
            output,
            table,
        })
    }
}

impl CommandListRecorder for EnvironmentLightRecorder {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn record_and_push_command_lists(
        &mut self,
        constants: &FrameConstants,
        sink: &CommandListSink,
    ) -> Result<(), GraphicsError> {
        crate::profile_scope!("environment_light_recorder");
        let (output, table) = (self.output, self.table);
        let mut recording = self.core.begin_frame(constants)?;
        draw_fullscreen(&mut recording, output, table)?;
        RecorderCore::finish(recording, sink)
    }

    fn validate_data(&self) -> bool {
        self.core.validate_data() && !self.output.is_null() && !self.table.is_null()
    }
}
