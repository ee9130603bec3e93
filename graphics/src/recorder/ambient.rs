//! Ambient occlusion, its blur, and the ambient light composite.

use super::{
    CommandListRecorder, OBJECT_CONSTANTS_SLOT, RecorderCore, draw_fullscreen, texture_table,
};
use crate::backend::PipelineDescriptor;
use crate::context::GraphicsContext;
use crate::error::GraphicsError;
use crate::resources::UploadBuffer;
use crate::scheduler::CommandListSink;
use crate::types::{
    AmbientOcclusionConstants, DescriptorHandle, FrameConstants, GBufferTargets, Handle,
    TextureHandle, require,
};

/// Computes the screen space ambient occlusion term from the G-buffer.
pub struct AmbientOcclusionRecorder {
    core: RecorderCore,
    target: TextureHandle,
    table: DescriptorHandle,
    parameters: UploadBuffer,
}

impl AmbientOcclusionRecorder {
    pub fn new(
        context: &GraphicsContext,
        gbuffer: GBufferTargets,
        target: TextureHandle,
        noise: TextureHandle,
        parameters: AmbientOcclusionConstants,
    ) -> Result<Self, GraphicsError> {
        gbuffer.validate()?;
        require(target, "ambient_occlusion.target")?;
        require(noise, "ambient_occlusion.noise")?;
        if parameters.sample_count == 0 {
            return Err(GraphicsError::InvalidParameter(
                "ambient_occlusion.sample_count must be non-zero".to_string(),
            ));
        }

        let buffer =
            UploadBuffer::for_type::<AmbientOcclusionConstants>(context.backend().clone(), 1)?;
        buffer.write(0, &parameters)?;
        let table = texture_table(context, &[gbuffer.normal_smoothness, gbuffer.depth, noise])?;
        let core = RecorderCore::new(
            context,
            "ambient_occlusion",
            &PipelineDescriptor::new("ambient_occlusion", 1),
        )?;

        Ok(Self {
            core,
            target,
            table,
            parameters: buffer,
        })
    }
}

impl CommandListRecorder for AmbientOcclusionRecorder {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn record_and_push_command_lists(
        &mut self,
        constants: &FrameConstants,
        sink: &CommandListSink,
    ) -> Result<(), GraphicsError> {
        crate::profile_scope!("ambient_occlusion_recorder");
        let (target, table) = (self.target, self.table);
        let mut recording = self.core.begin_frame(constants)?;
        recording.set_constant_buffer(OBJECT_CONSTANTS_SLOT, self.parameters.handle(), 0)?;
        draw_fullscreen(&mut recording, target, table)?;
        RecorderCore::finish(recording, sink)
    }

    fn validate_data(&self) -> bool {
        self.core.validate_data()
            && !self.target.is_null()
            && !self.table.is_null()
            && !self.parameters.handle().is_null()
    }
}

/// Blurs the raw occlusion term into its own target.
pub struct BlurRecorder {
    core: RecorderCore,
    target: TextureHandle,
    table: DescriptorHandle,
}

impl BlurRecorder {
    pub fn new(
        context: &GraphicsContext,
        source: TextureHandle,
        target: TextureHandle,
    ) -> Result<Self, GraphicsError> {
        require(source, "blur.source")?;
        require(target, "blur.target")?;
        if source == target {
            return Err(GraphicsError::InvalidParameter(
                "blur cannot sample its own target".to_string(),
            ));
        }

        let table = texture_table(context, &[source])?;
        let core = RecorderCore::new(context, "blur", &PipelineDescriptor::new("blur", 1))?;
        Ok(Self {
            core,
            target,
            table,
        })
    }
}

impl CommandListRecorder for BlurRecorder {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn record_and_push_command_lists(
        &mut self,
        constants: &FrameConstants,
        sink: &CommandListSink,
    ) -> Result<(), GraphicsError> {
        let (target, table) = (self.target, self.table);
        let mut recording = self.core.begin_frame(constants)?;
        draw_fullscreen(&mut recording, target, table)?;
        RecorderCore::finish(recording, sink)
    }

    fn validate_data(&self) -> bool {
        self.core.validate_data() && !self.target.is_null() && !self.table.is_null()
    }
}

/// Writes the ambient term into the light accumulation target, modulated by
/// the blurred occlusion when ambient occlusion is enabled.
pub struct AmbientLightRecorder {
    core: RecorderCore,
    output: TextureHandle,
    table: DescriptorHandle,
    occluded: bool,
}

impl AmbientLightRecorder {
    pub fn new(
        context: &GraphicsContext,
        gbuffer: GBufferTargets,
        occlusion: Option<TextureHandle>,
        output: TextureHandle,
    ) -> Result<Self, GraphicsError> {
        gbuffer.validate()?;
        require(output, "ambient_light.output")?;

        let mut inputs = vec![
            gbuffer.color_metalness,
            gbuffer.normal_smoothness,
            gbuffer.depth,
        ];
        if let Some(occlusion) = occlusion {
            inputs.push(require(occlusion, "ambient_light.occlusion")?);
        }

        let label = if occlusion.is_some() {
            "ambient_light_occluded"
        } else {
            "ambient_light"
        };
        let table = texture_table(context, &inputs)?;
        let core = RecorderCore::new(context, label, &PipelineDescriptor::new(label, 1))?;

        Ok(Self {
            core,
            output,
            table,
            occluded: occlusion.is_some(),
        })
    }

    /// Whether the occlusion term is sampled.
    pub fn is_occluded(&self) -> bool {
        self.occluded
    }
}

impl CommandListRecorder for AmbientLightRecorder {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn record_and_push_command_lists(
        &mut self,
        constants: &FrameConstants,
        sink: &CommandListSink,
    ) -> Result<(), GraphicsError> {
        let (output, table) = (self.output, self.table);
        let mut recording = self.core.begin_frame(constants)?;
        draw_fullscreen(&mut recording, output, table)?;
        RecorderCore::finish(recording, sink)
    }

    fn validate_data(&self) -> bool {
        self.core.validate_data() && !self.output.is_null() && !self.table.is_null()
    }
}
