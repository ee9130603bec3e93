//! Sky box.

use super::{CommandListRecorder, DESCRIPTOR_TABLE_SLOT, RecorderCore, texture_table};
use crate::backend::PipelineDescriptor;
use crate::command::ResourceState;
use crate::context::GraphicsContext;
use crate::error::GraphicsError;
use crate::scheduler::CommandListSink;
use crate::types::{
    DescriptorHandle, FrameConstants, GeometryData, Handle, TextureHandle, require,
};

/// Draws the sky box cube map behind the scene, depth tested against the
/// G-buffer depth so it only covers empty pixels.
pub struct SkyBoxRecorder {
    core: RecorderCore,
    mesh: GeometryData,
    output: TextureHandle,
    depth: TextureHandle,
    table: DescriptorHandle,
}

impl SkyBoxRecorder {
    pub fn new(
        context: &GraphicsContext,
        mesh: &GeometryData,
        sky_box: TextureHandle,
        output: TextureHandle,
        depth: TextureHandle,
    ) -> Result<Self, GraphicsError> {
        mesh.validate("sky_box.mesh")?;
        require(sky_box, "sky_box.texture")?;
        require(output, "sky_box.output")?;
        require(depth, "sky_box.depth")?;

        let table = texture_table(context, &[sky_box])?;
        let core = RecorderCore::new(
            context,
            "sky_box",
            &PipelineDescriptor::new("sky_box", 1).with_depth(),
        )?;

        Ok(Self {
            core,
            mesh: mesh.clone(),
            output,
            depth,
            table,
        })
    }
}

impl CommandListRecorder for SkyBoxRecorder {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn record_and_push_command_lists(
        &mut self,
        constants: &FrameConstants,
        sink: &CommandListSink,
    ) -> Result<(), GraphicsError> {
        let (output, depth, table) = (self.output, self.depth, self.table);
        let mesh = &self.mesh;
        let mut recording = self.core.begin_frame(constants)?;

        recording.transition(output, ResourceState::ShaderResource, ResourceState::RenderTarget)?;
        recording.transition(depth, ResourceState::ShaderResource, ResourceState::DepthRead)?;
        recording.set_render_targets(&[output], Some(depth))?;
        recording.set_descriptor_table(DESCRIPTOR_TABLE_SLOT, table)?;
        recording.set_geometry(mesh.vertex_buffer, mesh.index_buffer)?;
        recording.draw_indexed(mesh.index_count, 1)?;
        recording.transition(depth, ResourceState::DepthRead, ResourceState::ShaderResource)?;
        recording.transition(output, ResourceState::RenderTarget, ResourceState::ShaderResource)?;

        RecorderCore::finish(recording, sink)
    }

    fn validate_data(&self) -> bool {
        self.core.validate_data()
            && !self.mesh.vertex_buffer.is_null()
            && !self.mesh.index_buffer.is_null()
            && !self.output.is_null()
            && !self.depth.is_null()
            && !self.table.is_null()
    }
}
