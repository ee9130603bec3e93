//! Command list recording.
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`FrameSlotAllocator`] | N command allocators used in round robin |
//! | [`CommandListPerFrame`] | One reusable command list rotated over those slots |
//! | [`RecordingBuffer`] | An open command list for the current slot |
//! | [`ClosedCommandList`] | A finished list, ready to be queued exactly once |
//!
//! A [`RecordingBuffer`] borrows its [`CommandListPerFrame`] mutably, so the
//! list cannot be reset again while it is still recording. Closing consumes
//! the buffer and yields a move-only [`ClosedCommandList`]; pushing that into
//! the pending queue moves it again, which is what makes "enqueued exactly
//! once, after close" hold by construction.

mod allocator;
mod per_frame;

pub use allocator::{FrameSlot, FrameSlotAllocator};
pub use per_frame::CommandListPerFrame;

use crate::backend::GpuBackend;
use crate::error::GraphicsError;
use crate::types::{
    BufferHandle, CommandListHandle, DescriptorHandle, PipelineHandle, TextureHandle,
};

/// Usage state of a texture for transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
    RenderTarget,
    ShaderResource,
    DepthWrite,
    DepthRead,
    Present,
}

/// A single recorded GPU command.
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCommand {
    SetPipeline(PipelineHandle),
    SetDescriptorTable {
        slot: u32,
        table: DescriptorHandle,
    },
    SetConstantBuffer {
        slot: u32,
        buffer: BufferHandle,
        offset: u64,
    },
    SetVertexBuffer(BufferHandle),
    SetIndexBuffer(BufferHandle),
    SetRenderTargets {
        color: Vec<TextureHandle>,
        depth: Option<TextureHandle>,
    },
    ClearRenderTarget {
        target: TextureHandle,
        color: [f32; 4],
    },
    ClearDepth {
        target: TextureHandle,
        depth: f32,
    },
    Transition {
        resource: TextureHandle,
        before: ResourceState,
        after: ResourceState,
    },
    Draw {
        vertex_count: u32,
        instance_count: u32,
    },
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        base_vertex: i32,
    },
}

/// An open command list recording into the current frame slot.
///
/// Created by [`CommandListPerFrame::reset_with_next_slot`]. Dropping a
/// buffer without calling [`close`](Self::close) closes the list and discards
/// it, so the next reset of the same stream still succeeds.
pub struct RecordingBuffer<'a> {
    backend: &'a dyn GpuBackend,
    list: CommandListHandle,
    slot: usize,
    label: &'a str,
    command_count: u32,
    closed: bool,
}

impl<'a> RecordingBuffer<'a> {
    pub(crate) fn new(
        backend: &'a dyn GpuBackend,
        list: CommandListHandle,
        slot: usize,
        label: &'a str,
    ) -> Self {
        Self {
            backend,
            list,
            slot,
            label,
            command_count: 0,
            closed: false,
        }
    }

    /// Frame slot this recording belongs to.
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Backend handle of the underlying list.
    pub fn handle(&self) -> CommandListHandle {
        self.list
    }

    /// Number of commands recorded so far.
    pub fn command_count(&self) -> u32 {
        self.command_count
    }

    /// Append a raw command.
    pub fn record(&mut self, command: GpuCommand) -> Result<(), GraphicsError> {
        self.backend.record_command(self.list, &command)?;
        self.command_count += 1;
        Ok(())
    }

    pub fn set_pipeline(&mut self, pipeline: PipelineHandle) -> Result<(), GraphicsError> {
        self.record(GpuCommand::SetPipeline(pipeline))
    }

    pub fn set_descriptor_table(
        &mut self,
        slot: u32,
        table: DescriptorHandle,
    ) -> Result<(), GraphicsError> {
        self.record(GpuCommand::SetDescriptorTable { slot, table })
    }

    pub fn set_constant_buffer(
        &mut self,
        slot: u32,
        buffer: BufferHandle,
        offset: u64,
    ) -> Result<(), GraphicsError> {
        self.record(GpuCommand::SetConstantBuffer {
            slot,
            buffer,
            offset,
        })
    }

    /// Bind a vertex and an index buffer.
    pub fn set_geometry(
        &mut self,
        vertex_buffer: BufferHandle,
        index_buffer: BufferHandle,
    ) -> Result<(), GraphicsError> {
        self.record(GpuCommand::SetVertexBuffer(vertex_buffer))?;
        self.record(GpuCommand::SetIndexBuffer(index_buffer))
    }

    pub fn set_render_targets(
        &mut self,
        color: &[TextureHandle],
        depth: Option<TextureHandle>,
    ) -> Result<(), GraphicsError> {
        self.record(GpuCommand::SetRenderTargets {
            color: color.to_vec(),
            depth,
        })
    }

    pub fn clear_render_target(
        &mut self,
        target: TextureHandle,
        color: [f32; 4],
    ) -> Result<(), GraphicsError> {
        self.record(GpuCommand::ClearRenderTarget { target, color })
    }

    pub fn clear_depth(&mut self, target: TextureHandle, depth: f32) -> Result<(), GraphicsError> {
        self.record(GpuCommand::ClearDepth { target, depth })
    }

    pub fn transition(
        &mut self,
        resource: TextureHandle,
        before: ResourceState,
        after: ResourceState,
    ) -> Result<(), GraphicsError> {
        self.record(GpuCommand::Transition {
            resource,
            before,
            after,
        })
    }

    pub fn draw(&mut self, vertex_count: u32, instance_count: u32) -> Result<(), GraphicsError> {
        self.record(GpuCommand::Draw {
            vertex_count,
            instance_count,
        })
    }

    pub fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
    ) -> Result<(), GraphicsError> {
        self.record(GpuCommand::DrawIndexed {
            index_count,
            instance_count,
            first_index: 0,
            base_vertex: 0,
        })
    }

    /// Finish recording.
    pub fn close(mut self) -> Result<ClosedCommandList, GraphicsError> {
        self.backend.close_command_list(self.list)?;
        self.closed = true;
        log::trace!(
            "Closed command list '{}' (slot {}, {} commands)",
            self.label,
            self.slot,
            self.command_count
        );
        Ok(ClosedCommandList {
            list: self.list,
            slot: self.slot,
            command_count: self.command_count,
        })
    }
}

impl Drop for RecordingBuffer<'_> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        match self.backend.close_command_list(self.list) {
            Ok(()) => log::warn!(
                "Discarded command list '{}' (slot {}) after {} commands",
                self.label,
                self.slot,
                self.command_count
            ),
            Err(e) => log::warn!("Failed to close abandoned list '{}': {e}", self.label),
        }
    }
}

impl std::fmt::Debug for RecordingBuffer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingBuffer")
            .field("list", &self.list)
            .field("slot", &self.slot)
            .field("label", &self.label)
            .field("command_count", &self.command_count)
            .finish_non_exhaustive()
    }
}

/// A closed command list awaiting submission.
///
/// Deliberately neither `Clone` nor `Copy`.
#[derive(Debug, PartialEq, Eq)]
pub struct ClosedCommandList {
    list: CommandListHandle,
    slot: usize,
    command_count: u32,
}

impl ClosedCommandList {
    /// Backend handle of the list.
    pub fn handle(&self) -> CommandListHandle {
        self.list
    }

    /// Frame slot the list was recorded against.
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Number of commands recorded.
    pub fn command_count(&self) -> u32 {
        self.command_count
    }
}

static_assertions::assert_impl_all!(ClosedCommandList: Send, Sync);
static_assertions::assert_not_impl_any!(ClosedCommandList: Clone);
