/// Render commands and the per-frame command queue
///
/// Scene submission records [`RenderCommand`]s into a [`RenderCommandQueue`];
/// the frame executor replays them in order once the frame's command list is
/// open. Commands are plain values (no heap data), so the queue is a flat
/// vector that keeps its storage from frame to frame.

use crate::engine_bail;
use crate::error::{Error, Result};
use crate::graphics_device::{BindingKey, Rect2D, ShaderStageFlags, Viewport};
use crate::resource::{MaterialHandle, MaterialInstance, MeshId};

/// Largest push constant payload a single command can carry
pub const MAX_PUSH_CONSTANT_PAYLOAD: usize = 64;

/// One recorded draw-time operation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderCommand {
    SetViewport(Viewport),
    SetScissor(Rect2D),
    /// Bind a material's pipeline and descriptor sets at its base offsets
    BindMaterial(MaterialHandle),
    /// Same as `BindMaterial`, selecting the instance's per-object slot for later draws
    BindMaterialInstance(MaterialInstance),
    /// Bind a flushed mesh's vertex and index ranges
    BindMesh(MeshId),
    /// Override the dynamic offset of one uniform binding, relative to the
    /// material's base, for the following draws
    SetUniformOffset {
        binding: BindingKey,
        offset: u32,
    },
    PushConstants {
        stages: ShaderStageFlags,
        offset: u32,
        size: u8,
        data: [u8; MAX_PUSH_CONSTANT_PAYLOAD],
    },
    Draw {
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
    },
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
    },
}

// Commands live inline in the queue; keep them small
const _: () = assert!(std::mem::size_of::<RenderCommand>() <= 96);

impl RenderCommand {
    /// Build a push constant command, copying `data` inline
    pub fn push_constants(stages: ShaderStageFlags, offset: u32, data: &[u8]) -> Result<Self> {
        if data.is_empty() || data.len() > MAX_PUSH_CONSTANT_PAYLOAD {
            engine_bail!("prism::RenderCommandQueue" => Error::InvalidResource,
                "[RenderCommandQueue] push constant payload of {} bytes (must be 1..={})",
                data.len(), MAX_PUSH_CONSTANT_PAYLOAD);
        }
        let mut inline = [0u8; MAX_PUSH_CONSTANT_PAYLOAD];
        inline[..data.len()].copy_from_slice(data);
        Ok(RenderCommand::PushConstants {
            stages,
            offset,
            size: data.len() as u8,
            data: inline,
        })
    }

    /// Short name used in logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            RenderCommand::SetViewport(_) => "SetViewport",
            RenderCommand::SetScissor(_) => "SetScissor",
            RenderCommand::BindMaterial(_) => "BindMaterial",
            RenderCommand::BindMaterialInstance(_) => "BindMaterialInstance",
            RenderCommand::BindMesh(_) => "BindMesh",
            RenderCommand::SetUniformOffset { .. } => "SetUniformOffset",
            RenderCommand::PushConstants { .. } => "PushConstants",
            RenderCommand::Draw { .. } => "Draw",
            RenderCommand::DrawIndexed { .. } => "DrawIndexed",
        }
    }
}

/// Reusable, forward-only command queue
#[derive(Debug, Default)]
pub struct RenderCommandQueue {
    commands: Vec<RenderCommand>,
    cursor: usize,
}

impl RenderCommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            commands: Vec::with_capacity(capacity),
            cursor: 0,
        }
    }

    pub fn add_command(&mut self, command: RenderCommand) {
        self.commands.push(command);
    }

    /// Next unread command, or None once the queue is drained
    pub fn next_command(&mut self) -> Option<RenderCommand> {
        let command = self.commands.get(self.cursor).copied()?;
        self.cursor += 1;
        Some(command)
    }

    /// Restart reading from the first command
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// Drop every command, keeping the storage
    pub fn clear(&mut self) {
        self.commands.clear();
        self.cursor = 0;
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Commands not yet read
    pub fn remaining(&self) -> usize {
        self.commands.len() - self.cursor
    }

    pub fn commands(&self) -> &[RenderCommand] {
        &self.commands
    }
}

#[cfg(test)]
#[path = "render_command_tests.rs"]
mod tests;
