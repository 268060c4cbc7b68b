/// Frame executor - replays a RenderCommandQueue into a command list
///
/// Tracks the bound pipeline, material, material instance, mesh and pending
/// uniform offset overrides while walking the queue. Every command checks that
/// the state it depends on is present and fails with `Error::InvalidState`
/// otherwise, so a badly ordered queue never reaches the GPU.

use rustc_hash::FxHashMap;
use slotmap::SlotMap;
use crate::engine_bail;
use crate::engine_trace;
use crate::error::{Error, Result};
use crate::graphics_device::{BindingKey, CommandList, IndexType};
use crate::memory::{DeviceBuffer, MeshAllocation};
use crate::pipeline::{ShaderPipeline, ShaderPipelineKey};
use crate::render::{RenderCommand, RenderCommandQueue};
use crate::resource::{Material, MaterialHandle};

/// Resources the executor reads while replaying a frame
pub struct FrameResources<'a> {
    pub pipelines: &'a SlotMap<ShaderPipelineKey, ShaderPipeline>,
    pub materials: &'a SlotMap<MaterialHandle, Material>,
    pub device_buffer: &'a DeviceBuffer,
    pub image_index: u32,
}

/// Counters for one replay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionStats {
    pub commands: u32,
    pub draw_calls: u32,
    pub pipeline_binds: u32,
}

#[derive(Debug, Clone, Copy)]
struct BoundMaterialState {
    pipeline: ShaderPipelineKey,
    material_id: u32,
}

/// Running state of one replay
#[derive(Debug, Default)]
pub struct FrameExecutor {
    pipeline: Option<ShaderPipelineKey>,
    material: Option<BoundMaterialState>,
    instance: Option<u32>,
    mesh: Option<MeshAllocation>,
    offset_overrides: FxHashMap<BindingKey, u32>,
    stats: ExecutionStats,
}

impl FrameExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replay every remaining command of `queue` into `cmd`
    pub fn execute(
        &mut self,
        resources: &FrameResources,
        queue: &mut RenderCommandQueue,
        cmd: &mut dyn CommandList,
    ) -> Result<ExecutionStats> {
        while let Some(command) = queue.next_command() {
            self.execute_command(resources, &command, cmd)?;
            self.stats.commands += 1;
        }
        engine_trace!("prism::FrameExecutor", "replayed {} commands, {} draws",
            self.stats.commands, self.stats.draw_calls);
        Ok(self.stats)
    }

    pub fn stats(&self) -> ExecutionStats {
        self.stats
    }

    fn execute_command(
        &mut self,
        resources: &FrameResources,
        command: &RenderCommand,
        cmd: &mut dyn CommandList,
    ) -> Result<()> {
        match *command {
            RenderCommand::SetViewport(viewport) => cmd.set_viewport(viewport),
            RenderCommand::SetScissor(scissor) => cmd.set_scissor(scissor),

            RenderCommand::BindMaterial(handle) => {
                self.bind_material(resources, handle, cmd)?;
                self.instance = None;
                Ok(())
            }

            RenderCommand::BindMaterialInstance(instance) => {
                let material = material(resources, instance.material, command)?;
                if !material.has_instance(instance.instance_id) {
                    engine_bail!("prism::FrameExecutor" => Error::InvalidResource,
                        "[FrameExecutor] {}: material '{}' has no instance {}",
                        command.name(), material.name(), instance.instance_id);
                }
                self.bind_material(resources, instance.material, cmd)?;
                self.instance = Some(instance.instance_id);
                Ok(())
            }

            RenderCommand::BindMesh(mesh_id) => {
                if self.material.is_none() {
                    engine_bail!("prism::FrameExecutor" => Error::InvalidState,
                        "[FrameExecutor] {} {} without a bound material", command.name(), mesh_id);
                }
                let Some(allocation) = resources.device_buffer.allocation(mesh_id) else {
                    engine_bail!("prism::FrameExecutor" => Error::InvalidState,
                        "[FrameExecutor] {}: mesh {} was never flushed to device memory",
                        command.name(), mesh_id);
                };
                cmd.bind_vertex_buffer(allocation.buffer, allocation.start_offset)?;
                if allocation.index_count > 0 {
                    cmd.bind_index_buffer(allocation.buffer, allocation.index_offset(), IndexType::U32)?;
                }
                self.mesh = Some(*allocation);
                Ok(())
            }

            RenderCommand::SetUniformOffset { binding, offset } => {
                self.offset_overrides.insert(binding, offset);
                Ok(())
            }

            RenderCommand::PushConstants { stages, offset, size, ref data } => {
                let Some(key) = self.pipeline else {
                    engine_bail!("prism::FrameExecutor" => Error::InvalidState,
                        "[FrameExecutor] {} without a bound pipeline", command.name());
                };
                let pipeline = pipeline(resources, key, command)?;
                cmd.push_constants(pipeline.pipeline(), stages, offset, &data[..size as usize])
            }

            RenderCommand::Draw { vertex_count, instance_count, first_vertex } => {
                self.prepare_draw(resources, command, cmd)?;
                cmd.draw(vertex_count, instance_count, first_vertex, 0)?;
                self.stats.draw_calls += 1;
                Ok(())
            }

            RenderCommand::DrawIndexed { index_count, instance_count, first_index, vertex_offset } => {
                let mesh = self.prepare_draw(resources, command, cmd)?;
                if mesh.index_count == 0 {
                    engine_bail!("prism::FrameExecutor" => Error::InvalidState,
                        "[FrameExecutor] {} on a mesh without indices", command.name());
                }
                cmd.draw_indexed(index_count, instance_count, first_index, vertex_offset, 0)?;
                self.stats.draw_calls += 1;
                Ok(())
            }
        }
    }

    fn bind_material(
        &mut self,
        resources: &FrameResources,
        handle: MaterialHandle,
        cmd: &mut dyn CommandList,
    ) -> Result<()> {
        let command = RenderCommand::BindMaterial(handle);
        let material = material(resources, handle, &command)?;
        let key = material.pipeline();
        let pipeline = pipeline(resources, key, &command)?;

        if self.pipeline != Some(key) {
            cmd.bind_pipeline(pipeline.pipeline())?;
            self.pipeline = Some(key);
            self.stats.pipeline_binds += 1;
        }
        pipeline.bind_descriptor_sets(cmd, resources.image_index, material.material_id())?;

        self.material = Some(BoundMaterialState { pipeline: key, material_id: material.material_id() });
        self.offset_overrides.clear();
        Ok(())
    }

    /// Check draw preconditions and rebind per-object offsets when needed
    fn prepare_draw(
        &mut self,
        resources: &FrameResources,
        command: &RenderCommand,
        cmd: &mut dyn CommandList,
    ) -> Result<MeshAllocation> {
        let Some(bound) = self.material else {
            engine_bail!("prism::FrameExecutor" => Error::InvalidState,
                "[FrameExecutor] {} without a bound material", command.name());
        };
        let Some(mesh) = self.mesh else {
            engine_bail!("prism::FrameExecutor" => Error::InvalidState,
                "[FrameExecutor] {} without a bound mesh", command.name());
        };

        if self.instance.is_some() || !self.offset_overrides.is_empty() {
            let pipeline = pipeline(resources, bound.pipeline, command)?;
            pipeline.set_dynamic_offsets(
                cmd,
                resources.image_index,
                bound.material_id,
                self.instance.unwrap_or(0),
                &self.offset_overrides,
            )?;
        }
        Ok(mesh)
    }
}

fn material<'a>(
    resources: &FrameResources<'a>,
    handle: MaterialHandle,
    command: &RenderCommand,
) -> Result<&'a Material> {
    match resources.materials.get(handle) {
        Some(material) => Ok(material),
        None => engine_bail!("prism::FrameExecutor" => Error::InvalidResource,
            "[FrameExecutor] {}: material was destroyed", command.name()),
    }
}

fn pipeline<'a>(
    resources: &FrameResources<'a>,
    key: ShaderPipelineKey,
    command: &RenderCommand,
) -> Result<&'a ShaderPipeline> {
    match resources.pipelines.get(key) {
        Some(pipeline) => Ok(pipeline),
        None => engine_bail!("prism::FrameExecutor" => Error::InvalidResource,
            "[FrameExecutor] {}: shader pipeline was destroyed", command.name()),
    }
}

#[cfg(test)]
#[path = "frame_executor_tests.rs"]
mod tests;
