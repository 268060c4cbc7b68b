/// CommandList - Vulkan implementation of the CommandList trait
///
/// Wraps one primary command buffer and its pool. Handles are resolved against
/// the shared resource table at record time, so a destroyed buffer, pipeline
/// or descriptor set is reported instead of being recorded.

use ash::vk;
use prism_engine::graphics_device::{
    BufferCopyRegion, BufferHandle, CommandList as EngineCommandList, DescriptorSetHandle, IndexType,
    PipelineHandle, PushConstantRange, Rect2D, ShaderStageFlags, Viewport,
};
use prism_engine::prism::{Error, Result};
use prism_engine::{engine_bail, engine_err, engine_error};

use crate::vulkan_context::{read_resources, ResourceTable, SharedResources};
use crate::vulkan_format::{index_type_to_vk, stage_flags_to_vk};

/// Vulkan command list implementation
pub(crate) struct CommandList {
    device: ash::Device,
    command_pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,
    resources: SharedResources,
    /// Whether the command list is currently recording
    is_recording: bool,
    /// Whether we're inside a render pass
    in_render_pass: bool,
}

impl CommandList {
    /// Create a command list whose buffer is submitted to `queue_family`
    pub fn new(device: ash::Device, queue_family: u32, resources: SharedResources) -> Result<Self> {
        unsafe {
            let command_pool_create_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(queue_family)
                .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

            let command_pool = device.create_command_pool(&command_pool_create_info, None)
                .map_err(|e| {
                    engine_error!("prism::vulkan", "Failed to create command pool: {:?}", e);
                    Error::BackendError(format!("Failed to create command pool: {:?}", e))
                })?;

            let command_buffer_allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);

            let command_buffer = match device.allocate_command_buffers(&command_buffer_allocate_info) {
                Ok(buffers) => buffers[0],
                Err(e) => {
                    device.destroy_command_pool(command_pool, None);
                    engine_bail!("prism::vulkan", "Failed to allocate command buffer: {:?}", e);
                }
            };

            Ok(Self {
                device,
                command_pool,
                command_buffer,
                resources,
                is_recording: false,
                in_render_pass: false,
            })
        }
    }

    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    pub fn is_recording(&self) -> bool {
        self.is_recording
    }

    /// Forget an unfinished recording; the next `begin` resets the buffer
    pub fn discard(&mut self) {
        self.is_recording = false;
        self.in_render_pass = false;
    }

    /// Reset and begin recording a one-time-submit buffer
    pub fn begin(&mut self) -> Result<()> {
        if self.is_recording {
            engine_bail!("prism::vulkan" => Error::InvalidState, "Command list is already recording");
        }
        unsafe {
            self.device
                .reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(|e| engine_err!("prism::vulkan", "Failed to reset command buffer: {:?}", e))?;

            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            self.device
                .begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to begin command buffer: {:?}", e))?;
        }
        self.is_recording = true;
        Ok(())
    }

    pub fn end(&mut self) -> Result<()> {
        self.ensure_recording()?;
        if self.in_render_pass {
            engine_bail!("prism::vulkan" => Error::InvalidState, "Cannot end a command list inside a render pass");
        }
        unsafe {
            self.device
                .end_command_buffer(self.command_buffer)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to end command buffer: {:?}", e))?;
        }
        self.is_recording = false;
        Ok(())
    }

    /// Begin `render_pass` on `framebuffer`, clearing color and depth
    pub fn begin_render_pass(
        &mut self,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_color: [f32; 4],
    ) -> Result<()> {
        self.ensure_recording()?;
        if self.in_render_pass {
            engine_bail!("prism::vulkan" => Error::InvalidState, "Render pass already begun");
        }

        let clear_values = [
            vk::ClearValue { color: vk::ClearColorValue { float32: clear_color } },
            vk::ClearValue { depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 } },
        ];
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D { offset: vk::Offset2D { x: 0, y: 0 }, extent })
            .clear_values(&clear_values);

        unsafe {
            self.device.cmd_begin_render_pass(self.command_buffer, &begin_info, vk::SubpassContents::INLINE);
        }
        self.in_render_pass = true;
        Ok(())
    }

    pub fn end_render_pass(&mut self) -> Result<()> {
        self.ensure_recording()?;
        if !self.in_render_pass {
            engine_bail!("prism::vulkan" => Error::InvalidState, "No render pass to end");
        }
        unsafe {
            self.device.cmd_end_render_pass(self.command_buffer);
        }
        self.in_render_pass = false;
        Ok(())
    }

    /// Record a raw buffer memory barrier
    pub fn buffer_barriers(
        &mut self,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        barriers: &[vk::BufferMemoryBarrier],
    ) -> Result<()> {
        self.ensure_recording()?;
        unsafe {
            self.device.cmd_pipeline_barrier(
                self.command_buffer,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                barriers,
                &[],
            );
        }
        Ok(())
    }

    /// # Safety
    ///
    /// The command buffer must not be pending execution.
    pub unsafe fn destroy(&self) {
        self.device.destroy_command_pool(self.command_pool, None);
    }

    fn ensure_recording(&self) -> Result<()> {
        if !self.is_recording {
            engine_bail!("prism::vulkan" => Error::InvalidState, "Command list is not recording");
        }
        Ok(())
    }

    fn resources(&self) -> Result<std::sync::RwLockReadGuard<'_, ResourceTable>> {
        read_resources(&self.resources)
    }
}

fn buffer_of(table: &ResourceTable, handle: BufferHandle) -> Result<(vk::Buffer, u64)> {
    table
        .buffers
        .get(handle)
        .map(|b| (b.buffer, b.size))
        .ok_or_else(|| engine_err!("prism::vulkan" => Error::InvalidResource, "Unknown buffer handle {:?}", handle))
}

/// Whether a push of `size` bytes at `offset` for `stages` fits one declared range
pub(crate) fn push_constant_range_matches(
    ranges: &[PushConstantRange],
    stages: ShaderStageFlags,
    offset: u32,
    size: u32,
) -> bool {
    let Some(end) = offset.checked_add(size) else {
        return false;
    };
    ranges.iter().any(|r| r.stages.contains(stages) && offset >= r.offset && end <= r.end())
}

impl EngineCommandList for CommandList {
    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.ensure_recording()?;
        let vk_viewport = vk::Viewport {
            x: viewport.x,
            y: viewport.y,
            width: viewport.width,
            height: viewport.height,
            min_depth: viewport.min_depth,
            max_depth: viewport.max_depth,
        };
        unsafe {
            self.device.cmd_set_viewport(self.command_buffer, 0, &[vk_viewport]);
        }
        Ok(())
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.ensure_recording()?;
        let vk_scissor = vk::Rect2D {
            offset: vk::Offset2D { x: scissor.x, y: scissor.y },
            extent: vk::Extent2D { width: scissor.width, height: scissor.height },
        };
        unsafe {
            self.device.cmd_set_scissor(self.command_buffer, 0, &[vk_scissor]);
        }
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: PipelineHandle) -> Result<()> {
        self.ensure_recording()?;
        let vk_pipeline = {
            let table = self.resources()?;
            table.pipelines.get(pipeline).map(|p| p.pipeline).ok_or_else(|| {
                engine_err!("prism::vulkan" => Error::InvalidResource, "Unknown pipeline handle {:?}", pipeline)
            })?
        };
        unsafe {
            self.device.cmd_bind_pipeline(self.command_buffer, vk::PipelineBindPoint::GRAPHICS, vk_pipeline);
        }
        Ok(())
    }

    fn bind_descriptor_sets(
        &mut self,
        pipeline: PipelineHandle,
        first_set: u32,
        sets: &[DescriptorSetHandle],
        dynamic_offsets: &[u32],
    ) -> Result<()> {
        self.ensure_recording()?;
        let (layout, vk_sets) = {
            let table = self.resources()?;
            let Some(pipeline_entry) = table.pipelines.get(pipeline) else {
                engine_bail!("prism::vulkan" => Error::InvalidResource, "Unknown pipeline handle {:?}", pipeline);
            };
            if first_set as usize + sets.len() > pipeline_entry.set_count as usize {
                engine_bail!("prism::vulkan" => Error::InvalidResource,
                    "Binding sets {}..{} but the pipeline layout has {} set(s)",
                    first_set, first_set as usize + sets.len(), pipeline_entry.set_count);
            }
            let vk_sets = sets
                .iter()
                .map(|&handle| {
                    table.descriptor_sets.get(handle).map(|s| s.set).ok_or_else(|| {
                        engine_err!("prism::vulkan" => Error::InvalidResource,
                            "Unknown descriptor set handle {:?}", handle)
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            (pipeline_entry.layout, vk_sets)
        };
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                first_set,
                &vk_sets,
                dynamic_offsets,
            );
        }
        Ok(())
    }

    fn push_constants(
        &mut self,
        pipeline: PipelineHandle,
        stages: ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) -> Result<()> {
        self.ensure_recording()?;
        if data.is_empty() || data.len() % 4 != 0 || offset % 4 != 0 {
            engine_bail!("prism::vulkan" => Error::InvalidResource,
                "Push constant offset {} and size {} must be non-zero multiples of 4", offset, data.len());
        }
        let layout = {
            let table = self.resources()?;
            let Some(pipeline_entry) = table.pipelines.get(pipeline) else {
                engine_bail!("prism::vulkan" => Error::InvalidResource, "Unknown pipeline handle {:?}", pipeline);
            };
            if !push_constant_range_matches(&pipeline_entry.push_constant_ranges, stages, offset, data.len() as u32) {
                engine_bail!("prism::vulkan" => Error::InvalidResource,
                    "Push constants {:?} at {}..{} fall outside the pipeline's declared ranges",
                    stages, offset, offset as usize + data.len());
            }
            pipeline_entry.layout
        };
        unsafe {
            self.device.cmd_push_constants(self.command_buffer, layout, stage_flags_to_vk(stages), offset, data);
        }
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, buffer: BufferHandle, offset: u64) -> Result<()> {
        self.ensure_recording()?;
        let (vk_buffer, _) = buffer_of(&*self.resources()?, buffer)?;
        unsafe {
            self.device.cmd_bind_vertex_buffers(self.command_buffer, 0, &[vk_buffer], &[offset]);
        }
        Ok(())
    }

    fn bind_index_buffer(&mut self, buffer: BufferHandle, offset: u64, index_type: IndexType) -> Result<()> {
        self.ensure_recording()?;
        let (vk_buffer, _) = buffer_of(&*self.resources()?, buffer)?;
        unsafe {
            self.device.cmd_bind_index_buffer(self.command_buffer, vk_buffer, offset, index_type_to_vk(index_type));
        }
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) -> Result<()> {
        self.ensure_recording()?;
        if !self.in_render_pass {
            engine_bail!("prism::vulkan" => Error::InvalidState, "draw recorded outside a render pass");
        }
        unsafe {
            self.device.cmd_draw(self.command_buffer, vertex_count, instance_count, first_vertex, first_instance);
        }
        Ok(())
    }

    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> Result<()> {
        self.ensure_recording()?;
        if !self.in_render_pass {
            engine_bail!("prism::vulkan" => Error::InvalidState, "draw_indexed recorded outside a render pass");
        }
        unsafe {
            self.device.cmd_draw_indexed(
                self.command_buffer,
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            );
        }
        Ok(())
    }

    fn copy_buffer(&mut self, src: BufferHandle, dst: BufferHandle, regions: &[BufferCopyRegion]) -> Result<()> {
        self.ensure_recording()?;
        if self.in_render_pass {
            engine_bail!("prism::vulkan" => Error::InvalidState, "copy_buffer recorded inside a render pass");
        }
        if regions.is_empty() {
            return Ok(());
        }
        let ((src_buffer, src_size), (dst_buffer, dst_size)) = {
            let table = self.resources()?;
            (buffer_of(&table, src)?, buffer_of(&table, dst)?)
        };
        for region in regions {
            let src_end = region.src_offset.checked_add(region.size);
            let dst_end = region.dst_offset.checked_add(region.size);
            if !matches!(src_end, Some(end) if end <= src_size) || !matches!(dst_end, Some(end) if end <= dst_size) {
                engine_bail!("prism::vulkan" => Error::InvalidResource,
                    "Copy region {:?} exceeds source ({} bytes) or destination ({} bytes)",
                    region, src_size, dst_size);
            }
        }
        let vk_regions: Vec<vk::BufferCopy> = regions
            .iter()
            .map(|r| vk::BufferCopy { src_offset: r.src_offset, dst_offset: r.dst_offset, size: r.size })
            .collect();
        unsafe {
            self.device.cmd_copy_buffer(self.command_buffer, src_buffer, dst_buffer, &vk_regions);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "vulkan_command_list_tests.rs"]
mod tests;
