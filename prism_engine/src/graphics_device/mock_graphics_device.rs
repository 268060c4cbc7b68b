/// Mock graphics device for unit tests (no GPU required)
///
/// Buffers are plain byte vectors. Transfer copies are applied when the
/// transfer is submitted, so upload paths can be verified end to end.
/// Every recorded command is kept for assertions.

use std::cell::Cell;
use slotmap::SlotMap;
use crate::error::{Error, Result};
use crate::graphics_device::*;

// ============================================================================
// Mock CommandList
// ============================================================================

/// One recorded command
#[derive(Debug, Clone, PartialEq)]
pub enum MockCommand {
    SetViewport(Viewport),
    SetScissor(Rect2D),
    BindPipeline(PipelineHandle),
    BindDescriptorSets {
        pipeline: PipelineHandle,
        first_set: u32,
        sets: Vec<DescriptorSetHandle>,
        dynamic_offsets: Vec<u32>,
    },
    PushConstants {
        stages: ShaderStageFlags,
        offset: u32,
        data: Vec<u8>,
    },
    BindVertexBuffer(BufferHandle, u64),
    BindIndexBuffer(BufferHandle, u64, IndexType),
    Draw {
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    },
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    },
    CopyBuffer {
        src: BufferHandle,
        dst: BufferHandle,
        regions: Vec<BufferCopyRegion>,
    },
}

#[derive(Debug, Default)]
pub struct MockCommandList {
    pub commands: Vec<MockCommand>,
}

impl MockCommandList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of recorded commands, in order
    pub fn names(&self) -> Vec<&'static str> {
        self.commands
            .iter()
            .map(|c| match c {
                MockCommand::SetViewport(_) => "set_viewport",
                MockCommand::SetScissor(_) => "set_scissor",
                MockCommand::BindPipeline(_) => "bind_pipeline",
                MockCommand::BindDescriptorSets { .. } => "bind_descriptor_sets",
                MockCommand::PushConstants { .. } => "push_constants",
                MockCommand::BindVertexBuffer(..) => "bind_vertex_buffer",
                MockCommand::BindIndexBuffer(..) => "bind_index_buffer",
                MockCommand::Draw { .. } => "draw",
                MockCommand::DrawIndexed { .. } => "draw_indexed",
                MockCommand::CopyBuffer { .. } => "copy_buffer",
            })
            .collect()
    }
}

impl CommandList for MockCommandList {
    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.commands.push(MockCommand::SetViewport(viewport));
        Ok(())
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.commands.push(MockCommand::SetScissor(scissor));
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: PipelineHandle) -> Result<()> {
        self.commands.push(MockCommand::BindPipeline(pipeline));
        Ok(())
    }

    fn bind_descriptor_sets(
        &mut self,
        pipeline: PipelineHandle,
        first_set: u32,
        sets: &[DescriptorSetHandle],
        dynamic_offsets: &[u32],
    ) -> Result<()> {
        self.commands.push(MockCommand::BindDescriptorSets {
            pipeline,
            first_set,
            sets: sets.to_vec(),
            dynamic_offsets: dynamic_offsets.to_vec(),
        });
        Ok(())
    }

    fn push_constants(
        &mut self,
        _pipeline: PipelineHandle,
        stages: ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) -> Result<()> {
        self.commands.push(MockCommand::PushConstants { stages, offset, data: data.to_vec() });
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, buffer: BufferHandle, offset: u64) -> Result<()> {
        self.commands.push(MockCommand::BindVertexBuffer(buffer, offset));
        Ok(())
    }

    fn bind_index_buffer(&mut self, buffer: BufferHandle, offset: u64, index_type: IndexType) -> Result<()> {
        self.commands.push(MockCommand::BindIndexBuffer(buffer, offset, index_type));
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) -> Result<()> {
        self.commands.push(MockCommand::Draw { vertex_count, instance_count, first_vertex, first_instance });
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
        self.commands.push(MockCommand::DrawIndexed {
            index_count,
            instance_count,
            first_index,
            vertex_offset,
            first_instance,
        });
        Ok(())
    }

    fn copy_buffer(&mut self, src: BufferHandle, dst: BufferHandle, regions: &[BufferCopyRegion]) -> Result<()> {
        self.commands.push(MockCommand::CopyBuffer { src, dst, regions: regions.to_vec() });
        Ok(())
    }
}

// ============================================================================
// Mock GraphicsDevice
// ============================================================================

pub struct MockBuffer {
    pub desc: BufferDesc,
    pub data: Vec<u8>,
}

pub struct MockDescriptorSet {
    pub layout: DescriptorSetLayoutHandle,
    pub writes: Vec<DescriptorWrite>,
}

/// One host write, with the number of `wait_idle` calls that preceded it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockWrite {
    pub buffer: BufferHandle,
    pub offset: u64,
    pub len: u64,
    pub idle_waits_before: u32,
}

pub struct MockGraphicsDevice {
    pub limits: DeviceLimits,
    pub image_count: u32,
    pub extent: (u32, u32),
    pub buffers: SlotMap<BufferHandle, MockBuffer>,
    pub shaders: SlotMap<ShaderHandle, String>,
    pub layouts: SlotMap<DescriptorSetLayoutHandle, DescriptorSetLayoutDesc>,
    pub pipelines: SlotMap<PipelineHandle, PipelineDesc>,
    pub descriptor_sets: SlotMap<DescriptorSetHandle, MockDescriptorSet>,
    pub textures: SlotMap<TextureHandle, (String, TextureKind)>,
    pub transfer_commands: MockCommandList,
    pub frame_command_list: MockCommandList,
    /// Barrier lists passed to each `submit_transfer`
    pub submitted_barriers: Vec<Vec<BufferBarrier>>,
    /// Frame infos handed out by `begin_frame`
    pub frames_begun: Vec<FrameInfo>,
    pub frames_presented: u32,
    /// Makes the next `begin_frame` report an out-of-date swapchain
    pub skip_next_frame: bool,
    pub transfers_aborted: u32,
    pub writes: Vec<MockWrite>,
    pub idle_waits: Cell<u32>,
    in_frame: bool,
    in_transfer: bool,
    frame_counter: u32,
}

impl MockGraphicsDevice {
    pub fn new() -> Self {
        Self::with_limits(DeviceLimits::default(), 3)
    }

    pub fn with_limits(limits: DeviceLimits, image_count: u32) -> Self {
        Self {
            limits,
            image_count,
            extent: (800, 600),
            buffers: SlotMap::with_key(),
            shaders: SlotMap::with_key(),
            layouts: SlotMap::with_key(),
            pipelines: SlotMap::with_key(),
            descriptor_sets: SlotMap::with_key(),
            textures: SlotMap::with_key(),
            transfer_commands: MockCommandList::new(),
            frame_command_list: MockCommandList::new(),
            submitted_barriers: Vec::new(),
            frames_begun: Vec::new(),
            frames_presented: 0,
            skip_next_frame: false,
            transfers_aborted: 0,
            writes: Vec::new(),
            idle_waits: Cell::new(0),
            in_frame: false,
            in_transfer: false,
            frame_counter: 0,
        }
    }

    /// Create a shader module carrying hand-written reflection
    pub fn shader_module(&mut self, name: &str, stage: ShaderStage, reflection: ShaderReflection) -> ShaderModule {
        let handle = self.shaders.insert(name.to_string());
        ShaderModule {
            handle,
            stage,
            name: name.to_string(),
            entry_point: "main".to_string(),
            reflection,
        }
    }

    /// Raw contents of any buffer, device-local ones included
    pub fn contents(&self, buffer: BufferHandle) -> &[u8] {
        &self.buffers[buffer].data
    }

    fn buffer(&self, buffer: BufferHandle) -> Result<&MockBuffer> {
        self.buffers
            .get(buffer)
            .ok_or_else(|| Error::InvalidResource("mock: stale buffer handle".to_string()))
    }

    fn host_visible_range(&self, buffer: BufferHandle, offset: u64, len: u64) -> Result<std::ops::Range<usize>> {
        let b = self.buffer(buffer)?;
        if !b.desc.location.is_host_visible() {
            return Err(Error::InvalidResource(format!("mock: buffer '{}' is not host visible", b.desc.name)));
        }
        if offset + len > b.desc.size {
            return Err(Error::InvalidResource(format!(
                "mock: range {}..{} outside buffer '{}' of {} bytes",
                offset,
                offset + len,
                b.desc.name,
                b.desc.size
            )));
        }
        Ok(offset as usize..(offset + len) as usize)
    }

    fn apply_copies(&mut self) -> Result<()> {
        let commands = std::mem::take(&mut self.transfer_commands.commands);
        for command in &commands {
            if let MockCommand::CopyBuffer { src, dst, regions } = command {
                for region in regions {
                    let bytes = {
                        let s = self.buffer(*src)?;
                        let start = region.src_offset as usize;
                        s.data[start..start + region.size as usize].to_vec()
                    };
                    let d = self
                        .buffers
                        .get_mut(*dst)
                        .ok_or_else(|| Error::InvalidResource("mock: stale buffer handle".to_string()))?;
                    let start = region.dst_offset as usize;
                    d.data[start..start + bytes.len()].copy_from_slice(&bytes);
                }
            }
        }
        self.transfer_commands.commands = commands;
        Ok(())
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn swapchain_image_count(&self) -> u32 {
        self.image_count
    }

    fn swapchain_extent(&self) -> (u32, u32) {
        self.extent
    }

    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<BufferHandle> {
        if desc.size == 0 {
            return Err(Error::InvalidResource("mock: zero-sized buffer".to_string()));
        }
        Ok(self.buffers.insert(MockBuffer {
            desc: desc.clone(),
            data: vec![0u8; desc.size as usize],
        }))
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) -> Result<()> {
        self.buffers
            .remove(buffer)
            .map(|_| ())
            .ok_or_else(|| Error::InvalidResource("mock: buffer destroyed twice".to_string()))
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) -> Result<()> {
        let range = self.host_visible_range(buffer, offset, data.len() as u64)?;
        self.buffers[buffer].data[range].copy_from_slice(data);
        self.writes.push(MockWrite {
            buffer,
            offset,
            len: data.len() as u64,
            idle_waits_before: self.idle_waits.get(),
        });
        Ok(())
    }

    fn read_buffer(&self, buffer: BufferHandle, offset: u64, len: u64) -> Result<Vec<u8>> {
        let range = self.host_visible_range(buffer, offset, len)?;
        Ok(self.buffers[buffer].data[range].to_vec())
    }

    fn create_shader(&mut self, desc: &ShaderDesc) -> Result<ShaderModule> {
        Ok(self.shader_module(desc.name, desc.stage, ShaderReflection::default()))
    }

    fn destroy_shader(&mut self, shader: ShaderHandle) -> Result<()> {
        self.shaders
            .remove(shader)
            .map(|_| ())
            .ok_or_else(|| Error::InvalidResource("mock: stale shader handle".to_string()))
    }

    fn create_descriptor_set_layout(&mut self, desc: &DescriptorSetLayoutDesc) -> Result<DescriptorSetLayoutHandle> {
        Ok(self.layouts.insert(desc.clone()))
    }

    fn destroy_descriptor_set_layout(&mut self, layout: DescriptorSetLayoutHandle) -> Result<()> {
        self.layouts
            .remove(layout)
            .map(|_| ())
            .ok_or_else(|| Error::InvalidResource("mock: stale layout handle".to_string()))
    }

    fn create_pipeline(&mut self, desc: &PipelineDesc) -> Result<PipelineHandle> {
        Ok(self.pipelines.insert(desc.clone()))
    }

    fn destroy_pipeline(&mut self, pipeline: PipelineHandle) -> Result<()> {
        self.pipelines
            .remove(pipeline)
            .map(|_| ())
            .ok_or_else(|| Error::InvalidResource("mock: stale pipeline handle".to_string()))
    }

    fn allocate_descriptor_sets(&mut self, layouts: &[DescriptorSetLayoutHandle]) -> Result<Vec<DescriptorSetHandle>> {
        Ok(layouts
            .iter()
            .map(|layout| self.descriptor_sets.insert(MockDescriptorSet { layout: *layout, writes: Vec::new() }))
            .collect())
    }

    fn free_descriptor_sets(&mut self, sets: &[DescriptorSetHandle]) -> Result<()> {
        for set in sets {
            self.descriptor_sets.remove(*set);
        }
        Ok(())
    }

    fn update_descriptor_set(&mut self, set: DescriptorSetHandle, writes: &[DescriptorWrite]) -> Result<()> {
        let entry = self
            .descriptor_sets
            .get_mut(set)
            .ok_or_else(|| Error::InvalidResource("mock: stale descriptor set".to_string()))?;
        entry.writes.extend_from_slice(writes);
        Ok(())
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureHandle> {
        if desc.data.len() != desc.expected_size() {
            return Err(Error::InvalidResource("mock: texture data size mismatch".to_string()));
        }
        Ok(self.textures.insert((desc.name.to_string(), desc.kind)))
    }

    fn destroy_texture(&mut self, texture: TextureHandle) -> Result<()> {
        self.textures
            .remove(texture)
            .map(|_| ())
            .ok_or_else(|| Error::InvalidResource("mock: stale texture handle".to_string()))
    }

    fn begin_transfer(&mut self) -> Result<&mut dyn CommandList> {
        if self.in_transfer {
            return Err(Error::InvalidState("mock: transfer already recording".to_string()));
        }
        self.in_transfer = true;
        self.transfer_commands.commands.clear();
        Ok(&mut self.transfer_commands)
    }

    fn submit_transfer(&mut self, barriers: &[BufferBarrier]) -> Result<()> {
        if !self.in_transfer {
            return Err(Error::InvalidState("mock: no transfer recording".to_string()));
        }
        self.in_transfer = false;
        self.apply_copies()?;
        self.submitted_barriers.push(barriers.to_vec());
        Ok(())
    }

    fn abort_transfer(&mut self) {
        if self.in_transfer {
            self.in_transfer = false;
            self.transfer_commands.commands.clear();
            self.transfers_aborted += 1;
        }
    }

    fn begin_frame(&mut self) -> Result<FrameStatus> {
        if self.in_frame {
            return Err(Error::InvalidState("mock: frame already started".to_string()));
        }
        if self.skip_next_frame {
            self.skip_next_frame = false;
            return Ok(FrameStatus::Skipped);
        }
        if self.extent.0 == 0 || self.extent.1 == 0 {
            return Ok(FrameStatus::Skipped);
        }
        let info = FrameInfo {
            frame_index: self.frame_counter % 2,
            image_index: self.frame_counter % self.image_count,
        };
        self.frame_counter += 1;
        self.in_frame = true;
        self.frame_command_list.commands.clear();
        self.frames_begun.push(info);
        Ok(FrameStatus::Ready(info))
    }

    fn frame_commands(&mut self) -> Result<&mut dyn CommandList> {
        if !self.in_frame {
            return Err(Error::InvalidState("mock: no frame in progress".to_string()));
        }
        Ok(&mut self.frame_command_list)
    }

    fn end_frame(&mut self) -> Result<()> {
        if !self.in_frame {
            return Err(Error::InvalidState("mock: no frame in progress".to_string()));
        }
        self.in_frame = false;
        self.frames_presented += 1;
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.extent = (width, height);
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        self.idle_waits.set(self.idle_waits.get() + 1);
        Ok(())
    }

    fn as_mock(&mut self) -> Option<&mut MockGraphicsDevice> {
        Some(self)
    }
}
