/// CommandList trait - for recording GPU commands into a command buffer

use crate::error::Result;
use crate::graphics_device::{
    BufferCopyRegion, BufferHandle, DescriptorSetHandle, IndexType, PipelineHandle,
    ShaderStageFlags,
};

/// Command list for recording rendering and transfer commands
///
/// Obtained from [`crate::graphics_device::GraphicsDevice::frame_commands`]
/// (graphics queue, inside the frame's render pass) or
/// [`crate::graphics_device::GraphicsDevice::begin_transfer`] (transfer queue).
pub trait CommandList {
    /// Set the viewport
    ///
    /// # Arguments
    ///
    /// * `viewport` - Viewport dimensions and depth range
    fn set_viewport(&mut self, viewport: Viewport) -> Result<()>;

    /// Set the scissor rectangle
    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()>;

    /// Bind a graphics pipeline
    fn bind_pipeline(&mut self, pipeline: PipelineHandle) -> Result<()>;

    /// Bind consecutive descriptor sets with their dynamic offsets
    ///
    /// # Arguments
    ///
    /// * `pipeline` - Pipeline whose layout the sets are bound against
    /// * `first_set` - Set index of `sets[0]`
    /// * `sets` - Descriptor sets, one per set index
    /// * `dynamic_offsets` - One offset per dynamic binding, in (set, binding) order
    fn bind_descriptor_sets(
        &mut self,
        pipeline: PipelineHandle,
        first_set: u32,
        sets: &[DescriptorSetHandle],
        dynamic_offsets: &[u32],
    ) -> Result<()>;

    /// Push constants to the pipeline
    ///
    /// # Arguments
    ///
    /// * `pipeline` - Pipeline whose layout declares the range
    /// * `stages` - Stage flags of the declared range
    /// * `offset` - Offset in bytes into push constant range
    /// * `data` - Data to push
    fn push_constants(
        &mut self,
        pipeline: PipelineHandle,
        stages: ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) -> Result<()>;

    /// Bind a vertex buffer at binding 0
    fn bind_vertex_buffer(&mut self, buffer: BufferHandle, offset: u64) -> Result<()>;

    /// Bind an index buffer
    fn bind_index_buffer(&mut self, buffer: BufferHandle, offset: u64, index_type: IndexType) -> Result<()>;

    /// Draw vertices
    fn draw(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) -> Result<()>;

    /// Draw indexed vertices
    ///
    /// # Arguments
    ///
    /// * `index_count` - Number of indices to draw
    /// * `instance_count` - Number of instances
    /// * `first_index` - Index of first index
    /// * `vertex_offset` - Value added to vertex index before indexing into the vertex buffer
    /// * `first_instance` - Instance id of the first instance
    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> Result<()>;

    /// Copy regions between two buffers
    fn copy_buffer(&mut self, src: BufferHandle, dst: BufferHandle, regions: &[BufferCopyRegion]) -> Result<()>;
}

/// Viewport dimensions and depth range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Full-surface viewport with a [0, 1] depth range
    pub fn from_extent(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// 2D rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect2D {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect2D {
    pub fn from_extent(width: u32, height: u32) -> Self {
        Self { x: 0, y: 0, width, height }
    }
}
