/// GraphicsDevice trait - the backend-facing factory and frame driver
///
/// Every GPU object lives in an arena owned by the device and is addressed by
/// a generational handle. A handle that outlives its object is rejected with
/// `Error::InvalidResource` instead of reaching freed memory.

use slotmap::new_key_type;
use crate::error::Result;
use crate::graphics_device::{
    BufferBarrier, BufferDesc, CommandList, DescriptorSetLayoutDesc, DescriptorWrite,
    PipelineDesc, ShaderDesc, ShaderModule, TextureDesc,
};

new_key_type! {
    /// Handle to a device buffer
    pub struct BufferHandle;
    /// Handle to a sampled texture (image + view + sampler)
    pub struct TextureHandle;
    /// Handle to a shader module
    pub struct ShaderHandle;
    /// Handle to a graphics pipeline and its layout
    pub struct PipelineHandle;
    /// Handle to a descriptor set layout
    pub struct DescriptorSetLayoutHandle;
    /// Handle to an allocated descriptor set
    pub struct DescriptorSetHandle;
}

/// Device limits the core allocators depend on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLimits {
    pub min_uniform_buffer_offset_alignment: u64,
    pub max_push_constants_size: u32,
    pub max_bound_descriptor_sets: u32,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        // Vulkan-guaranteed minimums
        Self {
            min_uniform_buffer_offset_alignment: 256,
            max_push_constants_size: 128,
            max_bound_descriptor_sets: 4,
        }
    }
}

/// The two indices a frame juggles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    /// Frame-in-flight slot (selects fence, semaphores, command buffer)
    pub frame_index: u32,
    /// Acquired swapchain image (selects framebuffer and per-image descriptor sets)
    pub image_index: u32,
}

/// Outcome of [`GraphicsDevice::begin_frame`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// Recording has started, the render pass is open
    Ready(FrameInfo),
    /// The swapchain was out of date (or minimized) and no frame was started
    Skipped,
}

/// Backend graphics device
///
/// Owns the GPU, its queues, the swapchain and every object created through it.
pub trait GraphicsDevice {
    // ===== DEVICE INFO =====

    fn limits(&self) -> DeviceLimits;

    /// Number of swapchain images (fixed for the lifetime of the swapchain)
    fn swapchain_image_count(&self) -> u32;

    /// Current swapchain extent in pixels
    fn swapchain_extent(&self) -> (u32, u32);

    // ===== BUFFERS =====

    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<BufferHandle>;

    fn destroy_buffer(&mut self, buffer: BufferHandle) -> Result<()>;

    /// Write into a host-visible buffer
    ///
    /// # Arguments
    ///
    /// * `buffer` - Target buffer (must be `MemoryLocation::CpuToGpu`)
    /// * `offset` - Offset into the buffer in bytes
    /// * `data` - Data to write
    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) -> Result<()>;

    /// Read back `len` bytes from a host-visible buffer
    fn read_buffer(&self, buffer: BufferHandle, offset: u64, len: u64) -> Result<Vec<u8>>;

    // ===== SHADERS AND PIPELINES =====

    /// Create a shader module and reflect its interface
    fn create_shader(&mut self, desc: &ShaderDesc) -> Result<ShaderModule>;

    fn destroy_shader(&mut self, shader: ShaderHandle) -> Result<()>;

    fn create_descriptor_set_layout(&mut self, desc: &DescriptorSetLayoutDesc) -> Result<DescriptorSetLayoutHandle>;

    fn destroy_descriptor_set_layout(&mut self, layout: DescriptorSetLayoutHandle) -> Result<()>;

    fn create_pipeline(&mut self, desc: &PipelineDesc) -> Result<PipelineHandle>;

    fn destroy_pipeline(&mut self, pipeline: PipelineHandle) -> Result<()>;

    /// Allocate one descriptor set per entry of `layouts`
    fn allocate_descriptor_sets(&mut self, layouts: &[DescriptorSetLayoutHandle]) -> Result<Vec<DescriptorSetHandle>>;

    fn free_descriptor_sets(&mut self, sets: &[DescriptorSetHandle]) -> Result<()>;

    fn update_descriptor_set(&mut self, set: DescriptorSetHandle, writes: &[DescriptorWrite]) -> Result<()>;

    // ===== TEXTURES =====

    /// Create a sampled texture and upload its pixels (blocks until the upload completes)
    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureHandle>;

    fn destroy_texture(&mut self, texture: TextureHandle) -> Result<()>;

    // ===== UPLOADS =====

    /// Start recording a transfer-queue command buffer
    fn begin_transfer(&mut self) -> Result<&mut dyn CommandList>;

    /// Submit the recorded transfer and hand `barriers` over to the graphics queue
    ///
    /// Blocks until both the transfer and the graphics-side acquire have completed.
    fn submit_transfer(&mut self, barriers: &[BufferBarrier]) -> Result<()>;

    /// Discard a transfer that will not be submitted, so `begin_transfer` works again
    fn abort_transfer(&mut self);

    // ===== FRAMES =====

    /// Wait for the frame slot, acquire an image and open the frame's render pass
    fn begin_frame(&mut self) -> Result<FrameStatus>;

    /// Command list of the frame started by `begin_frame`
    fn frame_commands(&mut self) -> Result<&mut dyn CommandList>;

    /// Close the render pass, submit and present
    fn end_frame(&mut self) -> Result<()>;

    /// Schedule swapchain recreation for a new surface size
    fn resize(&mut self, width: u32, height: u32) -> Result<()>;

    fn wait_idle(&self) -> Result<()>;

    // ===== TESTING =====

    /// Access to the recording mock behind a boxed device
    #[cfg(test)]
    fn as_mock(&mut self) -> Option<&mut crate::graphics_device::mock_graphics_device::MockGraphicsDevice> {
        None
    }
}
