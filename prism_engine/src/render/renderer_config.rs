/// Renderer configuration

/// Settings shared by the Vulkan device and the [`crate::render::Renderer`]
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Enable validation/debug layers
    pub enable_validation: bool,
    /// Application name
    pub app_name: String,
    /// Application version (major, minor, patch)
    pub app_version: (u32, u32, u32),
    /// Frames the CPU may record ahead of the GPU
    pub max_frames_in_flight: u32,
    /// Initial ring staging buffer size in bytes (grows on demand)
    pub stage_buffer_size: u64,
    /// Device-local geometry buffer size in bytes
    pub device_buffer_size: u64,
    /// Shared uniform buffer size in bytes
    pub uniform_buffer_size: u64,
    /// Color the swapchain image is cleared to
    pub clear_color: [f32; 4],
    /// Wait for vertical blank (FIFO) instead of presenting immediately (MAILBOX)
    pub vsync: bool,
    /// Per-object uniform member that receives a model instance's transform
    pub model_matrix_member: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            enable_validation: cfg!(debug_assertions),
            app_name: "Prism Application".to_string(),
            app_version: (1, 0, 0),
            max_frames_in_flight: 2,
            stage_buffer_size: 4 * 1024 * 1024,
            device_buffer_size: 64 * 1024 * 1024,
            uniform_buffer_size: 4 * 1024 * 1024,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            vsync: true,
            model_matrix_member: "model".to_string(),
        }
    }
}
