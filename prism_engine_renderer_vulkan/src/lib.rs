/*!
# Prism Engine - Vulkan Backend

Vulkan implementation of the `prism_engine` graphics device.

This crate provides [`VulkanGraphicsDevice`], which implements the
`GraphicsDevice` trait using the Ash library for Vulkan bindings,
gpu-allocator for memory management and spirq for SPIR-V reflection.

Validation layers are only compiled in with the `vulkan-validation` feature,
and only enabled at runtime when `RendererConfig::enable_validation` is set.

# Example

```no_run
use prism_engine::prism::render::RendererConfig;
use prism_engine_renderer_vulkan::VulkanGraphicsDevice;
# fn run(window: &winit::window::Window) -> prism_engine::prism::Result<()> {
let device = VulkanGraphicsDevice::new(window, &RendererConfig::default())?;
# Ok(())
# }
```
*/

mod vulkan;
mod vulkan_buffer;
mod vulkan_command_list;
mod vulkan_context;
mod vulkan_descriptor_set;
mod vulkan_format;
mod vulkan_frame;
mod vulkan_pipeline;
mod vulkan_reflection;
mod vulkan_render_pass;
mod vulkan_sampler;
mod vulkan_shader;
mod vulkan_swapchain;
mod vulkan_texture;
mod vulkan_transfer;

#[cfg(feature = "vulkan-validation")]
mod debug;

pub use vulkan::VulkanGraphicsDevice;

#[cfg(feature = "vulkan-validation")]
pub use debug::{print_validation_stats_report, validation_stats, ValidationStats};
