/*!
# Prism Engine

Backend-agnostic core of the Prism renderer.

This crate owns everything that does not talk to a GPU API directly: the
device-facing traits, the GPU memory sub-allocators, shader pipeline layout
aggregation, materials, the render command queue and the renderer context.
The Vulkan backend (`prism_engine_renderer_vulkan`) implements
[`graphics_device::GraphicsDevice`] on top of `ash`.

## Architecture

- **GraphicsDevice / CommandList**: backend traits, every GPU object addressed by a handle
- **RingStageBuffer**: host-visible staging ring for uploads
- **DeviceBuffer / UniformBuffer**: best-fit sub-allocators over device buffers
- **ShaderPipeline**: merged stage reflection, descriptor layouts, per-material uniform slices
- **RenderCommandQueue**: commands recorded during a scene and replayed into a frame
- **Renderer**: the context object applications drive each frame
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod utils;
pub mod graphics_device;
pub mod memory;
pub mod pipeline;
pub mod render;
pub mod resource;

// Main prism namespace module
pub mod prism {
    // Error types
    pub use crate::error::{Error, Result};

    // Log routing
    pub use crate::engine::Engine;

    // Renderer context
    pub use crate::render::Renderer;

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    // Backend traits, handles and descriptors
    pub mod device {
        pub use crate::graphics_device::*;
    }

    // Render sub-module: commands, executor, renderer
    pub mod render {
        pub use crate::render::*;
        pub use crate::pipeline::*;
    }

    // Resource sub-module
    pub mod resource {
        pub use crate::resource::*;
    }

    // Memory sub-module
    pub mod memory {
        pub use crate::memory::*;
    }
}

// Re-export math library at crate root
pub use glam;
