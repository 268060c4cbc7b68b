/// Graphics device module - backend-facing traits, handles and descriptors

pub mod graphics_device;
pub mod buffer;
pub mod command_list;
pub mod shader;
pub mod pipeline;
pub mod texture;
pub mod descriptor;

pub use graphics_device::*;
pub use buffer::*;
pub use command_list::*;
pub use shader::*;
pub use pipeline::*;
pub use texture::*;
pub use descriptor::*;

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_graphics_device;
