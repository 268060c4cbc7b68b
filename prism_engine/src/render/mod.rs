/// Render module - command recording, frame replay and the renderer context

pub mod render_command;
pub mod frame_executor;
pub mod renderer_config;
pub mod renderer;

pub use render_command::*;
pub use frame_executor::{ExecutionStats, FrameExecutor, FrameResources};
pub use renderer_config::RendererConfig;
pub use renderer::{Renderer, RendererStats, SceneData, UniformTarget};
