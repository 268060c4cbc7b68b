/// Shader pipelines: layout aggregation and per-material uniform bookkeeping

pub mod bindings;
pub mod shader_pipeline;

pub use bindings::*;
pub use shader_pipeline::{ShaderPipeline, ShaderPipelineDesc, ShaderPipelineKey};
