/// Shader stages, shader modules and their reflection data
///
/// Reflection is produced by the backend (SPIR-V reflection in the Vulkan
/// backend) and consumed by [`crate::pipeline::ShaderPipeline`].

use bitflags::bitflags;
use crate::graphics_device::{BufferFormat, ShaderHandle};

/// Shader stage type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}

impl ShaderStage {
    pub fn flag(&self) -> ShaderStageFlags {
        match self {
            ShaderStage::Vertex => ShaderStageFlags::VERTEX,
            ShaderStage::Fragment => ShaderStageFlags::FRAGMENT,
            ShaderStage::Compute => ShaderStageFlags::COMPUTE,
        }
    }
}

bitflags! {
    /// Set of shader stages that can see a binding or push constant range
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShaderStageFlags: u32 {
        const VERTEX = 0x1;
        const FRAGMENT = 0x10;
        const COMPUTE = 0x20;
    }
}

/// Descriptor-set/binding pair identifying one shader resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingKey {
    pub set: u32,
    pub binding: u32,
}

impl BindingKey {
    pub const fn new(set: u32, binding: u32) -> Self {
        Self { set, binding }
    }
}

impl std::fmt::Display for BindingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(set {}, binding {})", self.set, self.binding)
    }
}

/// Descriptor for creating a shader module
#[derive(Debug, Clone)]
pub struct ShaderDesc<'a> {
    /// Name used in diagnostics (usually the source file name)
    pub name: &'a str,
    /// SPIR-V bytecode
    pub code: &'a [u8],
    /// Shader stage
    pub stage: ShaderStage,
    /// Entry point function name
    pub entry_point: &'a str,
}

/// A created shader module together with its reflection
#[derive(Debug, Clone)]
pub struct ShaderModule {
    pub handle: ShaderHandle,
    pub stage: ShaderStage,
    pub name: String,
    pub entry_point: String,
    pub reflection: ShaderReflection,
}

/// One member of a uniform block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformMember {
    pub name: String,
    pub offset: u32,
    pub size: u32,
}

/// A uniform block declared by a shader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectedUniform {
    pub name: String,
    pub key: BindingKey,
    /// Size of one block in bytes
    pub size: u32,
    /// Array element count (1 for a plain block)
    pub count: u32,
    /// Block holds one slice per material instance instead of one per material
    pub per_object: bool,
    pub members: Vec<UniformMember>,
}

/// Image dimensionality of a combined image sampler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerDimension {
    Texture2D,
    Cube,
}

/// A combined image sampler (or sampler array) declared by a shader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectedSampler {
    pub name: String,
    pub key: BindingKey,
    /// Declared array size; `None` for a runtime-sized array
    pub count: Option<u32>,
    pub dimension: SamplerDimension,
}

/// A push constant block declared by a shader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectedPushConstant {
    pub name: String,
    pub offset: u32,
    pub size: u32,
}

/// A stage input or output variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageVariable {
    pub location: u32,
    pub format: BufferFormat,
}

/// Everything the pipeline layer needs to know about a shader module
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderReflection {
    pub uniforms: Vec<ReflectedUniform>,
    pub samplers: Vec<ReflectedSampler>,
    pub push_constants: Vec<ReflectedPushConstant>,
    pub inputs: Vec<StageVariable>,
    pub outputs: Vec<StageVariable>,
}

/// Naming rule that marks a uniform block as per-object (dynamic per instance)
///
/// A block whose instance or type name contains `PerObject` / `per_object`
/// (case-insensitive, underscores ignored) gets one slice per material instance.
pub fn is_per_object_name(name: &str) -> bool {
    let folded: String = name
        .chars()
        .filter(|c| *c != '_')
        .map(|c| c.to_ascii_lowercase())
        .collect();
    folded.contains("perobject")
}

#[cfg(test)]
#[path = "shader_tests.rs"]
mod tests;
