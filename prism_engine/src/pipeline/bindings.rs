/// Binding records aggregated from shader reflection

use crate::graphics_device::{
    BindingKey, PushConstantRange, SamplerDimension, ShaderStageFlags, TextureHandle, UniformMember,
};
use crate::memory::UniformAllocation;
use crate::resource::MaterialHandle;

/// Identifies one push constant block: the stage that declared it and its
/// declaration index inside that stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PushConstantKey {
    pub stages: ShaderStageFlags,
    pub index: u32,
}

/// A (binding, material) pair addressing one material's slice of a default uniform buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialKey {
    pub binding: BindingKey,
    pub material_id: u32,
}

/// Uniform block visible to the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBinding {
    pub name: String,
    pub key: BindingKey,
    pub size: u32,
    pub count: u32,
    pub per_object: bool,
    pub members: Vec<UniformMember>,
    pub stages: ShaderStageFlags,
    /// Block size rounded up to the uniform offset alignment
    pub object_size_aligned: u64,
}

impl UniformBinding {
    pub fn member(&self, name: &str) -> Option<&UniformMember> {
        self.members.iter().find(|m| m.name == name)
    }
}

/// Combined image sampler (or array) visible to the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerBinding {
    pub name: String,
    pub key: BindingKey,
    /// Descriptor count in the layout
    pub count: u32,
    pub dimension: SamplerDimension,
    /// Runtime-sized array (variable count, partially bound, update after bind)
    pub variable_count: bool,
    pub stages: ShaderStageFlags,
    /// Textures currently written into the binding, by array element
    pub bound: Vec<TextureHandle>,
}

/// Push constant range after merging all stages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedPushConstant {
    pub name: String,
    pub range: PushConstantRange,
}

/// Default uniform buffer of one binding, replicated per swapchain image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultUniformBuffer {
    pub per_image: Vec<UniformAllocation>,
    /// Number of object-sized slots in each replica
    pub slots: u32,
}

/// Material attached to a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundMaterial {
    pub handle: MaterialHandle,
    /// Number of per-object slots reserved for the material's instances
    pub instance_capacity: u32,
}
