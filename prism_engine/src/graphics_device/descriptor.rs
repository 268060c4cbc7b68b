/// Descriptor set layouts and descriptor writes

use crate::graphics_device::{BufferHandle, ShaderStageFlags, TextureHandle};

/// Descriptor count given to sampler arrays declared without a size
pub const DEFAULT_SAMPLER_ARRAY_SIZE: u32 = 32;

/// Kind of resource a descriptor binding refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorType {
    /// Uniform buffer whose offset is supplied at bind time
    UniformBufferDynamic,
    /// Combined image + sampler
    CombinedImageSampler,
}

/// One binding inside a descriptor set layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorBindingDesc {
    pub binding: u32,
    pub descriptor_type: DescriptorType,
    pub count: u32,
    pub stages: ShaderStageFlags,
    /// Variable-count, partially bound, update-after-bind array
    pub variable_count: bool,
}

/// Descriptor set layout descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptorSetLayoutDesc {
    pub bindings: Vec<DescriptorBindingDesc>,
}

impl DescriptorSetLayoutDesc {
    pub fn has_variable_count(&self) -> bool {
        self.bindings.iter().any(|b| b.variable_count)
    }
}

/// One update applied to a descriptor set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorWrite {
    /// Point a dynamic uniform binding at `range` bytes of `buffer` starting at `offset`
    UniformBuffer {
        binding: u32,
        buffer: BufferHandle,
        offset: u64,
        range: u64,
    },
    /// Write textures into consecutive array elements starting at `first_element`
    Textures {
        binding: u32,
        first_element: u32,
        textures: Vec<TextureHandle>,
    },
}
