/// Descriptor set layouts, the descriptor pool and descriptor set writes
///
/// Sampler bindings are partially bound so material textures can be filled in
/// lazily. Layouts without dynamic uniform buffers are also update-after-bind,
/// which lets texture slots be rewritten while earlier frames still use the
/// set. Vulkan forbids update-after-bind on dynamic uniform buffers, so sets of
/// such layouts are only written once the graphics queue is idle.

use ash::vk;
use prism_engine::graphics_device::{DescriptorBindingDesc, DescriptorSetLayoutDesc, DescriptorType, DescriptorWrite};
use prism_engine::prism::{Error, Result};
use prism_engine::{engine_bail, engine_err, engine_error};

use crate::vulkan_format::{descriptor_type_to_vk, stage_flags_to_vk};

const POOL_MAX_SETS: u32 = 1024;
const POOL_UNIFORM_DESCRIPTORS: u32 = 1024;
const POOL_SAMPLER_DESCRIPTORS: u32 = 8192;

/// Vulkan descriptor set layout
pub(crate) struct DescriptorSetLayout {
    pub layout: vk::DescriptorSetLayout,
    pub bindings: Vec<DescriptorBindingDesc>,
    /// Descriptor count of the variable-count binding, if the layout has one
    pub variable_count: Option<u32>,
    pub update_after_bind: bool,
}

/// Vulkan descriptor set
pub(crate) struct DescriptorSet {
    pub set: vk::DescriptorSet,
    /// Copied from the layout, which may be destroyed while the set lives
    pub bindings: Vec<DescriptorBindingDesc>,
    pub update_after_bind: bool,
}

/// Per-binding flags and whether the layout can use update-after-bind
pub(crate) fn binding_flags(desc: &DescriptorSetLayoutDesc) -> (Vec<vk::DescriptorBindingFlags>, bool) {
    let update_after_bind = !desc
        .bindings
        .iter()
        .any(|b| b.descriptor_type == DescriptorType::UniformBufferDynamic);

    let flags = desc
        .bindings
        .iter()
        .map(|b| match b.descriptor_type {
            DescriptorType::UniformBufferDynamic => vk::DescriptorBindingFlags::empty(),
            DescriptorType::CombinedImageSampler => {
                let mut flags = vk::DescriptorBindingFlags::PARTIALLY_BOUND;
                if b.variable_count {
                    flags |= vk::DescriptorBindingFlags::VARIABLE_DESCRIPTOR_COUNT;
                }
                if update_after_bind {
                    flags |= vk::DescriptorBindingFlags::UPDATE_AFTER_BIND;
                }
                flags
            }
        })
        .collect();

    (flags, update_after_bind)
}

/// Check the constraints Vulkan puts on a layout before creating it
pub(crate) fn validate_layout(desc: &DescriptorSetLayoutDesc) -> Result<()> {
    let variable: Vec<_> = desc.bindings.iter().filter(|b| b.variable_count).collect();
    if variable.len() > 1 {
        engine_bail!("prism::vulkan" => Error::InvalidResource,
            "Descriptor set layout has {} variable-count bindings, at most one is allowed", variable.len());
    }
    if let Some(var_binding) = variable.first() {
        if var_binding.descriptor_type != DescriptorType::CombinedImageSampler {
            engine_bail!("prism::vulkan" => Error::InvalidResource,
                "Variable-count binding {} must be a combined image sampler", var_binding.binding);
        }
        let highest = desc.bindings.iter().map(|b| b.binding).max().unwrap_or(0);
        if var_binding.binding != highest {
            engine_bail!("prism::vulkan" => Error::InvalidResource,
                "Variable-count binding {} must be the highest binding of its set (highest is {})",
                var_binding.binding, highest);
        }
    }
    for (i, b) in desc.bindings.iter().enumerate() {
        if b.count == 0 {
            engine_bail!("prism::vulkan" => Error::InvalidResource,
                "Binding {} has a descriptor count of 0", b.binding);
        }
        if desc.bindings[..i].iter().any(|other| other.binding == b.binding) {
            engine_bail!("prism::vulkan" => Error::InvalidResource,
                "Binding {} declared twice in one descriptor set layout", b.binding);
        }
    }
    Ok(())
}

impl DescriptorSetLayout {
    pub fn new(device: &ash::Device, desc: &DescriptorSetLayoutDesc) -> Result<Self> {
        validate_layout(desc)?;

        let bindings: Vec<vk::DescriptorSetLayoutBinding> = desc
            .bindings
            .iter()
            .map(|b| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(b.binding)
                    .descriptor_type(descriptor_type_to_vk(b.descriptor_type))
                    .descriptor_count(b.count)
                    .stage_flags(stage_flags_to_vk(b.stages))
            })
            .collect();

        let (flags, update_after_bind) = binding_flags(desc);
        let mut binding_flags_info = vk::DescriptorSetLayoutBindingFlagsCreateInfo::default()
            .binding_flags(&flags);

        let layout_flags = if update_after_bind {
            vk::DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL
        } else {
            vk::DescriptorSetLayoutCreateFlags::empty()
        };

        let create_info = vk::DescriptorSetLayoutCreateInfo::default()
            .flags(layout_flags)
            .bindings(&bindings)
            .push_next(&mut binding_flags_info);

        let layout = unsafe {
            device.create_descriptor_set_layout(&create_info, None)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to create descriptor set layout: {:?}", e))?
        };

        Ok(Self {
            layout,
            bindings: desc.bindings.clone(),
            variable_count: desc.bindings.iter().find(|b| b.variable_count).map(|b| b.count),
            update_after_bind,
        })
    }
}

/// Create the single descriptor pool every set is allocated from
pub(crate) fn create_descriptor_pool(device: &ash::Device) -> Result<vk::DescriptorPool> {
    let pool_sizes = [
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
            descriptor_count: POOL_UNIFORM_DESCRIPTORS,
        },
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            descriptor_count: POOL_SAMPLER_DESCRIPTORS,
        },
    ];
    let info = vk::DescriptorPoolCreateInfo::default()
        .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET
            | vk::DescriptorPoolCreateFlags::UPDATE_AFTER_BIND)
        .pool_sizes(&pool_sizes)
        .max_sets(POOL_MAX_SETS);

    unsafe {
        device.create_descriptor_pool(&info, None)
            .map_err(|e| {
                engine_error!("prism::vulkan", "Failed to create descriptor pool: {:?}", e);
                Error::InitializationFailed(format!("Failed to create descriptor pool: {:?}", e))
            })
    }
}

/// Allocate one set per layout, variable-count bindings get their full count
pub(crate) fn allocate_sets(
    device: &ash::Device,
    pool: vk::DescriptorPool,
    layouts: &[&DescriptorSetLayout],
) -> Result<Vec<vk::DescriptorSet>> {
    let vk_layouts: Vec<vk::DescriptorSetLayout> = layouts.iter().map(|l| l.layout).collect();
    let counts: Vec<u32> = layouts.iter().map(|l| l.variable_count.unwrap_or(0)).collect();

    let mut variable_info = vk::DescriptorSetVariableDescriptorCountAllocateInfo::default()
        .descriptor_counts(&counts);
    let mut alloc_info = vk::DescriptorSetAllocateInfo::default()
        .descriptor_pool(pool)
        .set_layouts(&vk_layouts);
    if layouts.iter().any(|l| l.variable_count.is_some()) {
        alloc_info = alloc_info.push_next(&mut variable_info);
    }

    unsafe {
        device.allocate_descriptor_sets(&alloc_info).map_err(|e| match e {
            vk::Result::ERROR_OUT_OF_POOL_MEMORY | vk::Result::ERROR_FRAGMENTED_POOL => {
                engine_err!("prism::vulkan" => Error::ResourceExhausted,
                    "Descriptor pool exhausted allocating {} set(s)", layouts.len())
            }
            other => engine_err!("prism::vulkan", "Failed to allocate descriptor sets: {:?}", other),
        })
    }
}

/// Check `writes` against the bindings of the set they target
pub(crate) fn validate_writes(bindings: &[DescriptorBindingDesc], writes: &[DescriptorWrite]) -> Result<()> {
    for write in writes {
        let (binding, expected) = match write {
            DescriptorWrite::UniformBuffer { binding, .. } => (*binding, DescriptorType::UniformBufferDynamic),
            DescriptorWrite::Textures { binding, .. } => (*binding, DescriptorType::CombinedImageSampler),
        };
        let Some(desc) = bindings.iter().find(|b| b.binding == binding) else {
            engine_bail!("prism::vulkan" => Error::InvalidResource,
                "Descriptor set has no binding {}", binding);
        };
        if desc.descriptor_type != expected {
            engine_bail!("prism::vulkan" => Error::InvalidResource,
                "Binding {} is {:?}, cannot write {:?} to it", binding, desc.descriptor_type, expected);
        }
        match write {
            DescriptorWrite::UniformBuffer { range, .. } if *range == 0 => {
                engine_bail!("prism::vulkan" => Error::InvalidResource,
                    "Uniform buffer write to binding {} has an empty range", binding);
            }
            DescriptorWrite::Textures { first_element, textures, .. } => {
                let end = *first_element as u64 + textures.len() as u64;
                if end > desc.count as u64 {
                    engine_bail!("prism::vulkan" => Error::InvalidResource,
                        "Texture write {}..{} exceeds the {} element(s) of binding {}",
                        first_element, end, desc.count, binding);
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// A descriptor write with every handle resolved to Vulkan objects
pub(crate) enum ResolvedWrite {
    UniformBuffer {
        binding: u32,
        buffer: vk::Buffer,
        offset: u64,
        range: u64,
    },
    Images {
        binding: u32,
        first_element: u32,
        images: Vec<(vk::ImageView, vk::Sampler)>,
    },
}

/// Apply `writes` to `set`
///
/// # Safety
///
/// Unless the set's layout is update-after-bind, no pending command buffer may use the set.
pub(crate) unsafe fn write_set(device: &ash::Device, set: vk::DescriptorSet, writes: &[ResolvedWrite]) {
    // Info arrays must outlive the vk::WriteDescriptorSet values pointing at them
    let buffer_infos: Vec<[vk::DescriptorBufferInfo; 1]> = writes
        .iter()
        .filter_map(|w| match w {
            ResolvedWrite::UniformBuffer { buffer, offset, range, .. } => Some([vk::DescriptorBufferInfo {
                buffer: *buffer,
                offset: *offset,
                range: *range,
            }]),
            ResolvedWrite::Images { .. } => None,
        })
        .collect();
    let image_infos: Vec<Vec<vk::DescriptorImageInfo>> = writes
        .iter()
        .filter_map(|w| match w {
            ResolvedWrite::Images { images, .. } => Some(
                images
                    .iter()
                    .map(|(view, sampler)| vk::DescriptorImageInfo {
                        sampler: *sampler,
                        image_view: *view,
                        image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                    })
                    .collect(),
            ),
            ResolvedWrite::UniformBuffer { .. } => None,
        })
        .collect();

    let mut buffer_iter = buffer_infos.iter();
    let mut image_iter = image_infos.iter();
    let mut vk_writes = Vec::with_capacity(writes.len());
    for write in writes {
        match write {
            ResolvedWrite::UniformBuffer { binding, .. } => {
                if let Some(info) = buffer_iter.next() {
                    vk_writes.push(vk::WriteDescriptorSet::default()
                        .dst_set(set)
                        .dst_binding(*binding)
                        .dst_array_element(0)
                        .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC)
                        .buffer_info(info));
                }
            }
            ResolvedWrite::Images { binding, first_element, .. } => {
                if let Some(info) = image_iter.next() {
                    if info.is_empty() {
                        continue;
                    }
                    vk_writes.push(vk::WriteDescriptorSet::default()
                        .dst_set(set)
                        .dst_binding(*binding)
                        .dst_array_element(*first_element)
                        .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                        .image_info(info));
                }
            }
        }
    }

    device.update_descriptor_sets(&vk_writes, &[]);
}

#[cfg(test)]
#[path = "vulkan_descriptor_set_tests.rs"]
mod tests;
