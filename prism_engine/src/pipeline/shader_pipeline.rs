/// ShaderPipeline - a graphics pipeline plus everything needed to feed it
///
/// Built from a set of reflected shader stages. Construction merges the
/// stages' uniform blocks, samplers and push constant blocks into one
/// pipeline layout, validates the interface between consecutive stages and
/// allocates one descriptor set per layout per swapchain image.
///
/// Materials attach to a pipeline and receive a small numeric ID (lowest free
/// ID first). Every uniform binding that the application does not bind itself
/// gets a default uniform buffer replicated per swapchain image; each attached
/// material owns a slice of it, addressed at draw time with a dynamic offset.
/// Uniform blocks whose name contains "perObject" hold one slot per material
/// instance instead of one per material.
///
/// Attaching, detaching or resizing a material marks the pipeline dirty.
/// [`ShaderPipeline::allocate_resources`] must run before the next bind; it
/// carries every surviving material's uniform bytes over to the new layout.

use std::collections::BTreeMap;
use rustc_hash::FxHashMap;
use slotmap::new_key_type;
use crate::engine_bail;
use crate::engine_debug;
use crate::engine_err;
use crate::engine_warn;
use crate::error::{Error, Result};
use crate::graphics_device::{
    BindingKey, ColorBlendState, CommandList, DepthState, DescriptorBindingDesc,
    DescriptorSetHandle, DescriptorSetLayoutDesc, DescriptorSetLayoutHandle, DescriptorType,
    DescriptorWrite, GraphicsDevice, PipelineDesc, PipelineHandle, PrimitiveTopology,
    PushConstantRange, RasterizationState, SamplerDimension, ShaderModule, ShaderStage,
    StageVariable, TextureHandle, VertexLayout, DEFAULT_SAMPLER_ARRAY_SIZE,
};
use crate::memory::{align_up, UniformAllocation, UniformBuffer};
use crate::pipeline::{
    BoundMaterial, DefaultUniformBuffer, MaterialKey, MergedPushConstant, PushConstantKey,
    SamplerBinding, UniformBinding,
};
use crate::resource::MaterialHandle;
use crate::utils::SlotAllocator;

new_key_type! {
    /// Handle to a pipeline owned by the renderer
    pub struct ShaderPipelineKey;
}

/// One material's bytes in one image's replica, kept across reallocation
struct PreservedSlice {
    key: MaterialKey,
    image: usize,
    bytes: Vec<u8>,
}

/// Everything needed to build a [`ShaderPipeline`]
#[derive(Debug, Clone)]
pub struct ShaderPipelineDesc {
    pub name: String,
    /// Stages in pipeline order (vertex first)
    pub stages: Vec<ShaderModule>,
    pub vertex_layout: VertexLayout,
    pub topology: PrimitiveTopology,
    pub rasterization: RasterizationState,
    pub depth: DepthState,
    pub color_blend: ColorBlendState,
}

impl ShaderPipelineDesc {
    pub fn new(name: impl Into<String>, stages: Vec<ShaderModule>, vertex_layout: VertexLayout) -> Self {
        Self {
            name: name.into(),
            stages,
            vertex_layout,
            topology: PrimitiveTopology::TriangleList,
            rasterization: RasterizationState::default(),
            depth: DepthState::default(),
            color_blend: ColorBlendState::default(),
        }
    }
}

pub struct ShaderPipeline {
    name: String,
    stage_names: Vec<String>,
    pipeline: PipelineHandle,
    set_layouts: Vec<DescriptorSetLayoutHandle>,
    image_count: u32,
    /// `image_count * set_layouts.len()` sets, grouped by image
    descriptor_sets: Vec<DescriptorSetHandle>,
    uniform_alignment: u64,

    uniform_bindings: BTreeMap<BindingKey, UniformBinding>,
    sampler_bindings: BTreeMap<BindingKey, SamplerBinding>,
    push_constants: Vec<MergedPushConstant>,
    push_constant_keys: FxHashMap<PushConstantKey, usize>,

    default_uniform_buffers: BTreeMap<BindingKey, DefaultUniformBuffer>,
    user_uniform_buffers: FxHashMap<BindingKey, UniformAllocation>,
    material_buffer_offsets: FxHashMap<MaterialKey, u64>,
    /// Material owning each ID when the default buffers were last laid out
    allocated_materials: FxHashMap<u32, MaterialHandle>,

    bound_materials: BTreeMap<u32, BoundMaterial>,
    material_ids: FxHashMap<MaterialHandle, u32>,
    material_id_allocator: SlotAllocator,
    resources_dirty: bool,
}

impl ShaderPipeline {
    /// Build the pipeline layout and the pipeline itself
    pub fn new(device: &mut dyn GraphicsDevice, desc: ShaderPipelineDesc) -> Result<Self> {
        if desc.stages.is_empty() {
            engine_bail!("prism::ShaderPipeline" => Error::InvalidResource,
                "[ShaderPipeline] '{}' has no shader stages", desc.name);
        }

        validate_stage_interfaces(&desc.name, &desc.stages)?;
        validate_vertex_inputs(&desc.name, &desc.stages[0], &desc.vertex_layout)?;

        let limits = device.limits();
        let uniform_alignment = limits.min_uniform_buffer_offset_alignment.max(1).next_power_of_two();
        let (uniform_bindings, sampler_bindings) = merge_bindings(&desc.name, &desc.stages, uniform_alignment)?;
        let (push_constants, push_constant_keys) = merge_push_constants(&desc.stages);

        if let Some(end) = push_constants.iter().map(|p| p.range.end()).max() {
            if end > limits.max_push_constants_size {
                engine_bail!("prism::ShaderPipeline" => Error::InvalidResource,
                    "[ShaderPipeline] '{}' push constants use {} bytes, device allows {}",
                    desc.name, end, limits.max_push_constants_size);
            }
        }

        let layout_descs = build_set_layouts(&uniform_bindings, &sampler_bindings);
        if layout_descs.len() as u32 > limits.max_bound_descriptor_sets {
            engine_bail!("prism::ShaderPipeline" => Error::InvalidResource,
                "[ShaderPipeline] '{}' uses {} descriptor sets, device allows {}",
                desc.name, layout_descs.len(), limits.max_bound_descriptor_sets);
        }

        let mut set_layouts = Vec::with_capacity(layout_descs.len());
        for layout_desc in &layout_descs {
            set_layouts.push(device.create_descriptor_set_layout(layout_desc)?);
        }

        let pipeline = device.create_pipeline(&PipelineDesc {
            name: desc.name.clone(),
            stages: desc.stages.iter()
                .map(|s| (s.stage, s.handle, s.entry_point.clone()))
                .collect(),
            vertex_layout: desc.vertex_layout.clone(),
            topology: desc.topology,
            push_constant_ranges: push_constants.iter().map(|p| p.range).collect(),
            descriptor_set_layouts: set_layouts.clone(),
            rasterization: desc.rasterization,
            depth: desc.depth,
            color_blend: desc.color_blend,
        })?;

        let image_count = device.swapchain_image_count();
        let descriptor_sets = if set_layouts.is_empty() {
            Vec::new()
        } else {
            let per_image: Vec<_> = (0..image_count)
                .flat_map(|_| set_layouts.iter().copied())
                .collect();
            device.allocate_descriptor_sets(&per_image)?
        };

        engine_debug!("prism::ShaderPipeline",
            "'{}' created: {} stages, {} uniform bindings, {} sampler bindings, {} push constant ranges, {} set layouts",
            desc.name, desc.stages.len(), uniform_bindings.len(), sampler_bindings.len(),
            push_constants.len(), set_layouts.len());

        Ok(Self {
            name: desc.name,
            stage_names: desc.stages.iter().map(|s| s.name.clone()).collect(),
            pipeline,
            set_layouts,
            image_count,
            descriptor_sets,
            uniform_alignment,
            uniform_bindings,
            sampler_bindings,
            push_constants,
            push_constant_keys,
            default_uniform_buffers: BTreeMap::new(),
            user_uniform_buffers: FxHashMap::default(),
            material_buffer_offsets: FxHashMap::default(),
            allocated_materials: FxHashMap::default(),
            bound_materials: BTreeMap::new(),
            material_ids: FxHashMap::default(),
            material_id_allocator: SlotAllocator::new(),
            resources_dirty: true,
        })
    }

    // ===== ACCESSORS =====

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stage_names(&self) -> &[String] {
        &self.stage_names
    }

    pub fn pipeline(&self) -> PipelineHandle {
        self.pipeline
    }

    pub fn set_layouts(&self) -> &[DescriptorSetLayoutHandle] {
        &self.set_layouts
    }

    pub fn descriptor_sets(&self, image_index: u32) -> &[DescriptorSetHandle] {
        let count = self.set_layouts.len();
        let start = image_index as usize * count;
        self.descriptor_sets.get(start..start + count).unwrap_or(&[])
    }

    pub fn uniform_alignment(&self) -> u64 {
        self.uniform_alignment
    }

    pub fn image_count(&self) -> u32 {
        self.image_count
    }

    pub fn uniform_bindings(&self) -> impl Iterator<Item = &UniformBinding> {
        self.uniform_bindings.values()
    }

    pub fn sampler_bindings(&self) -> impl Iterator<Item = &SamplerBinding> {
        self.sampler_bindings.values()
    }

    pub fn uniform_binding(&self, name: &str) -> Option<&UniformBinding> {
        self.uniform_bindings.values().find(|b| b.name == name)
    }

    pub fn sampler_binding(&self, name: &str) -> Option<&SamplerBinding> {
        self.sampler_bindings.values().find(|b| b.name == name)
    }

    pub fn push_constants(&self) -> &[MergedPushConstant] {
        &self.push_constants
    }

    /// Merged range that contains the given stage's push constant block
    pub fn push_constant_range(&self, key: PushConstantKey) -> Option<&PushConstantRange> {
        self.push_constant_keys.get(&key).map(|&i| &self.push_constants[i].range)
    }

    pub fn default_uniform_buffer(&self, key: BindingKey) -> Option<&DefaultUniformBuffer> {
        self.default_uniform_buffers.get(&key)
    }

    /// Offset of a material's slice inside a default uniform buffer
    pub fn material_buffer_offset(&self, key: BindingKey, material_id: u32) -> Option<u64> {
        self.material_buffer_offsets.get(&MaterialKey { binding: key, material_id }).copied()
    }

    pub fn material_id(&self, material: MaterialHandle) -> Option<u32> {
        self.material_ids.get(&material).copied()
    }

    pub fn material_count(&self) -> usize {
        self.bound_materials.len()
    }

    /// True when attachments changed since the last `allocate_resources`
    pub fn needs_allocation(&self) -> bool {
        self.resources_dirty
    }

    // ===== MATERIALS =====

    /// Attach a material and return its pipeline-local ID
    ///
    /// Attaching an already attached material returns its existing ID.
    pub fn on_attach(&mut self, material: MaterialHandle) -> u32 {
        if let Some(&id) = self.material_ids.get(&material) {
            return id;
        }

        let id = self.material_id_allocator.alloc();
        self.material_ids.insert(material, id);
        self.bound_materials.insert(id, BoundMaterial { handle: material, instance_capacity: 0 });
        self.resources_dirty = true;
        engine_debug!("prism::ShaderPipeline", "'{}' attached material {}", self.name, id);
        id
    }

    /// Detach a material, freeing its ID for reuse
    pub fn on_detach(&mut self, material: MaterialHandle) -> Result<u32> {
        let Some(id) = self.material_ids.remove(&material) else {
            engine_bail!("prism::ShaderPipeline" => Error::InvalidResource,
                "[ShaderPipeline] '{}': detaching a material that is not attached", self.name);
        };
        self.bound_materials.remove(&id);
        self.material_id_allocator.free(id);
        self.resources_dirty = true;
        engine_debug!("prism::ShaderPipeline", "'{}' detached material {}", self.name, id);
        Ok(id)
    }

    /// Reserve per-object uniform slots for a material's instances
    pub fn set_instance_capacity(&mut self, material_id: u32, capacity: u32) -> Result<()> {
        let Some(bound) = self.bound_materials.get_mut(&material_id) else {
            engine_bail!("prism::ShaderPipeline" => Error::InvalidResource,
                "[ShaderPipeline] '{}': material {} is not attached", self.name, material_id);
        };
        if bound.instance_capacity != capacity {
            bound.instance_capacity = capacity;
            self.resources_dirty = true;
        }
        Ok(())
    }

    // ===== RESOURCES =====

    /// (Re)allocate the default uniform buffers and rewrite uniform descriptors
    ///
    /// Non-per-object bindings get one slot per attached material, per-object
    /// bindings one slot per material instance. Slices are laid out in
    /// material ID order. Materials still attached keep their bytes, truncated
    /// when their slice shrank. The GPU must not be reading the old slices.
    pub fn allocate_resources(
        &mut self,
        device: &mut dyn GraphicsDevice,
        uniform_buffer: &mut UniformBuffer,
    ) -> Result<()> {
        let preserved = self.read_surviving_slices(&*device)?;
        self.release_default_buffers(uniform_buffer)?;

        let materials: Vec<(u32, u32)> = self.bound_materials.iter()
            .map(|(&id, m)| (id, m.instance_capacity.max(1)))
            .collect();

        for (key, binding) in &self.uniform_bindings {
            if self.user_uniform_buffers.contains_key(key) {
                continue;
            }

            let mut running = 0u64;
            for &(material_id, capacity) in &materials {
                self.material_buffer_offsets.insert(
                    MaterialKey { binding: *key, material_id },
                    running * binding.object_size_aligned,
                );
                running += if binding.per_object { capacity as u64 } else { 1 };
            }
            let slots = running.max(1);

            let mut per_image = Vec::with_capacity(self.image_count as usize);
            for _ in 0..self.image_count {
                per_image.push(uniform_buffer.allocate(slots * binding.object_size_aligned)?);
            }
            self.default_uniform_buffers.insert(*key, DefaultUniformBuffer { per_image, slots: slots as u32 });
        }
        self.allocated_materials = self.bound_materials.iter()
            .map(|(&id, m)| (id, m.handle))
            .collect();

        for slice in &preserved {
            let binding = &self.uniform_bindings[&slice.key.binding];
            let (Some(dub), Some(&offset)) = (
                self.default_uniform_buffers.get(&slice.key.binding),
                self.material_buffer_offsets.get(&slice.key),
            ) else {
                continue;
            };
            let span = self.material_slots(slice.key.material_id, binding) * binding.object_size_aligned;
            let len = (slice.bytes.len() as u64).min(span) as usize;
            uniform_buffer.write(device, &dub.per_image[slice.image], offset, &slice.bytes[..len])?;
        }

        for image in 0..self.image_count {
            for set in 0..self.set_layouts.len() as u32 {
                let writes: Vec<DescriptorWrite> = self.uniform_bindings.iter()
                    .filter(|(key, _)| key.set == set)
                    .filter_map(|(key, binding)| {
                        let allocation = match self.user_uniform_buffers.get(key) {
                            Some(user) => *user,
                            None => self.default_uniform_buffers.get(key)?.per_image[image as usize],
                        };
                        Some(DescriptorWrite::UniformBuffer {
                            binding: key.binding,
                            buffer: allocation.buffer,
                            offset: allocation.offset,
                            range: binding.size as u64,
                        })
                    })
                    .collect();
                if !writes.is_empty() {
                    let handle = self.descriptor_set(image, set)?;
                    device.update_descriptor_set(handle, &writes)?;
                }
            }
        }

        self.resources_dirty = false;
        engine_debug!("prism::ShaderPipeline", "'{}' allocated uniform storage for {} materials",
            self.name, materials.len());
        Ok(())
    }

    /// Use an application-owned uniform slice for a binding instead of a default buffer
    pub fn bind_uniform_buffer(&mut self, binding_name: &str, allocation: UniformAllocation) -> Result<()> {
        let key = self.uniform_key(binding_name)?;
        let size = self.uniform_bindings[&key].size as u64;
        if allocation.size < size {
            engine_bail!("prism::ShaderPipeline" => Error::InvalidResource,
                "[ShaderPipeline] '{}': uniform '{}' needs {} bytes, bound slice has {}",
                self.name, binding_name, size, allocation.size);
        }
        self.user_uniform_buffers.insert(key, allocation);
        self.resources_dirty = true;
        Ok(())
    }

    /// Write a whole uniform block for a material (and object slot for per-object blocks)
    ///
    /// `image_index` of None writes every swapchain image's replica.
    #[allow(clippy::too_many_arguments)]
    pub fn write_uniform(
        &self,
        device: &mut dyn GraphicsDevice,
        uniform_buffer: &UniformBuffer,
        image_index: Option<u32>,
        binding_name: &str,
        material_id: u32,
        object_index: Option<u32>,
        data: &[u8],
    ) -> Result<()> {
        let key = self.uniform_key(binding_name)?;
        let binding = &self.uniform_bindings[&key];
        if data.len() as u64 != binding.size as u64 {
            engine_bail!("prism::ShaderPipeline" => Error::InvalidResource,
                "[ShaderPipeline] '{}': uniform '{}' is {} bytes, got {}",
                self.name, binding_name, binding.size, data.len());
        }
        self.write_default(device, uniform_buffer, image_index, key, material_id, object_index, 0, data)
    }

    /// Write one member of a uniform block
    #[allow(clippy::too_many_arguments)]
    pub fn write_uniform_member(
        &self,
        device: &mut dyn GraphicsDevice,
        uniform_buffer: &UniformBuffer,
        image_index: Option<u32>,
        binding_name: &str,
        member_name: &str,
        material_id: u32,
        object_index: Option<u32>,
        data: &[u8],
    ) -> Result<()> {
        let key = self.uniform_key(binding_name)?;
        let Some(member) = self.uniform_bindings[&key].member(member_name) else {
            engine_bail!("prism::ShaderPipeline" => Error::InvalidResource,
                "[ShaderPipeline] '{}': uniform '{}' has no member '{}'",
                self.name, binding_name, member_name);
        };
        if data.len() as u64 != member.size as u64 {
            engine_bail!("prism::ShaderPipeline" => Error::InvalidResource,
                "[ShaderPipeline] '{}': member '{}.{}' is {} bytes, got {}",
                self.name, binding_name, member_name, member.size, data.len());
        }
        let offset = member.offset as u64;
        self.write_default(device, uniform_buffer, image_index, key, material_id, object_index, offset, data)
    }

    /// Append 2D textures to a sampler binding; returns the array indices used
    pub fn bind_textures_2d(
        &mut self,
        device: &mut dyn GraphicsDevice,
        binding_name: &str,
        textures: &[TextureHandle],
    ) -> Result<Vec<u32>> {
        self.bind_textures(device, binding_name, SamplerDimension::Texture2D, textures)
    }

    /// Append cubemaps to a sampler binding; returns the array indices used
    pub fn bind_cubemaps(
        &mut self,
        device: &mut dyn GraphicsDevice,
        binding_name: &str,
        textures: &[TextureHandle],
    ) -> Result<Vec<u32>> {
        self.bind_textures(device, binding_name, SamplerDimension::Cube, textures)
    }

    // ===== DRAW-TIME BINDING =====

    /// Bind the image's descriptor sets with the material's base offsets
    pub fn bind_descriptor_sets(
        &self,
        cmd: &mut dyn CommandList,
        image_index: u32,
        material_id: u32,
    ) -> Result<()> {
        let offsets = self.dynamic_offsets(material_id, None, &FxHashMap::default())?;
        self.bind_sets(cmd, image_index, &offsets)
    }

    /// Rebind the image's descriptor sets with per-object offsets
    ///
    /// Per-object bindings address slot `object_index` of the material's
    /// slice. Entries in `overrides` replace the computed per-object offset
    /// for their binding (relative to the material's base).
    pub fn set_dynamic_offsets(
        &self,
        cmd: &mut dyn CommandList,
        image_index: u32,
        material_id: u32,
        object_index: u32,
        overrides: &FxHashMap<BindingKey, u32>,
    ) -> Result<()> {
        let offsets = self.dynamic_offsets(material_id, Some(object_index), overrides)?;
        self.bind_sets(cmd, image_index, &offsets)
    }

    /// Dynamic offsets in binding order for one draw
    pub fn dynamic_offsets(
        &self,
        material_id: u32,
        object_index: Option<u32>,
        overrides: &FxHashMap<BindingKey, u32>,
    ) -> Result<Vec<u32>> {
        let Some(material) = self.bound_materials.get(&material_id) else {
            engine_bail!("prism::ShaderPipeline" => Error::InvalidResource,
                "[ShaderPipeline] '{}': material {} is not attached", self.name, material_id);
        };
        if self.resources_dirty {
            engine_bail!("prism::ShaderPipeline" => Error::InvalidState,
                "[ShaderPipeline] '{}': resources are stale, allocate_resources must run before binding",
                self.name);
        }
        if let Some(key) = overrides.keys().find(|k| !self.uniform_bindings.contains_key(k)) {
            engine_bail!("prism::ShaderPipeline" => Error::InvalidResource,
                "[ShaderPipeline] '{}': no uniform binding at {}", self.name, key);
        }

        let capacity = material.instance_capacity.max(1);
        let mut offsets = Vec::with_capacity(self.uniform_bindings.len());
        for (key, binding) in &self.uniform_bindings {
            let base = if self.user_uniform_buffers.contains_key(key) {
                0
            } else {
                self.material_buffer_offset(*key, material_id).ok_or_else(|| {
                    engine_err!("prism::ShaderPipeline" => Error::InvalidState,
                        "[ShaderPipeline] '{}': no uniform slice for material {} at {}",
                        self.name, material_id, key)
                })?
            };

            let extra = match overrides.get(key) {
                Some(&offset) => {
                    self.check_offset_override(*key, binding, material_id, offset as u64)?;
                    offset as u64
                }
                None if binding.per_object => {
                    let index = object_index.unwrap_or(0);
                    if index >= capacity {
                        engine_bail!("prism::ShaderPipeline" => Error::InvalidResource,
                            "[ShaderPipeline] '{}': object {} out of range for material {} ({} slots)",
                            self.name, index, material_id, capacity);
                    }
                    index as u64 * binding.object_size_aligned
                }
                None => 0,
            };
            offsets.push((base + extra) as u32);
        }
        Ok(offsets)
    }

    /// Release descriptor sets, the pipeline and its layouts
    pub fn destroy(self, device: &mut dyn GraphicsDevice, uniform_buffer: &mut UniformBuffer) -> Result<()> {
        for (_, dub) in self.default_uniform_buffers {
            for allocation in dub.per_image {
                uniform_buffer.free(allocation)?;
            }
        }
        if !self.descriptor_sets.is_empty() {
            device.free_descriptor_sets(&self.descriptor_sets)?;
        }
        device.destroy_pipeline(self.pipeline)?;
        for layout in self.set_layouts {
            device.destroy_descriptor_set_layout(layout)?;
        }
        Ok(())
    }

    // ===== INTERNAL =====

    fn uniform_key(&self, name: &str) -> Result<BindingKey> {
        match self.uniform_bindings.values().find(|b| b.name == name) {
            Some(binding) => Ok(binding.key),
            None => engine_bail!("prism::ShaderPipeline" => Error::InvalidResource,
                "[ShaderPipeline] '{}' has no uniform named '{}'", self.name, name),
        }
    }

    fn descriptor_set(&self, image_index: u32, set: u32) -> Result<DescriptorSetHandle> {
        let index = (image_index as usize) * self.set_layouts.len() + set as usize;
        match self.descriptor_sets.get(index) {
            Some(handle) => Ok(*handle),
            None => engine_bail!("prism::ShaderPipeline" => Error::InvalidResource,
                "[ShaderPipeline] '{}': no descriptor set {} for image {}", self.name, set, image_index),
        }
    }

    fn bind_sets(&self, cmd: &mut dyn CommandList, image_index: u32, offsets: &[u32]) -> Result<()> {
        if image_index >= self.image_count {
            engine_bail!("prism::ShaderPipeline" => Error::InvalidResource,
                "[ShaderPipeline] '{}': image index {} out of range ({} images)",
                self.name, image_index, self.image_count);
        }
        let sets = self.descriptor_sets(image_index);
        if sets.is_empty() {
            return Ok(());
        }
        cmd.bind_descriptor_sets(self.pipeline, 0, sets, offsets)
    }

    /// Object slots a material owns in a default buffer of `binding`
    fn material_slots(&self, material_id: u32, binding: &UniformBinding) -> u64 {
        if !binding.per_object {
            return 1;
        }
        self.bound_materials.get(&material_id)
            .map_or(1, |m| m.instance_capacity.max(1) as u64)
    }

    /// An override must stay aligned and keep the whole block inside the
    /// slice the material's dynamic offset addresses
    fn check_offset_override(&self, key: BindingKey, binding: &UniformBinding, material_id: u32, offset: u64) -> Result<()> {
        if offset % self.uniform_alignment != 0 {
            engine_bail!("prism::ShaderPipeline" => Error::InvalidResource,
                "[ShaderPipeline] '{}': offset {} for uniform '{}' is not a multiple of {}",
                self.name, offset, binding.name, self.uniform_alignment);
        }
        let slice = match self.user_uniform_buffers.get(&key) {
            Some(user) => user.size,
            None => self.material_slots(material_id, binding) * binding.object_size_aligned,
        };
        if offset + binding.size as u64 > slice {
            engine_bail!("prism::ShaderPipeline" => Error::InvalidResource,
                "[ShaderPipeline] '{}': offset {} for uniform '{}' ({} bytes) leaves the {} byte slice of material {}",
                self.name, offset, binding.name, binding.size, slice, material_id);
        }
        Ok(())
    }

    /// Copy out every per-image slice whose material is still attached
    fn read_surviving_slices(&self, device: &dyn GraphicsDevice) -> Result<Vec<PreservedSlice>> {
        let mut preserved = Vec::new();
        for (key, dub) in &self.default_uniform_buffers {
            let binding = &self.uniform_bindings[key];
            let total = dub.slots as u64 * binding.object_size_aligned;
            let mut starts: Vec<(u32, u64)> = self.material_buffer_offsets.iter()
                .filter(|(m, _)| m.binding == *key)
                .map(|(m, &offset)| (m.material_id, offset))
                .collect();
            starts.sort_by_key(|&(_, offset)| offset);

            for (i, &(material_id, offset)) in starts.iter().enumerate() {
                let owner = self.allocated_materials.get(&material_id);
                let survives = self.bound_materials.get(&material_id)
                    .is_some_and(|m| owner == Some(&m.handle));
                if !survives || self.user_uniform_buffers.contains_key(key) {
                    continue;
                }
                let end = starts.get(i + 1).map_or(total, |&(_, next)| next);
                for (image, allocation) in dub.per_image.iter().enumerate() {
                    preserved.push(PreservedSlice {
                        key: MaterialKey { binding: *key, material_id },
                        image,
                        bytes: device.read_buffer(allocation.buffer, allocation.offset + offset, end - offset)?,
                    });
                }
            }
        }
        Ok(preserved)
    }

    fn release_default_buffers(&mut self, uniform_buffer: &mut UniformBuffer) -> Result<()> {
        for (_, dub) in std::mem::take(&mut self.default_uniform_buffers) {
            for allocation in dub.per_image {
                uniform_buffer.free(allocation)?;
            }
        }
        self.material_buffer_offsets.clear();
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn write_default(
        &self,
        device: &mut dyn GraphicsDevice,
        uniform_buffer: &UniformBuffer,
        image_index: Option<u32>,
        key: BindingKey,
        material_id: u32,
        object_index: Option<u32>,
        offset_in_object: u64,
        data: &[u8],
    ) -> Result<()> {
        let binding = &self.uniform_bindings[&key];
        if self.user_uniform_buffers.contains_key(&key) {
            engine_bail!("prism::ShaderPipeline" => Error::InvalidState,
                "[ShaderPipeline] '{}': uniform '{}' is bound to an application buffer",
                self.name, binding.name);
        }
        let Some(dub) = self.default_uniform_buffers.get(&key) else {
            engine_bail!("prism::ShaderPipeline" => Error::InvalidState,
                "[ShaderPipeline] '{}': uniform '{}' has no storage yet, allocate_resources must run first",
                self.name, binding.name);
        };
        let Some(base) = self.material_buffer_offset(key, material_id) else {
            engine_bail!("prism::ShaderPipeline" => Error::InvalidResource,
                "[ShaderPipeline] '{}': material {} has no slice of uniform '{}'",
                self.name, material_id, binding.name);
        };

        let object = if binding.per_object {
            let capacity = self.bound_materials.get(&material_id)
                .map(|m| m.instance_capacity.max(1))
                .unwrap_or(1);
            let index = object_index.unwrap_or(0);
            if index >= capacity {
                engine_bail!("prism::ShaderPipeline" => Error::InvalidResource,
                    "[ShaderPipeline] '{}': object {} out of range for material {} ({} slots)",
                    self.name, index, material_id, capacity);
            }
            index as u64 * binding.object_size_aligned
        } else {
            0
        };

        let offset = base + object + offset_in_object;
        match image_index {
            Some(image) => {
                let Some(allocation) = dub.per_image.get(image as usize) else {
                    engine_bail!("prism::ShaderPipeline" => Error::InvalidResource,
                        "[ShaderPipeline] '{}': image index {} out of range", self.name, image);
                };
                uniform_buffer.write(device, allocation, offset, data)
            }
            None => {
                for allocation in &dub.per_image {
                    uniform_buffer.write(device, allocation, offset, data)?;
                }
                Ok(())
            }
        }
    }

    fn bind_textures(
        &mut self,
        device: &mut dyn GraphicsDevice,
        binding_name: &str,
        dimension: SamplerDimension,
        textures: &[TextureHandle],
    ) -> Result<Vec<u32>> {
        let Some(key) = self.sampler_bindings.values().find(|b| b.name == binding_name).map(|b| b.key) else {
            engine_bail!("prism::ShaderPipeline" => Error::InvalidResource,
                "[ShaderPipeline] '{}' has no sampler named '{}'", self.name, binding_name);
        };
        let pipeline_name = &self.name;
        let Some(binding) = self.sampler_bindings.get_mut(&key) else {
            engine_bail!("prism::ShaderPipeline" => Error::InvalidResource,
                "[ShaderPipeline] '{}' has no sampler at {}", pipeline_name, key);
        };

        if binding.dimension != dimension {
            engine_bail!("prism::ShaderPipeline" => Error::InvalidResource,
                "[ShaderPipeline] '{}': sampler '{}' is {:?}, cannot bind {:?} textures",
                pipeline_name, binding_name, binding.dimension, dimension);
        }
        if textures.is_empty() {
            return Ok(Vec::new());
        }

        let first = if binding.count == 1 {
            if textures.len() != 1 {
                engine_bail!("prism::ShaderPipeline" => Error::InvalidResource,
                    "[ShaderPipeline] '{}': sampler '{}' takes a single texture, got {}",
                    pipeline_name, binding_name, textures.len());
            }
            binding.bound.clear();
            0
        } else {
            let first = binding.bound.len() as u32;
            if first + textures.len() as u32 > binding.count {
                engine_bail!("prism::ShaderPipeline" => Error::ResourceExhausted,
                    "[ShaderPipeline] '{}': sampler array '{}' is full ({} of {} used, {} requested)",
                    pipeline_name, binding_name, first, binding.count, textures.len());
            }
            first
        };
        binding.bound.extend_from_slice(textures);

        let write = DescriptorWrite::Textures {
            binding: key.binding,
            first_element: first,
            textures: textures.to_vec(),
        };
        for image in 0..self.image_count {
            let set = self.descriptor_set(image, key.set)?;
            device.update_descriptor_set(set, std::slice::from_ref(&write))?;
        }

        Ok((first..first + textures.len() as u32).collect())
    }
}

// ============================================================================
// Layout construction
// ============================================================================

fn stage_label(module: &ShaderModule) -> String {
    format!("{} ({:?})", module.name, module.stage)
}

/// Each graphics stage's outputs must match the next stage's inputs, location by location
fn validate_stage_interfaces(pipeline_name: &str, stages: &[ShaderModule]) -> Result<()> {
    let graphics: Vec<&ShaderModule> = stages.iter()
        .filter(|s| s.stage != ShaderStage::Compute)
        .collect();

    for pair in graphics.windows(2) {
        let (producer, consumer) = (pair[0], pair[1]);
        let mut outputs: Vec<StageVariable> = producer.reflection.outputs.clone();
        let mut inputs: Vec<StageVariable> = consumer.reflection.inputs.clone();
        outputs.sort_by_key(|v| v.location);
        inputs.sort_by_key(|v| v.location);

        if outputs.len() != inputs.len() {
            engine_bail!("prism::ShaderPipeline" => Error::InvalidResource,
                "[ShaderPipeline] '{}': stage {} writes {} attributes but stage {} reads {}",
                pipeline_name, stage_label(producer), outputs.len(), stage_label(consumer), inputs.len());
        }
        for (out, input) in outputs.iter().zip(&inputs) {
            if out.location != input.location || out.format.size_bytes() != input.format.size_bytes() {
                engine_bail!("prism::ShaderPipeline" => Error::InvalidResource,
                    "[ShaderPipeline] '{}': stage {} output at location {} ({} bytes) does not match stage {} input at location {} ({} bytes)",
                    pipeline_name,
                    stage_label(producer), out.location, out.format.size_bytes(),
                    stage_label(consumer), input.location, input.format.size_bytes());
            }
        }
    }
    Ok(())
}

/// Every input of the vertex stage must be fed by a vertex attribute of the same size
fn validate_vertex_inputs(pipeline_name: &str, first: &ShaderModule, layout: &VertexLayout) -> Result<()> {
    if first.stage != ShaderStage::Vertex {
        return Ok(());
    }
    for input in &first.reflection.inputs {
        let attribute = layout.attributes.iter().find(|a| a.location == input.location);
        match attribute {
            Some(a) if a.format.size_bytes() == input.format.size_bytes() => {}
            Some(a) => engine_bail!("prism::ShaderPipeline" => Error::InvalidResource,
                "[ShaderPipeline] '{}': vertex input {} of {} is {} bytes, vertex layout provides {}",
                pipeline_name, input.location, stage_label(first), input.format.size_bytes(), a.format.size_bytes()),
            None => engine_bail!("prism::ShaderPipeline" => Error::InvalidResource,
                "[ShaderPipeline] '{}': vertex input {} of {} has no attribute in the vertex layout",
                pipeline_name, input.location, stage_label(first)),
        }
    }
    Ok(())
}

/// Gather uniforms and samplers from all stages
///
/// The first stage to declare a binding defines it; later stages only add
/// their stage flag.
fn merge_bindings(
    pipeline_name: &str,
    stages: &[ShaderModule],
    uniform_alignment: u64,
) -> Result<(BTreeMap<BindingKey, UniformBinding>, BTreeMap<BindingKey, SamplerBinding>)> {
    let mut uniforms: BTreeMap<BindingKey, UniformBinding> = BTreeMap::new();
    let mut samplers: BTreeMap<BindingKey, SamplerBinding> = BTreeMap::new();

    for module in stages {
        let flag = module.stage.flag();

        for uniform in &module.reflection.uniforms {
            if samplers.contains_key(&uniform.key) {
                engine_bail!("prism::ShaderPipeline" => Error::InvalidResource,
                    "[ShaderPipeline] '{}': {} is a sampler in one stage and uniform '{}' in stage {}",
                    pipeline_name, uniform.key, uniform.name, stage_label(module));
            }
            if uniform.count > 1 {
                engine_bail!("prism::ShaderPipeline" => Error::InvalidResource,
                    "[ShaderPipeline] '{}': uniform '{}' is an array of {} blocks, only single blocks are supported",
                    pipeline_name, uniform.name, uniform.count);
            }
            match uniforms.get_mut(&uniform.key) {
                Some(existing) => {
                    if existing.size != uniform.size {
                        engine_warn!("prism::ShaderPipeline",
                            "'{}': uniform {} is {} bytes in stage {} but {} bytes in an earlier stage; keeping the earlier definition",
                            pipeline_name, uniform.key, uniform.size, stage_label(module), existing.size);
                    }
                    existing.stages |= flag;
                }
                None => {
                    uniforms.insert(uniform.key, UniformBinding {
                        name: uniform.name.clone(),
                        key: uniform.key,
                        size: uniform.size,
                        count: uniform.count.max(1),
                        per_object: uniform.per_object,
                        members: uniform.members.clone(),
                        stages: flag,
                        object_size_aligned: align_up(uniform.size.max(1) as u64, uniform_alignment),
                    });
                }
            }
        }

        for sampler in &module.reflection.samplers {
            if uniforms.contains_key(&sampler.key) {
                engine_bail!("prism::ShaderPipeline" => Error::InvalidResource,
                    "[ShaderPipeline] '{}': {} is a uniform in one stage and sampler '{}' in stage {}",
                    pipeline_name, sampler.key, sampler.name, stage_label(module));
            }
            match samplers.get_mut(&sampler.key) {
                Some(existing) => existing.stages |= flag,
                None => {
                    samplers.insert(sampler.key, SamplerBinding {
                        name: sampler.name.clone(),
                        key: sampler.key,
                        count: sampler.count.unwrap_or(DEFAULT_SAMPLER_ARRAY_SIZE),
                        dimension: sampler.dimension,
                        variable_count: sampler.count.is_none(),
                        stages: flag,
                        bound: Vec::new(),
                    });
                }
            }
        }
    }

    Ok((uniforms, samplers))
}

/// Merge every stage's push constant blocks into non-overlapping ranges
///
/// Overlapping blocks collapse into their union, visible to every declaring
/// stage. Each (stage, index) key maps to the range that absorbed it.
fn merge_push_constants(stages: &[ShaderModule]) -> (Vec<MergedPushConstant>, FxHashMap<PushConstantKey, usize>) {
    let mut blocks = Vec::new();
    for module in stages {
        for (index, block) in module.reflection.push_constants.iter().enumerate() {
            let key = PushConstantKey { stages: module.stage.flag(), index: index as u32 };
            blocks.push((key, block.name.clone(), block.offset, block.size));
        }
    }

    let mut merged: Vec<MergedPushConstant> = Vec::new();
    for (key, name, offset, size) in &blocks {
        let mut range = PushConstantRange { stages: key.stages, offset: *offset, size: *size };
        let mut name = name.clone();

        // A union can reach ranges it did not overlap before; repeat until stable
        loop {
            let Some(position) = merged.iter().position(|m| m.range.overlaps(range.offset, range.size)) else {
                break;
            };
            let other = merged.remove(position);
            let start = other.range.offset.min(range.offset);
            let end = other.range.end().max(range.end());
            range = PushConstantRange {
                stages: other.range.stages | range.stages,
                offset: start,
                size: end - start,
            };
            name = other.name;
        }
        merged.push(MergedPushConstant { name, range });
    }
    merged.sort_by_key(|m| m.range.offset);

    let mut keys = FxHashMap::default();
    for (key, _, offset, size) in &blocks {
        if let Some(index) = merged.iter().position(|m| m.range.offset <= *offset && offset + size <= m.range.end()) {
            keys.insert(*key, index);
        }
    }
    (merged, keys)
}

/// One layout per set index from 0 to the highest used set; unused sets stay empty
fn build_set_layouts(
    uniforms: &BTreeMap<BindingKey, UniformBinding>,
    samplers: &BTreeMap<BindingKey, SamplerBinding>,
) -> Vec<DescriptorSetLayoutDesc> {
    let max_set = uniforms.keys().chain(samplers.keys()).map(|k| k.set).max();
    let Some(max_set) = max_set else {
        return Vec::new();
    };

    let mut layouts = vec![DescriptorSetLayoutDesc::default(); max_set as usize + 1];
    for (key, uniform) in uniforms {
        layouts[key.set as usize].bindings.push(DescriptorBindingDesc {
            binding: key.binding,
            descriptor_type: DescriptorType::UniformBufferDynamic,
            count: 1,
            stages: uniform.stages,
            variable_count: false,
        });
    }
    for (key, sampler) in samplers {
        layouts[key.set as usize].bindings.push(DescriptorBindingDesc {
            binding: key.binding,
            descriptor_type: DescriptorType::CombinedImageSampler,
            count: sampler.count,
            stages: sampler.stages,
            variable_count: sampler.variable_count,
        });
    }
    for layout in &mut layouts {
        layout.bindings.sort_by_key(|b| b.binding);
    }
    layouts
}

#[cfg(test)]
#[path = "shader_pipeline_tests.rs"]
mod tests;
