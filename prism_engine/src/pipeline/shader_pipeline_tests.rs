use super::*;
use slotmap::SlotMap;
use crate::graphics_device::mock_graphics_device::{MockCommand, MockCommandList, MockGraphicsDevice};
use crate::graphics_device::{
    is_per_object_name, BufferFormat, ReflectedPushConstant, ReflectedSampler, ReflectedUniform,
    ShaderReflection, ShaderStageFlags, TextureDesc, TextureFormat, TextureKind, UniformMember,
};

// ============================================================================
// Helpers
// ============================================================================

fn var(location: u32, components: u32) -> StageVariable {
    StageVariable { location, format: BufferFormat::float(components).unwrap() }
}

fn uniform(name: &str, set: u32, binding: u32, members: &[(&str, u32, u32)]) -> ReflectedUniform {
    let members: Vec<UniformMember> = members.iter()
        .map(|(n, offset, size)| UniformMember { name: n.to_string(), offset: *offset, size: *size })
        .collect();
    let size = members.iter().map(|m| m.offset + m.size).max().unwrap_or(0);
    ReflectedUniform {
        name: name.to_string(),
        key: BindingKey::new(set, binding),
        size,
        count: 1,
        per_object: is_per_object_name(name),
        members,
    }
}

fn sampler(name: &str, set: u32, binding: u32, count: Option<u32>, dimension: SamplerDimension) -> ReflectedSampler {
    ReflectedSampler { name: name.to_string(), key: BindingKey::new(set, binding), count, dimension }
}

fn push(name: &str, offset: u32, size: u32) -> ReflectedPushConstant {
    ReflectedPushConstant { name: name.to_string(), offset, size }
}

fn vertex_reflection() -> ShaderReflection {
    ShaderReflection {
        uniforms: vec![
            uniform("Camera", 0, 0, &[("view", 0, 64), ("projection", 64, 64)]),
            uniform("PerObject", 1, 0, &[("model", 0, 64), ("tint", 64, 16)]),
        ],
        push_constants: vec![push("Push", 0, 4)],
        // position, normal, uv
        outputs: vec![var(0, 3), var(1, 3), var(2, 2)],
        ..Default::default()
    }
}

fn fragment_reflection() -> ShaderReflection {
    ShaderReflection {
        uniforms: vec![uniform("Camera", 0, 0, &[("view", 0, 64), ("projection", 64, 64)])],
        samplers: vec![
            sampler("albedo", 1, 1, Some(1), SamplerDimension::Texture2D),
            sampler("textures", 2, 0, None, SamplerDimension::Texture2D),
        ],
        push_constants: vec![push("Push", 0, 8)],
        inputs: vec![var(0, 3), var(1, 3), var(2, 2)],
        ..Default::default()
    }
}

fn desc(device: &mut MockGraphicsDevice, vertex: ShaderReflection, fragment: ShaderReflection) -> ShaderPipelineDesc {
    let stages = vec![
        device.shader_module("basic.vert", ShaderStage::Vertex, vertex),
        device.shader_module("basic.frag", ShaderStage::Fragment, fragment),
    ];
    ShaderPipelineDesc::new("basic", stages, VertexLayout::default())
}

fn basic_pipeline(device: &mut MockGraphicsDevice) -> ShaderPipeline {
    let desc = desc(device, vertex_reflection(), fragment_reflection());
    ShaderPipeline::new(device, desc).unwrap()
}

fn material_handles(count: usize) -> Vec<MaterialHandle> {
    let mut materials: SlotMap<MaterialHandle, ()> = SlotMap::with_key();
    (0..count).map(|_| materials.insert(())).collect()
}

fn texture(device: &mut MockGraphicsDevice, kind: TextureKind) -> TextureHandle {
    let data = vec![0u8; 4 * kind.layer_count() as usize];
    device.create_texture(&TextureDesc {
        name: "tex",
        width: 1,
        height: 1,
        format: TextureFormat::R8G8B8A8_UNORM,
        kind,
        data: &data,
    }).unwrap()
}

const CAMERA: BindingKey = BindingKey::new(0, 0);
const PER_OBJECT: BindingKey = BindingKey::new(1, 0);

// ============================================================================
// Construction and stage interfaces
// ============================================================================

#[test]
fn test_matching_stage_interfaces_construct() {
    let mut device = MockGraphicsDevice::new();
    let pipeline = basic_pipeline(&mut device);

    assert_eq!(pipeline.stage_names(), ["basic.vert", "basic.frag"]);
    assert!(device.pipelines.contains_key(pipeline.pipeline()));
    assert_eq!(pipeline.set_layouts().len(), 3);
    assert_eq!(pipeline.descriptor_sets(0).len(), 3);
    assert_eq!(device.descriptor_sets.len(), 9);
}

#[test]
fn test_attribute_count_mismatch_names_both_stages() {
    let mut device = MockGraphicsDevice::new();
    let mut fragment = fragment_reflection();
    fragment.inputs.pop();

    let desc = desc(&mut device, vertex_reflection(), fragment);
    let err = ShaderPipeline::new(&mut device, desc).err().unwrap();
    let message = err.to_string();
    assert!(matches!(err, Error::InvalidResource(_)));
    assert!(message.contains("basic.vert"), "{}", message);
    assert!(message.contains("basic.frag"), "{}", message);
}

#[test]
fn test_attribute_size_mismatch_is_rejected() {
    let mut device = MockGraphicsDevice::new();
    let mut fragment = fragment_reflection();
    fragment.inputs[2] = var(2, 4);

    let desc = desc(&mut device, vertex_reflection(), fragment);
    let message = ShaderPipeline::new(&mut device, desc).err().unwrap().to_string();
    assert!(message.contains("location 2"));
    assert!(message.contains("basic.frag"));
}

#[test]
fn test_vertex_inputs_checked_against_layout() {
    let mut device = MockGraphicsDevice::new();
    let mut vertex = vertex_reflection();
    vertex.inputs = vec![var(0, 3), var(1, 3), var(2, 2)];

    let good = desc(&mut device, vertex.clone(), fragment_reflection());
    let good = ShaderPipelineDesc { vertex_layout: crate::resource::Vertex::layout(), ..good };
    assert!(ShaderPipeline::new(&mut device, good).is_ok());

    let bad = desc(&mut device, vertex, fragment_reflection());
    assert!(ShaderPipeline::new(&mut device, bad).is_err());
}

#[test]
fn test_empty_stage_list_is_rejected() {
    let mut device = MockGraphicsDevice::new();
    let desc = ShaderPipelineDesc::new("empty", Vec::new(), VertexLayout::default());
    assert!(ShaderPipeline::new(&mut device, desc).is_err());
}

// ============================================================================
// Binding aggregation
// ============================================================================

#[test]
fn test_shared_uniform_visible_to_both_stages() {
    let mut device = MockGraphicsDevice::new();
    let pipeline = basic_pipeline(&mut device);

    let camera = pipeline.uniform_binding("Camera").unwrap();
    assert_eq!(camera.stages, ShaderStageFlags::VERTEX | ShaderStageFlags::FRAGMENT);
    assert_eq!(camera.object_size_aligned, 256);
    assert!(!camera.per_object);

    let per_object = pipeline.uniform_binding("PerObject").unwrap();
    assert_eq!(per_object.stages, ShaderStageFlags::VERTEX);
    assert!(per_object.per_object);
}

#[test]
fn test_first_stage_defines_binding() {
    let mut device = MockGraphicsDevice::new();
    let mut fragment = fragment_reflection();
    fragment.uniforms[0] = uniform("CameraFrag", 0, 0, &[("view", 0, 64)]);

    let desc = desc(&mut device, vertex_reflection(), fragment);
    let pipeline = ShaderPipeline::new(&mut device, desc).unwrap();
    let camera = pipeline.uniform_binding("Camera").unwrap();
    assert_eq!(camera.size, 128);
    assert!(pipeline.uniform_binding("CameraFrag").is_none());
}

#[test]
fn test_uniform_and_sampler_on_same_binding_conflict() {
    let mut device = MockGraphicsDevice::new();
    let mut fragment = fragment_reflection();
    fragment.samplers.push(sampler("clash", 0, 0, Some(1), SamplerDimension::Texture2D));

    let desc = desc(&mut device, vertex_reflection(), fragment);
    assert!(ShaderPipeline::new(&mut device, desc).is_err());
}

#[test]
fn test_descriptor_set_layouts() {
    let mut device = MockGraphicsDevice::new();
    let pipeline = basic_pipeline(&mut device);
    let layouts: Vec<_> = pipeline.set_layouts().iter().map(|h| device.layouts[*h].clone()).collect();

    assert_eq!(layouts[0].bindings.len(), 1);
    assert_eq!(layouts[0].bindings[0].descriptor_type, DescriptorType::UniformBufferDynamic);

    assert_eq!(layouts[1].bindings[0].descriptor_type, DescriptorType::UniformBufferDynamic);
    assert_eq!(layouts[1].bindings[1].descriptor_type, DescriptorType::CombinedImageSampler);
    assert_eq!(layouts[1].bindings[1].count, 1);
    assert!(!layouts[1].has_variable_count());

    // Unsized array
    assert_eq!(layouts[2].bindings[0].count, DEFAULT_SAMPLER_ARRAY_SIZE);
    assert!(layouts[2].bindings[0].variable_count);
}

#[test]
fn test_unused_sets_get_empty_layouts() {
    let mut device = MockGraphicsDevice::new();
    let vertex = ShaderReflection {
        uniforms: vec![uniform("Lights", 2, 0, &[("count", 0, 4)])],
        ..Default::default()
    };
    let stages = vec![device.shader_module("lights.vert", ShaderStage::Vertex, vertex)];
    let pipeline = ShaderPipeline::new(&mut device, ShaderPipelineDesc::new("lights", stages, VertexLayout::default())).unwrap();

    assert_eq!(pipeline.set_layouts().len(), 3);
    assert!(device.layouts[pipeline.set_layouts()[0]].bindings.is_empty());
    assert!(device.layouts[pipeline.set_layouts()[1]].bindings.is_empty());
    assert_eq!(device.layouts[pipeline.set_layouts()[2]].bindings.len(), 1);
}

#[test]
fn test_too_many_sets_is_rejected() {
    let mut device = MockGraphicsDevice::new();
    let vertex = ShaderReflection {
        uniforms: vec![uniform("Far", 7, 0, &[("x", 0, 4)])],
        ..Default::default()
    };
    let stages = vec![device.shader_module("far.vert", ShaderStage::Vertex, vertex)];
    assert!(ShaderPipeline::new(&mut device, ShaderPipelineDesc::new("far", stages, VertexLayout::default())).is_err());
}

// ============================================================================
// Push constants
// ============================================================================

#[test]
fn test_overlapping_push_constants_merge_stage_flags() {
    let mut device = MockGraphicsDevice::new();
    let pipeline = basic_pipeline(&mut device);

    assert_eq!(pipeline.push_constants().len(), 1);
    let range = pipeline.push_constants()[0].range;
    assert_eq!(range.offset, 0);
    assert_eq!(range.size, 8);
    assert_eq!(range.stages, ShaderStageFlags::VERTEX | ShaderStageFlags::FRAGMENT);

    let vertex_key = PushConstantKey { stages: ShaderStageFlags::VERTEX, index: 0 };
    let fragment_key = PushConstantKey { stages: ShaderStageFlags::FRAGMENT, index: 0 };
    assert_eq!(pipeline.push_constant_range(vertex_key), Some(&range));
    assert_eq!(pipeline.push_constant_range(fragment_key), Some(&range));

    let created = &device.pipelines[pipeline.pipeline()];
    assert_eq!(created.push_constant_ranges, vec![range]);
}

#[test]
fn test_disjoint_push_constants_stay_separate() {
    let mut device = MockGraphicsDevice::new();
    let mut vertex = vertex_reflection();
    let mut fragment = fragment_reflection();
    vertex.push_constants = vec![push("Transform", 0, 16)];
    fragment.push_constants = vec![push("Color", 16, 16)];

    let desc = desc(&mut device, vertex, fragment);
    let pipeline = ShaderPipeline::new(&mut device, desc).unwrap();
    let ranges: Vec<_> = pipeline.push_constants().iter().map(|p| p.range).collect();
    assert_eq!(ranges, vec![
        PushConstantRange { stages: ShaderStageFlags::VERTEX, offset: 0, size: 16 },
        PushConstantRange { stages: ShaderStageFlags::FRAGMENT, offset: 16, size: 16 },
    ]);
}

#[test]
fn test_push_constants_over_device_limit_are_rejected() {
    let mut device = MockGraphicsDevice::new();
    let mut vertex = vertex_reflection();
    vertex.push_constants = vec![push("Huge", 0, 256)];
    let desc = desc(&mut device, vertex, fragment_reflection());
    assert!(ShaderPipeline::new(&mut device, desc).is_err());
}

// ============================================================================
// Materials
// ============================================================================

#[test]
fn test_attach_is_idempotent_and_ids_are_reused() {
    let mut device = MockGraphicsDevice::new();
    let mut pipeline = basic_pipeline(&mut device);
    let materials = material_handles(3);

    let first = pipeline.on_attach(materials[0]);
    assert_eq!(pipeline.on_attach(materials[0]), first);
    assert_eq!(pipeline.material_count(), 1);

    let second = pipeline.on_attach(materials[1]);
    assert_ne!(first, second);

    assert_eq!(pipeline.on_detach(materials[0]).unwrap(), first);
    assert_eq!(pipeline.on_attach(materials[2]), first);
    assert_eq!(pipeline.material_id(materials[2]), Some(first));
    assert_eq!(pipeline.material_id(materials[0]), None);
}

#[test]
fn test_detach_unknown_material_fails() {
    let mut device = MockGraphicsDevice::new();
    let mut pipeline = basic_pipeline(&mut device);
    let materials = material_handles(1);
    assert!(pipeline.on_detach(materials[0]).is_err());
}

#[test]
fn test_attach_marks_resources_dirty() {
    let mut device = MockGraphicsDevice::new();
    let mut pipeline = basic_pipeline(&mut device);
    let mut uniforms = UniformBuffer::new(&mut device, 1 << 16).unwrap();
    let materials = material_handles(2);

    pipeline.on_attach(materials[0]);
    pipeline.allocate_resources(&mut device, &mut uniforms).unwrap();
    assert!(!pipeline.needs_allocation());

    pipeline.on_attach(materials[1]);
    assert!(pipeline.needs_allocation());
}

// ============================================================================
// Default uniform buffers and dynamic offsets
// ============================================================================

/// Two materials; material 1 has three instances
fn allocated_pipeline(device: &mut MockGraphicsDevice) -> (ShaderPipeline, UniformBuffer, u32, u32) {
    let mut pipeline = basic_pipeline(device);
    let mut uniforms = UniformBuffer::new(device, 1 << 16).unwrap();
    let materials = material_handles(2);
    let m0 = pipeline.on_attach(materials[0]);
    let m1 = pipeline.on_attach(materials[1]);
    pipeline.set_instance_capacity(m1, 3).unwrap();
    pipeline.allocate_resources(device, &mut uniforms).unwrap();
    (pipeline, uniforms, m0, m1)
}

#[test]
fn test_default_buffer_sizes() {
    let mut device = MockGraphicsDevice::new();
    let (pipeline, uniforms, m0, m1) = allocated_pipeline(&mut device);

    let camera = pipeline.default_uniform_buffer(CAMERA).unwrap();
    assert_eq!(camera.per_image.len(), 3);
    assert_eq!(camera.slots, 2);
    assert_eq!(camera.per_image[0].size, 512);
    assert_eq!(pipeline.material_buffer_offset(CAMERA, m0), Some(0));
    assert_eq!(pipeline.material_buffer_offset(CAMERA, m1), Some(256));

    // Material 0 has no instances but still owns one object slot
    let per_object = pipeline.default_uniform_buffer(PER_OBJECT).unwrap();
    assert_eq!(per_object.slots, 4);
    assert_eq!(pipeline.material_buffer_offset(PER_OBJECT, m0), Some(0));
    assert_eq!(pipeline.material_buffer_offset(PER_OBJECT, m1), Some(256));

    assert_eq!(uniforms.allocator().used_bytes(), 3 * (512 + 1024));
}

#[test]
fn test_uniform_descriptors_written_per_image() {
    let mut device = MockGraphicsDevice::new();
    let (pipeline, _uniforms, _, _) = allocated_pipeline(&mut device);

    for image in 0..3 {
        let set0 = pipeline.descriptor_sets(image)[0];
        let expected = pipeline.default_uniform_buffer(CAMERA).unwrap().per_image[image as usize];
        assert_eq!(device.descriptor_sets[set0].writes, vec![DescriptorWrite::UniformBuffer {
            binding: 0,
            buffer: expected.buffer,
            offset: expected.offset,
            range: 128,
        }]);
    }
}

#[test]
fn test_reallocation_releases_previous_storage() {
    let mut device = MockGraphicsDevice::new();
    let (mut pipeline, mut uniforms, _, m1) = allocated_pipeline(&mut device);
    let used = uniforms.allocator().used_bytes();

    pipeline.set_instance_capacity(m1, 1).unwrap();
    pipeline.allocate_resources(&mut device, &mut uniforms).unwrap();
    assert!(uniforms.allocator().used_bytes() < used);
}

fn slice_bytes(device: &MockGraphicsDevice, pipeline: &ShaderPipeline, key: BindingKey, material_id: u32, image: usize, offset: u64, len: usize) -> Vec<u8> {
    let allocation = pipeline.default_uniform_buffer(key).unwrap().per_image[image];
    let at = (allocation.offset + pipeline.material_buffer_offset(key, material_id).unwrap() + offset) as usize;
    device.contents(allocation.buffer)[at..at + len].to_vec()
}

#[test]
fn test_reallocation_keeps_surviving_material_data() {
    let mut device = MockGraphicsDevice::new();
    let mut pipeline = basic_pipeline(&mut device);
    let mut uniforms = UniformBuffer::new(&mut device, 1 << 16).unwrap();
    let materials = material_handles(3);
    let m0 = pipeline.on_attach(materials[0]);
    let m1 = pipeline.on_attach(materials[1]);
    pipeline.set_instance_capacity(m1, 3).unwrap();
    pipeline.allocate_resources(&mut device, &mut uniforms).unwrap();

    pipeline.write_uniform(&mut device, &uniforms, None, "Camera", m1, None, &[4u8; 128]).unwrap();
    pipeline.write_uniform_member(&mut device, &uniforms, None, "PerObject", "tint", m1, Some(2), &[6u8; 16]).unwrap();

    // Material 0's ID goes to a new material and material 1 gains an object slot
    pipeline.on_detach(materials[0]).unwrap();
    let m2 = pipeline.on_attach(materials[2]);
    assert_eq!(m2, m0);
    pipeline.set_instance_capacity(m1, 4).unwrap();
    pipeline.allocate_resources(&mut device, &mut uniforms).unwrap();

    for image in 0..3 {
        assert_eq!(slice_bytes(&device, &pipeline, CAMERA, m1, image, 0, 128), vec![4u8; 128]);
        assert_eq!(slice_bytes(&device, &pipeline, PER_OBJECT, m1, image, 2 * 256 + 64, 16), vec![6u8; 16]);
    }
}

#[test]
fn test_shrunk_slice_keeps_leading_objects() {
    let mut device = MockGraphicsDevice::new();
    let (mut pipeline, mut uniforms, _, m1) = allocated_pipeline(&mut device);
    pipeline.write_uniform_member(&mut device, &uniforms, None, "PerObject", "tint", m1, Some(0), &[8u8; 16]).unwrap();

    pipeline.set_instance_capacity(m1, 1).unwrap();
    pipeline.allocate_resources(&mut device, &mut uniforms).unwrap();
    for image in 0..3 {
        assert_eq!(slice_bytes(&device, &pipeline, PER_OBJECT, m1, image, 64, 16), vec![8u8; 16]);
    }
}

#[test]
fn test_bind_before_allocation_fails() {
    let mut device = MockGraphicsDevice::new();
    let mut pipeline = basic_pipeline(&mut device);
    let id = pipeline.on_attach(material_handles(1)[0]);
    let mut cmd = MockCommandList::new();

    let result = pipeline.bind_descriptor_sets(&mut cmd, 0, id);
    assert!(matches!(result, Err(Error::InvalidState(_))));
    assert!(cmd.commands.is_empty());
}

#[test]
fn test_bind_unattached_material_fails() {
    let mut device = MockGraphicsDevice::new();
    let (pipeline, _uniforms, _, _) = allocated_pipeline(&mut device);
    let mut cmd = MockCommandList::new();
    assert!(matches!(pipeline.bind_descriptor_sets(&mut cmd, 0, 9), Err(Error::InvalidResource(_))));
}

#[test]
fn test_bind_uses_material_base_offsets() {
    let mut device = MockGraphicsDevice::new();
    let (pipeline, _uniforms, _, m1) = allocated_pipeline(&mut device);
    let mut cmd = MockCommandList::new();

    pipeline.bind_descriptor_sets(&mut cmd, 1, m1).unwrap();
    assert_eq!(cmd.commands, vec![MockCommand::BindDescriptorSets {
        pipeline: pipeline.pipeline(),
        first_set: 0,
        sets: pipeline.descriptor_sets(1).to_vec(),
        dynamic_offsets: vec![256, 256],
    }]);
}

#[test]
fn test_per_object_offsets() {
    let mut device = MockGraphicsDevice::new();
    let (pipeline, _uniforms, _, m1) = allocated_pipeline(&mut device);

    let offsets = pipeline.dynamic_offsets(m1, Some(2), &FxHashMap::default()).unwrap();
    // Camera is per material; PerObject slot 2 of material 1
    assert_eq!(offsets, vec![256, 256 + 2 * 256]);

    assert!(pipeline.dynamic_offsets(m1, Some(3), &FxHashMap::default()).is_err());
}

#[test]
fn test_offset_overrides() {
    let mut device = MockGraphicsDevice::new();
    let (pipeline, _uniforms, _, m1) = allocated_pipeline(&mut device);
    let mut cmd = MockCommandList::new();

    let mut overrides = FxHashMap::default();
    overrides.insert(PER_OBJECT, 512);
    pipeline.set_dynamic_offsets(&mut cmd, 0, m1, 1, &overrides).unwrap();
    let MockCommand::BindDescriptorSets { dynamic_offsets, .. } = &cmd.commands[0] else {
        panic!("expected descriptor set bind");
    };
    assert_eq!(dynamic_offsets, &vec![256, 256 + 512]);

    overrides.insert(BindingKey::new(3, 3), 0);
    assert!(pipeline.set_dynamic_offsets(&mut cmd, 0, m1, 1, &overrides).is_err());
}

#[test]
fn test_unaligned_offset_override_is_rejected() {
    let mut device = MockGraphicsDevice::new();
    let (pipeline, _uniforms, _, m1) = allocated_pipeline(&mut device);

    let mut overrides = FxHashMap::default();
    overrides.insert(PER_OBJECT, 3);
    let result = pipeline.dynamic_offsets(m1, None, &overrides);
    assert!(matches!(result, Err(Error::InvalidResource(_))));
}

#[test]
fn test_offset_override_must_stay_in_material_slice() {
    let mut device = MockGraphicsDevice::new();
    let (pipeline, _uniforms, m0, m1) = allocated_pipeline(&mut device);
    let mut overrides = FxHashMap::default();

    // Material 1 owns three 256 byte object slots
    overrides.insert(PER_OBJECT, 768);
    assert!(matches!(pipeline.dynamic_offsets(m1, None, &overrides), Err(Error::InvalidResource(_))));

    // Material 0 owns a single slot of each binding
    overrides.insert(PER_OBJECT, 256);
    assert!(matches!(pipeline.dynamic_offsets(m0, None, &overrides), Err(Error::InvalidResource(_))));
    overrides.clear();
    overrides.insert(CAMERA, 256);
    assert!(matches!(pipeline.dynamic_offsets(m0, None, &overrides), Err(Error::InvalidResource(_))));

    overrides.insert(CAMERA, 0);
    assert_eq!(pipeline.dynamic_offsets(m0, None, &overrides).unwrap(), vec![0, 0]);
}

#[test]
fn test_image_index_out_of_range() {
    let mut device = MockGraphicsDevice::new();
    let (pipeline, _uniforms, m0, _) = allocated_pipeline(&mut device);
    let mut cmd = MockCommandList::new();
    assert!(pipeline.bind_descriptor_sets(&mut cmd, 3, m0).is_err());
}

// ============================================================================
// Uniform writes
// ============================================================================

#[test]
fn test_write_uniform_member_lands_in_object_slot() {
    let mut device = MockGraphicsDevice::new();
    let (pipeline, uniforms, _, m1) = allocated_pipeline(&mut device);
    let tint = [7u8; 16];

    pipeline.write_uniform_member(&mut device, &uniforms, Some(2), "PerObject", "tint", m1, Some(1), &tint).unwrap();

    let allocation = pipeline.default_uniform_buffer(PER_OBJECT).unwrap().per_image[2];
    let at = (allocation.offset + 256 + 256 + 64) as usize;
    assert_eq!(&device.contents(uniforms.buffer())[at..at + 16], &tint);

    // Other images untouched
    let other = pipeline.default_uniform_buffer(PER_OBJECT).unwrap().per_image[0];
    let at = (other.offset + 256 + 256 + 64) as usize;
    assert_eq!(&device.contents(uniforms.buffer())[at..at + 16], &[0u8; 16]);
}

#[test]
fn test_write_uniform_all_images() {
    let mut device = MockGraphicsDevice::new();
    let (pipeline, uniforms, m0, _) = allocated_pipeline(&mut device);
    let camera = [3u8; 128];

    pipeline.write_uniform(&mut device, &uniforms, None, "Camera", m0, None, &camera).unwrap();
    for allocation in &pipeline.default_uniform_buffer(CAMERA).unwrap().per_image {
        let at = allocation.offset as usize;
        assert_eq!(&device.contents(uniforms.buffer())[at..at + 128], &camera);
    }
}

#[test]
fn test_write_size_mismatch_is_rejected() {
    let mut device = MockGraphicsDevice::new();
    let (pipeline, uniforms, m0, _) = allocated_pipeline(&mut device);

    assert!(pipeline.write_uniform(&mut device, &uniforms, None, "Camera", m0, None, &[0u8; 64]).is_err());
    assert!(pipeline.write_uniform_member(&mut device, &uniforms, None, "Camera", "view", m0, None, &[0u8; 4]).is_err());
    assert!(pipeline.write_uniform_member(&mut device, &uniforms, None, "Camera", "missing", m0, None, &[0u8; 4]).is_err());
    assert!(pipeline.write_uniform(&mut device, &uniforms, None, "Missing", m0, None, &[0u8; 4]).is_err());
}

#[test]
fn test_user_bound_uniform_buffer() {
    let mut device = MockGraphicsDevice::new();
    let (mut pipeline, mut uniforms, m0, m1) = allocated_pipeline(&mut device);
    let user = uniforms.allocate(128).unwrap();

    pipeline.bind_uniform_buffer("Camera", user).unwrap();
    assert!(pipeline.needs_allocation());
    pipeline.allocate_resources(&mut device, &mut uniforms).unwrap();

    assert!(pipeline.default_uniform_buffer(CAMERA).is_none());
    let offsets = pipeline.dynamic_offsets(m1, None, &FxHashMap::default()).unwrap();
    assert_eq!(offsets[0], 0);

    let set0 = pipeline.descriptor_sets(0)[0];
    assert_eq!(device.descriptor_sets[set0].writes.last(), Some(&DescriptorWrite::UniformBuffer {
        binding: 0,
        buffer: user.buffer,
        offset: user.offset,
        range: 128,
    }));

    let result = pipeline.write_uniform(&mut device, &uniforms, None, "Camera", m0, None, &[0u8; 128]);
    assert!(matches!(result, Err(Error::InvalidState(_))));
}

// ============================================================================
// Textures
// ============================================================================

#[test]
fn test_texture_array_binding_appends() {
    let mut device = MockGraphicsDevice::new();
    let mut pipeline = basic_pipeline(&mut device);
    let a = texture(&mut device, TextureKind::Texture2D);
    let b = texture(&mut device, TextureKind::Texture2D);
    let c = texture(&mut device, TextureKind::Texture2D);

    assert_eq!(pipeline.bind_textures_2d(&mut device, "textures", &[a, b]).unwrap(), vec![0, 1]);
    assert_eq!(pipeline.bind_textures_2d(&mut device, "textures", &[c]).unwrap(), vec![2]);
    assert_eq!(pipeline.sampler_binding("textures").unwrap().bound, vec![a, b, c]);

    for image in 0..3 {
        let set2 = pipeline.descriptor_sets(image)[2];
        assert_eq!(device.descriptor_sets[set2].writes[1], DescriptorWrite::Textures {
            binding: 0,
            first_element: 2,
            textures: vec![c],
        });
    }
}

#[test]
fn test_single_texture_binding_replaces() {
    let mut device = MockGraphicsDevice::new();
    let mut pipeline = basic_pipeline(&mut device);
    let a = texture(&mut device, TextureKind::Texture2D);
    let b = texture(&mut device, TextureKind::Texture2D);

    assert_eq!(pipeline.bind_textures_2d(&mut device, "albedo", &[a]).unwrap(), vec![0]);
    assert_eq!(pipeline.bind_textures_2d(&mut device, "albedo", &[b]).unwrap(), vec![0]);
    assert_eq!(pipeline.sampler_binding("albedo").unwrap().bound, vec![b]);
    assert!(pipeline.bind_textures_2d(&mut device, "albedo", &[a, b]).is_err());
}

#[test]
fn test_texture_array_overflow() {
    let mut device = MockGraphicsDevice::new();
    let mut pipeline = basic_pipeline(&mut device);
    let t = texture(&mut device, TextureKind::Texture2D);
    let many = vec![t; DEFAULT_SAMPLER_ARRAY_SIZE as usize];

    pipeline.bind_textures_2d(&mut device, "textures", &many).unwrap();
    let result = pipeline.bind_textures_2d(&mut device, "textures", &[t]);
    assert!(matches!(result, Err(Error::ResourceExhausted(_))));
}

#[test]
fn test_cubemap_dimension_is_checked() {
    let mut device = MockGraphicsDevice::new();
    let mut pipeline = basic_pipeline(&mut device);
    let cube = texture(&mut device, TextureKind::Cubemap);
    assert!(pipeline.bind_cubemaps(&mut device, "textures", &[cube]).is_err());
    assert!(pipeline.bind_cubemaps(&mut device, "missing", &[cube]).is_err());
}

// ============================================================================
// Teardown
// ============================================================================

#[test]
fn test_destroy_releases_everything() {
    let mut device = MockGraphicsDevice::new();
    let (pipeline, mut uniforms, _, _) = allocated_pipeline(&mut device);

    pipeline.destroy(&mut device, &mut uniforms).unwrap();
    assert!(device.pipelines.is_empty());
    assert!(device.layouts.is_empty());
    assert!(device.descriptor_sets.is_empty());
    assert_eq!(uniforms.allocator().used_bytes(), 0);
}
