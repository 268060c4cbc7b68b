//! Integration tests for CPU-side resources and command recording
//!
//! Loads meshes through the on-disk cache, builds draw submissions from them
//! and records the resulting commands into a queue. No GPU required.
//!
//! Run with: cargo test --test resource_integration_tests

use std::cell::Cell;
use std::fs;
use prism_engine::glam::{Mat4, Vec3};
use prism_engine::prism::Error;
use prism_engine::prism::device::{BindingKey, ShaderStageFlags, TextureFormat, Viewport};
use prism_engine::prism::render::{RenderCommand, RenderCommandQueue};
use prism_engine::prism::resource::{
    mesh_cache, MaterialHandle, MeshRenderer, PerspectiveCamera, Texture2D, Vertex,
};
use tempfile::TempDir;

fn triangle() -> (Vec<Vertex>, Vec<u32>) {
    let vertex = |x: f32, y: f32| Vertex { position: [x, y, 0.0], normal: [0.0, 0.0, 1.0], uv: [x, y] };
    (vec![vertex(0.0, 0.0), vertex(1.0, 0.0), vertex(0.0, 1.0)], vec![0, 1, 2])
}

// ============================================================================
// MESH CACHE
// ============================================================================

#[test]
fn test_integration_cache_is_built_once_then_reused() {
    let dir = TempDir::new().unwrap();
    let model = dir.path().join("triangle.obj");
    let parses = Cell::new(0);
    let parse = |_: &std::path::Path| {
        parses.set(parses.get() + 1);
        Ok(triangle())
    };

    let first = mesh_cache::load_or_build(&model, "triangle", parse).unwrap();
    assert!(mesh_cache::cache_path(&model).exists());
    let second = mesh_cache::load_or_build(&model, "triangle", parse).unwrap();

    assert_eq!(parses.get(), 1);
    assert_eq!(first.vertex_data(), second.vertex_data());
    assert_eq!(second.indices(), &[0, 1, 2]);
    assert_ne!(first.id(), second.id());
}

#[test]
fn test_integration_truncated_cache_is_rebuilt() {
    let dir = TempDir::new().unwrap();
    let model = dir.path().join("triangle.obj");
    let (vertices, indices) = triangle();
    mesh_cache::write_mesh_cache(&mesh_cache::cache_path(&model), &vertices, &indices).unwrap();

    let cache = mesh_cache::cache_path(&model);
    let bytes = fs::read(&cache).unwrap();
    fs::write(&cache, &bytes[..bytes.len() - 3]).unwrap();
    assert!(matches!(mesh_cache::read_mesh_cache(&cache), Err(Error::InvalidResource(_))));

    let mesh = mesh_cache::load_or_build(&model, "triangle", |_| Ok(triangle())).unwrap();
    assert_eq!(mesh.vertex_count(), 3);
    assert_eq!(mesh_cache::read_mesh_cache(&cache).unwrap(), triangle());
}

#[test]
fn test_integration_parser_failure_is_propagated() {
    let dir = TempDir::new().unwrap();
    let model = dir.path().join("missing.obj");
    let result = mesh_cache::load_or_build(&model, "missing", |_| {
        Err(Error::InvalidResource("no such model".to_string()))
    });
    assert!(result.is_err());
    assert!(!mesh_cache::cache_path(&model).exists());
}

// ============================================================================
// COMMAND RECORDING
// ============================================================================

#[test]
fn test_integration_scene_recording_round() {
    let dir = TempDir::new().unwrap();
    let model = dir.path().join("triangle.obj");
    let mesh = mesh_cache::load_or_build(&model, "triangle", |_| Ok(triangle())).unwrap();
    let renderer = MeshRenderer::new(&mesh, MaterialHandle::default());

    let mut queue = RenderCommandQueue::with_capacity(8);
    queue.add_command(RenderCommand::SetViewport(Viewport::from_extent(800, 600)));
    queue.add_command(RenderCommand::BindMaterial(renderer.material));
    queue.add_command(RenderCommand::SetUniformOffset { binding: BindingKey::new(1, 0), offset: 256 });
    queue.add_command(RenderCommand::push_constants(ShaderStageFlags::VERTEX, 0, &1.5f32.to_le_bytes()).unwrap());
    queue.add_command(RenderCommand::BindMesh(mesh.id()));
    queue.add_command(renderer.draw_command());

    let names: Vec<_> = queue.commands().iter().map(|c| c.name()).collect();
    assert_eq!(names, vec![
        "SetViewport", "BindMaterial", "SetUniformOffset", "PushConstants", "BindMesh", "DrawIndexed",
    ]);

    // Replaying drains the queue; rewinding replays it again
    let mut replayed = 0;
    while queue.next_command().is_some() {
        replayed += 1;
    }
    assert_eq!(replayed, 6);
    assert_eq!(queue.remaining(), 0);
    queue.rewind();
    assert_eq!(queue.next_command(), Some(RenderCommand::SetViewport(Viewport::from_extent(800, 600))));

    queue.clear();
    assert!(queue.is_empty());
    assert!(queue.next_command().is_none());
}

#[test]
fn test_integration_oversized_push_constants_rejected() {
    let result = RenderCommand::push_constants(ShaderStageFlags::FRAGMENT, 0, &[0u8; 65]);
    assert!(matches!(result, Err(Error::InvalidResource(_))));
}

// ============================================================================
// TEXTURES AND CAMERA
// ============================================================================

#[test]
fn test_integration_rgb_texture_is_expanded_for_upload() {
    let texture = Texture2D::new("rgb", 2, 1, 3, vec![10, 20, 30, 40, 50, 60]).unwrap();
    let (format, data) = texture.upload_data();
    assert_eq!(format, TextureFormat::from_channels(4, true).unwrap());
    assert_eq!(&data[..], &[10, 20, 30, 255, 40, 50, 60, 255]);

    let desc = texture.desc(format, &data);
    assert_eq!(desc.expected_size(), data.len());
}

#[test]
fn test_integration_camera_projects_target_to_center() {
    let mut camera = PerspectiveCamera::new(60.0, 16.0 / 9.0, 0.1, 100.0);
    camera.set_position(Vec3::new(0.0, 3.0, 10.0));
    camera.look_at(Vec3::new(0.0, 1.0, 0.0));

    let clip = camera.view_projection_matrix() * Vec3::new(0.0, 1.0, 0.0).extend(1.0);
    let ndc = clip / clip.w;
    assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5);
    assert!(ndc.z > 0.0 && ndc.z < 1.0);
    assert_ne!(camera.view_matrix(), Mat4::IDENTITY);
}
