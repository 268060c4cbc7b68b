/// Draw submissions: what to draw and with which material

use glam::Mat4;
use crate::render::RenderCommand;
use crate::resource::{MaterialHandle, MaterialInstance, Mesh, MeshId};

/// Geometry drawn with a material's shared (per-material) uniforms
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshRenderer {
    pub mesh: MeshId,
    pub vertex_count: u32,
    pub index_count: u32,
    pub material: MaterialHandle,
}

impl MeshRenderer {
    pub fn new(mesh: &Mesh, material: MaterialHandle) -> Self {
        Self {
            mesh: mesh.id(),
            vertex_count: mesh.vertex_count(),
            index_count: mesh.index_count(),
            material,
        }
    }

    pub fn draw_command(&self) -> RenderCommand {
        draw_command(self.vertex_count, self.index_count)
    }
}

/// Geometry drawn with its own per-object uniform slot and transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelInstance {
    pub mesh: MeshId,
    pub vertex_count: u32,
    pub index_count: u32,
    pub instance: MaterialInstance,
    pub transform: Mat4,
}

impl ModelInstance {
    pub fn new(mesh: &Mesh, instance: MaterialInstance, transform: Mat4) -> Self {
        Self {
            mesh: mesh.id(),
            vertex_count: mesh.vertex_count(),
            index_count: mesh.index_count(),
            instance,
            transform,
        }
    }

    pub fn draw_command(&self) -> RenderCommand {
        draw_command(self.vertex_count, self.index_count)
    }
}

fn draw_command(vertex_count: u32, index_count: u32) -> RenderCommand {
    if index_count > 0 {
        RenderCommand::DrawIndexed { index_count, instance_count: 1, first_index: 0, vertex_offset: 0 }
    } else {
        RenderCommand::Draw { vertex_count, instance_count: 1, first_vertex: 0 }
    }
}
