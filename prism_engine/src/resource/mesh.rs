//! CPU-side mesh data handed to the renderer for upload.
//!
//! A [`Mesh`] is an interleaved vertex blob plus 32-bit indices, tagged with a
//! process-unique [`MeshId`]. The renderer stages the bytes through the ring
//! stage buffer and keys the resulting device allocation by that id.

use std::sync::atomic::{AtomicU64, Ordering};
use bytemuck::{Pod, Zeroable};
use crate::graphics_device::{BufferFormat, VertexAttribute, VertexLayout};

static NEXT_MESH_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identifier of a mesh's geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(pub u64);

impl MeshId {
    /// Allocate a fresh process-unique id
    pub fn next() -> Self {
        MeshId(NEXT_MESH_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for MeshId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Standard vertex: position, normal, texture coordinate (32 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub const STRIDE: u32 = std::mem::size_of::<Vertex>() as u32;

    /// Vertex input layout matching locations 0 (position), 1 (normal), 2 (uv)
    pub fn layout() -> VertexLayout {
        VertexLayout {
            stride: Self::STRIDE,
            attributes: vec![
                VertexAttribute { location: 0, format: BufferFormat::R32G32B32_SFLOAT, offset: 0 },
                VertexAttribute { location: 1, format: BufferFormat::R32G32B32_SFLOAT, offset: 12 },
                VertexAttribute { location: 2, format: BufferFormat::R32G32_SFLOAT, offset: 24 },
            ],
        }
    }
}

/// Geometry ready for upload
#[derive(Debug, Clone)]
pub struct Mesh {
    id: MeshId,
    name: String,
    vertex_data: Vec<u8>,
    vertex_stride: u32,
    indices: Vec<u32>,
}

impl Mesh {
    /// Build a mesh from typed vertices
    pub fn from_vertices(name: impl Into<String>, vertices: &[Vertex], indices: Vec<u32>) -> Self {
        Self::from_raw(name, bytemuck::cast_slice(vertices).to_vec(), Vertex::STRIDE, indices)
    }

    /// Build a mesh from an already interleaved vertex blob
    pub fn from_raw(name: impl Into<String>, vertex_data: Vec<u8>, vertex_stride: u32, indices: Vec<u32>) -> Self {
        Self {
            id: MeshId::next(),
            name: name.into(),
            vertex_data,
            vertex_stride,
            indices,
        }
    }

    pub fn id(&self) -> MeshId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Interleaved vertex bytes
    pub fn vertex_data(&self) -> &[u8] {
        &self.vertex_data
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Index bytes as uploaded (little-endian u32)
    pub fn index_data(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    pub fn vertex_stride(&self) -> u32 {
        self.vertex_stride
    }

    pub fn vertex_count(&self) -> u32 {
        if self.vertex_stride == 0 {
            0
        } else {
            (self.vertex_data.len() / self.vertex_stride as usize) as u32
        }
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Vertex bytes + index bytes
    pub fn byte_size(&self) -> u64 {
        (self.vertex_data.len() + self.indices.len() * 4) as u64
    }
}

#[cfg(test)]
#[path = "mesh_tests.rs"]
mod tests;
