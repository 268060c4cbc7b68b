/// Buffer descriptors, copy regions and ownership barriers

use crate::graphics_device::BufferHandle;

/// What a buffer is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    /// Host-visible upload source (ring stage buffer, texture staging)
    Staging,
    /// Vertex + index data, filled by transfer copies
    Geometry,
    /// Uniform data bound through dynamic uniform descriptors
    Uniform,
}

/// Where the buffer memory lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryLocation {
    /// Host-visible, persistently mapped
    CpuToGpu,
    /// Device-local, only reachable through transfer commands
    GpuOnly,
}

impl MemoryLocation {
    pub fn is_host_visible(&self) -> bool {
        matches!(self, MemoryLocation::CpuToGpu)
    }
}

/// Descriptor for creating a buffer
#[derive(Debug, Clone)]
pub struct BufferDesc {
    /// Debug name
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Buffer usage
    pub usage: BufferUsage,
    /// Memory location
    pub location: MemoryLocation,
}

/// One buffer-to-buffer copy (the equivalent of a `VkBufferCopy`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferCopyRegion {
    pub src_offset: u64,
    pub dst_offset: u64,
    pub size: u64,
}

/// A byte range whose ownership moves from the transfer queue to the graphics
/// queue once an upload completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferBarrier {
    pub buffer: BufferHandle,
    pub offset: u64,
    pub size: u64,
}

/// Vertex attribute data format
///
/// Defines the data type and component count of one vertex attribute or one
/// stage input/output variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum BufferFormat {
    R32_SFLOAT,
    R32G32_SFLOAT,
    R32G32B32_SFLOAT,
    R32G32B32A32_SFLOAT,

    R32_SINT,
    R32G32_SINT,
    R32G32B32_SINT,
    R32G32B32A32_SINT,

    R32_UINT,
    R32G32_UINT,
    R32G32B32_UINT,
    R32G32B32A32_UINT,
}

impl BufferFormat {
    /// Returns size in bytes for this format
    pub fn size_bytes(&self) -> u32 {
        match self {
            BufferFormat::R32_SFLOAT | BufferFormat::R32_SINT | BufferFormat::R32_UINT => 4,
            BufferFormat::R32G32_SFLOAT | BufferFormat::R32G32_SINT | BufferFormat::R32G32_UINT => 8,
            BufferFormat::R32G32B32_SFLOAT | BufferFormat::R32G32B32_SINT | BufferFormat::R32G32B32_UINT => 12,
            BufferFormat::R32G32B32A32_SFLOAT | BufferFormat::R32G32B32A32_SINT | BufferFormat::R32G32B32A32_UINT => 16,
        }
    }

    /// Float format with `components` 32-bit lanes
    pub fn float(components: u32) -> Option<Self> {
        match components {
            1 => Some(BufferFormat::R32_SFLOAT),
            2 => Some(BufferFormat::R32G32_SFLOAT),
            3 => Some(BufferFormat::R32G32B32_SFLOAT),
            4 => Some(BufferFormat::R32G32B32A32_SFLOAT),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
