/// Shared uniform storage
///
/// One host-visible buffer sub-allocated with the same best-fit allocator as
/// the geometry buffer. Every request is rounded up to the device's
/// `minUniformBufferOffsetAlignment`, so every returned offset can be bound
/// directly as a dynamic uniform offset.

use crate::{engine_bail, engine_debug};
use crate::error::{Error, Result};
use crate::graphics_device::{BufferDesc, BufferHandle, BufferUsage, GraphicsDevice, MemoryLocation};
use crate::memory::{align_up, BlockAllocator};

/// A slice of the uniform buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformAllocation {
    pub buffer: BufferHandle,
    pub offset: u64,
    /// Aligned size actually reserved
    pub size: u64,
}

pub struct UniformBuffer {
    buffer: BufferHandle,
    alignment: u64,
    allocator: BlockAllocator,
}

impl UniformBuffer {
    /// Create a uniform buffer of `size` bytes using the device's offset alignment
    pub fn new(device: &mut dyn GraphicsDevice, size: u64) -> Result<Self> {
        let alignment = device.limits().min_uniform_buffer_offset_alignment.max(1).next_power_of_two();
        let buffer = device.create_buffer(&BufferDesc {
            name: "UniformBuffer".to_string(),
            size,
            usage: BufferUsage::Uniform,
            location: MemoryLocation::CpuToGpu,
        })?;
        engine_debug!("prism::UniformBuffer", "created {} bytes, offset alignment {}", size, alignment);
        Ok(Self {
            buffer,
            alignment,
            allocator: BlockAllocator::new(format!("UniformBuffer ({} bytes)", size), size),
        })
    }

    /// Reserve at least `size` bytes at an aligned offset
    pub fn allocate(&mut self, size: u64) -> Result<UniformAllocation> {
        let aligned = align_up(size, self.alignment);
        let offset = self.allocator.allocate(aligned)?;
        Ok(UniformAllocation { buffer: self.buffer, offset, size: aligned })
    }

    pub fn free(&mut self, allocation: UniformAllocation) -> Result<()> {
        self.allocator.free(allocation.offset)
    }

    /// Write into a previously allocated slice
    pub fn write(
        &self,
        device: &mut dyn GraphicsDevice,
        allocation: &UniformAllocation,
        offset: u64,
        data: &[u8],
    ) -> Result<()> {
        if offset + data.len() as u64 > allocation.size {
            engine_bail!("prism::UniformBuffer" => Error::InvalidResource,
                "[UniformBuffer] write of {} bytes at {} overflows slice of {} bytes",
                data.len(), offset, allocation.size);
        }
        device.write_buffer(self.buffer, allocation.offset + offset, data)
    }

    pub fn alignment(&self) -> u64 {
        self.alignment
    }

    pub fn buffer(&self) -> BufferHandle {
        self.buffer
    }

    pub fn allocator(&self) -> &BlockAllocator {
        &self.allocator
    }

    pub fn destroy(self, device: &mut dyn GraphicsDevice) -> Result<()> {
        device.destroy_buffer(self.buffer)
    }
}

#[cfg(test)]
#[path = "uniform_buffer_tests.rs"]
mod tests;
