/// Device-local geometry storage
///
/// One large GPU-only buffer sub-allocated with a best-fit [`BlockAllocator`].
/// Each uploaded mesh gets one contiguous range holding its vertices followed
/// by its indices, recorded in a [`MeshAllocation`] keyed by mesh id.

use rustc_hash::FxHashMap;
use crate::engine_bail;
use crate::error::{Error, Result};
use crate::graphics_device::{
    BufferCopyRegion, BufferDesc, BufferHandle, BufferUsage, CommandList, GraphicsDevice, MemoryLocation,
};
use crate::memory::{BlockAllocator, DataInfo, StagedDataType};
use crate::resource::MeshId;

/// Where a mesh lives inside the device buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshAllocation {
    pub buffer: BufferHandle,
    pub start_offset: u64,
    pub size: u64,
    /// Indices start at `start_offset + vertex_bytes`
    pub vertex_bytes: u64,
    pub index_count: u32,
}

impl MeshAllocation {
    pub fn index_offset(&self) -> u64 {
        self.start_offset + self.vertex_bytes
    }
}

/// Result of one recorded staging copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRecord {
    pub mesh_id: MeshId,
    pub allocation: MeshAllocation,
    /// Regions as recorded (destination offsets are absolute)
    pub regions: Vec<BufferCopyRegion>,
}

pub struct DeviceBuffer {
    buffer: BufferHandle,
    allocator: BlockAllocator,
    allocations: FxHashMap<MeshId, MeshAllocation>,
}

impl DeviceBuffer {
    /// Create the GPU-only buffer of `size` bytes
    pub fn new(device: &mut dyn GraphicsDevice, size: u64) -> Result<Self> {
        let buffer = device.create_buffer(&BufferDesc {
            name: "DeviceBuffer".to_string(),
            size,
            usage: BufferUsage::Geometry,
            location: MemoryLocation::GpuOnly,
        })?;
        Ok(Self {
            buffer,
            allocator: BlockAllocator::new("DeviceBuffer", size),
            allocations: FxHashMap::default(),
        })
    }

    /// Reserve `size` bytes and return their offset
    pub fn sub_allocate(&mut self, size: u64) -> Result<u64> {
        self.allocator.allocate(size)
    }

    /// Allocate room for a staged record and record the copy out of the ring
    ///
    /// The returned regions are what the caller turns into ownership-transfer
    /// barriers once every copy of the batch has been recorded.
    pub fn transfer_data(
        &mut self,
        cmd: &mut dyn CommandList,
        staging_buffer: BufferHandle,
        info: &DataInfo,
    ) -> Result<TransferRecord> {
        // Re-uploading a mesh replaces its previous range
        if self.allocations.contains_key(&info.resource_id) {
            self.release(info.resource_id)?;
        }

        let start_offset = self.allocator.allocate(info.data_size)?;
        let regions: Vec<BufferCopyRegion> = info
            .copy_regions
            .iter()
            .map(|r| BufferCopyRegion {
                src_offset: r.src_offset,
                dst_offset: start_offset + r.dst_offset,
                size: r.size,
            })
            .collect();

        if let Err(e) = cmd.copy_buffer(staging_buffer, self.buffer, &regions) {
            self.allocator.free(start_offset)?;
            return Err(e);
        }

        let StagedDataType::Mesh { vertex_bytes, index_count } = info.data_type;
        let allocation = MeshAllocation {
            buffer: self.buffer,
            start_offset,
            size: info.data_size,
            vertex_bytes,
            index_count,
        };
        self.allocations.insert(info.resource_id, allocation);

        Ok(TransferRecord { mesh_id: info.resource_id, allocation, regions })
    }

    /// Free a mesh's range
    pub fn release(&mut self, mesh_id: MeshId) -> Result<()> {
        let Some(allocation) = self.allocations.remove(&mesh_id) else {
            engine_bail!("prism::DeviceBuffer" => Error::InvalidResource,
                "[DeviceBuffer] mesh {} has no device allocation", mesh_id);
        };
        self.allocator.free(allocation.start_offset)
    }

    pub fn allocation(&self, mesh_id: MeshId) -> Option<&MeshAllocation> {
        self.allocations.get(&mesh_id)
    }

    pub fn contains(&self, mesh_id: MeshId) -> bool {
        self.allocations.contains_key(&mesh_id)
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
#[path = "device_buffer_tests.rs"]
mod tests;
