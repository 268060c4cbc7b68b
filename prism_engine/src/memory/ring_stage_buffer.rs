/// Ring staging buffer - batches CPU writes awaiting upload to device memory
///
/// A single host-visible buffer used as a circular queue. `stage_mesh` writes
/// at the end cursor and records a [`DataInfo`]; the flush path pops records
/// from the front and copies their byte ranges into device-local memory.
///
/// Cursors wrap modulo the capacity. Data between `start` and `end` is
/// pending. When the last record is popped both cursors return to 0. The
/// buffer is never allowed to become completely full, so `start == end`
/// always means empty.
///
/// Single writer, no internal locking.

use std::collections::VecDeque;
use crate::engine_bail;
use crate::engine_debug;
use crate::error::{Error, Result};
use crate::graphics_device::{BufferCopyRegion, BufferDesc, BufferHandle, BufferUsage, GraphicsDevice, MemoryLocation};
use crate::resource::{Mesh, MeshId};

/// What a staged range contains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagedDataType {
    /// Vertex bytes immediately followed by u32 indices
    Mesh {
        vertex_bytes: u64,
        index_count: u32,
    },
}

/// One pending upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataInfo {
    /// One region, or two when the data wraps past the end of the buffer.
    /// `dst_offset` is relative to the start of the destination allocation.
    pub copy_regions: Vec<BufferCopyRegion>,
    /// Offset of the first byte inside the ring
    pub offset: u64,
    pub data_size: u64,
    pub data_type: StagedDataType,
    pub resource_id: MeshId,
}

pub struct RingStageBuffer {
    buffer: Option<BufferHandle>,
    capacity: u64,
    start_offset: u64,
    end_offset: u64,
    pending: VecDeque<DataInfo>,
}

impl RingStageBuffer {
    pub fn new() -> Self {
        Self {
            buffer: None,
            capacity: 0,
            start_offset: 0,
            end_offset: 0,
            pending: VecDeque::new(),
        }
    }

    /// Create the buffer, or grow it to `size` bytes
    ///
    /// Requests not larger than the current capacity are ignored. Growing keeps
    /// pending data: it is copied in logical order to offset 0 of the new
    /// buffer and every pending record is rebased onto that linear layout.
    pub fn allocate(&mut self, device: &mut dyn GraphicsDevice, size: u64) -> Result<()> {
        if size <= self.capacity {
            return Ok(());
        }

        let new_buffer = device.create_buffer(&BufferDesc {
            name: "RingStageBuffer".to_string(),
            size,
            usage: BufferUsage::Staging,
            location: MemoryLocation::CpuToGpu,
        })?;

        if let Some(old_buffer) = self.buffer {
            let staged = self.staged_bytes();
            if staged > 0 {
                let contents = self.read_pending(device, old_buffer)?;
                device.write_buffer(new_buffer, 0, &contents)?;
            }

            let old_capacity = self.capacity;
            let old_start = self.start_offset;
            for info in self.pending.iter_mut() {
                let relative = (info.offset + old_capacity - old_start) % old_capacity;
                info.offset = relative;
                info.copy_regions = vec![BufferCopyRegion {
                    src_offset: relative,
                    dst_offset: 0,
                    size: info.data_size,
                }];
            }

            self.start_offset = 0;
            self.end_offset = staged;
            device.destroy_buffer(old_buffer)?;

            engine_debug!("prism::RingStageBuffer", "grew from {} to {} bytes ({} bytes pending)",
                old_capacity, size, staged);
        }

        self.buffer = Some(new_buffer);
        self.capacity = size;
        Ok(())
    }

    /// Copy a mesh's vertex and index bytes into the ring
    ///
    /// Fails if the mesh does not fit in the current free space; a full ring is
    /// an error, not backpressure.
    pub fn stage_mesh(&mut self, device: &mut dyn GraphicsDevice, mesh: &Mesh) -> Result<()> {
        let vertex_bytes = mesh.vertex_data();
        let index_bytes = mesh.index_data();
        let data_size = (vertex_bytes.len() + index_bytes.len()) as u64;

        let Some(buffer) = self.buffer else {
            engine_bail!("prism::RingStageBuffer" => Error::InvalidState,
                "[RingStageBuffer] staging mesh {} before the buffer was allocated", mesh.id());
        };
        if data_size == 0 {
            engine_bail!("prism::RingStageBuffer" => Error::InvalidResource,
                "[RingStageBuffer] mesh {} ('{}') has no data", mesh.id(), mesh.name());
        }
        if data_size >= self.free_space() {
            engine_bail!("prism::RingStageBuffer" => Error::ResourceExhausted,
                "[RingStageBuffer] not enough space for mesh {} ('{}'): {} bytes requested, {} free of {}",
                mesh.id(), mesh.name(), data_size, self.free_space(), self.capacity);
        }

        let offset = self.end_offset;
        let copy_regions = if offset + data_size <= self.capacity {
            vec![BufferCopyRegion { src_offset: offset, dst_offset: 0, size: data_size }]
        } else {
            let head = self.capacity - offset;
            vec![
                BufferCopyRegion { src_offset: offset, dst_offset: 0, size: head },
                BufferCopyRegion { src_offset: 0, dst_offset: head, size: data_size - head },
            ]
        };

        let cursor = self.write_wrapped(device, buffer, offset, vertex_bytes)?;
        let cursor = self.write_wrapped(device, buffer, cursor, index_bytes)?;
        self.end_offset = cursor;

        self.pending.push_back(DataInfo {
            copy_regions,
            offset,
            data_size,
            data_type: StagedDataType::Mesh {
                vertex_bytes: vertex_bytes.len() as u64,
                index_count: mesh.index_count(),
            },
            resource_id: mesh.id(),
        });
        Ok(())
    }

    /// Remove the oldest pending record and release its bytes
    pub fn pop_metadata(&mut self) -> Option<DataInfo> {
        let info = self.pending.pop_front()?;
        if self.pending.is_empty() {
            self.start_offset = 0;
            self.end_offset = 0;
        } else {
            self.start_offset = (self.start_offset + info.data_size) % self.capacity;
        }
        Some(info)
    }

    /// Bytes waiting to be flushed
    pub fn staged_bytes(&self) -> u64 {
        if self.pending.is_empty() {
            0
        } else if self.end_offset > self.start_offset {
            self.end_offset - self.start_offset
        } else {
            self.capacity - self.start_offset + self.end_offset
        }
    }

    pub fn free_space(&self) -> u64 {
        self.capacity - self.staged_bytes()
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn buffer(&self) -> Option<BufferHandle> {
        self.buffer
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending(&self) -> impl Iterator<Item = &DataInfo> {
        self.pending.iter()
    }

    pub fn cursors(&self) -> (u64, u64) {
        (self.start_offset, self.end_offset)
    }

    /// Pending bytes in logical (unwrapped) order
    pub fn read_pending(&self, device: &dyn GraphicsDevice, buffer: BufferHandle) -> Result<Vec<u8>> {
        let staged = self.staged_bytes();
        if staged == 0 {
            return Ok(Vec::new());
        }
        if self.end_offset > self.start_offset {
            return device.read_buffer(buffer, self.start_offset, staged);
        }

        let mut contents = device.read_buffer(buffer, self.start_offset, self.capacity - self.start_offset)?;
        if self.end_offset > 0 {
            contents.extend(device.read_buffer(buffer, 0, self.end_offset)?);
        }
        Ok(contents)
    }

    /// Release the device buffer and drop all pending records
    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice) -> Result<()> {
        if let Some(buffer) = self.buffer.take() {
            device.destroy_buffer(buffer)?;
        }
        self.capacity = 0;
        self.start_offset = 0;
        self.end_offset = 0;
        self.pending.clear();
        Ok(())
    }

    /// Write `bytes` at `cursor`, continuing at offset 0 past the end.
    /// Returns the cursor after the write.
    fn write_wrapped(
        &self,
        device: &mut dyn GraphicsDevice,
        buffer: BufferHandle,
        cursor: u64,
        bytes: &[u8],
    ) -> Result<u64> {
        let len = bytes.len() as u64;
        if len == 0 {
            return Ok(cursor);
        }
        if cursor + len <= self.capacity {
            device.write_buffer(buffer, cursor, bytes)?;
            return Ok((cursor + len) % self.capacity);
        }

        let head = (self.capacity - cursor) as usize;
        device.write_buffer(buffer, cursor, &bytes[..head])?;
        device.write_buffer(buffer, 0, &bytes[head..])?;
        Ok(len - head as u64)
    }
}

impl Default for RingStageBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "ring_stage_buffer_tests.rs"]
mod tests;
