/// Buffer - a VkBuffer with its gpu-allocator allocation

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator};
use prism_engine::graphics_device::{BufferDesc, MemoryLocation};
use prism_engine::prism::{Error, Result};
use prism_engine::{engine_bail, engine_err, engine_error};

use crate::vulkan_format::{buffer_usage_to_vk, memory_location_to_vk};

/// Vulkan buffer
pub(crate) struct Buffer {
    pub buffer: vk::Buffer,
    allocation: Option<Allocation>,
    pub size: u64,
    pub location: MemoryLocation,
    pub name: String,
}

impl Buffer {
    /// Create a buffer and bind freshly allocated memory to it
    pub fn new(device: &ash::Device, allocator: &mut Allocator, desc: &BufferDesc) -> Result<Self> {
        if desc.size == 0 {
            engine_bail!("prism::vulkan" => Error::InvalidResource,
                "Buffer '{}' has zero size", desc.name);
        }

        unsafe {
            let buffer_create_info = vk::BufferCreateInfo::default()
                .size(desc.size)
                .usage(buffer_usage_to_vk(desc.usage))
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let buffer = device.create_buffer(&buffer_create_info, None)
                .map_err(|e| engine_err!("prism::vulkan",
                    "Failed to create buffer '{}' of size {} bytes: {:?}", desc.name, desc.size, e))?;

            let requirements = device.get_buffer_memory_requirements(buffer);

            let allocation = match allocator.allocate(&AllocationCreateDesc {
                name: &desc.name,
                requirements,
                location: memory_location_to_vk(desc.location),
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            }) {
                Ok(allocation) => allocation,
                Err(_) => {
                    device.destroy_buffer(buffer, None);
                    let size_mb = requirements.size as f64 / (1024.0 * 1024.0);
                    engine_error!("prism::vulkan", "Out of GPU memory for buffer '{}' (required: {:.2} MB)",
                        desc.name, size_mb);
                    return Err(Error::OutOfMemory);
                }
            };

            if let Err(e) = device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) {
                allocator.free(allocation).ok();
                device.destroy_buffer(buffer, None);
                engine_bail!("prism::vulkan", "Failed to bind buffer memory for '{}': {:?}", desc.name, e);
            }

            Ok(Self {
                buffer,
                allocation: Some(allocation),
                size: desc.size,
                location: desc.location,
                name: desc.name.clone(),
            })
        }
    }

    /// Copy `data` into the mapped memory at `offset`
    pub fn write(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let ptr = self.mapped_range(offset, data.len() as u64)?;
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), ptr, data.len());
        }
        Ok(())
    }

    /// Copy `len` bytes out of the mapped memory at `offset`
    pub fn read(&self, offset: u64, len: u64) -> Result<Vec<u8>> {
        let ptr = self.mapped_range(offset, len)?;
        let mut out = vec![0u8; len as usize];
        unsafe {
            std::ptr::copy_nonoverlapping(ptr as *const u8, out.as_mut_ptr(), out.len());
        }
        Ok(out)
    }

    /// Pointer to `offset` after checking the buffer is host visible and the range fits
    fn mapped_range(&self, offset: u64, len: u64) -> Result<*mut u8> {
        if !self.location.is_host_visible() {
            engine_bail!("prism::vulkan" => Error::InvalidResource,
                "Buffer '{}' is device-local and cannot be mapped", self.name);
        }
        match offset.checked_add(len) {
            Some(end) if end <= self.size => {}
            _ => engine_bail!("prism::vulkan" => Error::InvalidResource,
                "Range {}..+{} is outside buffer '{}' ({} bytes)", offset, len, self.name, self.size),
        }
        let Some(allocation) = &self.allocation else {
            engine_bail!("prism::vulkan", "Buffer '{}' has no allocation", self.name);
        };
        let base = allocation
            .mapped_ptr()
            .ok_or_else(|| engine_err!("prism::vulkan", "Buffer '{}' is not CPU-accessible", self.name))?
            .as_ptr() as *mut u8;
        Ok(unsafe { base.add(offset as usize) })
    }

    /// Free the memory and destroy the buffer
    ///
    /// # Safety
    ///
    /// The GPU must no longer use the buffer.
    pub unsafe fn destroy(mut self, device: &ash::Device, allocator: &mut Allocator) {
        if let Some(allocation) = self.allocation.take() {
            allocator.free(allocation).ok();
        }
        device.destroy_buffer(self.buffer, None);
    }
}
