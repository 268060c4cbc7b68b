/// GPU memory management: staging ring, geometry and uniform sub-allocators

pub mod block_allocator;
pub mod ring_stage_buffer;
pub mod device_buffer;
pub mod uniform_buffer;

pub use block_allocator::{Block, BlockAllocator};
pub use ring_stage_buffer::{DataInfo, RingStageBuffer, StagedDataType};
pub use device_buffer::{DeviceBuffer, MeshAllocation, TransferRecord};
pub use uniform_buffer::{UniformAllocation, UniformBuffer};

/// Round `value` up to the next multiple of `alignment` (a power of two)
#[inline]
pub fn align_up(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}
