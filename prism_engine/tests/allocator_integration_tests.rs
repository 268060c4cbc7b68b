//! Integration tests for the best-fit block allocator
//!
//! Exercises the public memory API the way the device and uniform buffers
//! drive it. No GPU required.
//!
//! Run with: cargo test --test allocator_integration_tests

use prism_engine::prism::Error;
use prism_engine::prism::memory::{align_up, Block, BlockAllocator};

fn assert_well_formed(allocator: &BlockAllocator) {
    let blocks = allocator.blocks();
    assert_eq!(blocks.iter().map(|b| b.size).sum::<u64>(), allocator.total_size());
    for pair in blocks.windows(2) {
        assert_eq!(pair[0].end(), pair[1].offset, "gap or overlap in {:?}", blocks);
        assert!(!(pair[0].free && pair[1].free), "adjacent free blocks in {:?}", blocks);
    }
}

// ============================================================================
// END-TO-END ALLOCATION
// ============================================================================

#[test]
fn test_integration_two_allocations_leave_one_tail_block() {
    let mut allocator = BlockAllocator::new("DeviceBuffer", 1000);
    assert_eq!(allocator.allocate(100).unwrap(), 0);
    assert_eq!(allocator.allocate(200).unwrap(), 100);

    assert_eq!(allocator.used_bytes(), 300);
    let free: Vec<Block> = allocator.blocks().iter().copied().filter(|b| b.free).collect();
    assert_eq!(free, vec![Block { offset: 300, size: 700, free: true }]);

    // Freeing the first allocation opens a 100-byte hole in front
    allocator.free(0).unwrap();
    assert_eq!(allocator.used_bytes(), 200);
    assert_eq!(allocator.blocks()[0], Block { offset: 0, size: 100, free: true });
    assert_well_formed(&allocator);
}

#[test]
fn test_integration_smallest_adequate_block_is_chosen() {
    // Holes of 300, 100 and 200 bytes separated by live allocations
    let mut allocator = BlockAllocator::new("DeviceBuffer", 1000);
    let offsets: Vec<u64> = [300, 50, 100, 50, 200, 50].iter()
        .map(|&size| allocator.allocate(size).unwrap())
        .collect();
    for &hole in &[offsets[0], offsets[2], offsets[4]] {
        allocator.free(hole).unwrap();
    }

    // 90 fits every hole; the 100-byte one is the tightest
    assert_eq!(allocator.allocate(90).unwrap(), offsets[2]);
    // 150 skips the remaining 10-byte sliver and the 300-byte hole
    assert_eq!(allocator.allocate(150).unwrap(), offsets[4]);
    assert_well_formed(&allocator);
}

#[test]
fn test_integration_exhaustion_and_recovery() {
    let mut allocator = BlockAllocator::new("UniformBuffer", 512);
    let a = allocator.allocate(256).unwrap();
    let b = allocator.allocate(256).unwrap();
    assert!(matches!(allocator.allocate(1), Err(Error::ResourceExhausted(_))));

    allocator.free(a).unwrap();
    allocator.free(b).unwrap();
    assert_eq!(allocator.blocks(), &[Block { offset: 0, size: 512, free: true }]);
    assert_eq!(allocator.allocate(512).unwrap(), 0);
}

#[test]
fn test_integration_aligned_uniform_slices() {
    // Uniform slices are rounded up to the device's offset alignment
    let mut allocator = BlockAllocator::new("UniformBuffer", 4096);
    let sizes = [64u64, 80, 300];
    let offsets: Vec<u64> = sizes.iter()
        .map(|&size| allocator.allocate(align_up(size, 256)).unwrap())
        .collect();
    assert_eq!(offsets, vec![0, 256, 512]);
    assert!(offsets.iter().all(|o| o % 256 == 0));
    assert_eq!(allocator.used_bytes(), 1024);
}

#[test]
fn test_integration_interleaved_sequence_stays_well_formed() {
    let mut allocator = BlockAllocator::new("DeviceBuffer", 2048);
    let mut live = Vec::new();
    for step in 0..64u64 {
        let size = 16 + (step * 37) % 200;
        if step % 3 == 2 && !live.is_empty() {
            let offset = live.remove((step as usize * 7) % live.len());
            allocator.free(offset).unwrap();
        } else if let Ok(offset) = allocator.allocate(size) {
            live.push(offset);
        }
        assert_well_formed(&allocator);
    }
    for offset in live {
        allocator.free(offset).unwrap();
    }
    assert_eq!(allocator.free_bytes(), 2048);
    assert_eq!(allocator.blocks().len(), 1);
}
