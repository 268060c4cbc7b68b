use super::*;
use crate::graphics_device::mock_graphics_device::{MockCommand, MockCommandList, MockGraphicsDevice};
use crate::resource::Mesh;

fn info(mesh: &Mesh, regions: Vec<BufferCopyRegion>) -> DataInfo {
    DataInfo {
        offset: regions[0].src_offset,
        copy_regions: regions,
        data_size: mesh.byte_size(),
        data_type: StagedDataType::Mesh {
            vertex_bytes: mesh.vertex_data().len() as u64,
            index_count: mesh.index_count(),
        },
        resource_id: mesh.id(),
    }
}

fn mesh(vertex_bytes: usize, index_count: u32) -> Mesh {
    Mesh::from_raw("m", vec![7u8; vertex_bytes], 4, (0..index_count).collect())
}

// ============================================================================
// Sub-allocation
// ============================================================================

#[test]
fn test_new_creates_gpu_only_buffer() {
    let mut device = MockGraphicsDevice::new();
    let db = DeviceBuffer::new(&mut device, 1000).unwrap();
    assert_eq!(device.buffers[db.buffer()].desc.location, MemoryLocation::GpuOnly);
    assert_eq!(db.allocator().free_bytes(), 1000);
}

#[test]
fn test_sub_allocate_100_then_200() {
    let mut device = MockGraphicsDevice::new();
    let mut db = DeviceBuffer::new(&mut device, 1000).unwrap();
    assert_eq!(db.sub_allocate(100).unwrap(), 0);
    assert_eq!(db.sub_allocate(200).unwrap(), 100);

    assert_eq!(db.allocator().used_bytes(), 300);
    let free: Vec<_> = db.allocator().blocks().iter().filter(|b| b.free).copied().collect();
    assert_eq!(free, vec![crate::memory::Block { offset: 300, size: 700, free: true }]);
}

// ============================================================================
// Transfers
// ============================================================================

#[test]
fn test_transfer_records_copy_with_absolute_destination() {
    let mut device = MockGraphicsDevice::new();
    let mut db = DeviceBuffer::new(&mut device, 1000).unwrap();
    db.sub_allocate(64).unwrap();

    let m = mesh(40, 5);
    let staged = info(&m, vec![
        BufferCopyRegion { src_offset: 90, dst_offset: 0, size: 10 },
        BufferCopyRegion { src_offset: 0, dst_offset: 10, size: 50 },
    ]);
    let staging = device.create_buffer(&BufferDesc {
        name: "staging".to_string(),
        size: 100,
        usage: BufferUsage::Staging,
        location: MemoryLocation::CpuToGpu,
    }).unwrap();

    let mut cmd = MockCommandList::new();
    let record = db.transfer_data(&mut cmd, staging, &staged).unwrap();

    assert_eq!(record.mesh_id, m.id());
    assert_eq!(record.allocation.start_offset, 64);
    assert_eq!(record.allocation.index_offset(), 104);
    assert_eq!(record.allocation.index_count, 5);
    assert_eq!(record.regions[0].dst_offset, 64);
    assert_eq!(record.regions[1].dst_offset, 74);
    assert_eq!(
        cmd.commands,
        vec![MockCommand::CopyBuffer { src: staging, dst: db.buffer(), regions: record.regions.clone() }]
    );
    assert_eq!(db.allocation(m.id()), Some(&record.allocation));
}

#[test]
fn test_transfer_exhaustion_is_error() {
    let mut device = MockGraphicsDevice::new();
    let mut db = DeviceBuffer::new(&mut device, 64).unwrap();
    let m = mesh(80, 0);
    let staged = info(&m, vec![BufferCopyRegion { src_offset: 0, dst_offset: 0, size: 80 }]);
    let mut cmd = MockCommandList::new();
    let staging = db.buffer();
    assert!(matches!(db.transfer_data(&mut cmd, staging, &staged), Err(Error::ResourceExhausted(_))));
    assert!(cmd.commands.is_empty());
    assert!(!db.contains(m.id()));
}

#[test]
fn test_restaging_replaces_previous_range() {
    let mut device = MockGraphicsDevice::new();
    let mut db = DeviceBuffer::new(&mut device, 256).unwrap();
    let m = mesh(16, 4);
    let staged = info(&m, vec![BufferCopyRegion { src_offset: 0, dst_offset: 0, size: 32 }]);
    let mut cmd = MockCommandList::new();
    let staging = db.buffer();
    db.transfer_data(&mut cmd, staging, &staged).unwrap();
    db.transfer_data(&mut cmd, staging, &staged).unwrap();
    assert_eq!(db.allocator().used_bytes(), 32);
}

#[test]
fn test_release_returns_space() {
    let mut device = MockGraphicsDevice::new();
    let mut db = DeviceBuffer::new(&mut device, 256).unwrap();
    let m = mesh(16, 4);
    let staged = info(&m, vec![BufferCopyRegion { src_offset: 0, dst_offset: 0, size: 32 }]);
    let mut cmd = MockCommandList::new();
    let staging = db.buffer();
    db.transfer_data(&mut cmd, staging, &staged).unwrap();

    db.release(m.id()).unwrap();
    assert_eq!(db.allocator().free_bytes(), 256);
    assert!(db.release(m.id()).is_err());
}
