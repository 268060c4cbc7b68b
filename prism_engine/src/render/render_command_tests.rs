use super::*;

fn draw(vertex_count: u32) -> RenderCommand {
    RenderCommand::Draw { vertex_count, instance_count: 1, first_vertex: 0 }
}

#[test]
fn test_queue_reads_in_order() {
    let mut queue = RenderCommandQueue::new();
    queue.add_command(RenderCommand::SetScissor(Rect2D::from_extent(800, 600)));
    queue.add_command(draw(3));
    queue.add_command(draw(6));

    assert_eq!(queue.len(), 3);
    assert_eq!(queue.next_command().unwrap().name(), "SetScissor");
    assert_eq!(queue.next_command(), Some(draw(3)));
    assert_eq!(queue.remaining(), 1);
    assert_eq!(queue.next_command(), Some(draw(6)));
    assert_eq!(queue.next_command(), None);
}

#[test]
fn test_rewind_and_clear() {
    let mut queue = RenderCommandQueue::with_capacity(4);
    queue.add_command(draw(3));
    while queue.next_command().is_some() {}

    queue.rewind();
    assert_eq!(queue.next_command(), Some(draw(3)));

    queue.clear();
    assert!(queue.is_empty());
    assert_eq!(queue.next_command(), None);

    queue.add_command(draw(9));
    assert_eq!(queue.next_command(), Some(draw(9)));
}

#[test]
fn test_push_constants_payload() {
    let command = RenderCommand::push_constants(ShaderStageFlags::VERTEX, 16, &[1, 2, 3, 4]).unwrap();
    let RenderCommand::PushConstants { stages, offset, size, data } = command else {
        panic!("expected push constants");
    };
    assert_eq!(stages, ShaderStageFlags::VERTEX);
    assert_eq!(offset, 16);
    assert_eq!(size, 4);
    assert_eq!(&data[..4], &[1, 2, 3, 4]);
    assert!(data[4..].iter().all(|b| *b == 0));
}

#[test]
fn test_push_constants_payload_limits() {
    assert!(RenderCommand::push_constants(ShaderStageFlags::VERTEX, 0, &[0u8; 64]).is_ok());
    assert!(RenderCommand::push_constants(ShaderStageFlags::VERTEX, 0, &[0u8; 65]).is_err());
    assert!(RenderCommand::push_constants(ShaderStageFlags::VERTEX, 0, &[]).is_err());
}

#[test]
fn test_command_fits_inline() {
    assert!(std::mem::size_of::<RenderCommand>() <= 96);
}
