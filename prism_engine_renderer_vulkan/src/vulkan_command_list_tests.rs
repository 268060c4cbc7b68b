use super::*;

fn ranges() -> Vec<PushConstantRange> {
    vec![
        PushConstantRange { stages: ShaderStageFlags::VERTEX | ShaderStageFlags::FRAGMENT, offset: 0, size: 64 },
        PushConstantRange { stages: ShaderStageFlags::FRAGMENT, offset: 64, size: 16 },
    ]
}

// ============================================================================
// PUSH CONSTANT RANGE TESTS
// ============================================================================

#[test]
fn test_push_inside_shared_range() {
    let ranges = ranges();
    assert!(push_constant_range_matches(&ranges, ShaderStageFlags::VERTEX, 0, 64));
    assert!(push_constant_range_matches(&ranges, ShaderStageFlags::VERTEX | ShaderStageFlags::FRAGMENT, 16, 32));
}

#[test]
fn test_push_to_fragment_only_range() {
    let ranges = ranges();
    assert!(push_constant_range_matches(&ranges, ShaderStageFlags::FRAGMENT, 64, 16));
    assert!(!push_constant_range_matches(&ranges, ShaderStageFlags::VERTEX, 64, 16));
}

#[test]
fn test_push_crossing_range_end_is_rejected() {
    let ranges = ranges();
    assert!(!push_constant_range_matches(&ranges, ShaderStageFlags::VERTEX, 48, 32));
    assert!(!push_constant_range_matches(&ranges, ShaderStageFlags::FRAGMENT, 72, 16));
    assert!(!push_constant_range_matches(&ranges, ShaderStageFlags::FRAGMENT, u32::MAX, 4));
}

#[test]
fn test_push_without_ranges_is_rejected() {
    assert!(!push_constant_range_matches(&[], ShaderStageFlags::VERTEX, 0, 4));
}
