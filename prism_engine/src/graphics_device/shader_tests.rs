use super::*;

#[test]
fn test_stage_flags_are_distinct() {
    let all = ShaderStage::Vertex.flag() | ShaderStage::Fragment.flag() | ShaderStage::Compute.flag();
    assert_eq!(all.bits().count_ones(), 3);
    assert!(all.contains(ShaderStageFlags::FRAGMENT));
}

#[test]
fn test_binding_key_ordering() {
    let mut keys = vec![BindingKey::new(1, 0), BindingKey::new(0, 2), BindingKey::new(0, 1)];
    keys.sort();
    assert_eq!(keys, vec![BindingKey::new(0, 1), BindingKey::new(0, 2), BindingKey::new(1, 0)]);
    assert_eq!(BindingKey::new(2, 3).to_string(), "(set 2, binding 3)");
}

#[test]
fn test_per_object_naming_rule() {
    assert!(is_per_object_name("PerObject"));
    assert!(is_per_object_name("u_per_object"));
    assert!(is_per_object_name("ModelPEROBJECTData"));
    assert!(!is_per_object_name("MaterialParams"));
    assert!(!is_per_object_name("object"));
}
