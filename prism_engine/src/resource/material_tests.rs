use super::*;
use slotmap::SlotMap;

fn material() -> Material {
    let mut pipelines: SlotMap<ShaderPipelineKey, ()> = SlotMap::with_key();
    Material::new("brick", pipelines.insert(()), 2)
}

#[test]
fn test_material_accessors() {
    let material = material();
    assert_eq!(material.name(), "brick");
    assert_eq!(material.material_id(), 2);
    assert_eq!(material.instance_count(), 0);
    assert_eq!(material.instance_capacity(), 0);
}

#[test]
fn test_instance_ids_are_sequential() {
    let mut material = material();
    assert_eq!(material.create_instance(), 0);
    assert_eq!(material.create_instance(), 1);
    assert_eq!(material.create_instance(), 2);
    assert_eq!(material.instance_capacity(), 3);
}

#[test]
fn test_destroyed_instance_id_is_reused() {
    let mut material = material();
    for _ in 0..4 {
        material.create_instance();
    }
    material.destroy_instance(1).unwrap();
    assert!(!material.has_instance(1));
    assert_eq!(material.instance_count(), 3);
    // Capacity still covers instance 3
    assert_eq!(material.instance_capacity(), 4);

    assert_eq!(material.create_instance(), 1);
    assert_eq!(material.create_instance(), 4);
}

#[test]
fn test_destroying_top_instance_shrinks_capacity() {
    let mut material = material();
    for _ in 0..3 {
        material.create_instance();
    }
    material.destroy_instance(2).unwrap();
    assert_eq!(material.instance_capacity(), 2);
}

#[test]
fn test_destroy_unknown_instance_fails() {
    let mut material = material();
    material.create_instance();
    assert!(matches!(material.destroy_instance(5), Err(Error::InvalidResource(_))));
    material.destroy_instance(0).unwrap();
    assert!(material.destroy_instance(0).is_err());
}
