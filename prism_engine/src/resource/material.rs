/// Materials and material instances
///
/// A Material belongs to exactly one ShaderPipeline and owns a slice of each
/// of the pipeline's default uniform buffers. It is identified in the
/// renderer's arena by a [`MaterialHandle`] and inside its pipeline by a small
/// numeric material ID.
///
/// A MaterialInstance is one per-object slot of a material. Instance IDs are
/// handed out lowest-free-first, so destroying an instance lets the next one
/// reuse its uniform slot.

use slotmap::new_key_type;
use crate::engine_bail;
use crate::error::{Error, Result};
use crate::pipeline::ShaderPipelineKey;
use crate::utils::SlotAllocator;

new_key_type! {
    /// Handle to a material owned by the renderer
    pub struct MaterialHandle;
}

/// Handle to one instance of a material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialInstance {
    pub material: MaterialHandle,
    pub instance_id: u32,
}

pub struct Material {
    name: String,
    pipeline: ShaderPipelineKey,
    material_id: u32,
    instances: SlotAllocator,
}

impl Material {
    pub(crate) fn new(name: impl Into<String>, pipeline: ShaderPipelineKey, material_id: u32) -> Self {
        Self {
            name: name.into(),
            pipeline,
            material_id,
            instances: SlotAllocator::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pipeline(&self) -> ShaderPipelineKey {
        self.pipeline
    }

    /// ID assigned by the pipeline on attach
    pub fn material_id(&self) -> u32 {
        self.material_id
    }

    /// Reserve the lowest free instance ID
    pub fn create_instance(&mut self) -> u32 {
        self.instances.alloc()
    }

    pub fn destroy_instance(&mut self, instance_id: u32) -> Result<()> {
        if !self.instances.free(instance_id) {
            engine_bail!("prism::Material" => Error::InvalidResource,
                "[Material] '{}' has no live instance {}", self.name, instance_id);
        }
        Ok(())
    }

    pub fn has_instance(&self, instance_id: u32) -> bool {
        self.instances.contains(instance_id)
    }

    pub fn instance_count(&self) -> u32 {
        self.instances.len()
    }

    /// Per-object slots needed to address every live instance
    pub fn instance_capacity(&self) -> u32 {
        self.instances.high_water_mark()
    }
}

#[cfg(test)]
#[path = "material_tests.rs"]
mod tests;
