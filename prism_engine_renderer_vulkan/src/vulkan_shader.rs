/// Shader - a VkShaderModule plus the stage and entry point it was created for

use ash::vk;
use prism_engine::graphics_device::{ShaderDesc, ShaderStage};
use prism_engine::prism::{Error, Result};
use prism_engine::{engine_bail, engine_err};
use std::ffi::CString;
use std::io::Cursor;

/// Vulkan shader module
pub(crate) struct Shader {
    pub module: vk::ShaderModule,
    pub stage: ShaderStage,
    pub entry_point: CString,
}

impl Shader {
    /// Create the module from SPIR-V bytes
    ///
    /// Returns the module and the decoded SPIR-V words, which reflection reuses.
    pub fn new(device: &ash::Device, desc: &ShaderDesc) -> Result<(Self, Vec<u32>)> {
        if desc.code.is_empty() || desc.code.len() % 4 != 0 {
            engine_bail!("prism::vulkan" => Error::InvalidResource,
                "Shader '{}': SPIR-V size {} is not a non-zero multiple of 4", desc.name, desc.code.len());
        }

        let words = ash::util::read_spv(&mut Cursor::new(desc.code))
            .map_err(|e| engine_err!("prism::vulkan" => Error::InvalidResource,
                "Shader '{}': invalid SPIR-V: {}", desc.name, e))?;

        let entry_point = CString::new(desc.entry_point)
            .map_err(|_| engine_err!("prism::vulkan" => Error::InvalidResource,
                "Shader '{}': entry point contains a NUL byte", desc.name))?;

        let create_info = vk::ShaderModuleCreateInfo::default().code(&words);
        let module = unsafe {
            device.create_shader_module(&create_info, None)
                .map_err(|e| engine_err!("prism::vulkan",
                    "Failed to create shader module '{}': {:?}", desc.name, e))?
        };

        Ok((Self { module, stage: desc.stage, entry_point }, words))
    }

    /// # Safety
    ///
    /// No pipeline creation may be using the module.
    pub unsafe fn destroy(self, device: &ash::Device) {
        device.destroy_shader_module(self.module, None);
    }
}
