/// SamplerCache - internal VkSampler management for the Vulkan backend
///
/// Samplers are created on first use and shared by every texture of the same
/// kind. Only two kinds exist, so the cache stays tiny.

use ash::vk;
use prism_engine::engine_err;
use prism_engine::graphics_device::TextureKind;
use prism_engine::prism::Result;
use rustc_hash::FxHashMap;

/// Sampler configurations the backend hands out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum SamplerKind {
    /// Linear filtering, repeat addressing (2D textures)
    LinearRepeat,
    /// Linear filtering, clamp-to-edge addressing (cubemaps)
    LinearClamp,
}

impl SamplerKind {
    pub fn for_texture(kind: TextureKind) -> Self {
        match kind {
            TextureKind::Texture2D => SamplerKind::LinearRepeat,
            TextureKind::Cubemap => SamplerKind::LinearClamp,
        }
    }

    fn address_mode(&self) -> vk::SamplerAddressMode {
        match self {
            SamplerKind::LinearRepeat => vk::SamplerAddressMode::REPEAT,
            SamplerKind::LinearClamp => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        }
    }
}

/// Creates VkSamplers on first use, destroys them on shutdown
pub(crate) struct SamplerCache {
    cache: FxHashMap<SamplerKind, vk::Sampler>,
    /// `None` when the device lacks anisotropic filtering
    max_anisotropy: Option<f32>,
}

impl SamplerCache {
    pub fn new(max_anisotropy: Option<f32>) -> Self {
        Self {
            cache: FxHashMap::default(),
            max_anisotropy,
        }
    }

    /// Get or create the VkSampler for `kind`
    pub fn get(&mut self, device: &ash::Device, kind: SamplerKind) -> Result<vk::Sampler> {
        if let Some(&sampler) = self.cache.get(&kind) {
            return Ok(sampler);
        }

        let address = kind.address_mode();
        let mut create_info = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .address_mode_u(address)
            .address_mode_v(address)
            .address_mode_w(address)
            .mip_lod_bias(0.0)
            .min_lod(0.0)
            .max_lod(vk::LOD_CLAMP_NONE)
            .border_color(vk::BorderColor::FLOAT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS);

        create_info = match self.max_anisotropy {
            Some(max) => create_info.anisotropy_enable(true).max_anisotropy(max),
            None => create_info.anisotropy_enable(false).max_anisotropy(1.0),
        };

        let sampler = unsafe {
            device.create_sampler(&create_info, None)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to create {:?} sampler: {:?}", kind, e))?
        };
        self.cache.insert(kind, sampler);
        Ok(sampler)
    }

    /// Destroy all cached samplers
    ///
    /// # Safety
    ///
    /// No texture may still reference them.
    pub unsafe fn shutdown(&mut self, device: &ash::Device) {
        for (_, sampler) in self.cache.drain() {
            device.destroy_sampler(sampler, None);
        }
    }
}
