/// Texture descriptors

/// Texture pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum TextureFormat {
    R8_UNORM,
    R8G8_UNORM,
    R8G8B8A8_UNORM,
    R8G8B8A8_SRGB,
    B8G8R8A8_SRGB,
    D32_FLOAT,
}

impl TextureFormat {
    /// Bytes per pixel
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            TextureFormat::R8_UNORM => 1,
            TextureFormat::R8G8_UNORM => 2,
            TextureFormat::R8G8B8A8_UNORM
            | TextureFormat::R8G8B8A8_SRGB
            | TextureFormat::B8G8R8A8_SRGB
            | TextureFormat::D32_FLOAT => 4,
        }
    }

    /// Sampled color format for an image with `channels` 8-bit channels
    ///
    /// Three-channel images have no widely supported Vulkan format and are
    /// expanded to four channels by the caller.
    pub fn from_channels(channels: u32, srgb: bool) -> Option<Self> {
        match (channels, srgb) {
            (1, _) => Some(TextureFormat::R8_UNORM),
            (2, _) => Some(TextureFormat::R8G8_UNORM),
            (4, false) => Some(TextureFormat::R8G8B8A8_UNORM),
            (4, true) => Some(TextureFormat::R8G8B8A8_SRGB),
            _ => None,
        }
    }
}

/// Texture dimensionality
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureKind {
    Texture2D,
    /// Six square layers in +X, -X, +Y, -Y, +Z, -Z order
    Cubemap,
}

impl TextureKind {
    pub fn layer_count(&self) -> u32 {
        match self {
            TextureKind::Texture2D => 1,
            TextureKind::Cubemap => 6,
        }
    }
}

/// Descriptor for creating a sampled texture
#[derive(Debug, Clone)]
pub struct TextureDesc<'a> {
    pub name: &'a str,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub kind: TextureKind,
    /// Tightly packed pixels, all layers back to back
    pub data: &'a [u8],
}

impl TextureDesc<'_> {
    /// Expected length of `data`
    pub fn expected_size(&self) -> usize {
        self.width as usize
            * self.height as usize
            * self.format.bytes_per_pixel() as usize
            * self.kind.layer_count() as usize
    }
}
