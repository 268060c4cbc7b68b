/// CPU-side texture images handed to the renderer for upload
///
/// Pixels are 8 bits per channel, tightly packed, rows top to bottom. Images
/// with three channels are expanded to RGBA on upload since three-channel
/// formats are rarely sampleable.

use std::borrow::Cow;
use crate::engine_bail;
use crate::error::{Error, Result};
use crate::graphics_device::{TextureDesc, TextureFormat, TextureKind};

/// A single 2D image
#[derive(Debug, Clone)]
pub struct Texture2D {
    name: String,
    width: u32,
    height: u32,
    channels: u32,
    srgb: bool,
    pixels: Vec<u8>,
}

impl Texture2D {
    pub fn new(name: impl Into<String>, width: u32, height: u32, channels: u32, pixels: Vec<u8>) -> Result<Self> {
        let name = name.into();
        validate_image(&name, width, height, channels, 1, pixels.len())?;
        Ok(Self { name, width, height, channels, srgb: true, pixels })
    }

    /// Treat the pixels as linear data (normal maps, masks)
    pub fn with_linear_color(mut self) -> Self {
        self.srgb = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u32 {
        self.channels
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Upload format and the pixel bytes in that format
    pub fn upload_data(&self) -> (TextureFormat, Cow<'_, [u8]>) {
        upload_data(self.channels, self.srgb, &self.pixels)
    }

    /// Build the device descriptor; `data` must come from [`Texture2D::upload_data`]
    pub fn desc<'a>(&'a self, format: TextureFormat, data: &'a [u8]) -> TextureDesc<'a> {
        TextureDesc {
            name: &self.name,
            width: self.width,
            height: self.height,
            format,
            kind: TextureKind::Texture2D,
            data,
        }
    }
}

/// Six square faces in +X, -X, +Y, -Y, +Z, -Z order, stored back to back
#[derive(Debug, Clone)]
pub struct TextureCubemap {
    name: String,
    size: u32,
    channels: u32,
    srgb: bool,
    pixels: Vec<u8>,
}

impl TextureCubemap {
    pub fn new(name: impl Into<String>, size: u32, channels: u32, pixels: Vec<u8>) -> Result<Self> {
        let name = name.into();
        validate_image(&name, size, size, channels, 6, pixels.len())?;
        Ok(Self { name, size, channels, srgb: true, pixels })
    }

    /// Assemble a cubemap from six separate faces
    pub fn from_faces(name: impl Into<String>, size: u32, channels: u32, faces: [&[u8]; 6]) -> Result<Self> {
        let pixels = faces.concat();
        Self::new(name, size, channels, pixels)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Edge length of each face
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn channels(&self) -> u32 {
        self.channels
    }

    /// Pixels of one face (0..6)
    pub fn face(&self, index: usize) -> Option<&[u8]> {
        let face_bytes = (self.size * self.size * self.channels) as usize;
        self.pixels.get(index * face_bytes..(index + 1) * face_bytes)
    }

    pub fn upload_data(&self) -> (TextureFormat, Cow<'_, [u8]>) {
        upload_data(self.channels, self.srgb, &self.pixels)
    }

    pub fn desc<'a>(&'a self, format: TextureFormat, data: &'a [u8]) -> TextureDesc<'a> {
        TextureDesc {
            name: &self.name,
            width: self.size,
            height: self.size,
            format,
            kind: TextureKind::Cubemap,
            data,
        }
    }
}

fn validate_image(name: &str, width: u32, height: u32, channels: u32, layers: u32, len: usize) -> Result<()> {
    if width == 0 || height == 0 {
        engine_bail!("prism::Texture" => Error::InvalidResource,
            "[Texture] '{}' has zero extent ({}x{})", name, width, height);
    }
    if !(1..=4).contains(&channels) {
        engine_bail!("prism::Texture" => Error::InvalidResource,
            "[Texture] '{}' has {} channels (expected 1 to 4)", name, channels);
    }
    let expected = width as usize * height as usize * channels as usize * layers as usize;
    if len != expected {
        engine_bail!("prism::Texture" => Error::InvalidResource,
            "[Texture] '{}' has {} bytes of pixels, expected {} ({}x{}x{} x {} layers)",
            name, len, expected, width, height, channels, layers);
    }
    Ok(())
}

fn upload_data(channels: u32, srgb: bool, pixels: &[u8]) -> (TextureFormat, Cow<'_, [u8]>) {
    if let Some(format) = TextureFormat::from_channels(channels, srgb) {
        return (format, Cow::Borrowed(pixels));
    }

    // RGB -> RGBA, opaque alpha
    let mut rgba = Vec::with_capacity(pixels.len() / 3 * 4);
    for rgb in pixels.chunks_exact(3) {
        rgba.extend_from_slice(rgb);
        rgba.push(u8::MAX);
    }
    let format = if srgb { TextureFormat::R8G8B8A8_SRGB } else { TextureFormat::R8G8B8A8_UNORM };
    (format, Cow::Owned(rgba))
}

#[cfg(test)]
#[path = "texture_tests.rs"]
mod tests;
