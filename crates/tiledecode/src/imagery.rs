//! Imagery decoding.

use crate::error::{DecodeError, DecodeResult};

/// A decoded imagery tile, always expanded to 8-bit RGBA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageryTile {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel data, 4 bytes per pixel, row-major.
    pub rgba: Vec<u8>,
}

impl ImageryTile {
    /// A tile filled with one color.
    #[must_use]
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = width as usize * height as usize;
        Self {
            width,
            height,
            rgba: rgba.repeat(pixels),
        }
    }

    /// The pixel at `(x, y)`, or `None` outside the tile.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        let p = self.rgba.get(i..i + 4)?;
        Some([p[0], p[1], p[2], p[3]])
    }
}

/// Decode a PNG or JPEG payload into RGBA.
///
/// # Errors
///
/// Returns an error if the image format is not recognized or the image has
/// no pixels.
pub fn decode_image(bytes: &[u8]) -> DecodeResult<ImageryTile> {
    let image = image::load_from_memory(bytes)?.to_rgba8();
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(DecodeError::InvalidDimensions { width, height });
    }
    Ok(ImageryTile {
        width,
        height,
        rgba: image.into_raw(),
    })
}
