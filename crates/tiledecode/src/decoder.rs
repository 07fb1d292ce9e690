//! The decode capability consumed by tile providers.

use crate::error::DecodeResult;
use crate::heightmap::{Heightmap, HeightmapEncoding, decode_heightmap};
use crate::imagery::{ImageryTile, decode_image};

/// Turns fetched bytes into typed tile data.
pub trait TileDecoder: Send + Sync + 'static {
    /// The decoded tile type.
    type Output: Send + Sync + 'static;

    /// Decode one tile payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is malformed.
    fn decode(&self, bytes: &[u8]) -> DecodeResult<Self::Output>;
}

/// Decodes PNG or JPEG imagery.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageDecoder;

impl TileDecoder for ImageDecoder {
    type Output = ImageryTile;

    fn decode(&self, bytes: &[u8]) -> DecodeResult<ImageryTile> {
        decode_image(bytes)
    }
}

/// Decodes heightmaps in a fixed encoding.
#[derive(Debug, Clone, Copy)]
pub struct HeightmapDecoder {
    /// Encoding of every payload this decoder sees.
    pub encoding: HeightmapEncoding,
}

impl HeightmapDecoder {
    /// Create a decoder for the given encoding.
    #[must_use]
    pub fn new(encoding: HeightmapEncoding) -> Self {
        Self { encoding }
    }
}

impl TileDecoder for HeightmapDecoder {
    type Output = Heightmap;

    fn decode(&self, bytes: &[u8]) -> DecodeResult<Heightmap> {
        decode_heightmap(bytes, self.encoding)
    }
}
