//! Heightmap decoding.
//!
//! Three encodings are understood:
//!
//! - Raw little-endian `f32` samples in row-major order (north row first)
//! - Terrain-RGB images: `h = -10000 + (R * 65536 + G * 256 + B) * 0.1`
//! - Terrarium images: `h = R * 256 + G + B / 256 - 32768`

use crate::error::{DecodeError, DecodeResult};

/// A grid of terrain heights in meters, row-major, north row first.
#[derive(Debug, Clone, PartialEq)]
pub struct Heightmap {
    /// Samples per row.
    pub width: u32,
    /// Number of rows.
    pub height: u32,
    /// Height samples in meters.
    pub heights: Vec<f32>,
}

impl Heightmap {
    /// A heightmap of zeros, used for ellipsoid-only terrain.
    #[must_use]
    pub fn flat(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            heights: vec![0.0; width as usize * height as usize],
        }
    }

    /// Height at a sample, or `None` outside the grid.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.heights
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Minimum and maximum height, or `None` for an empty grid.
    #[must_use]
    pub fn range(&self) -> Option<(f32, f32)> {
        self.heights.iter().copied().fold(None, |acc, h| match acc {
            None => Some((h, h)),
            Some((lo, hi)) => Some((lo.min(h), hi.max(h))),
        })
    }
}

/// Encoding of a heightmap payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeightmapEncoding {
    /// Raw little-endian `f32` samples with a known grid size.
    RawF32 { width: u32, height: u32 },
    /// Mapbox Terrain-RGB PNG.
    TerrainRgb,
    /// Terrarium PNG.
    Terrarium,
}

/// Decode a heightmap payload.
///
/// # Errors
///
/// Returns an error if the payload size does not match the encoding, the
/// image cannot be decoded, a sample is not finite, or the grid is empty.
pub fn decode_heightmap(bytes: &[u8], encoding: HeightmapEncoding) -> DecodeResult<Heightmap> {
    let heightmap = match encoding {
        HeightmapEncoding::RawF32 { width, height } => decode_raw_f32(bytes, width, height)?,
        HeightmapEncoding::TerrainRgb => decode_rgb_encoded(bytes, |r, g, b| {
            -10_000.0 + (r * 65_536.0 + g * 256.0 + b) * 0.1
        })?,
        HeightmapEncoding::Terrarium => {
            decode_rgb_encoded(bytes, |r, g, b| r * 256.0 + g + b / 256.0 - 32_768.0)?
        }
    };

    if heightmap.width == 0 || heightmap.height == 0 {
        return Err(DecodeError::InvalidDimensions {
            width: heightmap.width,
            height: heightmap.height,
        });
    }
    Ok(heightmap)
}

fn decode_raw_f32(bytes: &[u8], width: u32, height: u32) -> DecodeResult<Heightmap> {
    let count = width as usize * height as usize;
    let expected = count * 4;
    if bytes.len() < expected {
        return Err(DecodeError::BufferTooSmall {
            expected,
            actual: bytes.len(),
        });
    }
    if bytes.len() != expected {
        return Err(DecodeError::SizeMismatch {
            expected,
            actual: bytes.len(),
        });
    }

    let mut heights = Vec::with_capacity(count);
    for (i, chunk) in bytes.chunks_exact(4).enumerate() {
        let h = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        if !h.is_finite() {
            return Err(DecodeError::InvalidFormat {
                context: "raw heightmap",
                detail: format!("sample {i} is not finite"),
            });
        }
        heights.push(h);
    }

    Ok(Heightmap {
        width,
        height,
        heights,
    })
}

fn decode_rgb_encoded(bytes: &[u8], to_height: impl Fn(f32, f32, f32) -> f32) -> DecodeResult<Heightmap> {
    let image = image::load_from_memory(bytes)?.to_rgb8();
    let (width, height) = image.dimensions();
    let heights = image
        .pixels()
        .map(|p| {
            let [r, g, b] = p.0;
            to_height(f32::from(r), f32::from(g), f32::from(b))
        })
        .collect();

    Ok(Heightmap {
        width,
        height,
        heights,
    })
}
