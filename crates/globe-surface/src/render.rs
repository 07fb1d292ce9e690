//! The per-frame render list handed to the graphics layer.

use std::sync::Arc;

use glam::DVec2;
use tiledecode::{Heightmap, ImageryTile};

use crate::layer::LayerId;
use crate::tiling::{Rectangle, TileKey};

/// Maps a tile's unit texture coordinates into an ancestor's texture.
///
/// Coordinates run west to east and south to north. The mapping is taken in
/// tile grid space, so it holds for any projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvTransform {
    /// Where the tile's `(0, 0)` corner lands in the ancestor.
    pub offset: DVec2,
    /// Fraction of the ancestor the tile spans on each axis.
    pub scale: DVec2,
}

impl UvTransform {
    pub const IDENTITY: Self = Self {
        offset: DVec2::ZERO,
        scale: DVec2::ONE,
    };

    /// The transform from `tile` into `ancestor`. Identity unless `tile`
    /// lies strictly within `ancestor`.
    #[must_use]
    pub fn between(tile: TileKey, ancestor: TileKey) -> Self {
        let Some(depth) = tile.level.checked_sub(ancestor.level) else {
            return Self::IDENTITY;
        };
        if depth == 0 || !tile.is_within(ancestor) {
            return Self::IDENTITY;
        }
        let span = 2f64.powi(i32::try_from(depth).unwrap_or(i32::MAX));
        let mask = (1u64 << depth.min(63)) - 1;
        let column = f64::from(u32::try_from(u64::from(tile.x) & mask).unwrap_or(0));
        let row = f64::from(u32::try_from(u64::from(tile.y) & mask).unwrap_or(0));
        Self {
            // Rows count north to south, v counts south to north.
            offset: DVec2::new(column / span, (span - 1.0 - row) / span),
            scale: DVec2::splat(1.0 / span),
        }
    }

    #[must_use]
    pub fn apply(&self, uv: DVec2) -> DVec2 {
        self.offset + uv * self.scale
    }
}

/// Where a tile's terrain or imagery comes from this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderSource {
    /// The tile's own data.
    Own,
    /// The nearest loaded ancestor's data, sampled through `uv`.
    Ancestor { key: TileKey, uv: UvTransform },
    /// Nothing loaded anywhere up the tree.
    Placeholder,
}

impl RenderSource {
    #[must_use]
    pub fn is_own(&self) -> bool {
        matches!(self, Self::Own)
    }
}

/// One imagery layer's contribution to a tile.
#[derive(Debug, Clone)]
pub struct RenderImagery {
    /// The layer this entry draws.
    pub layer: LayerId,
    /// Whose imagery is sampled.
    pub source: RenderSource,
    /// The sampled image, `None` for a placeholder.
    pub data: Option<Arc<ImageryTile>>,
    /// Layer opacity, 0 to 1.
    pub alpha: f32,
    /// Layer brightness multiplier.
    pub brightness: f32,
}

/// A tile to draw this frame.
#[derive(Debug, Clone)]
pub struct RenderTile {
    pub key: TileKey,
    /// Geographic bounds of the tile.
    pub rectangle: Rectangle,
    /// Whose terrain is drawn.
    pub terrain: RenderSource,
    /// The drawn heightmap, `None` for a placeholder.
    pub terrain_data: Option<Arc<Heightmap>>,
    /// Visible layers, bottom to top.
    pub imagery: Vec<RenderImagery>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiling::TilingScheme;

    #[test]
    fn test_uv_of_child_quarter() {
        let scheme = TilingScheme::geographic();
        let parent = TileKey::new(1, 0, 0);
        // South-east child.
        let child = parent.children()[3];

        let uv = UvTransform::between(child, parent);
        assert!((uv.scale - DVec2::splat(0.5)).length() < 1e-12);
        assert!((uv.offset - DVec2::new(0.5, 0.0)).length() < 1e-12);
        assert!((uv.apply(DVec2::ONE) - DVec2::new(1.0, 0.5)).length() < 1e-12);

        // Agrees with the rectangles in an equirectangular scheme.
        let p = scheme.rectangle_of(parent);
        let c = scheme.rectangle_of(child);
        assert!((uv.offset.x - (c.west - p.west) / p.width()).abs() < 1e-12);
        assert!((uv.offset.y - (c.south - p.south) / p.height()).abs() < 1e-12);
    }

    #[test]
    fn test_uv_two_levels_up() {
        // 3/5/2 within 1/1/0: column 1 of 4, row 2 of 4 from the north.
        let uv = UvTransform::between(TileKey::new(3, 5, 2), TileKey::new(1, 1, 0));
        assert!((uv.scale - DVec2::splat(0.25)).length() < 1e-12);
        assert!((uv.offset - DVec2::new(0.25, 0.25)).length() < 1e-12);
    }

    #[test]
    fn test_identity() {
        let key = TileKey::new(2, 1, 1);
        assert_eq!(UvTransform::between(key, key), UvTransform::IDENTITY);
        assert_eq!(
            UvTransform::between(key, TileKey::new(1, 1, 1)),
            UvTransform::IDENTITY
        );
        assert!((UvTransform::IDENTITY.apply(DVec2::ONE) - DVec2::ONE).length() < 1e-12);
    }
}
