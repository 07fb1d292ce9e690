//! Tile addressing and tiling schemes.
//!
//! Tiles are addressed by `(level, x, y)`. Level 0 holds the root tiles;
//! every level below splits each tile into a 2x2 grid. Columns count west to
//! east and rows north to south. The grid is regular in the scheme's
//! projection: equirectangular for [`TilingScheme::geographic`], spherical
//! Mercator for [`TilingScheme::web_mercator`].

use std::f64::consts::{FRAC_PI_2, PI};
use std::fmt;

/// Semi-major axis of the WGS84 ellipsoid in meters.
pub const WGS84_RADIUS_M: f64 = 6_378_137.0;

/// Heightmap samples per tile edge assumed when estimating geometric error.
const HEIGHTMAP_SAMPLES: f64 = 65.0;

/// Deepest level a provider may serve. Keys of every child at this level
/// still fit in `u32` for root grids up to two tiles wide.
pub const MAXIMUM_LEVEL: u32 = 30;

/// Latitude bound of the Web Mercator square, in radians (about 85.05°).
pub const WEB_MERCATOR_MAX_LATITUDE: f64 = 1.484_422_229_745_332;

/// Identifies one quadtree cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    /// Depth in the quadtree, 0 for roots.
    pub level: u32,
    /// Column within the level.
    pub x: u32,
    /// Row within the level.
    pub y: u32,
}

impl TileKey {
    /// Create a tile key.
    #[must_use]
    pub const fn new(level: u32, x: u32, y: u32) -> Self {
        Self { level, x, y }
    }

    /// The parent key, or `None` for a root.
    #[must_use]
    pub fn parent(self) -> Option<Self> {
        (self.level > 0).then(|| Self::new(self.level - 1, self.x / 2, self.y / 2))
    }

    /// The four child keys: north-west, north-east, south-west, south-east.
    #[must_use]
    pub fn children(self) -> [Self; 4] {
        let (level, x, y) = (self.level + 1, self.x * 2, self.y * 2);
        [
            Self::new(level, x, y),
            Self::new(level, x + 1, y),
            Self::new(level, x, y + 1),
            Self::new(level, x + 1, y + 1),
        ]
    }

    /// The ancestor at `level`, `self` at its own level, `None` below it.
    #[must_use]
    pub fn ancestor_at(self, level: u32) -> Option<Self> {
        let shift = self.level.checked_sub(level)?;
        Some(Self::new(level, self.x >> shift, self.y >> shift))
    }

    /// Whether `self` is `other` or one of its descendants.
    #[must_use]
    pub fn is_within(self, other: Self) -> bool {
        self.ancestor_at(other.level) == Some(other)
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.level, self.x, self.y)
    }
}

/// A geographic rectangle in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rectangle {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Rectangle {
    /// The whole globe.
    pub const MAX_VALUE: Self = Self {
        west: -PI,
        south: -FRAC_PI_2,
        east: PI,
        north: FRAC_PI_2,
    };

    /// Create a rectangle from radians.
    #[must_use]
    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Create a rectangle from degrees.
    #[must_use]
    pub fn from_degrees(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self::new(
            west.to_radians(),
            south.to_radians(),
            east.to_radians(),
            north.to_radians(),
        )
    }

    /// East-west extent in radians.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    /// North-south extent in radians.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    /// Center as `(longitude, latitude)` in radians.
    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        (
            (self.west + self.east) * 0.5,
            (self.south + self.north) * 0.5,
        )
    }

    /// Whether any corner is non-finite or the rectangle has no area.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        let corners = [self.west, self.south, self.east, self.north];
        corners.iter().any(|v| !v.is_finite()) || self.width() <= 0.0 || self.height() <= 0.0
    }

    /// Whether the two rectangles overlap with positive area.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.west < other.east
            && other.west < self.east
            && self.south < other.north
            && other.south < self.north
    }

    /// Clamp a point to the rectangle.
    #[must_use]
    pub fn clamp(&self, lon: f64, lat: f64) -> (f64, f64) {
        (
            lon.clamp(self.west, self.east),
            lat.clamp(self.south, self.north),
        )
    }
}

/// How tile rows map to latitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Projection {
    /// Rows are evenly spaced in latitude.
    #[default]
    Geographic,
    /// Rows are evenly spaced in spherical Mercator y, as in XYZ web tiles.
    WebMercator,
}

/// Lays tiles out over a geographic rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TilingScheme {
    rectangle: Rectangle,
    roots_x: u32,
    roots_y: u32,
    projection: Projection,
}

impl TilingScheme {
    /// Two root tiles covering the globe in equirectangular projection.
    #[must_use]
    pub fn geographic() -> Self {
        Self::new(Rectangle::MAX_VALUE, 2, 1)
    }

    /// One root tile covering the Web Mercator square, the layout of
    /// `{z}/{x}/{y}` web map tiles.
    #[must_use]
    pub fn web_mercator() -> Self {
        Self {
            rectangle: Rectangle::new(
                -PI,
                -WEB_MERCATOR_MAX_LATITUDE,
                PI,
                WEB_MERCATOR_MAX_LATITUDE,
            ),
            roots_x: 1,
            roots_y: 1,
            projection: Projection::WebMercator,
        }
    }

    /// An equirectangular scheme over an arbitrary rectangle with the given
    /// root grid.
    #[must_use]
    pub fn new(rectangle: Rectangle, roots_x: u32, roots_y: u32) -> Self {
        Self {
            rectangle,
            roots_x: roots_x.max(1),
            roots_y: roots_y.max(1),
            projection: Projection::Geographic,
        }
    }

    /// The covered rectangle.
    #[must_use]
    pub fn rectangle(&self) -> Rectangle {
        self.rectangle
    }

    #[must_use]
    pub fn projection(&self) -> Projection {
        self.projection
    }

    /// Number of tiles in `(x, y)` at `level`.
    #[must_use]
    pub fn tiles_at_level(&self, level: u32) -> (u64, u64) {
        let scale = 1u64.checked_shl(level).unwrap_or(u64::MAX);
        (
            u64::from(self.roots_x).saturating_mul(scale),
            u64::from(self.roots_y).saturating_mul(scale),
        )
    }

    /// Keys of every root tile, row by row.
    #[must_use]
    pub fn root_keys(&self) -> Vec<TileKey> {
        (0..self.roots_y)
            .flat_map(|y| (0..self.roots_x).map(move |x| TileKey::new(0, x, y)))
            .collect()
    }

    /// Whether `key` addresses a tile that exists in this scheme.
    #[must_use]
    pub fn contains(&self, key: TileKey) -> bool {
        let (nx, ny) = self.tiles_at_level(key.level);
        u64::from(key.x) < nx && u64::from(key.y) < ny
    }

    /// Geographic bounds of a tile.
    ///
    /// Both edges are computed from the west/north origin so that the four
    /// children of a tile share its outer edges exactly.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn rectangle_of(&self, key: TileKey) -> Rectangle {
        let (nx, ny) = self.tiles_at_level(key.level);
        let tile_width = self.rectangle.width() / nx as f64;
        let x = f64::from(key.x);
        let y = f64::from(key.y);
        let (north, south) = match self.projection {
            Projection::Geographic => {
                let tile_height = self.rectangle.height() / ny as f64;
                (
                    self.rectangle.north - y * tile_height,
                    self.rectangle.north - (y + 1.0) * tile_height,
                )
            }
            Projection::WebMercator => (
                mercator_latitude(y / ny as f64),
                mercator_latitude((y + 1.0) / ny as f64),
            ),
        };
        Rectangle {
            west: self.rectangle.west + x * tile_width,
            east: self.rectangle.west + (x + 1.0) * tile_width,
            north,
            south,
        }
    }

    /// Estimated maximum geometric error of a tile at `level`, in meters.
    #[must_use]
    pub fn geometric_error(&self, level: u32) -> f64 {
        let level_zero = WGS84_RADIUS_M * 2.0 * PI * 0.25
            / (HEIGHTMAP_SAMPLES * f64::from(self.roots_x));
        level_zero / 2f64.powi(i32::try_from(level).unwrap_or(i32::MAX))
    }
}

/// Latitude of a row edge at `fraction` of the way from the north edge of the
/// Mercator square to the south edge.
fn mercator_latitude(fraction: f64) -> f64 {
    (PI * (1.0 - 2.0 * fraction)).sinh().atan()
}

impl Default for TilingScheme {
    fn default() -> Self {
        Self::geographic()
    }
}
