//! Streaming globe surface: a quadtree tile scheduler for terrain and imagery.
//!
//! The globe's surface is a quadtree of tiles over a geographic tiling
//! scheme. Each frame the scheduler decides which tiles to draw from the
//! camera's screen-space error, fetches what they are missing through
//! prioritized lanes, and substitutes ancestor or placeholder data while
//! fetches are in flight, so the render loop never waits on the network.
//!
//! # Design principles
//!
//! - **Host-driven**: nothing happens between calls to [`Globe::update`]
//! - **Runtime-agnostic**: fetches run on a [`TaskSpawner`] the host provides
//! - **Always drawable**: every selected tile has an entry in the render list
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use globe_surface::{FramePump, FrameState, Globe, Rectangle, RectangleView};
//!
//! let pump = Arc::new(FramePump::new());
//! let mut globe = Globe::new(pump.clone());
//! let view = RectangleView::framing(Rectangle::from_degrees(5.0, 45.0, 10.0, 50.0), 1080.0);
//! while globe.tiles_loading() {
//!     globe.update(&FrameState::new(&view));
//!     pump.pump();
//! }
//! for tile in globe.render_list() {
//!     // draw tile
//! }
//! ```

pub mod config;
mod error;
pub mod event;
mod globe;
pub mod layer;
pub mod provider;
pub mod queue;
pub mod render;
pub mod spawn;
mod surface;
pub mod tile;
pub mod tiling;
pub mod view;

pub use config::SurfaceConfig;
pub use error::{Error, FailureKind, Result};
pub use event::{EventSource, Subscription};
pub use globe::Globe;
pub use layer::{ImageryLayer, LayerChange, LayerChangeKind, LayerCollection, LayerId};
pub use provider::{
    EllipsoidTerrainProvider, ImageryProvider, ProviderState, SingleTileImageryProvider,
    TemplateTileProvider, TerrainProvider, TileFuture, TileProvider,
};
pub use queue::{Lane, LaneCounts, LoadQueue, LoadSource, LoadTarget};
pub use render::{RenderImagery, RenderSource, RenderTile, UvTransform};
pub use spawn::{BoxFuture, FramePump, TaskSpawner};
pub use surface::{GlobeSurface, SurfaceDiagnostics};
pub use tile::{LoadSlot, QuadtreeTile, TileLoadState};
pub use tiling::{MAXIMUM_LEVEL, Projection, Rectangle, TileKey, TilingScheme};
pub use view::{FrameState, RectangleView, SurfaceView};
