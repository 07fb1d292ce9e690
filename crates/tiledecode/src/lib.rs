//! Decode fetched terrain and imagery tile payloads.
//!
//! This crate provides pure synchronous decoding of the bytes a tile provider
//! fetches into the typed data the surface scheduler stores on each tile.
//!
//! # Design principles
//!
//! - **Synchronous**: No async, no threading primitives
//! - **User-controlled parallelism**: Callers decide where decoding runs
//! - **Total**: Malformed input is an error, never a panic

mod decoder;
mod error;
mod heightmap;
mod imagery;

pub use decoder::{HeightmapDecoder, ImageDecoder, TileDecoder};
pub use error::{DecodeError, DecodeResult};
pub use heightmap::{Heightmap, HeightmapEncoding, decode_heightmap};
pub use imagery::{ImageryTile, decode_image};
