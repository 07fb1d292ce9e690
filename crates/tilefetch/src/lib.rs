//! Asynchronous resource fetching for globe tile providers.
//!
//! This crate provides the fetch capability the surface scheduler's tile
//! providers consume: a [`ResourceFetcher`] trait that returns a deferred
//! result immediately, an HTTP implementation backed by reqwest, and response
//! caches keyed by URL.
//!
//! # Design principles
//!
//! - **Non-blocking**: `fetch` returns a boxed future and never waits
//! - **Runtime-agnostic**: futures can be driven by any executor that
//!   satisfies reqwest
//! - **Typed responses**: callers ask for a document or a binary payload
//!
//! # Example
//!
//! ```ignore
//! use tilefetch::{HttpFetcher, MemoryCache, ResourceFetcher, ResourceRequest};
//!
//! let fetcher = HttpFetcher::with_cache(MemoryCache::with_max_bytes(64 << 20));
//! let metadata = fetcher
//!     .fetch(ResourceRequest::document("https://example.com/terrain/layer.json"))
//!     .await?;
//! ```

pub mod cache;
mod error;
mod fetcher;
mod request;

pub use cache::{MemoryCache, NoCache, ResponseCache};
pub use error::{Error, Result};
pub use fetcher::{FetchFuture, HttpFetcher, ResourceFetcher};
pub use request::{Payload, ResourceRequest, ResponseKind};
