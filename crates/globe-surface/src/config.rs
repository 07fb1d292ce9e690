//! Scheduler policy constants.

use serde::{Deserialize, Serialize};

/// Screen-space error, in pixels, above which a tile is refined.
pub const DEFAULT_MAXIMUM_SCREEN_SPACE_ERROR: f64 = 2.0;

/// Fetches allowed in flight at once, shared by terrain and imagery.
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 16;

/// Failed fetches tolerated per tile and source before giving up.
pub const DEFAULT_MAX_FETCH_ATTEMPTS: u32 = 3;

/// Frames to wait before retrying a failed fetch.
pub const DEFAULT_RETRY_DELAY_FRAMES: u64 = 8;

/// Frames a subtree may go unvisited before it is evicted.
pub const DEFAULT_TILE_RETENTION_FRAMES: u64 = 300;

/// Tunable policy for the surface scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    /// Screen-space error, in pixels, above which a tile is refined.
    pub maximum_screen_space_error: f64,
    /// Fetches allowed in flight at once.
    pub max_concurrent_requests: usize,
    /// Failed fetches tolerated per tile and source; the last failure is final.
    pub max_fetch_attempts: u32,
    /// Frames to wait before retrying a failed fetch.
    pub retry_delay_frames: u64,
    /// Frames a subtree may go unvisited before it is evicted.
    pub tile_retention_frames: u64,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            maximum_screen_space_error: DEFAULT_MAXIMUM_SCREEN_SPACE_ERROR,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            max_fetch_attempts: DEFAULT_MAX_FETCH_ATTEMPTS,
            retry_delay_frames: DEFAULT_RETRY_DELAY_FRAMES,
            tile_retention_frames: DEFAULT_TILE_RETENTION_FRAMES,
        }
    }
}

impl SurfaceConfig {
    /// Set the refinement threshold.
    #[must_use]
    pub fn with_maximum_screen_space_error(mut self, pixels: f64) -> Self {
        self.maximum_screen_space_error = pixels;
        self
    }

    /// Set the in-flight bound. Zero is treated as one.
    #[must_use]
    pub fn with_max_concurrent_requests(mut self, count: usize) -> Self {
        self.max_concurrent_requests = count.max(1);
        self
    }

    /// Set how many failures end a tile's attempts. Zero is treated as one.
    #[must_use]
    pub fn with_max_fetch_attempts(mut self, attempts: u32) -> Self {
        self.max_fetch_attempts = attempts.max(1);
        self
    }

    /// Set the retry delay.
    #[must_use]
    pub fn with_retry_delay_frames(mut self, frames: u64) -> Self {
        self.retry_delay_frames = frames;
        self
    }

    /// Set the eviction window.
    #[must_use]
    pub fn with_tile_retention_frames(mut self, frames: u64) -> Self {
        self.tile_retention_frames = frames;
        self
    }
}
