//! Runs surface fetches on the Tokio runtime.
//!
//! reqwest needs a Tokio reactor, so the probe hands the globe a spawner
//! backed by the runtime `main` runs on.

use globe_surface::{BoxFuture, TaskSpawner};
use tokio::runtime::Handle;

/// A [`TaskSpawner`] over a Tokio runtime handle.
#[derive(Debug, Clone)]
pub struct TokioSpawner {
    handle: Handle,
}

impl TokioSpawner {
    /// A spawner for the runtime this is called from.
    ///
    /// Panics outside a Tokio runtime.
    #[must_use]
    pub fn current() -> Self {
        Self {
            handle: Handle::current(),
        }
    }
}

impl TaskSpawner for TokioSpawner {
    fn spawn(&self, task: BoxFuture) {
        // Detached: results come back through the surface's channel.
        drop(self.handle.spawn(task));
    }
}
