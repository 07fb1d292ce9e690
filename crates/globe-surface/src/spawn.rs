//! Task spawning for tile fetches.
//!
//! The surface never awaits anything itself. Fetches are handed to a
//! [`TaskSpawner`] and report back through a channel that is drained at the
//! start of each update. Hosts with a multi-threaded runtime implement the
//! trait over that runtime; single-threaded hosts and tests use [`FramePump`].

use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};
use std::task::{Context, Poll, Waker};

/// A boxed background task.
pub type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Runs background tasks to completion.
///
/// Tasks return nothing. Results travel back over `async_channel`.
pub trait TaskSpawner: Send + Sync {
    fn spawn(&self, task: BoxFuture);
}

/// Cooperative spawner: tasks make progress only when [`FramePump::pump`] is
/// called.
///
/// Tasks are polled without a waker, so they must be able to make progress by
/// being polled again. Channel receivers and ready futures qualify; futures
/// that need a reactor (timers, sockets) do not.
#[derive(Default)]
pub struct FramePump {
    tasks: Mutex<Vec<BoxFuture>>,
}

impl FramePump {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Poll every task once. Returns how many completed.
    ///
    /// Tasks spawned while pumping are polled on the next call.
    pub fn pump(&self) -> usize {
        let mut tasks = std::mem::take(&mut *self.lock());
        let mut cx = Context::from_waker(Waker::noop());
        let before = tasks.len();
        tasks.retain_mut(|task| task.as_mut().poll(&mut cx) == Poll::Pending);
        let completed = before - tasks.len();

        // Keep tasks that were spawned during polling.
        let mut queue = self.lock();
        tasks.append(&mut queue);
        *queue = tasks;
        completed
    }

    /// Tasks not yet complete.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<BoxFuture>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TaskSpawner for FramePump {
    fn spawn(&self, task: BoxFuture) {
        self.lock().push(task);
    }
}

impl std::fmt::Debug for FramePump {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramePump")
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_tasks_run_only_when_pumped() {
        let pump = FramePump::new();
        let ran = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&ran);
        pump.spawn(Box::pin(async move {
            r.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(pump.pending(), 1);
        assert_eq!(pump.pump(), 1);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(pump.pending(), 0);
    }

    #[test]
    fn test_pending_task_resumes_after_send() {
        let pump = FramePump::new();
        let (tx, rx) = async_channel::bounded::<u32>(1);
        let got = Arc::new(AtomicUsize::new(0));
        let g = Arc::clone(&got);
        pump.spawn(Box::pin(async move {
            if let Ok(v) = rx.recv().await {
                g.store(v as usize, Ordering::SeqCst);
            }
        }));

        assert_eq!(pump.pump(), 0);
        tx.try_send(42).unwrap();
        assert_eq!(pump.pump(), 1);
        assert_eq!(got.load(Ordering::SeqCst), 42);
    }
}
