//! Load queue manager: three priority lanes and a bounded in-flight set.
//!
//! Entries are admitted High before Medium before Low and, within a lane,
//! nearest first, then oldest first. A target that is already in flight is
//! never queued a second time. Cancelled requests keep their in-flight slot
//! until their fetch actually completes, so the bound on simultaneous
//! fetches holds even across cancellation.

use std::collections::HashMap;

use serde::Serialize;

use crate::layer::LayerId;
use crate::tiling::TileKey;

/// Priority class of a queued fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Lane {
    /// Data for tiles on screen right now.
    High,
    /// Detail for tiles that already draw something.
    Medium,
    /// Prefetch ahead of need.
    Low,
}

/// Which data a fetch is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadSource {
    Terrain,
    Imagery(LayerId),
}

/// A tile and the data source to fetch for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadTarget {
    pub tile: TileKey,
    pub source: LoadSource,
}

impl LoadTarget {
    #[must_use]
    pub fn terrain(tile: TileKey) -> Self {
        Self {
            tile,
            source: LoadSource::Terrain,
        }
    }

    #[must_use]
    pub fn imagery(tile: TileKey, layer: LayerId) -> Self {
        Self {
            tile,
            source: LoadSource::Imagery(layer),
        }
    }
}

/// Identifies one admitted fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub(crate) u64);

/// A queued entry promoted to an in-flight fetch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Admission {
    pub request: RequestId,
    pub target: LoadTarget,
    pub lane: Lane,
    pub score: f64,
}

/// Queued entries per lane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LaneCounts {
    /// Entries in the High lane.
    pub high: usize,
    /// Entries in the Medium lane.
    pub medium: usize,
    /// Entries in the Low lane.
    pub low: usize,
}

impl LaneCounts {
    #[must_use]
    pub fn total(&self) -> usize {
        self.high + self.medium + self.low
    }
}

#[derive(Debug, Clone, Copy)]
struct QueueEntry {
    lane: Lane,
    score: f64,
    sequence: u64,
}

/// Three-lane fetch queue with a bounded in-flight set.
#[derive(Debug, Default)]
pub struct LoadQueue {
    pending: HashMap<LoadTarget, QueueEntry>,
    /// Every admitted fetch that has not completed, cancelled or not.
    in_flight: HashMap<RequestId, LoadTarget>,
    /// The current, non-cancelled request for each in-flight target.
    active: HashMap<LoadTarget, RequestId>,
    next_sequence: u64,
    next_request: u64,
}

impl LoadQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a fetch, or move an already queued one to a new lane and score.
    ///
    /// Returns false, changing nothing, if the target is already in flight.
    pub fn enqueue(&mut self, target: LoadTarget, lane: Lane, score: f64) -> bool {
        if self.active.contains_key(&target) {
            return false;
        }
        let score = if score.is_nan() { f64::INFINITY } else { score };
        if let Some(entry) = self.pending.get_mut(&target) {
            entry.lane = lane;
            entry.score = score;
        } else {
            let sequence = self.next_sequence;
            self.next_sequence += 1;
            self.pending.insert(
                target,
                QueueEntry {
                    lane,
                    score,
                    sequence,
                },
            );
        }
        true
    }

    /// Admit queued entries until `max_in_flight` fetches are in flight.
    ///
    /// The result is in admission order.
    pub fn admit(&mut self, max_in_flight: usize) -> Vec<Admission> {
        let capacity = max_in_flight.saturating_sub(self.in_flight.len());
        if capacity == 0 || self.pending.is_empty() {
            return Vec::new();
        }

        let mut ordered: Vec<(LoadTarget, QueueEntry)> =
            self.pending.iter().map(|(t, e)| (*t, *e)).collect();
        ordered.sort_by(|(_, a), (_, b)| {
            a.lane
                .cmp(&b.lane)
                .then(a.score.total_cmp(&b.score))
                .then(a.sequence.cmp(&b.sequence))
        });
        ordered.truncate(capacity);

        ordered
            .into_iter()
            .map(|(target, entry)| {
                self.pending.remove(&target);
                let request = RequestId(self.next_request);
                self.next_request += 1;
                self.in_flight.insert(request, target);
                self.active.insert(target, request);
                Admission {
                    request,
                    target,
                    lane: entry.lane,
                    score: entry.score,
                }
            })
            .collect()
    }

    /// Release the in-flight slot of a completed fetch.
    ///
    /// Returns the target if the request is still current, `None` if it was
    /// cancelled or is unknown.
    pub fn finish(&mut self, request: RequestId) -> Option<LoadTarget> {
        let target = self.in_flight.remove(&request)?;
        if self.active.get(&target) == Some(&request) {
            self.active.remove(&target);
            Some(target)
        } else {
            None
        }
    }

    /// Drop a queued entry and cancel an in-flight fetch for `target`.
    pub fn cancel(&mut self, target: LoadTarget) {
        self.pending.remove(&target);
        self.active.remove(&target);
    }

    /// Cancel every queued or in-flight target matching `predicate`.
    ///
    /// Returns how many targets were affected.
    pub fn cancel_where(&mut self, mut predicate: impl FnMut(&LoadTarget) -> bool) -> usize {
        let before = self.pending.len() + self.active.len();
        self.pending.retain(|target, _| !predicate(target));
        self.active.retain(|target, _| !predicate(target));
        before - (self.pending.len() + self.active.len())
    }

    /// Drop every queued entry. In-flight fetches are untouched.
    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }

    /// Cancel everything. In-flight fetches still hold their slots until they
    /// complete.
    pub fn cancel_all(&mut self) {
        self.pending.clear();
        self.active.clear();
    }

    /// Queued entries per lane.
    #[must_use]
    pub fn lane_counts(&self) -> LaneCounts {
        let mut counts = LaneCounts::default();
        for entry in self.pending.values() {
            match entry.lane {
                Lane::High => counts.high += 1,
                Lane::Medium => counts.medium += 1,
                Lane::Low => counts.low += 1,
            }
        }
        counts
    }

    /// Fetches in flight, including cancelled ones not yet completed.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    #[must_use]
    pub fn is_queued(&self, target: &LoadTarget) -> bool {
        self.pending.contains_key(target)
    }

    #[must_use]
    pub fn is_in_flight(&self, target: &LoadTarget) -> bool {
        self.active.contains_key(target)
    }

    /// Nothing queued and nothing in flight.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.in_flight.is_empty()
    }
}
