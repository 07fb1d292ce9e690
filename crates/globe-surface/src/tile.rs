//! The quadtree tile and its per-source load state machine.
//!
//! Terrain and every imagery layer load independently, so each tile carries
//! one [`LoadSlot`] for terrain and one per layer. A slot moves through
//!
//! ```text
//! Unloaded -> Loading -> Done
//!                     -> Failed -> Loading (retry, bounded)
//! ```
//!
//! and a slot that failed on its last allowed attempt stays `Failed`.

use std::collections::HashMap;
use std::sync::Arc;

use tiledecode::{Heightmap, ImageryTile};

use crate::layer::LayerId;
use crate::queue::RequestId;
use crate::tiling::{Rectangle, TileKey};

/// Load state of one data source on one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileLoadState {
    Unloaded,
    Loading,
    Done,
    Failed,
}

/// State machine for one source (terrain or a layer) on one tile.
#[derive(Debug, Clone, Default)]
pub struct LoadSlot {
    state: SlotState,
    attempts: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum SlotState {
    #[default]
    Unloaded,
    Loading(RequestId),
    Done,
    /// Failed; retry allowed from the given frame, or never.
    Failed(Option<u64>),
}

impl LoadSlot {
    /// A slot that has failed for good, used for tiles that can never load.
    #[must_use]
    pub(crate) fn exhausted() -> Self {
        Self {
            state: SlotState::Failed(None),
            attempts: 0,
        }
    }

    /// Public view of the state.
    #[must_use]
    pub fn state(&self) -> TileLoadState {
        match self.state {
            SlotState::Unloaded => TileLoadState::Unloaded,
            SlotState::Loading(_) => TileLoadState::Loading,
            SlotState::Done => TileLoadState::Done,
            SlotState::Failed(_) => TileLoadState::Failed,
        }
    }

    /// Failed fetches so far.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state == SlotState::Done
    }

    /// Failed with no retries left.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.state == SlotState::Failed(None)
    }

    /// Done, or failed for good: nothing more will change without invalidation.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.is_done() || self.is_exhausted()
    }

    /// Whether a fetch should be queued at `frame`.
    #[must_use]
    pub fn needs_request(&self, frame: u64) -> bool {
        match self.state {
            SlotState::Unloaded => true,
            SlotState::Failed(Some(retry_at)) => frame >= retry_at,
            SlotState::Loading(_) | SlotState::Done | SlotState::Failed(None) => false,
        }
    }

    /// Failed, with a retry scheduled after `frame`.
    #[must_use]
    pub fn awaiting_retry(&self, frame: u64) -> bool {
        matches!(self.state, SlotState::Failed(Some(retry_at)) if frame < retry_at)
    }

    /// The request this slot is waiting on.
    #[must_use]
    pub(crate) fn pending_request(&self) -> Option<RequestId> {
        match self.state {
            SlotState::Loading(request) => Some(request),
            _ => None,
        }
    }

    /// `Unloaded | Failed -> Loading`. Returns false for any other state.
    pub(crate) fn begin(&mut self, request: RequestId) -> bool {
        match self.state {
            SlotState::Unloaded | SlotState::Failed(Some(_)) => {
                self.state = SlotState::Loading(request);
                true
            }
            _ => false,
        }
    }

    /// `Loading -> Done`.
    pub(crate) fn succeed(&mut self) {
        self.state = SlotState::Done;
    }

    /// `Loading -> Failed`. Returns true when no retries remain.
    pub(crate) fn fail(&mut self, frame: u64, max_attempts: u32, retry_delay: u64) -> bool {
        self.attempts += 1;
        if self.attempts >= max_attempts {
            self.state = SlotState::Failed(None);
            true
        } else {
            self.state = SlotState::Failed(Some(frame + retry_delay));
            false
        }
    }

    /// Abandon an in-flight request without counting it as a failure.
    pub(crate) fn cancel(&mut self) {
        if matches!(self.state, SlotState::Loading(_)) {
            self.state = SlotState::Unloaded;
        }
    }

    /// Forget failures: a failed slot gets a fresh set of attempts.
    /// Done and in-flight slots are left alone.
    pub(crate) fn invalidate(&mut self) {
        if matches!(self.state, SlotState::Unloaded | SlotState::Failed(_)) {
            self.state = SlotState::Unloaded;
            self.attempts = 0;
        }
    }
}

/// Per-layer imagery state on a tile.
#[derive(Debug, Clone, Default)]
pub struct ImagerySlot {
    pub slot: LoadSlot,
    pub data: Option<Arc<ImageryTile>>,
}

/// One cell of the surface quadtree.
#[derive(Debug, Clone)]
pub struct QuadtreeTile {
    key: TileKey,
    rectangle: Rectangle,
    parent: Option<TileKey>,
    children: Option<[TileKey; 4]>,
    pub(crate) terrain: LoadSlot,
    pub(crate) terrain_data: Option<Arc<Heightmap>>,
    renderable: bool,
    upsampled_from_parent: bool,
    pub(crate) imagery: HashMap<LayerId, ImagerySlot>,
    pub(crate) last_selection_frame: Option<u64>,
    pub(crate) last_visited_frame: u64,
}

impl QuadtreeTile {
    fn new(key: TileKey, rectangle: Rectangle, parent: Option<TileKey>, frame: u64) -> Self {
        // A tile without area can never be drawn from its own data.
        let terrain = if rectangle.is_degenerate() {
            LoadSlot::exhausted()
        } else {
            LoadSlot::default()
        };
        Self {
            key,
            rectangle,
            parent,
            children: None,
            terrain,
            terrain_data: None,
            renderable: false,
            upsampled_from_parent: false,
            imagery: HashMap::new(),
            last_selection_frame: None,
            last_visited_frame: frame,
        }
    }

    /// A root tile; not renderable until its terrain loads.
    #[must_use]
    pub(crate) fn root(key: TileKey, rectangle: Rectangle, frame: u64) -> Self {
        Self::new(key, rectangle, None, frame)
    }

    /// A child of `parent`, renderable from the parent's data straight away.
    #[must_use]
    pub(crate) fn child_of(parent: &Self, key: TileKey, rectangle: Rectangle, frame: u64) -> Self {
        let mut tile = Self::new(key, rectangle, Some(parent.key), frame);
        tile.renderable = parent.renderable;
        tile.upsampled_from_parent = parent.renderable;
        tile
    }

    #[must_use]
    pub fn key(&self) -> TileKey {
        self.key
    }

    #[must_use]
    pub fn level(&self) -> u32 {
        self.key.level
    }

    #[must_use]
    pub fn rectangle(&self) -> Rectangle {
        self.rectangle
    }

    /// Parent key; look it up in the surface to reach the parent.
    #[must_use]
    pub fn parent(&self) -> Option<TileKey> {
        self.parent
    }

    #[must_use]
    pub fn children(&self) -> Option<[TileKey; 4]> {
        self.children
    }

    /// Has at least coarse data sufficient to draw.
    #[must_use]
    pub fn is_renderable(&self) -> bool {
        self.renderable
    }

    /// Drawn from an ancestor's terrain rather than its own.
    #[must_use]
    pub fn is_upsampled_from_parent(&self) -> bool {
        self.upsampled_from_parent
    }

    #[must_use]
    pub fn terrain(&self) -> &LoadSlot {
        &self.terrain
    }

    #[must_use]
    pub fn terrain_state(&self) -> TileLoadState {
        self.terrain.state()
    }

    #[must_use]
    pub fn terrain_data(&self) -> Option<&Arc<Heightmap>> {
        self.terrain_data.as_ref()
    }

    /// Imagery state for a layer; `None` until the layer was first considered.
    #[must_use]
    pub fn imagery(&self, layer: LayerId) -> Option<&ImagerySlot> {
        self.imagery.get(&layer)
    }

    /// Load state of a layer's imagery, `Unloaded` if never considered.
    #[must_use]
    pub fn imagery_state(&self, layer: LayerId) -> TileLoadState {
        self.imagery
            .get(&layer)
            .map_or(TileLoadState::Unloaded, |i| i.slot.state())
    }

    /// Last frame this tile was selected for rendering.
    #[must_use]
    pub fn last_selection_frame(&self) -> Option<u64> {
        self.last_selection_frame
    }

    pub(crate) fn set_children(&mut self, children: Option<[TileKey; 4]>) {
        self.children = children;
    }

    pub(crate) fn finish_terrain(&mut self, data: Arc<Heightmap>) {
        self.terrain.succeed();
        self.terrain_data = Some(data);
        self.renderable = true;
        self.upsampled_from_parent = false;
    }

    pub(crate) fn imagery_mut(&mut self, layer: LayerId) -> &mut ImagerySlot {
        self.imagery.entry(layer).or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect() -> Rectangle {
        Rectangle::from_degrees(0.0, 0.0, 10.0, 10.0)
    }

    #[test]
    fn test_slot_success_path() {
        let mut slot = LoadSlot::default();
        assert_eq!(slot.state(), TileLoadState::Unloaded);
        assert!(slot.needs_request(0));

        assert!(slot.begin(RequestId(1)));
        assert_eq!(slot.state(), TileLoadState::Loading);
        assert_eq!(slot.pending_request(), Some(RequestId(1)));
        assert!(!slot.needs_request(0));
        assert!(!slot.begin(RequestId(2)));

        slot.succeed();
        assert!(slot.is_done());
        assert!(slot.is_settled());
        assert!(!slot.begin(RequestId(3)));
    }

    #[test]
    fn test_slot_retry_is_bounded() {
        let mut slot = LoadSlot::default();

        assert!(slot.begin(RequestId(1)));
        assert!(!slot.fail(10, 3, 5));
        assert!(slot.awaiting_retry(12));
        assert!(!slot.needs_request(14));
        assert!(slot.needs_request(15));

        assert!(slot.begin(RequestId(2)));
        assert!(!slot.fail(15, 3, 5));
        assert!(slot.begin(RequestId(3)));
        assert!(slot.fail(20, 3, 5));

        assert_eq!(slot.state(), TileLoadState::Failed);
        assert!(slot.is_exhausted());
        assert!(slot.is_settled());
        assert!(!slot.needs_request(1_000));
        assert!(!slot.awaiting_retry(20));
        assert_eq!(slot.attempts(), 3);
    }

    #[test]
    fn test_slot_invalidate_keeps_done() {
        let mut done = LoadSlot::default();
        done.begin(RequestId(1));
        done.succeed();
        done.invalidate();
        assert!(done.is_done());

        let mut failed = LoadSlot::default();
        failed.begin(RequestId(1));
        failed.fail(0, 1, 0);
        failed.invalidate();
        assert_eq!(failed.state(), TileLoadState::Unloaded);
        assert_eq!(failed.attempts(), 0);
    }

    #[test]
    fn test_slot_cancel() {
        let mut slot = LoadSlot::default();
        slot.begin(RequestId(7));
        slot.cancel();
        assert_eq!(slot.state(), TileLoadState::Unloaded);
        assert_eq!(slot.attempts(), 0);
    }

    #[test]
    fn test_root_renderable_after_terrain() {
        let mut root = QuadtreeTile::root(TileKey::new(0, 0, 0), rect(), 0);
        assert!(!root.is_renderable());

        root.terrain.begin(RequestId(1));
        root.finish_terrain(Arc::new(Heightmap::flat(2, 2)));
        assert!(root.is_renderable());
        assert!(!root.is_upsampled_from_parent());
    }

    #[test]
    fn test_child_upsampled_from_renderable_parent() {
        let mut root = QuadtreeTile::root(TileKey::new(0, 0, 0), rect(), 0);
        root.terrain.begin(RequestId(1));
        root.finish_terrain(Arc::new(Heightmap::flat(2, 2)));

        let child = QuadtreeTile::child_of(&root, TileKey::new(1, 0, 0), rect(), 1);
        assert!(child.is_renderable());
        assert!(child.is_upsampled_from_parent());
        assert_eq!(child.terrain_state(), TileLoadState::Unloaded);
        assert_eq!(child.parent(), Some(root.key()));
    }

    #[test]
    fn test_degenerate_tile_never_loads() {
        let tile = QuadtreeTile::root(
            TileKey::new(0, 0, 0),
            Rectangle::new(0.0, 0.0, 0.0, 0.0),
            0,
        );
        assert!(tile.terrain().is_exhausted());
        assert!(!tile.terrain().needs_request(0));
    }
}
