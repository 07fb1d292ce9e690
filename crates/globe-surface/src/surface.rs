//! The surface scheduler.
//!
//! Owns the tile arena and the load queue. Each [`GlobeSurface::update`]:
//!
//! 1. applies layer changes and fetch completions received since last frame,
//! 2. rebuilds the roots if the terrain provider changed and is now ready,
//! 3. walks the quadtree nearest first, choosing tiles to draw,
//! 4. queues the data those tiles are missing,
//! 5. builds the render list, substituting ancestor data where needed,
//! 6. admits queued fetches up to the concurrency bound,
//! 7. evicts subtrees nobody has visited for a while.
//!
//! # Design principles
//!
//! - **Never blocks**: fetches run on the spawner and report back over a
//!   channel drained only at the start of an update
//! - **Single writer**: only the surface mutates tile state
//! - **Stale-proof**: a completion is applied only if its provider generation
//!   and request id are still current

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tiledecode::{Heightmap, ImageryTile};

use crate::config::SurfaceConfig;
use crate::error::Result;
use crate::layer::{LayerChange, LayerChangeKind, LayerCollection, LayerId};
use crate::provider::{ProviderState, TerrainProvider, TileFuture};
use crate::queue::{Admission, Lane, LaneCounts, LoadQueue, LoadSource, LoadTarget, RequestId};
use crate::render::{RenderImagery, RenderSource, RenderTile, UvTransform};
use crate::spawn::TaskSpawner;
use crate::tile::QuadtreeTile;
use crate::tiling::{MAXIMUM_LEVEL, TileKey};
use crate::view::{FrameState, SurfaceView};

/// Counters describing the last update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SurfaceDiagnostics {
    /// Frame number of the update these counters describe.
    pub frame: u64,
    /// Entries still queued per lane after dispatch.
    pub lanes: LaneCounts,
    /// Fetches started and not yet drained.
    pub in_flight: usize,
    /// Tiles drawn in place of children that are still loading.
    pub waiting_for_children: usize,
    /// Length of the render list.
    pub tiles_rendered: usize,
    /// Tiles the traversal touched.
    pub tiles_visited: usize,
    /// Tiles skipped as invisible.
    pub tiles_culled: usize,
    /// Failed loads waiting out their retry delay.
    pub awaiting_retry: usize,
    /// Tiles held in the tile map.
    pub tiles_in_memory: usize,
    /// Tiles evicted since the surface was created.
    pub tiles_evicted: u64,
    /// Stale completions thrown away since the surface was created.
    pub completions_discarded: u64,
}

enum TileData {
    Terrain(Heightmap),
    Imagery(ImageryTile),
}

/// A finished fetch on its way back to the surface.
struct Completion {
    request: RequestId,
    generation: u64,
    target: LoadTarget,
    result: Result<TileData>,
}

/// A visible layer as the surface sees it this frame.
struct LayerPlan {
    id: LayerId,
    ready: bool,
    maximum_level: u32,
    alpha: f32,
    brightness: f32,
}

#[derive(Default)]
struct Traversal {
    selected: Vec<(TileKey, f64)>,
    visited: usize,
    culled: usize,
    waiting: usize,
}

/// Schedules terrain and imagery loads for a quadtree over the globe.
pub struct GlobeSurface {
    config: SurfaceConfig,
    spawner: Arc<dyn TaskSpawner>,
    terrain: Arc<TerrainProvider>,
    /// Bumped on every terrain provider assignment.
    generation: u64,
    /// Generation the current roots were built for.
    roots_generation: Option<u64>,
    terrain_error: Option<String>,
    tiles: HashMap<TileKey, QuadtreeTile>,
    roots: Vec<TileKey>,
    queue: LoadQueue,
    completions_tx: async_channel::Sender<Completion>,
    completions_rx: async_channel::Receiver<Completion>,
    render_list: Vec<RenderTile>,
    /// Layers already reported as using a different tiling scheme.
    incompatible: HashSet<LayerId>,
    show: bool,
    frame: u64,
    stats: SurfaceDiagnostics,
}

impl GlobeSurface {
    #[must_use]
    pub fn new(
        terrain: Arc<TerrainProvider>,
        config: SurfaceConfig,
        spawner: Arc<dyn TaskSpawner>,
    ) -> Self {
        let (completions_tx, completions_rx) = async_channel::unbounded();
        Self {
            config,
            spawner,
            terrain,
            generation: 0,
            roots_generation: None,
            terrain_error: None,
            tiles: HashMap::new(),
            roots: Vec::new(),
            queue: LoadQueue::new(),
            completions_tx,
            completions_rx,
            render_list: Vec::new(),
            incompatible: HashSet::new(),
            show: true,
            frame: 0,
            stats: SurfaceDiagnostics::default(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &SurfaceConfig {
        &self.config
    }

    #[must_use]
    pub fn terrain_provider(&self) -> &Arc<TerrainProvider> {
        &self.terrain
    }

    /// Switch terrain. Queued and in-flight work for the old provider is
    /// cancelled; the current render list stays until the new provider is
    /// ready and the roots are rebuilt.
    pub fn set_terrain_provider(&mut self, provider: Arc<TerrainProvider>) {
        self.terrain = provider;
        self.generation += 1;
        self.terrain_error = None;
        self.queue.cancel_all();
        tracing::info!(generation = self.generation, "terrain provider replaced");
    }

    /// Incremented each time the terrain provider is replaced.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Why the terrain provider failed to initialize, if it did.
    #[must_use]
    pub fn terrain_provider_error(&self) -> Option<&str> {
        self.terrain_error.as_deref()
    }

    #[must_use]
    pub fn show(&self) -> bool {
        self.show
    }

    /// Hide or show the surface. Hiding empties the render list and cancels
    /// outstanding loads; loaded data is kept.
    pub fn set_show(&mut self, show: bool) {
        if self.show == show {
            return;
        }
        self.show = show;
        if !show {
            self.queue.cancel_all();
            for tile in self.tiles.values_mut() {
                tile.terrain.cancel();
                for imagery in tile.imagery.values_mut() {
                    imagery.slot.cancel();
                }
            }
        }
    }

    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    #[must_use]
    pub fn tile(&self, key: TileKey) -> Option<&QuadtreeTile> {
        self.tiles.get(&key)
    }

    /// Every tile in memory, in no particular order.
    pub fn tiles(&self) -> impl Iterator<Item = &QuadtreeTile> {
        self.tiles.values()
    }

    #[must_use]
    pub fn root_keys(&self) -> &[TileKey] {
        &self.roots
    }

    /// Tiles to draw, as of the last update.
    #[must_use]
    pub fn render_list(&self) -> &[RenderTile] {
        &self.render_list
    }

    #[must_use]
    pub fn queue(&self) -> &LoadQueue {
        &self.queue
    }

    #[must_use]
    pub fn diagnostics(&self) -> SurfaceDiagnostics {
        SurfaceDiagnostics {
            lanes: self.queue.lane_counts(),
            in_flight: self.queue.in_flight(),
            tiles_in_memory: self.tiles.len(),
            ..self.stats
        }
    }

    /// Whether loading is still in progress for the current view.
    #[must_use]
    pub fn tiles_loading(&self, layers: &LayerCollection) -> bool {
        if !self.queue.is_idle() {
            return true;
        }
        match self.terrain.state() {
            ProviderState::Pending => return true,
            ProviderState::Failed(_) => return false,
            ProviderState::Ready => {}
        }
        if self.roots_generation != Some(self.generation) {
            return true;
        }
        if !self.show {
            return false;
        }
        let imagery_pending = layers
            .iter()
            .any(|l| l.show() && l.provider().state() == ProviderState::Pending);
        imagery_pending || self.stats.waiting_for_children > 0 || self.stats.awaiting_retry > 0
    }

    /// Advance one frame.
    pub fn update(&mut self, frame: &FrameState<'_>, layers: &mut LayerCollection) {
        self.frame += 1;
        self.stats.frame = self.frame;
        for change in layers.take_changes() {
            self.apply_layer_change(change);
        }
        self.drain_completions();

        match self.terrain.state() {
            ProviderState::Pending => return,
            ProviderState::Failed(reason) => {
                if self.terrain_error.is_none() {
                    tracing::warn!("terrain provider failed: {reason}");
                    self.terrain_error = Some(reason);
                }
                return;
            }
            ProviderState::Ready => {}
        }
        if self.roots_generation != Some(self.generation) {
            self.rebuild_roots();
        }

        if !self.show {
            self.render_list.clear();
            self.stats.waiting_for_children = 0;
            self.stats.awaiting_retry = 0;
            return;
        }

        let plan = self.imagery_plan(layers);
        // Only what this frame selects stays queued; fetches in flight run on.
        self.queue.clear_pending();
        let mut traversal = Traversal::default();
        self.traverse(frame.view, &mut traversal);
        self.request_selected(&traversal.selected, &plan);
        self.render_list = self.build_render_list(&traversal.selected, &plan);
        self.dispatch(layers);
        self.evict();

        self.stats.tiles_visited = traversal.visited;
        self.stats.tiles_culled = traversal.culled;
        self.stats.waiting_for_children = traversal.waiting;
        self.stats.tiles_rendered = self.render_list.len();
        self.stats.awaiting_retry = self.count_awaiting_retry();
    }

    fn rebuild_roots(&mut self) {
        let scheme = self.terrain.tiling_scheme();
        self.tiles.clear();
        self.roots = scheme.root_keys();
        for key in &self.roots {
            self.tiles.insert(
                *key,
                QuadtreeTile::root(*key, scheme.rectangle_of(*key), self.frame),
            );
        }
        self.roots_generation = Some(self.generation);
        tracing::info!(
            generation = self.generation,
            roots = self.roots.len(),
            maximum_level = self.terrain.maximum_level(),
            "surface roots built"
        );
    }

    fn apply_layer_change(&mut self, change: LayerChange) {
        let layer = change.layer;
        match change.kind {
            LayerChangeKind::Added | LayerChangeKind::Moved => {}
            LayerChangeKind::Removed => {
                self.cancel_imagery(layer);
                for tile in self.tiles.values_mut() {
                    tile.imagery.remove(&layer);
                }
                self.incompatible.remove(&layer);
            }
            LayerChangeKind::Hidden => self.cancel_imagery(layer),
            LayerChangeKind::Shown => {
                for tile in self.tiles.values_mut() {
                    if let Some(imagery) = tile.imagery.get_mut(&layer) {
                        imagery.slot.invalidate();
                    }
                }
            }
        }
    }

    fn cancel_imagery(&mut self, layer: LayerId) {
        let cancelled = self
            .queue
            .cancel_where(|t| t.source == LoadSource::Imagery(layer));
        for tile in self.tiles.values_mut() {
            if let Some(imagery) = tile.imagery.get_mut(&layer) {
                imagery.slot.cancel();
            }
        }
        tracing::debug!(%layer, cancelled, "imagery loads cancelled");
    }

    fn drain_completions(&mut self) {
        while let Ok(completion) = self.completions_rx.try_recv() {
            if !self.apply_completion(completion) {
                self.stats.completions_discarded += 1;
            }
        }
    }

    /// Apply one fetch result. Returns false if it was stale and discarded.
    fn apply_completion(&mut self, completion: Completion) -> bool {
        let Completion {
            request,
            generation,
            target,
            result,
        } = completion;

        let current = self.queue.finish(request).is_some();
        if generation != self.generation || !current {
            tracing::debug!(tile = %target.tile, ?request, "stale completion discarded");
            return false;
        }
        let Some(tile) = self.tiles.get_mut(&target.tile) else {
            return false;
        };

        match (target.source, result) {
            (LoadSource::Terrain, Ok(TileData::Terrain(heightmap))) => {
                if tile.terrain.pending_request() != Some(request) {
                    return false;
                }
                tile.finish_terrain(Arc::new(heightmap));
                tracing::debug!(tile = %target.tile, "terrain loaded");
            }
            (LoadSource::Imagery(layer), Ok(TileData::Imagery(image))) => {
                let Some(imagery) = tile.imagery.get_mut(&layer) else {
                    return false;
                };
                if imagery.slot.pending_request() != Some(request) {
                    return false;
                }
                imagery.slot.succeed();
                imagery.data = Some(Arc::new(image));
                tracing::debug!(tile = %target.tile, %layer, "imagery loaded");
            }
            (source, Err(error)) => {
                let slot = match source {
                    LoadSource::Terrain => &mut tile.terrain,
                    LoadSource::Imagery(layer) => match tile.imagery.get_mut(&layer) {
                        Some(imagery) => &mut imagery.slot,
                        None => return false,
                    },
                };
                if slot.pending_request() != Some(request) {
                    return false;
                }
                let exhausted = slot.fail(
                    self.frame,
                    self.config.max_fetch_attempts,
                    self.config.retry_delay_frames,
                );
                if exhausted {
                    tracing::warn!(
                        tile = %target.tile,
                        source = ?source,
                        attempts = slot.attempts(),
                        kind = ?error.kind(),
                        "giving up on tile: {error}"
                    );
                } else {
                    tracing::debug!(
                        tile = %target.tile,
                        source = ?source,
                        attempts = slot.attempts(),
                        "tile fetch failed, will retry: {error}"
                    );
                }
            }
            _ => return false,
        }
        true
    }

    fn imagery_plan(&mut self, layers: &LayerCollection) -> Vec<LayerPlan> {
        let scheme = self.terrain.tiling_scheme();
        let incompatible = &mut self.incompatible;
        layers
            .iter()
            .filter(|layer| layer.show())
            .filter_map(|layer| {
                let provider = layer.provider();
                let ready = provider.is_ready();
                if ready && provider.tiling_scheme() != scheme {
                    if incompatible.insert(layer.id()) {
                        tracing::warn!(
                            layer = %layer.id(),
                            "imagery layer tiling scheme differs from terrain, skipping"
                        );
                    }
                    return None;
                }
                Some(LayerPlan {
                    id: layer.id(),
                    ready,
                    maximum_level: if ready { provider.maximum_level() } else { 0 },
                    alpha: layer.alpha(),
                    brightness: layer.brightness(),
                })
            })
            .collect()
    }

    fn traverse(&mut self, view: &dyn SurfaceView, traversal: &mut Traversal) {
        let mut roots: Vec<(TileKey, f64)> = self
            .roots
            .iter()
            .filter_map(|key| {
                self.tiles
                    .get(key)
                    .map(|tile| (*key, view.distance(&tile.rectangle())))
            })
            .collect();
        roots.sort_by(|a, b| a.1.total_cmp(&b.1));
        for (key, _) in roots {
            self.visit(key, view, traversal);
        }
    }

    fn visit(&mut self, key: TileKey, view: &dyn SurfaceView, traversal: &mut Traversal) {
        let frame = self.frame;
        let maximum_level = self.terrain.maximum_level().min(MAXIMUM_LEVEL);
        let scheme = self.terrain.tiling_scheme();
        let Some(tile) = self.tiles.get_mut(&key) else {
            return;
        };
        tile.last_visited_frame = frame;
        traversal.visited += 1;

        let rectangle = tile.rectangle();
        if !view.is_visible(&rectangle) {
            traversal.culled += 1;
            return;
        }
        let distance = view.distance(&rectangle);
        let error = view.screen_space_error(scheme.geometric_error(key.level), distance);
        let refine = error > self.config.maximum_screen_space_error
            && tile.is_renderable()
            && key.level < maximum_level;
        if !refine {
            tile.last_selection_frame = Some(frame);
            traversal.selected.push((key, distance));
            return;
        }

        let children = self.ensure_children(key);
        let settled = children.iter().all(|child| {
            self.tiles
                .get(child)
                .is_some_and(|tile| tile.terrain().is_settled())
        });

        if settled {
            let mut ordered: Vec<(TileKey, f64)> = children
                .iter()
                .map(|child| {
                    let d = self
                        .tiles
                        .get(child)
                        .map_or(f64::INFINITY, |tile| view.distance(&tile.rectangle()));
                    (*child, d)
                })
                .collect();
            ordered.sort_by(|a, b| a.1.total_cmp(&b.1));
            for (child, _) in ordered {
                self.visit(child, view, traversal);
            }
            return;
        }

        // Keep drawing this tile until all four children can replace it.
        if let Some(tile) = self.tiles.get_mut(&key) {
            tile.last_selection_frame = Some(frame);
        }
        traversal.selected.push((key, distance));
        traversal.waiting += 1;
        for child in children {
            if let Some(tile) = self.tiles.get_mut(&child) {
                tile.last_visited_frame = frame;
                if tile.terrain().needs_request(frame) {
                    let d = view.distance(&tile.rectangle());
                    self.queue.enqueue(LoadTarget::terrain(child), Lane::Low, d);
                }
            }
        }
    }

    fn ensure_children(&mut self, key: TileKey) -> [TileKey; 4] {
        let scheme = self.terrain.tiling_scheme();
        let Some(parent) = self.tiles.get(&key) else {
            return key.children();
        };
        if let Some(children) = parent.children() {
            return children;
        }

        let keys = key.children();
        let created: Vec<QuadtreeTile> = keys
            .iter()
            .map(|child| {
                QuadtreeTile::child_of(parent, *child, scheme.rectangle_of(*child), self.frame)
            })
            .collect();
        for tile in created {
            self.tiles.insert(tile.key(), tile);
        }
        if let Some(parent) = self.tiles.get_mut(&key) {
            parent.set_children(Some(keys));
        }
        keys
    }

    fn request_selected(&mut self, selected: &[(TileKey, f64)], plan: &[LayerPlan]) {
        let frame = self.frame;
        for &(key, distance) in selected {
            let Some(tile) = self.tiles.get(&key) else {
                continue;
            };
            if tile.terrain().needs_request(frame) {
                self.queue
                    .enqueue(LoadTarget::terrain(key), Lane::High, distance);
            }
            // Imagery waits for terrain to settle. Tiles whose terrain failed
            // for good still draw, from ancestor terrain, so they get imagery.
            if !tile.terrain().is_settled() || tile.rectangle().is_degenerate() {
                continue;
            }

            for layer in plan.iter().filter(|l| l.ready) {
                let source = imagery_key(key, layer.maximum_level);
                let needed = self.tiles.get(&source).is_some_and(|tile| {
                    tile.imagery(layer.id)
                        .is_none_or(|imagery| imagery.slot.needs_request(frame))
                });
                if needed {
                    self.queue
                        .enqueue(LoadTarget::imagery(source, layer.id), Lane::Medium, distance);
                }
            }
        }
    }

    fn build_render_list(&self, selected: &[(TileKey, f64)], plan: &[LayerPlan]) -> Vec<RenderTile> {
        selected
            .iter()
            .filter_map(|&(key, _)| {
                let tile = self.tiles.get(&key)?;
                let (terrain, terrain_data) =
                    self.resolve(key, key, |tile| tile.terrain_data().cloned());
                let imagery = plan
                    .iter()
                    .map(|layer| {
                        let (source, data) = if layer.ready {
                            self.resolve(key, imagery_key(key, layer.maximum_level), |tile| {
                                tile.imagery(layer.id).and_then(|i| i.data.clone())
                            })
                        } else {
                            (RenderSource::Placeholder, None)
                        };
                        RenderImagery {
                            layer: layer.id,
                            source,
                            data,
                            alpha: layer.alpha,
                            brightness: layer.brightness,
                        }
                    })
                    .collect();
                Some(RenderTile {
                    key,
                    rectangle: tile.rectangle(),
                    terrain,
                    terrain_data,
                    imagery,
                })
            })
            .collect()
    }

    /// Find data for `key`, starting the search at `start` (itself or an
    /// ancestor) and walking up.
    fn resolve<T>(
        &self,
        key: TileKey,
        start: TileKey,
        data: impl Fn(&QuadtreeTile) -> Option<Arc<T>>,
    ) -> (RenderSource, Option<Arc<T>>) {
        let mut current = Some(start);
        while let Some(k) = current {
            let Some(tile) = self.tiles.get(&k) else {
                break;
            };
            if let Some(found) = data(tile) {
                let source = if k == key {
                    RenderSource::Own
                } else {
                    RenderSource::Ancestor {
                        key: k,
                        uv: UvTransform::between(key, k),
                    }
                };
                return (source, Some(found));
            }
            current = tile.parent();
        }
        (RenderSource::Placeholder, None)
    }

    fn dispatch(&mut self, layers: &LayerCollection) {
        for admission in self.queue.admit(self.config.max_concurrent_requests) {
            if !self.start(admission, layers) {
                // Nothing to fetch after all; give the slot back.
                self.queue.finish(admission.request);
            }
        }
    }

    fn start(&mut self, admission: Admission, layers: &LayerCollection) -> bool {
        let Admission {
            request,
            target,
            lane,
            ..
        } = admission;
        let Some(tile) = self.tiles.get_mut(&target.tile) else {
            return false;
        };

        let future: TileFuture<TileData> = match target.source {
            LoadSource::Terrain => {
                if !tile.terrain.begin(request) {
                    return false;
                }
                let fetch = self.terrain.request_tile(target.tile);
                Box::pin(async move { fetch.await.map(TileData::Terrain) })
            }
            LoadSource::Imagery(layer_id) => {
                let Some(layer) = layers.get(layer_id) else {
                    return false;
                };
                if !tile.imagery_mut(layer_id).slot.begin(request) {
                    return false;
                }
                let fetch = layer.provider().request_tile(target.tile);
                Box::pin(async move { fetch.await.map(TileData::Imagery) })
            }
        };

        tracing::debug!(tile = %target.tile, source = ?target.source, ?lane, "fetch started");
        let tx = self.completions_tx.clone();
        let generation = self.generation;
        self.spawner.spawn(Box::pin(async move {
            let result = future.await;
            let _ = tx
                .send(Completion {
                    request,
                    generation,
                    target,
                    result,
                })
                .await;
        }));
        true
    }

    fn evict(&mut self) {
        let Some(cutoff) = self.frame.checked_sub(self.config.tile_retention_frames) else {
            return;
        };
        let mut removed = Vec::new();
        for root in self.roots.clone() {
            self.prune(root, cutoff, &mut removed);
        }
        if removed.is_empty() {
            return;
        }

        let removed_set: HashSet<TileKey> = removed.iter().copied().collect();
        self.queue.cancel_where(|t| removed_set.contains(&t.tile));
        self.stats.tiles_evicted += removed.len() as u64;
        tracing::debug!(count = removed.len(), "evicted stale tiles");
    }

    /// Newest visit anywhere in the subtree at `key`. Child groups whose
    /// subtrees are all older than `cutoff` are removed.
    fn prune(&mut self, key: TileKey, cutoff: u64, removed: &mut Vec<TileKey>) -> u64 {
        let Some(tile) = self.tiles.get(&key) else {
            return 0;
        };
        let newest = tile.last_visited_frame;
        let Some(children) = tile.children() else {
            return newest;
        };

        let children_newest = children
            .iter()
            .map(|child| self.prune(*child, cutoff, removed))
            .max()
            .unwrap_or(0);
        if children_newest < cutoff {
            for child in children {
                self.remove_subtree(child, removed);
            }
            if let Some(tile) = self.tiles.get_mut(&key) {
                tile.set_children(None);
            }
        }
        newest.max(children_newest)
    }

    fn remove_subtree(&mut self, key: TileKey, removed: &mut Vec<TileKey>) {
        let mut stack = vec![key];
        while let Some(key) = stack.pop() {
            if let Some(tile) = self.tiles.remove(&key) {
                if let Some(children) = tile.children() {
                    stack.extend(children);
                }
                removed.push(key);
            }
        }
    }

    fn count_awaiting_retry(&self) -> usize {
        let frame = self.frame;
        self.tiles
            .values()
            .map(|tile| {
                usize::from(tile.terrain().awaiting_retry(frame))
                    + tile
                        .imagery
                        .values()
                        .filter(|i| i.slot.awaiting_retry(frame))
                        .count()
            })
            .sum()
    }
}

/// The tile whose imagery covers `key` for a provider that stops at
/// `maximum_level`.
fn imagery_key(key: TileKey, maximum_level: u32) -> TileKey {
    key.ancestor_at(key.level.min(maximum_level)).unwrap_or(key)
}
