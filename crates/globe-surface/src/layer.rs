//! Imagery layers and the ordered, observable layer collection.
//!
//! Index 0 is the bottom layer. Adding, removing, showing, hiding or moving a
//! layer records a [`LayerChange`] for the surface scheduler to apply on its
//! next update and raises exactly one `layers_updated` event, after the
//! mutation. Operations that change nothing raise nothing.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::event::EventSource;
use crate::provider::ImageryProvider;

static NEXT_LAYER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an imagery layer. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(u64);

impl LayerId {
    pub(crate) fn next() -> Self {
        Self(NEXT_LAYER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer#{}", self.0)
    }
}

/// Imagery draped over the terrain.
#[derive(Clone)]
pub struct ImageryLayer {
    id: LayerId,
    provider: Arc<ImageryProvider>,
    show: bool,
    alpha: f32,
    brightness: f32,
    name: Option<String>,
}

impl ImageryLayer {
    /// A visible, opaque layer over `provider`.
    #[must_use]
    pub fn new(provider: Arc<ImageryProvider>) -> Self {
        Self {
            id: LayerId::next(),
            provider,
            show: true,
            alpha: 1.0,
            brightness: 1.0,
            name: None,
        }
    }

    #[must_use]
    pub fn with_show(mut self, show: bool) -> Self {
        self.show = show;
        self
    }

    #[must_use]
    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha.clamp(0.0, 1.0);
        self
    }

    #[must_use]
    pub fn with_brightness(mut self, brightness: f32) -> Self {
        self.brightness = brightness.max(0.0);
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn id(&self) -> LayerId {
        self.id
    }

    #[must_use]
    pub fn provider(&self) -> &Arc<ImageryProvider> {
        &self.provider
    }

    #[must_use]
    pub fn show(&self) -> bool {
        self.show
    }

    #[must_use]
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    #[must_use]
    pub fn brightness(&self) -> f32 {
        self.brightness
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl fmt::Debug for ImageryLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageryLayer")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("show", &self.show)
            .field("alpha", &self.alpha)
            .field("brightness", &self.brightness)
            .finish_non_exhaustive()
    }
}

/// What happened to a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerChangeKind {
    Added,
    Removed,
    Shown,
    Hidden,
    Moved,
}

/// A mutation the surface has not yet applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerChange {
    pub layer: LayerId,
    pub kind: LayerChangeKind,
}

/// Ordered set of imagery layers, bottom first.
#[derive(Debug, Default)]
pub struct LayerCollection {
    layers: Vec<ImageryLayer>,
    changes: Vec<LayerChange>,
    updated: EventSource<LayerId>,
}

impl LayerCollection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raised once per add, remove, show, hide or reorder, with the layer id.
    #[must_use]
    pub fn layers_updated(&self) -> &EventSource<LayerId> {
        &self.updated
    }

    /// Add a visible layer over `provider` on top.
    pub fn add_provider(&mut self, provider: Arc<ImageryProvider>) -> LayerId {
        self.add(ImageryLayer::new(provider))
    }

    /// Add a layer on top.
    pub fn add(&mut self, layer: ImageryLayer) -> LayerId {
        let index = self.layers.len();
        self.add_at(index, layer)
    }

    /// Insert a layer at `index`, clamped to the collection length.
    pub fn add_at(&mut self, index: usize, layer: ImageryLayer) -> LayerId {
        let id = layer.id;
        let index = index.min(self.layers.len());
        tracing::debug!(%id, index, show = layer.show, "imagery layer added");
        self.layers.insert(index, layer);
        self.changed(id, LayerChangeKind::Added);
        id
    }

    /// Remove a layer. Returns it, or `None` if it is not in the collection.
    pub fn remove(&mut self, id: LayerId) -> Option<ImageryLayer> {
        let index = self.index_of(id)?;
        let layer = self.layers.remove(index);
        tracing::debug!(%id, "imagery layer removed");
        self.changed(id, LayerChangeKind::Removed);
        Some(layer)
    }

    /// Remove every layer, top first, raising one event per layer.
    pub fn remove_all(&mut self) {
        while let Some(layer) = self.layers.pop() {
            self.changed(layer.id, LayerChangeKind::Removed);
        }
    }

    /// Move a layer one step up. Returns false if it is already on top or absent.
    pub fn raise(&mut self, id: LayerId) -> bool {
        match self.index_of(id) {
            Some(index) => self.move_to(index, index + 1),
            None => false,
        }
    }

    /// Move a layer one step down. Returns false if it is already at the bottom or absent.
    pub fn lower(&mut self, id: LayerId) -> bool {
        match self.index_of(id) {
            Some(index) if index > 0 => self.move_to(index, index - 1),
            _ => false,
        }
    }

    /// Move a layer to the top.
    pub fn raise_to_top(&mut self, id: LayerId) -> bool {
        match self.index_of(id) {
            Some(index) => self.move_to(index, self.layers.len() - 1),
            None => false,
        }
    }

    /// Move a layer to the bottom.
    pub fn lower_to_bottom(&mut self, id: LayerId) -> bool {
        match self.index_of(id) {
            Some(index) => self.move_to(index, 0),
            None => false,
        }
    }

    fn move_to(&mut self, from: usize, to: usize) -> bool {
        if to >= self.layers.len() || from == to {
            return false;
        }
        let layer = self.layers.remove(from);
        let id = layer.id;
        self.layers.insert(to, layer);
        self.changed(id, LayerChangeKind::Moved);
        true
    }

    /// Show or hide a layer. Returns false if nothing changed.
    pub fn set_show(&mut self, id: LayerId, show: bool) -> bool {
        let Some(layer) = self.layers.iter_mut().find(|l| l.id == id) else {
            return false;
        };
        if layer.show == show {
            return false;
        }
        layer.show = show;
        let kind = if show {
            LayerChangeKind::Shown
        } else {
            LayerChangeKind::Hidden
        };
        self.changed(id, kind);
        true
    }

    /// Set a layer's opacity. Styling changes raise no event.
    pub fn set_alpha(&mut self, id: LayerId, alpha: f32) -> bool {
        self.layers
            .iter_mut()
            .find(|l| l.id == id)
            .map(|l| l.alpha = alpha.clamp(0.0, 1.0))
            .is_some()
    }

    /// Set a layer's brightness. Styling changes raise no event.
    pub fn set_brightness(&mut self, id: LayerId, brightness: f32) -> bool {
        self.layers
            .iter_mut()
            .find(|l| l.id == id)
            .map(|l| l.brightness = brightness.max(0.0))
            .is_some()
    }

    #[must_use]
    pub fn get(&self, id: LayerId) -> Option<&ImageryLayer> {
        self.layers.iter().find(|l| l.id == id)
    }

    #[must_use]
    pub fn index_of(&self, id: LayerId) -> Option<usize> {
        self.layers.iter().position(|l| l.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: LayerId) -> bool {
        self.index_of(id).is_some()
    }

    /// Layers bottom to top.
    pub fn iter(&self) -> impl Iterator<Item = &ImageryLayer> {
        self.layers.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Changes recorded since the last call, oldest first.
    pub fn take_changes(&mut self) -> Vec<LayerChange> {
        std::mem::take(&mut self.changes)
    }

    fn changed(&mut self, layer: LayerId, kind: LayerChangeKind) {
        self.changes.push(LayerChange { layer, kind });
        self.updated.raise(&layer);
    }
}
