//! The globe: terrain provider, imagery layers and the surface that draws them.

use std::sync::Arc;

use crate::config::SurfaceConfig;
use crate::event::EventSource;
use crate::layer::{LayerCollection, LayerId};
use crate::provider::{EllipsoidTerrainProvider, TerrainProvider};
use crate::render::RenderTile;
use crate::spawn::TaskSpawner;
use crate::surface::{GlobeSurface, SurfaceDiagnostics};
use crate::view::FrameState;

/// Host-facing entry point.
///
/// Call [`Globe::update`] once per frame and draw [`Globe::render_list`].
/// Events are raised on the calling thread, so a `Globe` stays on the thread
/// that created it.
pub struct Globe {
    surface: GlobeSurface,
    imagery_layers: LayerCollection,
    terrain_provider_changed: EventSource<Arc<TerrainProvider>>,
}

impl Globe {
    /// A globe over flat ellipsoid terrain with default settings.
    #[must_use]
    pub fn new(spawner: Arc<dyn TaskSpawner>) -> Self {
        Self::with_config(SurfaceConfig::default(), spawner)
    }

    #[must_use]
    pub fn with_config(config: SurfaceConfig, spawner: Arc<dyn TaskSpawner>) -> Self {
        Self::with_terrain(Arc::new(EllipsoidTerrainProvider::new()), config, spawner)
    }

    #[must_use]
    pub fn with_terrain(
        terrain: Arc<TerrainProvider>,
        config: SurfaceConfig,
        spawner: Arc<dyn TaskSpawner>,
    ) -> Self {
        Self {
            surface: GlobeSurface::new(terrain, config, spawner),
            imagery_layers: LayerCollection::new(),
            terrain_provider_changed: EventSource::new(),
        }
    }

    #[must_use]
    pub fn terrain_provider(&self) -> &Arc<TerrainProvider> {
        self.surface.terrain_provider()
    }

    /// Replace the terrain provider.
    ///
    /// `terrain_provider_changed` is raised before this returns, whether or
    /// not the new provider is ready yet.
    pub fn set_terrain_provider(&mut self, provider: Arc<TerrainProvider>) {
        self.surface.set_terrain_provider(Arc::clone(&provider));
        self.terrain_provider_changed.raise(&provider);
    }

    /// Raised with the new provider whenever the terrain provider is replaced.
    #[must_use]
    pub fn terrain_provider_changed(&self) -> &EventSource<Arc<TerrainProvider>> {
        &self.terrain_provider_changed
    }

    /// Why the terrain provider failed to initialize, if it did.
    #[must_use]
    pub fn terrain_provider_error(&self) -> Option<&str> {
        self.surface.terrain_provider_error()
    }

    #[must_use]
    pub fn imagery_layers(&self) -> &LayerCollection {
        &self.imagery_layers
    }

    pub fn imagery_layers_mut(&mut self) -> &mut LayerCollection {
        &mut self.imagery_layers
    }

    /// Raised with the layer id on every add, remove, show, hide or reorder.
    #[must_use]
    pub fn imagery_layers_updated(&self) -> &EventSource<LayerId> {
        self.imagery_layers.layers_updated()
    }

    #[must_use]
    pub fn show(&self) -> bool {
        self.surface.show()
    }

    pub fn set_show(&mut self, show: bool) {
        self.surface.set_show(show);
    }

    /// Advance one frame.
    pub fn update(&mut self, frame: &FrameState<'_>) {
        self.surface.update(frame, &mut self.imagery_layers);
    }

    /// Whether the current view is still loading.
    #[must_use]
    pub fn tiles_loading(&self) -> bool {
        self.surface.tiles_loading(&self.imagery_layers)
    }

    #[must_use]
    pub fn render_list(&self) -> &[RenderTile] {
        self.surface.render_list()
    }

    #[must_use]
    pub fn diagnostics(&self) -> SurfaceDiagnostics {
        self.surface.diagnostics()
    }

    #[must_use]
    pub fn surface(&self) -> &GlobeSurface {
        &self.surface
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::TileProvider;
    use crate::provider::test_support::StaticImagery;
    use crate::spawn::FramePump;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_terrain_change_event_is_synchronous() {
        let mut globe = Globe::new(Arc::new(FramePump::new()));
        let seen: Rc<RefCell<Vec<u32>>> = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = globe
            .terrain_provider_changed()
            .subscribe(move |p| s.borrow_mut().push(p.maximum_level()));

        globe.set_terrain_provider(Arc::new(EllipsoidTerrainProvider::new().with_maximum_level(7)));
        assert_eq!(*seen.borrow(), vec![7]);
        assert_eq!(globe.terrain_provider().maximum_level(), 7);
        assert_eq!(globe.surface().generation(), 1);
    }

    #[test]
    fn test_layer_events_forwarded() {
        let mut globe = Globe::new(Arc::new(FramePump::new()));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = globe
            .imagery_layers_updated()
            .subscribe(move |id| s.borrow_mut().push(*id));

        let id = globe
            .imagery_layers_mut()
            .add_provider(Arc::new(StaticImagery));
        assert_eq!(*seen.borrow(), vec![id]);
    }

    #[test]
    fn test_default_terrain_is_ellipsoid() {
        let globe = Globe::new(Arc::new(FramePump::new()));
        assert!(globe.terrain_provider().is_ready());
        assert!(globe.show());
        assert!(globe.terrain_provider_error().is_none());
        // Nothing has run yet.
        assert!(globe.tiles_loading());
    }
}
