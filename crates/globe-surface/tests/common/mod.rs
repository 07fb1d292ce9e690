//! Scripted providers and a frame driver shared by the scenario tests.

use std::collections::HashSet;
use std::future::ready;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use globe_surface::{
    Error, FrameState, FramePump, Globe, ProviderState, Rectangle, RectangleView, SurfaceConfig,
    TerrainProvider, TileFuture, TileKey, TileProvider, TilingScheme,
};
use tiledecode::{Heightmap, ImageryTile};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A provider whose answers the test controls.
///
/// By default every request succeeds immediately. Keys passed to
/// [`ScriptedProvider::fail`] always fail. While held, requests wait until
/// [`ScriptedProvider::release_all`].
pub struct ScriptedProvider<D> {
    state: Mutex<ProviderState>,
    scheme: TilingScheme,
    maximum_level: u32,
    make: fn(TileKey) -> D,
    failing: Mutex<HashSet<TileKey>>,
    hold: AtomicBool,
    held: Mutex<Vec<(TileKey, async_channel::Sender<globe_surface::Result<D>>)>>,
    requests: Mutex<Vec<TileKey>>,
}

impl<D: Send + Sync + 'static> ScriptedProvider<D> {
    pub fn new(maximum_level: u32, make: fn(TileKey) -> D) -> Arc<Self> {
        Self::with_scheme(maximum_level, TilingScheme::geographic(), make)
    }

    pub fn with_scheme(
        maximum_level: u32,
        scheme: TilingScheme,
        make: fn(TileKey) -> D,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ProviderState::Ready),
            scheme,
            maximum_level,
            make,
            failing: Mutex::new(HashSet::new()),
            hold: AtomicBool::new(false),
            held: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn set_state(&self, state: ProviderState) {
        *self.state.lock().unwrap() = state;
    }

    pub fn fail(&self, key: TileKey) {
        self.failing.lock().unwrap().insert(key);
    }

    pub fn hold(&self, hold: bool) {
        self.hold.store(hold, Ordering::SeqCst);
    }

    pub fn held(&self) -> usize {
        self.held.lock().unwrap().len()
    }

    /// Answer every held request.
    pub fn release_all(&self) {
        for (key, tx) in self.held.lock().unwrap().drain(..) {
            let _ = tx.try_send(self.answer(key));
        }
    }

    pub fn requests(&self) -> Vec<TileKey> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_for(&self, key: TileKey) -> usize {
        self.requests.lock().unwrap().iter().filter(|k| **k == key).count()
    }

    fn answer(&self, key: TileKey) -> globe_surface::Result<D> {
        if self.failing.lock().unwrap().contains(&key) {
            Err(Error::Fetch(tilefetch::Error::HttpStatus {
                url: format!("scripted://{key}"),
                status: 503,
            }))
        } else {
            Ok((self.make)(key))
        }
    }
}

impl<D: Send + Sync + 'static> TileProvider for ScriptedProvider<D> {
    type Data = D;

    fn state(&self) -> ProviderState {
        self.state.lock().unwrap().clone()
    }

    fn tiling_scheme(&self) -> TilingScheme {
        self.scheme
    }

    fn maximum_level(&self) -> u32 {
        self.maximum_level
    }

    fn request_tile(&self, key: TileKey) -> TileFuture<D> {
        self.requests.lock().unwrap().push(key);
        if self.hold.load(Ordering::SeqCst) {
            let (tx, rx) = async_channel::bounded(1);
            self.held.lock().unwrap().push((key, tx));
            return Box::pin(async move {
                rx.recv().await.unwrap_or(Err(Error::ProviderNotReady))
            });
        }
        Box::pin(ready(self.answer(key)))
    }
}

pub fn terrain(maximum_level: u32) -> Arc<ScriptedProvider<Heightmap>> {
    ScriptedProvider::new(maximum_level, |_| Heightmap::flat(2, 2))
}

pub fn imagery(maximum_level: u32) -> Arc<ScriptedProvider<ImageryTile>> {
    ScriptedProvider::new(maximum_level, |_| ImageryTile::solid(1, 1, [40, 80, 120, 255]))
}

/// A 10 degree square in the western hemisphere, north of the equator.
pub fn west_view() -> RectangleView {
    RectangleView::framing(Rectangle::from_degrees(-95.0, 10.0, -85.0, 20.0), 1080.0)
}

/// The same square mirrored into the eastern hemisphere, under the other root.
pub fn east_view() -> RectangleView {
    RectangleView::framing(Rectangle::from_degrees(85.0, 10.0, 95.0, 20.0), 1080.0)
}

/// A view straddling the prime meridian, so both roots are visible.
pub fn meridian_view() -> RectangleView {
    RectangleView::framing(Rectangle::from_degrees(-10.0, 0.0, 10.0, 10.0), 1080.0)
}

/// A globe, its pump and a fixed camera.
pub struct Harness {
    pub globe: Globe,
    pub pump: Arc<FramePump>,
    pub view: RectangleView,
}

impl Harness {
    pub fn new(terrain: Arc<TerrainProvider>, config: SurfaceConfig, view: RectangleView) -> Self {
        init_tracing();
        let pump = Arc::new(FramePump::new());
        Self {
            globe: Globe::with_terrain(terrain, config, pump.clone()),
            pump,
            view,
        }
    }

    /// One host frame: update, then let fetches progress.
    pub fn tick(&mut self) {
        self.globe.update(&FrameState::new(&self.view));
        self.pump.pump();
    }

    /// Tick until nothing is loading. Returns the frames taken.
    pub fn run_until_idle(&mut self, max_frames: usize) -> usize {
        for frame in 1..=max_frames {
            self.tick();
            if !self.globe.tiles_loading() {
                return frame;
            }
        }
        panic!(
            "still loading after {max_frames} frames: {:?}",
            self.globe.diagnostics()
        );
    }

    pub fn rendered_keys(&self) -> Vec<TileKey> {
        let mut keys: Vec<_> = self.globe.render_list().iter().map(|t| t.key).collect();
        keys.sort();
        keys
    }
}
