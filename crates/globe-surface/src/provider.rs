//! Tile data providers.
//!
//! A provider turns a [`TileKey`] into terrain or imagery. Providers may need
//! to initialize asynchronously (for example by fetching a metadata
//! document); until [`TileProvider::state`] reports `Ready` the surface does
//! not request tiles from them.

use std::future::{Future, ready};
use std::pin::Pin;
use std::sync::{Arc, OnceLock};

use serde::Deserialize;
use tiledecode::{Heightmap, ImageDecoder, ImageryTile, TileDecoder};
use tilefetch::{Payload, ResourceFetcher, ResourceRequest};

use crate::error::{Error, Result};
use crate::spawn::TaskSpawner;
use crate::tiling::{MAXIMUM_LEVEL, TileKey, TilingScheme};

/// Deepest level served by the default ellipsoid terrain.
pub const DEFAULT_ELLIPSOID_MAXIMUM_LEVEL: u32 = 18;

/// Deepest level assumed for metadata documents without `maxzoom`.
pub const DEFAULT_TEMPLATE_MAXIMUM_LEVEL: u32 = 18;

/// Future resolving to one tile's data.
pub type TileFuture<D> = Pin<Box<dyn Future<Output = Result<D>> + Send + 'static>>;

/// Initialization state of a provider. `Ready` or `Failed` is reached once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderState {
    Pending,
    Ready,
    Failed(String),
}

/// Supplies tile data for one tiling scheme.
pub trait TileProvider: Send + Sync + 'static {
    /// Decoded tile type.
    type Data: Send + Sync + 'static;

    fn state(&self) -> ProviderState;

    fn is_ready(&self) -> bool {
        self.state() == ProviderState::Ready
    }

    fn tiling_scheme(&self) -> TilingScheme;

    /// Deepest level with data. Only meaningful once ready.
    fn maximum_level(&self) -> u32;

    /// Start loading one tile. Returns immediately.
    fn request_tile(&self, key: TileKey) -> TileFuture<Self::Data>;
}

/// Provider of terrain heightmaps.
pub type TerrainProvider = dyn TileProvider<Data = Heightmap>;

/// Provider of imagery tiles.
pub type ImageryProvider = dyn TileProvider<Data = ImageryTile>;

/// Flat terrain on the reference ellipsoid. Ready immediately.
#[derive(Debug, Clone)]
pub struct EllipsoidTerrainProvider {
    scheme: TilingScheme,
    maximum_level: u32,
    samples: u32,
}

impl EllipsoidTerrainProvider {
    #[must_use]
    pub fn new() -> Self {
        Self {
            scheme: TilingScheme::geographic(),
            maximum_level: DEFAULT_ELLIPSOID_MAXIMUM_LEVEL,
            samples: 2,
        }
    }

    #[must_use]
    pub fn with_tiling_scheme(mut self, scheme: TilingScheme) -> Self {
        self.scheme = scheme;
        self
    }

    #[must_use]
    pub fn with_maximum_level(mut self, level: u32) -> Self {
        self.maximum_level = level.min(MAXIMUM_LEVEL);
        self
    }
}

impl Default for EllipsoidTerrainProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TileProvider for EllipsoidTerrainProvider {
    type Data = Heightmap;

    fn state(&self) -> ProviderState {
        ProviderState::Ready
    }

    fn tiling_scheme(&self) -> TilingScheme {
        self.scheme
    }

    fn maximum_level(&self) -> u32 {
        self.maximum_level
    }

    fn request_tile(&self, key: TileKey) -> TileFuture<Heightmap> {
        if !self.scheme.contains(key) {
            return Box::pin(ready(Err(out_of_range(key))));
        }
        Box::pin(ready(Ok(Heightmap::flat(self.samples, self.samples))))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct UrlTemplate {
    url: String,
    maximum_level: u32,
    /// Rows count south to north in `{y}` (TMS).
    flip_y: bool,
}

impl UrlTemplate {
    fn expand(&self, key: TileKey, scheme: &TilingScheme) -> String {
        let (_, rows) = scheme.tiles_at_level(key.level);
        let reverse_y = rows.saturating_sub(1).saturating_sub(u64::from(key.y));
        let y = if self.flip_y {
            reverse_y
        } else {
            u64::from(key.y)
        };
        self.url
            .replace("{z}", &key.level.to_string())
            .replace("{x}", &key.x.to_string())
            .replace("{y}", &y.to_string())
            .replace("{reverseY}", &reverse_y.to_string())
    }
}

/// TileJSON-style metadata document.
#[derive(Debug, Deserialize)]
struct TileMetadata {
    tiles: Vec<String>,
    #[serde(default)]
    maxzoom: Option<u32>,
    #[serde(default)]
    scheme: Option<String>,
}

fn parse_metadata(url: &str, payload: &Payload) -> Result<UrlTemplate> {
    let invalid = |detail: String| Error::InvalidMetadata {
        url: url.to_string(),
        detail,
    };
    let text = payload
        .as_document()
        .ok_or_else(|| invalid("expected a text document".to_string()))?;
    let metadata: TileMetadata =
        serde_json::from_str(text).map_err(|e| invalid(e.to_string()))?;
    let template = metadata
        .tiles
        .first()
        .ok_or_else(|| invalid("no tile URL templates".to_string()))?;
    let flip_y = match metadata.scheme.as_deref() {
        None | Some("xyz") => false,
        Some("tms") => true,
        Some(other) => return Err(invalid(format!("unknown scheme {other:?}"))),
    };
    Ok(UrlTemplate {
        url: resolve_url(url, template),
        maximum_level: metadata
            .maxzoom
            .unwrap_or(DEFAULT_TEMPLATE_MAXIMUM_LEVEL)
            .min(MAXIMUM_LEVEL),
        flip_y,
    })
}

/// Resolve a possibly relative tile URL against the metadata URL.
fn resolve_url(base: &str, url: &str) -> String {
    if url.contains("://") {
        return url.to_string();
    }
    if let Some(path) = url.strip_prefix('/') {
        // Keep scheme and authority only.
        let authority_end = base
            .find("://")
            .and_then(|i| base[i + 3..].find('/').map(|j| i + 3 + j))
            .unwrap_or(base.len());
        return format!("{}/{path}", &base[..authority_end]);
    }
    match base.rfind('/') {
        Some(i) if !base[..i].ends_with('/') => format!("{}/{url}", &base[..i]),
        _ => format!("{}/{url}", base.trim_end_matches('/')),
    }
}

/// Tiles fetched from a URL template (`{z}`, `{x}`, `{y}`, `{reverseY}`) and
/// decoded with `D`.
pub struct TemplateTileProvider<D: TileDecoder> {
    fetcher: Arc<dyn ResourceFetcher>,
    decoder: Arc<D>,
    scheme: TilingScheme,
    headers: Vec<(String, String)>,
    template: Arc<OnceLock<std::result::Result<UrlTemplate, String>>>,
}

impl<D: TileDecoder> TemplateTileProvider<D> {
    /// A provider for a known template. Ready immediately.
    pub fn new(
        template: impl Into<String>,
        maximum_level: u32,
        scheme: TilingScheme,
        fetcher: Arc<dyn ResourceFetcher>,
        decoder: D,
    ) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(Ok(UrlTemplate {
            url: template.into(),
            maximum_level: maximum_level.min(MAXIMUM_LEVEL),
            flip_y: false,
        }));
        Self {
            fetcher,
            decoder: Arc::new(decoder),
            scheme,
            headers: Vec::new(),
            template: Arc::new(cell),
        }
    }

    /// A provider configured by the metadata document at `url`.
    ///
    /// The document is fetched on `spawner`; the provider is `Pending` until
    /// it arrives and then `Ready` or `Failed` for good.
    pub fn from_metadata(
        url: impl Into<String>,
        scheme: TilingScheme,
        fetcher: Arc<dyn ResourceFetcher>,
        decoder: D,
        spawner: &dyn TaskSpawner,
    ) -> Self {
        let url = url.into();
        let template = Arc::new(OnceLock::new());

        let cell = Arc::clone(&template);
        let fetch = fetcher.fetch(ResourceRequest::document(url.clone()));
        spawner.spawn(Box::pin(async move {
            let parsed = match fetch.await {
                Ok(payload) => parse_metadata(&url, &payload),
                Err(e) => Err(Error::from(e)),
            };
            match parsed {
                Ok(template) => {
                    tracing::info!(
                        %url,
                        maximum_level = template.maximum_level,
                        "tile provider ready"
                    );
                    let _ = cell.set(Ok(template));
                }
                Err(e) => {
                    tracing::warn!(%url, "tile provider failed: {e}");
                    let _ = cell.set(Err(e.to_string()));
                }
            }
        }));

        Self {
            fetcher,
            decoder: Arc::new(decoder),
            scheme,
            headers: Vec::new(),
            template,
        }
    }

    /// Send a header with every tile request.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// URL of a tile, once the template is known.
    #[must_use]
    pub fn tile_url(&self, key: TileKey) -> Option<String> {
        match self.template.get() {
            Some(Ok(template)) => Some(template.expand(key, &self.scheme)),
            _ => None,
        }
    }
}

impl<D: TileDecoder> TileProvider for TemplateTileProvider<D> {
    type Data = D::Output;

    fn state(&self) -> ProviderState {
        match self.template.get() {
            None => ProviderState::Pending,
            Some(Ok(_)) => ProviderState::Ready,
            Some(Err(reason)) => ProviderState::Failed(reason.clone()),
        }
    }

    fn tiling_scheme(&self) -> TilingScheme {
        self.scheme
    }

    fn maximum_level(&self) -> u32 {
        match self.template.get() {
            Some(Ok(template)) => template.maximum_level,
            _ => 0,
        }
    }

    fn request_tile(&self, key: TileKey) -> TileFuture<D::Output> {
        let template = match self.template.get() {
            Some(Ok(template)) => template,
            Some(Err(reason)) => return Box::pin(ready(Err(provider_failed(reason)))),
            None => return Box::pin(ready(Err(Error::ProviderNotReady))),
        };
        if key.level > template.maximum_level || !self.scheme.contains(key) {
            return Box::pin(ready(Err(out_of_range(key))));
        }

        let mut request = ResourceRequest::binary(template.expand(key, &self.scheme));
        for (name, value) in &self.headers {
            request = request.with_header(name.clone(), value.clone());
        }
        let fetch = self.fetcher.fetch(request);
        let decoder = Arc::clone(&self.decoder);
        Box::pin(async move {
            let payload = fetch.await?;
            Ok(decoder.decode(payload.as_bytes())?)
        })
    }
}

/// One image stretched over the whole tiling scheme. Serves level 0 only,
/// each root getting its share of the image.
pub struct SingleTileImageryProvider {
    scheme: TilingScheme,
    image: Arc<OnceLock<std::result::Result<Arc<ImageryTile>, String>>>,
}

impl SingleTileImageryProvider {
    /// Fetch and decode the image at `url` on `spawner`.
    pub fn new(
        url: impl Into<String>,
        scheme: TilingScheme,
        fetcher: &dyn ResourceFetcher,
        spawner: &dyn TaskSpawner,
    ) -> Self {
        let url = url.into();
        let image = Arc::new(OnceLock::new());

        let cell = Arc::clone(&image);
        let fetch = fetcher.fetch(ResourceRequest::binary(url.clone()));
        spawner.spawn(Box::pin(async move {
            let decoded = match fetch.await {
                Ok(payload) => ImageDecoder.decode(payload.as_bytes()).map_err(Error::from),
                Err(e) => Err(Error::from(e)),
            };
            match decoded {
                Ok(image) => {
                    tracing::info!(
                        %url,
                        width = image.width,
                        height = image.height,
                        "single tile imagery ready"
                    );
                    let _ = cell.set(Ok(Arc::new(image)));
                }
                Err(e) => {
                    tracing::warn!(%url, "single tile imagery failed: {e}");
                    let _ = cell.set(Err(e.to_string()));
                }
            }
        }));

        Self { scheme, image }
    }

    /// A provider over an image already in memory. Ready immediately.
    #[must_use]
    pub fn from_image(image: ImageryTile, scheme: TilingScheme) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(Ok(Arc::new(image)));
        Self {
            scheme,
            image: Arc::new(cell),
        }
    }
}

impl TileProvider for SingleTileImageryProvider {
    type Data = ImageryTile;

    fn state(&self) -> ProviderState {
        match self.image.get() {
            None => ProviderState::Pending,
            Some(Ok(_)) => ProviderState::Ready,
            Some(Err(reason)) => ProviderState::Failed(reason.clone()),
        }
    }

    fn tiling_scheme(&self) -> TilingScheme {
        self.scheme
    }

    fn maximum_level(&self) -> u32 {
        0
    }

    fn request_tile(&self, key: TileKey) -> TileFuture<ImageryTile> {
        let image = match self.image.get() {
            Some(Ok(image)) => image,
            Some(Err(reason)) => return Box::pin(ready(Err(provider_failed(reason)))),
            None => return Box::pin(ready(Err(Error::ProviderNotReady))),
        };
        if key.level != 0 || !self.scheme.contains(key) {
            return Box::pin(ready(Err(out_of_range(key))));
        }
        let (columns, rows) = self.scheme.tiles_at_level(0);
        Box::pin(ready(Ok(root_share(image, key, columns, rows))))
    }
}

/// The part of `image` covering root tile `key` in a `columns` x `rows` grid.
fn root_share(image: &ImageryTile, key: TileKey, columns: u64, rows: u64) -> ImageryTile {
    let span = |index: u32, count: u64, size: u32| {
        let size = u64::from(size);
        let start = u64::from(index) * size / count;
        let end = (u64::from(index) + 1) * size / count;
        (
            u32::try_from(start).unwrap_or(u32::MAX),
            u32::try_from(end).unwrap_or(u32::MAX),
        )
    };
    let (x0, x1) = span(key.x, columns, image.width);
    let (y0, y1) = span(key.y, rows, image.height);
    if x1 <= x0 || y1 <= y0 {
        return image.clone();
    }

    let mut rgba = Vec::with_capacity((x1 - x0) as usize * (y1 - y0) as usize * 4);
    for y in y0..y1 {
        let row = (y as usize * image.width as usize + x0 as usize) * 4;
        rgba.extend_from_slice(&image.rgba[row..row + (x1 - x0) as usize * 4]);
    }
    ImageryTile {
        width: x1 - x0,
        height: y1 - y0,
        rgba,
    }
}

fn provider_failed(reason: &str) -> Error {
    Error::ProviderFailed {
        reason: reason.to_string(),
    }
}

fn out_of_range(key: TileKey) -> Error {
    Error::TileOutOfRange {
        tile: key.to_string(),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::spawn::FramePump;
    use std::task::{Context, Poll, Waker};
    use tiledecode::{HeightmapDecoder, HeightmapEncoding};
    use tilefetch::FetchFuture;

    /// Serves a fixed payload for every URL and records what was asked.
    struct FixedFetcher {
        payload: tilefetch::Result<Payload>,
        requests: std::sync::Mutex<Vec<ResourceRequest>>,
    }

    impl FixedFetcher {
        fn new(payload: tilefetch::Result<Payload>) -> Arc<Self> {
            Arc::new(Self {
                payload,
                requests: std::sync::Mutex::new(Vec::new()),
            })
        }
    }

    impl ResourceFetcher for FixedFetcher {
        fn fetch(&self, request: ResourceRequest) -> FetchFuture {
            self.requests.lock().unwrap().push(request);
            Box::pin(ready(self.payload.clone()))
        }
    }

    fn poll_now<T>(mut future: TileFuture<T>) -> Result<T> {
        let mut cx = Context::from_waker(Waker::noop());
        match future.as_mut().poll(&mut cx) {
            Poll::Ready(result) => result,
            Poll::Pending => panic!("future was not ready"),
        }
    }

    fn raw_2x2() -> Vec<u8> {
        [1.0f32, 2.0, 3.0, 4.0]
            .iter()
            .flat_map(|h| h.to_le_bytes())
            .collect()
    }

    #[test]
    fn test_expand_template() {
        let template = UrlTemplate {
            url: "https://t/{z}/{x}/{y}.png?r={reverseY}".to_string(),
            maximum_level: 5,
            flip_y: false,
        };
        let scheme = TilingScheme::geographic();
        // Level 2 has 4 rows.
        assert_eq!(
            template.expand(TileKey::new(2, 3, 1), &scheme),
            "https://t/2/3/1.png?r=2"
        );

        let tms = UrlTemplate {
            flip_y: true,
            ..template
        };
        assert_eq!(
            tms.expand(TileKey::new(2, 3, 1), &scheme),
            "https://t/2/3/2.png?r=2"
        );
    }

    #[test]
    fn test_resolve_url() {
        let base = "https://example.com/tiles/layer.json";
        assert_eq!(
            resolve_url(base, "{z}/{x}/{y}.png"),
            "https://example.com/tiles/{z}/{x}/{y}.png"
        );
        assert_eq!(
            resolve_url(base, "/other/{z}.png"),
            "https://example.com/other/{z}.png"
        );
        assert_eq!(resolve_url(base, "http://cdn/{z}"), "http://cdn/{z}");
    }

    #[test]
    fn test_parse_metadata() {
        let doc = Payload::Document(
            r#"{ "tiles": ["{z}/{x}/{y}.bin"], "maxzoom": 7, "scheme": "tms" }"#.to_string(),
        );
        let template = parse_metadata("https://h/a/layer.json", &doc).unwrap();
        assert_eq!(template.url, "https://h/a/{z}/{x}/{y}.bin");
        assert_eq!(template.maximum_level, 7);
        assert!(template.flip_y);

        let empty = Payload::Document(r#"{ "tiles": [] }"#.to_string());
        assert!(matches!(
            parse_metadata("u", &empty),
            Err(Error::InvalidMetadata { .. })
        ));
        let binary = Payload::Binary(vec![1, 2, 3]);
        assert!(parse_metadata("u", &binary).is_err());
    }

    #[test]
    fn test_ellipsoid_is_flat_and_ready() {
        let provider = EllipsoidTerrainProvider::new().with_maximum_level(3);
        assert!(provider.is_ready());
        assert_eq!(provider.maximum_level(), 3);

        let heightmap = poll_now(provider.request_tile(TileKey::new(1, 3, 1))).unwrap();
        assert_eq!(heightmap.range(), Some((0.0, 0.0)));
        assert!(poll_now(provider.request_tile(TileKey::new(0, 5, 0))).is_err());
    }

    #[test]
    fn test_template_fetches_and_decodes() {
        let fetcher = FixedFetcher::new(Ok(Payload::Binary(raw_2x2())));
        let provider = TemplateTileProvider::new(
            "https://t/{z}/{x}/{y}",
            4,
            TilingScheme::geographic(),
            fetcher.clone(),
            HeightmapDecoder::new(HeightmapEncoding::RawF32 {
                width: 2,
                height: 2,
            }),
        )
        .with_header("x-key", "secret");

        let heightmap = poll_now(provider.request_tile(TileKey::new(1, 2, 1))).unwrap();
        assert_eq!(heightmap.get(1, 1), Some(4.0));

        let requests = fetcher.requests.lock().unwrap();
        assert_eq!(requests[0].url, "https://t/1/2/1");
        assert_eq!(requests[0].headers, vec![("x-key".to_string(), "secret".to_string())]);
        drop(requests);

        let too_deep = poll_now(provider.request_tile(TileKey::new(5, 0, 0)));
        assert!(matches!(too_deep, Err(Error::TileOutOfRange { .. })));
    }

    #[test]
    fn test_template_decode_failure_is_malformed() {
        let fetcher = FixedFetcher::new(Ok(Payload::Binary(vec![0; 3])));
        let provider = TemplateTileProvider::new(
            "https://t/{z}/{x}/{y}",
            4,
            TilingScheme::geographic(),
            fetcher,
            HeightmapDecoder::new(HeightmapEncoding::RawF32 {
                width: 2,
                height: 2,
            }),
        );
        let err = poll_now(provider.request_tile(TileKey::new(0, 0, 0))).unwrap_err();
        assert_eq!(err.kind(), crate::error::FailureKind::MalformedPayload);
    }

    #[test]
    fn test_from_metadata_becomes_ready_once() {
        let pump = FramePump::new();
        let fetcher = FixedFetcher::new(Ok(Payload::Document(
            r#"{ "tiles": ["https://t/{z}/{x}/{y}"], "maxzoom": 9 }"#.to_string(),
        )));
        let provider = TemplateTileProvider::from_metadata(
            "https://t/layer.json",
            TilingScheme::geographic(),
            fetcher.clone(),
            ImageDecoder,
            &pump,
        );

        assert_eq!(provider.state(), ProviderState::Pending);
        assert!(matches!(
            poll_now(provider.request_tile(TileKey::new(0, 0, 0))),
            Err(Error::ProviderNotReady)
        ));

        pump.pump();
        assert_eq!(provider.state(), ProviderState::Ready);
        assert_eq!(provider.maximum_level(), 9);
        assert_eq!(
            provider.tile_url(TileKey::new(1, 0, 1)).as_deref(),
            Some("https://t/1/0/1")
        );
        assert_eq!(
            fetcher.requests.lock().unwrap()[0].kind,
            tilefetch::ResponseKind::Document
        );
    }

    #[test]
    fn test_from_metadata_failure() {
        let pump = FramePump::new();
        let fetcher = FixedFetcher::new(Err(tilefetch::Error::HttpStatus {
            url: "https://t/layer.json".into(),
            status: 404,
        }));
        let provider = TemplateTileProvider::from_metadata(
            "https://t/layer.json",
            TilingScheme::geographic(),
            fetcher,
            ImageDecoder,
            &pump,
        );
        pump.pump();
        assert!(matches!(provider.state(), ProviderState::Failed(_)));
        assert!(!provider.is_ready());

        let err = poll_now(provider.request_tile(TileKey::new(0, 0, 0))).unwrap_err();
        assert!(matches!(err, Error::ProviderFailed { ref reason } if reason.contains("404")));
        assert_eq!(err.kind(), crate::error::FailureKind::InvalidProviderState);
    }

    #[test]
    fn test_failed_single_tile_reports_reason() {
        let pump = FramePump::new();
        let fetcher = FixedFetcher::new(Ok(Payload::Binary(vec![1, 2, 3])));
        let provider = SingleTileImageryProvider::new(
            "https://t/world.png",
            TilingScheme::geographic(),
            fetcher.as_ref(),
            &pump,
        );
        assert!(matches!(
            poll_now(provider.request_tile(TileKey::new(0, 0, 0))),
            Err(Error::ProviderNotReady)
        ));

        pump.pump();
        assert!(matches!(provider.state(), ProviderState::Failed(_)));
        assert!(matches!(
            poll_now(provider.request_tile(TileKey::new(0, 0, 0))),
            Err(Error::ProviderFailed { .. })
        ));
    }

    #[test]
    fn test_maximum_level_is_clamped() {
        let doc =
            Payload::Document(r#"{ "tiles": ["{z}/{x}/{y}.png"], "maxzoom": 40 }"#.to_string());
        let template = parse_metadata("https://h/layer.json", &doc).unwrap();
        assert_eq!(template.maximum_level, MAXIMUM_LEVEL);

        let provider = EllipsoidTerrainProvider::new().with_maximum_level(u32::MAX);
        assert_eq!(provider.maximum_level(), MAXIMUM_LEVEL);

        let provider = TemplateTileProvider::new(
            "https://t/{z}/{x}/{y}",
            64,
            TilingScheme::geographic(),
            FixedFetcher::new(Ok(Payload::Binary(raw_2x2()))),
            ImageDecoder,
        );
        assert_eq!(provider.maximum_level(), MAXIMUM_LEVEL);
        // The last column of a two-root grid still splits without overflow.
        let deepest = TileKey::new(MAXIMUM_LEVEL, (2 << MAXIMUM_LEVEL) - 1, 0);
        assert_eq!(deepest.children()[3].x, u32::MAX);
    }

    #[test]
    fn test_single_tile_splits_between_roots() {
        let mut image = ImageryTile::solid(4, 2, [0, 0, 0, 255]);
        // Paint the east half red.
        for y in 0..2 {
            for x in 2..4 {
                let i = (y * 4 + x) * 4;
                image.rgba[i] = 255;
            }
        }
        let provider = SingleTileImageryProvider::from_image(image, TilingScheme::geographic());
        assert_eq!(provider.maximum_level(), 0);

        let west = poll_now(provider.request_tile(TileKey::new(0, 0, 0))).unwrap();
        let east = poll_now(provider.request_tile(TileKey::new(0, 1, 0))).unwrap();
        assert_eq!((west.width, west.height), (2, 2));
        assert_eq!(west.pixel(0, 0), Some([0, 0, 0, 255]));
        assert_eq!(east.pixel(1, 1), Some([255, 0, 0, 255]));
        assert!(poll_now(provider.request_tile(TileKey::new(1, 0, 0))).is_err());
    }
}
