//! Headless probe: stream one view of the globe until it is fully loaded.
//!
//! Terrain and imagery come from real tile endpoints. Each frame the probe
//! updates the globe, waits for the next frame tick, and logs the scheduler
//! diagnostics. When nothing is loading any more it prints the final
//! diagnostics as JSON on stdout.

mod cli;
mod spawner;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use globe_surface::{
    EllipsoidTerrainProvider, FrameState, Globe, ImageryLayer, Rectangle, RectangleView,
    SingleTileImageryProvider, SurfaceDiagnostics, TemplateTileProvider, TerrainProvider,
    TileProvider, TilingScheme,
};
use tiledecode::{HeightmapDecoder, ImageDecoder};
use tilefetch::{HttpFetcher, MemoryCache, ResourceFetcher};

use crate::cli::CliArgs;
use crate::spawner::TokioSpawner;

/// Frames between progress lines.
const LOG_EVERY_FRAMES: u64 = 30;

#[tokio::main]
async fn main() -> ExitCode {
    {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    let args = CliArgs::parse();
    let config = match args.surface_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let spawner = TokioSpawner::current();
    let fetcher: Arc<dyn ResourceFetcher> = Arc::new(HttpFetcher::with_cache(
        MemoryCache::with_max_bytes(args.cache_bytes()),
    ));
    let scheme = TilingScheme::from(args.scheme);

    let terrain: Arc<TerrainProvider> = match &args.terrain {
        Some(url) => Arc::new(TemplateTileProvider::from_metadata(
            url.clone(),
            scheme,
            Arc::clone(&fetcher),
            HeightmapDecoder::new(args.terrain_encoding.into()),
            &spawner,
        )),
        None => Arc::new(EllipsoidTerrainProvider::new().with_tiling_scheme(scheme)),
    };
    let mut globe = Globe::with_terrain(terrain, config, Arc::new(spawner.clone()));

    let _terrain_changed = globe.terrain_provider_changed().subscribe(|provider| {
        tracing::info!(
            maximum_level = provider.maximum_level(),
            "terrain provider replaced"
        );
    });

    if let Some(url) = &args.single_image {
        let provider = SingleTileImageryProvider::new(url.clone(), scheme, &*fetcher, &spawner);
        globe
            .imagery_layers_mut()
            .add(ImageryLayer::new(Arc::new(provider)).with_name(url.clone()));
    }
    for template in &args.imagery {
        let provider = TemplateTileProvider::new(
            template.clone(),
            args.imagery_max_level,
            scheme,
            Arc::clone(&fetcher),
            ImageDecoder,
        );
        globe
            .imagery_layers_mut()
            .add(ImageryLayer::new(Arc::new(provider)).with_name(template.clone()));
    }

    let view = RectangleView::framing(
        Rectangle::from_degrees(args.west, args.south, args.east, args.north),
        args.screen_height,
    );
    tracing::info!(
        west = args.west,
        south = args.south,
        east = args.east,
        north = args.north,
        layers = globe.imagery_layers().len(),
        projection = ?scheme.projection(),
        "probing view"
    );

    let started = Instant::now();
    let mut ticker = tokio::time::interval(Duration::from_millis(args.frame_ms.max(1)));
    let mut loaded = false;
    for frame in 1..=args.max_frames {
        ticker.tick().await;
        globe.update(&FrameState::new(&view));

        if frame % LOG_EVERY_FRAMES == 0 {
            log_progress(&globe.diagnostics());
        }
        if let Some(error) = globe.terrain_provider_error() {
            tracing::error!("terrain provider failed: {error}");
            break;
        }
        if !globe.tiles_loading() {
            loaded = true;
            break;
        }
    }

    let diagnostics = globe.diagnostics();
    tracing::info!(
        frames = diagnostics.frame,
        elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        tiles_rendered = globe.render_list().len(),
        loaded,
        "probe finished"
    );
    match serde_json::to_string_pretty(&diagnostics) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::error!("encoding diagnostics: {e}"),
    }

    if loaded {
        ExitCode::SUCCESS
    } else {
        tracing::warn!(max_frames = args.max_frames, "view did not finish loading");
        ExitCode::FAILURE
    }
}

fn log_progress(d: &SurfaceDiagnostics) {
    tracing::info!(
        frame = d.frame,
        in_flight = d.in_flight,
        queued_high = d.lanes.high,
        queued_medium = d.lanes.medium,
        queued_low = d.lanes.low,
        rendered = d.tiles_rendered,
        waiting = d.waiting_for_children,
        in_memory = d.tiles_in_memory,
        "loading"
    );
}
