//! Command-line parsing for the probe.

use std::fmt;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use globe_surface::{SurfaceConfig, TilingScheme};
use tiledecode::HeightmapEncoding;

/// Default view: the western Alps.
const DEFAULT_WEST: f64 = 5.0;
const DEFAULT_SOUTH: f64 = 45.0;
const DEFAULT_EAST: f64 = 10.0;
const DEFAULT_NORTH: f64 = 50.0;

const DEFAULT_SCREEN_HEIGHT: f64 = 1080.0;
const DEFAULT_MAX_FRAMES: u64 = 2_000;
const DEFAULT_FRAME_MS: u64 = 16;
const DEFAULT_CACHE_MB: usize = 256;
const DEFAULT_IMAGERY_MAX_LEVEL: u32 = 18;

/// How terrain tiles encode heights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TerrainEncoding {
    #[default]
    Terrarium,
    TerrainRgb,
}

impl From<TerrainEncoding> for HeightmapEncoding {
    fn from(encoding: TerrainEncoding) -> Self {
        match encoding {
            TerrainEncoding::Terrarium => HeightmapEncoding::Terrarium,
            TerrainEncoding::TerrainRgb => HeightmapEncoding::TerrainRgb,
        }
    }
}

/// How the endpoints lay out their tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SchemeArg {
    /// One square root tile, rows spaced in Mercator latitude (XYZ maps).
    #[default]
    WebMercator,
    /// Two root tiles, rows spaced evenly in latitude.
    Geographic,
}

impl From<SchemeArg> for TilingScheme {
    fn from(scheme: SchemeArg) -> Self {
        match scheme {
            SchemeArg::WebMercator => TilingScheme::web_mercator(),
            SchemeArg::Geographic => TilingScheme::geographic(),
        }
    }
}

#[derive(Parser, Debug)]
#[command(about = "Stream a globe surface view until every tile it needs has loaded")]
pub struct CliArgs {
    /// West edge of the view in degrees.
    #[arg(long, default_value_t = DEFAULT_WEST, allow_hyphen_values = true)]
    pub west: f64,

    /// South edge of the view in degrees.
    #[arg(long, default_value_t = DEFAULT_SOUTH, allow_hyphen_values = true)]
    pub south: f64,

    /// East edge of the view in degrees.
    #[arg(long, default_value_t = DEFAULT_EAST, allow_hyphen_values = true)]
    pub east: f64,

    /// North edge of the view in degrees.
    #[arg(long, default_value_t = DEFAULT_NORTH, allow_hyphen_values = true)]
    pub north: f64,

    /// Viewport height in pixels.
    #[arg(long, default_value_t = DEFAULT_SCREEN_HEIGHT)]
    pub screen_height: f64,

    /// Tiling scheme shared by the terrain and imagery endpoints.
    #[arg(long, value_enum, default_value_t = SchemeArg::default())]
    pub scheme: SchemeArg,

    /// Terrain metadata document (`tiles`, `maxzoom`, `scheme`). Flat
    /// ellipsoid terrain when omitted.
    #[arg(long)]
    pub terrain: Option<String>,

    /// Height encoding of the terrain tiles.
    #[arg(long, value_enum, default_value_t = TerrainEncoding::default())]
    pub terrain_encoding: TerrainEncoding,

    /// Imagery URL template with `{z}`, `{x}`, `{y}` or `{reverseY}`.
    /// Repeat to stack layers, bottom first.
    #[arg(long)]
    pub imagery: Vec<String>,

    /// Deepest level the imagery templates serve.
    #[arg(long, default_value_t = DEFAULT_IMAGERY_MAX_LEVEL)]
    pub imagery_max_level: u32,

    /// A single image stretched over the whole globe, drawn below the
    /// template layers.
    #[arg(long)]
    pub single_image: Option<String>,

    /// JSON file with scheduler settings. Flags below override it.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Screen-space error, in pixels, above which tiles are refined.
    #[arg(long)]
    pub max_sse: Option<f64>,

    /// Fetches allowed in flight at once.
    #[arg(long)]
    pub max_concurrent: Option<usize>,

    /// Failed fetches tolerated per tile before giving up.
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Give up after this many frames.
    #[arg(long, default_value_t = DEFAULT_MAX_FRAMES)]
    pub max_frames: u64,

    /// Milliseconds between frames.
    #[arg(long, default_value_t = DEFAULT_FRAME_MS)]
    pub frame_ms: u64,

    /// Response cache size in megabytes.
    #[arg(long, default_value_t = DEFAULT_CACHE_MB)]
    pub cache_mb: usize,
}

impl CliArgs {
    /// Scheduler settings from `--config`, then the override flags.
    pub fn surface_config(&self) -> Result<SurfaceConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => SurfaceConfig::default(),
        };
        if let Some(sse) = self.max_sse {
            config = config.with_maximum_screen_space_error(sse);
        }
        if let Some(count) = self.max_concurrent {
            config = config.with_max_concurrent_requests(count);
        }
        if let Some(attempts) = self.max_attempts {
            config = config.with_max_fetch_attempts(attempts);
        }
        Ok(config)
    }

    #[must_use]
    pub fn cache_bytes(&self) -> usize {
        self.cache_mb.saturating_mul(1024 * 1024)
    }
}

/// Reading the `--config` file failed.
#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "reading {}: {source}", path.display()),
            Self::Parse { path, source } => write!(f, "parsing {}: {source}", path.display()),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
        }
    }
}

fn load_config(path: &Path) -> Result<SurfaceConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use globe_surface::Projection;

    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("surface-probe").chain(args.iter().copied()))
            .expect("arguments should parse")
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]);
        assert!((args.west - DEFAULT_WEST).abs() < f64::EPSILON);
        assert!(args.terrain.is_none());
        assert!(args.imagery.is_empty());
        assert_eq!(args.terrain_encoding, TerrainEncoding::Terrarium);
        assert_eq!(TilingScheme::from(args.scheme), TilingScheme::web_mercator());
        assert_eq!(args.surface_config().unwrap(), SurfaceConfig::default());
        assert_eq!(args.cache_bytes(), DEFAULT_CACHE_MB * 1024 * 1024);
    }

    #[test]
    fn test_overrides_apply() {
        let args = parse(&[
            "--west",
            "-95",
            "--max-sse",
            "4",
            "--max-concurrent",
            "0",
            "--imagery",
            "https://a/{z}/{x}/{y}.png",
            "--imagery",
            "https://b/{z}/{x}/{y}.png",
            "--terrain-encoding",
            "terrain-rgb",
        ]);
        assert!((args.west + 95.0).abs() < f64::EPSILON);
        assert_eq!(args.imagery.len(), 2);
        assert_eq!(
            HeightmapEncoding::from(args.terrain_encoding),
            HeightmapEncoding::TerrainRgb
        );

        let config = args.surface_config().unwrap();
        assert!((config.maximum_screen_space_error - 4.0).abs() < f64::EPSILON);
        assert_eq!(config.max_concurrent_requests, 1);
    }

    #[test]
    fn test_scheme_selects_tiling() {
        let mercator = TilingScheme::from(parse(&["--scheme", "web-mercator"]).scheme);
        assert_eq!(mercator.tiles_at_level(0), (1, 1));
        assert_eq!(mercator.projection(), Projection::WebMercator);

        let geographic = TilingScheme::from(parse(&["--scheme", "geographic"]).scheme);
        assert_eq!(geographic.tiles_at_level(0), (2, 1));
        assert_eq!(geographic.projection(), Projection::Geographic);

        assert!(CliArgs::try_parse_from(["surface-probe", "--scheme", "mercator"]).is_err());
    }

    #[test]
    fn test_config_file_then_flags() {
        let path = std::env::temp_dir().join(format!("surface-probe-{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "max_fetch_attempts": 5, "retry_delay_frames": 2 }"#).unwrap();

        let args = parse(&["--config", path.to_str().unwrap(), "--max-attempts", "7"]);
        let config = args.surface_config().unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.retry_delay_frames, 2);
        assert_eq!(config.max_fetch_attempts, 7);
        assert_eq!(config.max_concurrent_requests, 16);
    }

    #[test]
    fn test_missing_config_file() {
        let args = parse(&["--config", "/nonexistent/surface.json"]);
        assert!(matches!(args.surface_config(), Err(ConfigError::Io { .. })));
    }
}
