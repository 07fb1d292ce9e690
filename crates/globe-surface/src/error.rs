//! Error types for the globe surface.

use std::fmt;

use tiledecode::DecodeError;

/// Result type for surface operations.
pub type Result<T> = std::result::Result<T, Error>;

/// How a failure is treated by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The fetch was rejected or timed out.
    Network,
    /// The fetched bytes could not be decoded.
    MalformedPayload,
    /// The provider is not ready or could not initialize.
    InvalidProviderState,
}

/// Errors produced while loading tile data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Fetching a resource failed.
    Fetch(tilefetch::Error),
    /// Decoding a fetched payload failed.
    Decode(DecodeError),
    /// A tile was requested from a provider that is not ready.
    ProviderNotReady,
    /// The provider could not initialize.
    ProviderFailed {
        /// Why initialization failed.
        reason: String,
    },
    /// A provider metadata document was invalid.
    InvalidMetadata {
        /// The metadata URL.
        url: String,
        /// Description of what was invalid.
        detail: String,
    },
    /// The requested tile lies outside the provider's tiling scheme.
    TileOutOfRange {
        /// The tile as `level/x/y`.
        tile: String,
    },
}

impl Error {
    /// Classify the failure for the retry policy.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::Fetch(_) => FailureKind::Network,
            Error::Decode(_) | Error::TileOutOfRange { .. } => FailureKind::MalformedPayload,
            Error::ProviderNotReady
            | Error::ProviderFailed { .. }
            | Error::InvalidMetadata { .. } => FailureKind::InvalidProviderState,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Fetch(e) => write!(f, "fetch error: {e}"),
            Error::Decode(e) => write!(f, "decode error: {e}"),
            Error::ProviderNotReady => write!(f, "tile provider is not ready"),
            Error::ProviderFailed { reason } => {
                write!(f, "tile provider failed to initialize: {reason}")
            }
            Error::InvalidMetadata { url, detail } => {
                write!(f, "invalid provider metadata at {url}: {detail}")
            }
            Error::TileOutOfRange { tile } => {
                write!(f, "tile {tile} is outside the provider's tiling scheme")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Fetch(e) => Some(e),
            Error::Decode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<tilefetch::Error> for Error {
    fn from(e: tilefetch::Error) -> Self {
        Error::Fetch(e)
    }
}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        Error::Decode(e)
    }
}
