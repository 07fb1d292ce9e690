//! Error types for the tilefetch crate.

use std::fmt;

/// Result type for fetch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while fetching a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The request could not be sent or the body could not be read.
    Http {
        /// The URL that failed.
        url: String,
        /// The error message.
        message: String,
    },
    /// The response had a non-success status code.
    HttpStatus {
        /// The URL that returned the error.
        url: String,
        /// The HTTP status code.
        status: u16,
    },
    /// The response body did not match the requested response kind.
    InvalidData {
        /// The URL whose response was invalid.
        url: String,
        /// Description of what was invalid.
        detail: String,
    },
}

impl Error {
    /// The HTTP status code, if the server answered with one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the server rejected the request as not found.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http { url, message } => {
                write!(f, "http request to {url} failed: {message}")
            }
            Error::HttpStatus { url, status } => {
                write!(f, "http request to {url} returned status {status}")
            }
            Error::InvalidData { url, detail } => {
                write!(f, "invalid response from {url}: {detail}")
            }
        }
    }
}

impl std::error::Error for Error {}
