//! The resource fetcher capability and its HTTP implementation.

use std::{future::Future, pin::Pin, sync::Arc};

use crate::cache::{NoCache, ResponseCache};
use crate::error::{Error, Result};
use crate::request::{Payload, ResourceRequest, ResponseKind};

/// Future returned by [`ResourceFetcher::fetch`].
pub type FetchFuture = Pin<Box<dyn Future<Output = Result<Payload>> + Send + 'static>>;

/// Asynchronously fetches resources.
///
/// `fetch` returns immediately with a deferred result; callers never block on
/// it. Dropping the future abandons the request.
pub trait ResourceFetcher: Send + Sync + 'static {
    /// Start fetching the resource described by `request`.
    fn fetch(&self, request: ResourceRequest) -> FetchFuture;
}

impl<F: ResourceFetcher + ?Sized> ResourceFetcher for Arc<F> {
    fn fetch(&self, request: ResourceRequest) -> FetchFuture {
        (**self).fetch(request)
    }
}

/// HTTP fetcher backed by reqwest.
///
/// Runtime-agnostic in the same way reqwest is: the returned futures need a
/// Tokio reactor on native targets.
pub struct HttpFetcher<C: ResponseCache = NoCache> {
    http: reqwest::Client,
    cache: Arc<C>,
}

impl HttpFetcher<NoCache> {
    /// Create a fetcher with default settings and no caching.
    #[must_use]
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            cache: Arc::new(NoCache),
        }
    }
}

impl Default for HttpFetcher<NoCache> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ResponseCache> HttpFetcher<C> {
    /// Create a fetcher with a response cache.
    #[must_use]
    pub fn with_cache(cache: C) -> Self {
        Self {
            http: reqwest::Client::new(),
            cache: Arc::new(cache),
        }
    }

    /// Create a fetcher with a custom HTTP client and cache.
    #[must_use]
    pub fn with_http_and_cache(http: reqwest::Client, cache: C) -> Self {
        Self {
            http,
            cache: Arc::new(cache),
        }
    }

    /// The response cache.
    #[must_use]
    pub fn cache(&self) -> &C {
        &self.cache
    }
}

impl<C: ResponseCache> ResourceFetcher for HttpFetcher<C> {
    fn fetch(&self, request: ResourceRequest) -> FetchFuture {
        let http = self.http.clone();
        let cache = Arc::clone(&self.cache);
        Box::pin(async move { fetch_with_cache(&http, cache.as_ref(), request).await })
    }
}

async fn fetch_with_cache<C: ResponseCache>(
    http: &reqwest::Client,
    cache: &C,
    request: ResourceRequest,
) -> Result<Payload> {
    let url = request.url.as_str();

    if let Some(payload) = cache.get(url, request.kind) {
        tracing::debug!(url, "cache hit");
        return Ok(payload);
    }

    tracing::debug!(url, kind = ?request.kind, "fetching");

    let mut builder = http.get(url);
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(accept) = request.accept() {
        builder = builder.header(reqwest::header::ACCEPT, accept);
    }

    let response = builder.send().await.map_err(|e| Error::Http {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let bytes = response.bytes().await.map_err(|e| Error::Http {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    let payload = match request.kind {
        ResponseKind::Binary => Payload::Binary(bytes.to_vec()),
        ResponseKind::Document => {
            let text = String::from_utf8(bytes.to_vec()).map_err(|e| Error::InvalidData {
                url: url.to_string(),
                detail: format!("document is not valid utf-8: {e}"),
            })?;
            Payload::Document(text)
        }
    };

    cache.put(url, request.kind, payload.clone());
    Ok(payload)
}
