//! Request and response types shared by every fetcher.

/// How the response body should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    /// A structured text document (metadata, XML or JSON).
    Document,
    /// Raw bytes (tile payloads).
    Binary,
}

/// A request for a single resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequest {
    /// The absolute URL to fetch.
    pub url: String,
    /// Extra headers sent with the request.
    pub headers: Vec<(String, String)>,
    /// Expected response kind.
    pub kind: ResponseKind,
    /// MIME type to assume for document responses, regardless of what the
    /// server reports.
    pub override_mime_type: Option<String>,
}

impl ResourceRequest {
    /// Create a request for a binary payload.
    #[must_use]
    pub fn binary(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            kind: ResponseKind::Binary,
            override_mime_type: None,
        }
    }

    /// Create a request for a structured document.
    #[must_use]
    pub fn document(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            kind: ResponseKind::Document,
            override_mime_type: None,
        }
    }

    /// Add a header to the request.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Treat the document response as the given MIME type.
    #[must_use]
    pub fn with_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.override_mime_type = Some(mime.into());
        self
    }

    /// The `Accept` header value for this request, unless one was set explicitly.
    #[must_use]
    pub fn accept(&self) -> Option<&str> {
        if self
            .headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("accept"))
        {
            return None;
        }
        match self.kind {
            ResponseKind::Document => Some(
                self.override_mime_type
                    .as_deref()
                    .unwrap_or("application/json,text/xml;q=0.9,*/*;q=0.1"),
            ),
            ResponseKind::Binary => None,
        }
    }
}

/// A fetched response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Text of a structured document.
    Document(String),
    /// Raw bytes.
    Binary(Vec<u8>),
}

impl Payload {
    /// Size of the payload in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Payload::Document(text) => text.len(),
            Payload::Binary(bytes) => bytes.len(),
        }
    }

    /// Whether the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The payload as raw bytes, whatever its kind.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::Document(text) => text.as_bytes(),
            Payload::Binary(bytes) => bytes,
        }
    }

    /// Consume the payload, returning its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Payload::Document(text) => text.into_bytes(),
            Payload::Binary(bytes) => bytes,
        }
    }

    /// The document text, if this is a document.
    #[must_use]
    pub fn as_document(&self) -> Option<&str> {
        match self {
            Payload::Document(text) => Some(text),
            Payload::Binary(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_accept_defaults() {
        let req = ResourceRequest::document("http://a/layer.json");
        assert!(req.accept().unwrap().starts_with("application/json"));

        let req = req.with_mime_type("text/xml");
        assert_eq!(req.accept(), Some("text/xml"));
    }

    #[test]
    fn test_explicit_accept_header_wins() {
        let req = ResourceRequest::document("http://a").with_header("Accept", "text/plain");
        assert_eq!(req.accept(), None);
    }

    #[test]
    fn test_binary_has_no_accept() {
        assert_eq!(ResourceRequest::binary("http://a/0/0/0.png").accept(), None);
    }

    #[test]
    fn test_payload_len() {
        assert_eq!(Payload::Document("abc".to_string()).len(), 3);
        assert!(Payload::Binary(Vec::new()).is_empty());
        assert_eq!(Payload::Binary(vec![1, 2]).into_bytes(), vec![1, 2]);
    }
}
