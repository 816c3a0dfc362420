//! Per-request view consumed by matchers.
//!
//! # Responsibilities
//! - Expose request metadata (method, path, headers, peer address)
//! - Buffer the body on first access and serve it from memory afterwards
//! - Hand the request back, body replayed, for forwarding upstream
//!
//! # Design Decisions
//! - The network body is read at most once per request
//! - A view is owned by a single request and never shared across tasks
//! - Metadata accessors never touch the body

use std::net::SocketAddr;

use axum::body::{Body, Bytes};
use axum::http::{header, request::Parts, HeaderMap, Method, Request};
use thiserror::Error;

/// Path suffix of federation inbox endpoints.
pub const INBOX_SUFFIX: &str = "/inbox";

/// Header carrying the client chain when behind another proxy.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Errors raised while buffering the request body.
#[derive(Debug, Error)]
pub enum BodyError {
    /// The underlying stream failed before it was fully read.
    #[error("read request body: {0}")]
    Read(#[source] axum::Error),

    /// An earlier read failed part way, so the stream is gone.
    #[error("request body was lost by an earlier failed read")]
    Consumed,
}

/// An inbound request wrapped for inspection.
#[derive(Debug)]
pub struct RequestView {
    parts: Parts,
    peer_addr: Option<SocketAddr>,
    stream: Option<Body>,
    buffered: Option<Bytes>,
}

impl RequestView {
    /// Wrap a request together with the transport-level peer address.
    pub fn new(request: Request<Body>, peer_addr: Option<SocketAddr>) -> Self {
        let (parts, body) = request.into_parts();
        Self {
            parts,
            peer_addr,
            stream: Some(body),
            buffered: None,
        }
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// First value of a header, if present and valid UTF-8.
    ///
    /// Lookup is case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The `User-Agent` header, or an empty string when absent.
    pub fn user_agent(&self) -> &str {
        self.parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    /// The raw `X-Forwarded-For` header value, if any.
    pub fn forwarded_for(&self) -> Option<&str> {
        self.header(X_FORWARDED_FOR)
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Returns true if the request targets a federation inbox.
    pub fn is_inbox(&self) -> bool {
        self.path().ends_with(INBOX_SUFFIX)
    }

    /// Returns true once the body has been buffered.
    pub fn is_body_buffered(&self) -> bool {
        self.buffered.is_some()
    }

    /// Fetch the full request body.
    ///
    /// The first call drains the network stream; later calls return the
    /// same buffered bytes.
    pub async fn body(&mut self) -> Result<&Bytes, BodyError> {
        if self.buffered.is_none() {
            let stream = self.stream.take().ok_or(BodyError::Consumed)?;
            let bytes = axum::body::to_bytes(stream, usize::MAX)
                .await
                .map_err(BodyError::Read)?;
            tracing::trace!(len = bytes.len(), "request body buffered");
            self.buffered = Some(bytes);
        }

        match &self.buffered {
            Some(bytes) => Ok(bytes),
            None => Err(BodyError::Consumed),
        }
    }

    /// Reassemble the request for forwarding.
    ///
    /// A buffered body is replayed unchanged; an untouched body is passed
    /// through as a stream. After a failed read the body is empty.
    pub fn into_request(self) -> Request<Body> {
        let body = match (self.buffered, self.stream) {
            (Some(bytes), _) => Body::from(bytes),
            (None, Some(stream)) => stream,
            (None, None) => Body::empty(),
        };
        Request::from_parts(self.parts, body)
    }
}
