//! Upstream forwarding.
//!
//! # Responsibilities
//! - Rewrite the request URI onto the upstream endpoint
//! - Strip hop-by-hop headers in both directions
//! - Append the client address to `X-Forwarded-For`
//! - Stream the upstream response back unchanged
//!
//! # Design Decisions
//! - The inbound `Host` header is preserved; federation signatures cover it
//! - Upstream transport failures become 502 Bad Gateway
//! - Forwarding sits behind a trait so dispatch can be tested in memory

use std::net::SocketAddr;
use std::str::FromStr;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{
        header::{self, HeaderMap, HeaderName, HeaderValue},
        uri::{Authority, PathAndQuery, Scheme},
        Request, StatusCode, Uri, Version,
    },
    response::{IntoResponse, Response},
};
use futures_util::future::BoxFuture;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use url::Url;

use crate::filter::request::X_FORWARDED_FOR;

/// Headers that describe a single connection and must not be forwarded.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
];

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("invalid upstream endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
}

/// Something that can serve a request on our behalf.
pub trait Upstream: Send + Sync {
    fn forward(&self, request: Request<Body>) -> BoxFuture<'_, Response>;
}

/// Forwards requests to a single HTTP upstream.
#[derive(Clone)]
pub struct HttpUpstream {
    client: Client<HttpConnector, Body>,
    authority: Authority,
    base_path: String,
}

impl HttpUpstream {
    pub fn new(endpoint: &str) -> Result<Self, UpstreamError> {
        let invalid = |reason: String| UpstreamError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason,
        };

        let url = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
        if url.scheme() != "http" {
            return Err(invalid(format!("unsupported scheme {:?}", url.scheme())));
        }
        let host = url.host_str().ok_or_else(|| invalid("missing host".to_string()))?;
        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let authority = Authority::from_str(&authority).map_err(|e| invalid(e.to_string()))?;

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Ok(Self {
            client,
            authority,
            base_path: url.path().trim_end_matches('/').to_string(),
        })
    }

    /// Map an inbound URI onto the upstream, joining base path and request path.
    fn upstream_uri(&self, inbound: &Uri) -> Result<Uri, axum::http::Error> {
        let path = format!("{}{}", self.base_path, inbound.path());
        let path_and_query = match inbound.query() {
            Some(query) => format!("{path}?{query}"),
            None => path,
        };
        Uri::builder()
            .scheme(Scheme::HTTP)
            .authority(self.authority.clone())
            .path_and_query(PathAndQuery::from_str(&path_and_query)?)
            .build()
    }
}

impl Upstream for HttpUpstream {
    fn forward(&self, request: Request<Body>) -> BoxFuture<'_, Response> {
        Box::pin(async move {
            let (mut parts, body) = request.into_parts();

            let uri = match self.upstream_uri(&parts.uri) {
                Ok(uri) => uri,
                Err(e) => {
                    tracing::error!(error = %e, uri = %parts.uri, "Cannot build upstream URI");
                    return (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response();
                }
            };

            // HTTP/2 clients carry the host in the URI rather than a header.
            if !parts.headers.contains_key(header::HOST) {
                if let Some(host) = parts.uri.authority().and_then(|a| HeaderValue::from_str(a.as_str()).ok()) {
                    parts.headers.insert(header::HOST, host);
                }
            }

            strip_hop_by_hop(&mut parts.headers);
            let peer = parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr);
            if let Some(peer) = peer {
                append_forwarded_for(&mut parts.headers, peer);
            }

            parts.uri = uri;
            parts.version = Version::HTTP_11;

            match self.client.request(Request::from_parts(parts, body)).await {
                Ok(response) => {
                    let (mut parts, body) = response.into_parts();
                    strip_hop_by_hop(&mut parts.headers);
                    Response::from_parts(parts, Body::new(body))
                }
                Err(e) => {
                    tracing::error!(error = %e, upstream = %self.authority, "Upstream error");
                    (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
                }
            }
        })
    }
}

/// Remove hop-by-hop headers, including any named in `Connection`.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_str(name.trim()).ok())
        .collect();

    for name in named.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
    // Upgrades are not proxied.
    headers.remove(header::UPGRADE);
}

fn append_forwarded_for(headers: &mut HeaderMap, peer: SocketAddr) {
    let client = peer.ip().to_canonical().to_string();
    let value = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(prior) if !prior.trim().is_empty() => format!("{prior}, {client}"),
        _ => client,
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}
