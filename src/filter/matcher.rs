//! Matcher trait and header-level matchers.
//!
//! # Responsibilities
//! - Define the single capability every rule condition implements
//! - Match on the `User-Agent` header (substring)
//! - Match the resolved client address against a CIDR block
//!
//! # Design Decisions
//! - Matchers are immutable and validated at construction
//! - A matcher error is distinct from "no match" and always propagates
//! - Header matchers never read the request body

use std::fmt;
use std::net::IpAddr;

use futures_util::future::{self, BoxFuture};
use thiserror::Error;

use crate::filter::cidr::{CidrBlock, CidrParseError};
use crate::filter::request::{BodyError, RequestView};

/// Construction-time rule errors.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("empty {0} pattern")]
    EmptyPattern(&'static str),

    #[error("invalid mention threshold {0}: must not be negative")]
    NegativeThreshold(i64),

    #[error("invalid CIDR block {block:?}: {source}")]
    InvalidCidr {
        block: String,
        #[source]
        source: CidrParseError,
    },

    #[error("ruleset has no rules")]
    EmptyRuleSet,
}

/// Errors raised while testing a request.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error(transparent)]
    Body(#[from] BodyError),

    #[error("unmarshal json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("resolve client address: {0}")]
    ClientAddress(String),
}

/// A single condition a request may satisfy.
pub trait Matcher: Send + Sync + fmt::Debug {
    /// Returns whether the request satisfies this condition.
    ///
    /// Content matchers may buffer the body through the view; the buffered
    /// bytes are shared with every later matcher on the same request.
    fn test<'a>(&'a self, req: &'a mut RequestView) -> BoxFuture<'a, Result<bool, MatchError>>;
}

/// Matches when the `User-Agent` header contains a pattern.
#[derive(Debug, Clone)]
pub struct UserAgentMatcher {
    pattern: String,
}

impl UserAgentMatcher {
    pub fn new(pattern: impl Into<String>) -> Result<Self, RuleError> {
        let pattern = pattern.into();
        if pattern.is_empty() {
            return Err(RuleError::EmptyPattern("user agent"));
        }
        Ok(Self { pattern })
    }
}

impl Matcher for UserAgentMatcher {
    fn test<'a>(&'a self, req: &'a mut RequestView) -> BoxFuture<'a, Result<bool, MatchError>> {
        let matched = req.user_agent().contains(&self.pattern);
        Box::pin(future::ready(Ok(matched)))
    }
}

/// Matches when the client address falls within a CIDR block.
#[derive(Debug, Clone)]
pub struct RemoteIpMatcher {
    block: CidrBlock,
}

impl RemoteIpMatcher {
    pub fn new(block: &str) -> Result<Self, RuleError> {
        let parsed = block.parse().map_err(|source| RuleError::InvalidCidr {
            block: block.to_string(),
            source,
        })?;
        Ok(Self { block: parsed })
    }

    pub fn block(&self) -> &CidrBlock {
        &self.block
    }
}

impl Matcher for RemoteIpMatcher {
    fn test<'a>(&'a self, req: &'a mut RequestView) -> BoxFuture<'a, Result<bool, MatchError>> {
        let result = resolve_client_ip(req).map(|ip| self.block.contains(ip));
        Box::pin(future::ready(result))
    }
}

/// Determine the effective client address of a request.
///
/// The first `X-Forwarded-For` entry wins when the header is non-empty;
/// it is trusted as set by the fronting proxy. Otherwise the transport
/// peer address is used. IPv4-mapped IPv6 addresses are canonicalised.
pub fn resolve_client_ip(req: &RequestView) -> Result<IpAddr, MatchError> {
    if let Some(forwarded) = req.forwarded_for().filter(|v| !v.trim().is_empty()) {
        let first = forwarded.split(',').next().unwrap_or_default().trim();
        return first
            .parse::<IpAddr>()
            .map(|ip| ip.to_canonical())
            .map_err(|e| MatchError::ClientAddress(format!("forwarded-for entry {first:?}: {e}")));
    }

    req.peer_addr()
        .map(|addr| addr.ip().to_canonical())
        .ok_or_else(|| MatchError::ClientAddress("no peer address".to_string()))
}
