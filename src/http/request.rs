//! Per-request correlation identifiers.
//!
//! # Responsibilities
//! - Generate a unique identifier for every inbound request
//! - Keep generation injectable so handlers are testable without globals
//!
//! # Design Decisions
//! - UUID v4 by default; no coordination between workers needed
//! - Identifiers are only handed to observers, never written into the
//!   forwarded request or the response

use std::fmt;

use uuid::Uuid;

/// Correlation identifier for one request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of fresh request identifiers.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> RequestId;
}

/// Random UUID v4 identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> RequestId {
        RequestId(Uuid::new_v4().to_string())
    }
}
