//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, catch-all route, middleware)
//!     → dispatch.rs (new request ID, evaluate policy)
//!     → Deny: configured status, empty body
//!     → Allow / evaluation error: forward.rs (proxy to upstream)
//!     → Send to client
//! ```

pub mod dispatch;
pub mod forward;
pub mod request;
pub mod server;

pub use dispatch::{DispatchObserver, Dispatcher, Forwarded, NoopObserver};
pub use forward::{HttpUpstream, Upstream, UpstreamError};
pub use request::{IdGenerator, RequestId, UuidGenerator};
pub use server::HttpServer;
