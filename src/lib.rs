//! Filtering reverse proxy for federated server inboxes.

pub mod config;
pub mod filter;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::schema::ProxyConfig;
pub use filter::{Action, Policy, RequestView, Verdict};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
