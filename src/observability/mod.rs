//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! http::dispatch produces events:
//!     → observer.rs (LoggingObserver: one event per outcome)
//!     → logging.rs (structured log output)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - The correlation id is on every dispatch event
//! - Metrics are cheap and disabled unless an address is configured

pub mod logging;
pub mod metrics;
pub mod observer;

pub use observer::LoggingObserver;
