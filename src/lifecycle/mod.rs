//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Build server → Bind listener → Serve
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!
//! Shutdown (shutdown.rs):
//!     Trigger → Stop accepting → Drain connections → Exit
//! ```
//!
//! # Design Decisions
//! - Policy and configuration are fully validated before anything binds
//! - Shutdown has timeout: in-flight requests are abandoned after the deadline

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
