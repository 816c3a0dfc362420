//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Choose between human and machine readable output
//!
//! # Design Decisions
//! - Uses the tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - Log level configurable via `RUST_LOG`

use clap::ValueEnum;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "inbox_shield=info,tower_http=info";

/// Output format of log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Install the global subscriber. Call once, before anything logs.
pub fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}
