//! Inbox Shield
//!
//! A filtering reverse proxy that sits in front of a federated social
//! server and drops unwanted traffic before it reaches the upstream.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request      ┌──────────────────────────────────────────────┐
//!     ───────────────────▶│ http::server ──▶ http::dispatch              │
//!                         │                    │                         │
//!                         │                    ▼                         │
//!                         │              filter::Policy                  │
//!                         │        (rule sets, first match wins)         │
//!                         │          │                    │              │
//!                         │        Deny             Allow / error        │
//!                         │          │                    │              │
//!     Client Response     │          ▼                    ▼              │
//!     ◀───────────────────│   empty deny status    http::forward ───────┼──▶ Upstream
//!                         └──────────────────────────────────────────────┘
//! ```

use std::error::Error;

use clap::Parser;

use inbox_shield::config::{load_policy, validate_config, Cli, ConfigError};
use inbox_shield::lifecycle::startup;
use inbox_shield::observability::{logging, metrics};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    logging::init_logging(cli.log_format);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "inbox-shield starting");

    validate_config(&cli.proxy).map_err(ConfigError::Validation)?;
    let policy = load_policy(&cli.rule_file)?;

    tracing::info!(
        rule_file = %cli.rule_file.display(),
        rulesets = policy.len(),
        upstream = %cli.proxy.upstream_endpoint,
        deny_response_code = cli.proxy.deny_response_code,
        "Configuration loaded"
    );

    if cli.check {
        println!("{}: ok, {} rulesets", cli.rule_file.display(), policy.len());
        return Ok(());
    }

    if let Some(addr) = cli.proxy.metrics_address {
        metrics::init_metrics(addr)?;
    }

    startup::start(cli.proxy, policy).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
