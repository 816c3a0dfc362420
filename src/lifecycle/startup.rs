//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the server from validated configuration and a loaded policy
//! - Bind the listener and begin accepting traffic
//! - Wire OS signals to graceful shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::ProxyConfig;
use crate::filter::Policy;
use crate::http::{HttpServer, UpstreamError};
use crate::lifecycle::{signals, Shutdown};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("listen on {address}: {source}")]
    Bind {
        address: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("serve: {0}")]
    Serve(#[source] std::io::Error),
}

/// Serve until SIGINT or SIGTERM, then drain and return.
pub async fn start(config: ProxyConfig, policy: Policy) -> Result<(), StartupError> {
    let shutdown = Shutdown::new();
    let signal_task = signals::spawn_signal_handler(shutdown.clone());

    let result = serve(config, policy, &shutdown).await;
    signal_task.abort();
    result
}

/// Serve until `shutdown` is triggered.
pub async fn serve(config: ProxyConfig, policy: Policy, shutdown: &Shutdown) -> Result<(), StartupError> {
    let signal = shutdown.subscribe();
    let address = config.listen_address();
    let rulesets = policy.len();
    let server = HttpServer::new(config, policy)?;

    let listener = TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::Bind { address, source })?;

    tracing::info!(
        address = %address,
        upstream = %server.config().upstream_endpoint,
        rulesets,
        "Listening for connections"
    );

    server
        .run(listener, signal)
        .await
        .map_err(StartupError::Serve)
}
