//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the catch-all filtering handler
//! - Wire up middleware (tracing, request timeout)
//! - Bind server to listener, exposing peer addresses to handlers
//! - Drain in-flight requests on shutdown, within a deadline

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Notify};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::validation::deny_status;
use crate::config::ProxyConfig;
use crate::filter::Policy;
use crate::http::dispatch::Dispatcher;
use crate::http::forward::{HttpUpstream, UpstreamError};
use crate::observability::LoggingObserver;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

/// HTTP server for the filtering proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a server forwarding to the configured upstream.
    ///
    /// `config` is expected to have passed validation; an unusable deny
    /// status falls back to 404.
    pub fn new(config: ProxyConfig, policy: Policy) -> Result<Self, UpstreamError> {
        let upstream = Arc::new(HttpUpstream::new(&config.upstream_endpoint)?);
        let status = deny_status(config.deny_response_code).unwrap_or_else(|| {
            tracing::warn!(code = config.deny_response_code, "Invalid deny status, using 404");
            axum::http::StatusCode::NOT_FOUND
        });
        let dispatcher = Dispatcher::new(Arc::new(policy), upstream, status)
            .with_observer(Arc::new(LoggingObserver));

        Ok(Self::with_dispatcher(config, dispatcher))
    }

    /// Create a server around an existing dispatcher.
    pub fn with_dispatcher(config: ProxyConfig, dispatcher: Dispatcher) -> Self {
        let state = AppState {
            dispatcher: Arc::new(dispatcher),
        };
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(config.request_timeout()))
            .layer(TraceLayer::new_for_http())
    }

    /// The router, for serving it some other way.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Run the server until `shutdown` fires, then drain.
    ///
    /// In-flight requests get `exit_timeout` to finish; whatever is still
    /// running after that is abandoned.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let drain_timeout = self.config.exit_timeout();
        tracing::info!(address = %addr, "HTTP server starting");

        let draining = Arc::new(Notify::new());
        let signal = draining.clone();
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("Shutdown signal received, draining connections");
            signal.notify_one();
        });

        let mut serving = tokio::spawn(async move { server.await });

        tokio::select! {
            result = &mut serving => return flatten(result),
            _ = draining.notified() => {}
        }

        match tokio::time::timeout(drain_timeout, &mut serving).await {
            Ok(result) => flatten(result)?,
            Err(_) => {
                tracing::warn!(
                    timeout_secs = drain_timeout.as_secs(),
                    "Drain timeout elapsed, abandoning in-flight requests"
                );
                serving.abort();
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn flatten(
    result: Result<Result<(), std::io::Error>, tokio::task::JoinError>,
) -> Result<(), std::io::Error> {
    result.map_err(std::io::Error::other)?
}

/// Catch-all handler: every path goes through the filter.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    state.dispatcher.dispatch(request, peer).await
}
