//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, limits, request ID)
//! - Serve until the shutdown signal fires

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    http::HeaderName,
    routing::{get, post, put},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin;
use crate::breaker::ActorDirectory;
use crate::config::BreakerConfig;
use crate::http::handlers;
use crate::persistence::StateStore;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<ActorDirectory>,
    pub store: Arc<dyn StateStore>,
    pub config: Arc<BreakerConfig>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(directory: Arc<ActorDirectory>, store: Arc<dyn StateStore>, config: BreakerConfig) -> Self {
        Self {
            directory,
            store,
            config: Arc::new(config),
            started_at: Instant::now(),
        }
    }
}

/// HTTP front door for the circuit breaker.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        Self {
            router: Self::build_router(state),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(state: AppState) -> Router {
        let config = state.config.clone();
        let request_id = HeaderName::from_static(X_REQUEST_ID);

        let mut router = Router::new()
            .route("/health", get(handlers::health))
            .route("/circuit-breaker/{key}", get(handlers::get_circuit))
            .route("/circuit-breaker/{key}/add-failure", post(handlers::add_failure))
            .route("/circuit-breaker/{key}/open", put(handlers::open_circuit))
            .route("/circuit-breaker/{key}/close", put(handlers::close_circuit));

        if config.admin.enabled {
            router = router.merge(admin::router(state.clone()));
        }

        router
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(ConcurrencyLimitLayer::new(config.listener.max_connections))
            .layer(PropagateRequestIdLayer::new(request_id.clone()))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
