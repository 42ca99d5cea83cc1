//! HTTP server wiring: routes, shared state, and the accept loop.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use steno_relay::RelayConfig;

use crate::config::ServerConfig;
use crate::health::{HealthResponse, health_check};
use crate::{metrics, ws};

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    /// Relay settings applied to each accepted session.
    pub relay: Arc<RelayConfig>,
    /// Server-level settings (bind address, frame limits).
    pub config: Arc<ServerConfig>,
    /// Number of sessions currently running.
    pub sessions: Arc<AtomicUsize>,
    /// Process start, for health uptime.
    pub start_time: Instant,
    /// Prometheus scrape handle.
    pub metrics: PrometheusHandle,
}

/// The gateway server: owns configuration and the shutdown token.
pub struct GatewayServer {
    config: Arc<ServerConfig>,
    relay: Arc<RelayConfig>,
    sessions: Arc<AtomicUsize>,
    start_time: Instant,
    metrics: PrometheusHandle,
    shutdown: CancellationToken,
}

impl GatewayServer {
    /// Create a server from its configuration and an installed recorder.
    pub fn new(config: ServerConfig, relay: RelayConfig, metrics: PrometheusHandle) -> Self {
        Self {
            config: Arc::new(config),
            relay: Arc::new(relay),
            sessions: Arc::new(AtomicUsize::new(0)),
            start_time: Instant::now(),
            metrics,
            shutdown: CancellationToken::new(),
        }
    }

    /// Token that stops the accept loop when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Build the full route table.
    pub fn router(&self) -> Router {
        let state = AppState {
            relay: Arc::clone(&self.relay),
            config: Arc::clone(&self.config),
            sessions: Arc::clone(&self.sessions),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        };
        Router::new()
            .route("/ws", get(ws::ws_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Bind the configured address and serve until the shutdown token
    /// fires. Returns the bound address (useful with port 0) and the
    /// serve task's handle.
    pub async fn listen(&self) -> io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        info!(%addr, engine = %self.relay.engine.addr(), "gateway listening");

        let router = self.router();
        let token = self.shutdown.clone();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await });
            if let Err(error) = serve.await {
                error!(error = %error, "server task failed");
            }
        });
        Ok((addr, task))
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health_check(
        state.start_time,
        state.sessions.load(Ordering::Relaxed),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> String {
    metrics::render(&state.metrics)
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use tower::ServiceExt;

    fn make_server() -> GatewayServer {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        GatewayServer::new(ServerConfig::default(), RelayConfig::default(), handle)
    }

    #[tokio::test]
    async fn health_endpoint_reports_ok() {
        let server = make_server();
        let response = server
            .router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(health["status"], "ok");
        assert_eq!(health["active_sessions"], 0);
    }

    #[tokio::test]
    async fn metrics_endpoint_renders() {
        let server = make_server();
        let response = server
            .router()
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let server = make_server();
        let response = server
            .router()
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn ws_route_rejects_plain_get() {
        let server = make_server();
        let response = server
            .router()
            .oneshot(Request::get("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();
        // missing upgrade headers
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn listen_binds_and_shuts_down() {
        let config = ServerConfig {
            port: 0,
            ..ServerConfig::default()
        };
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let server = GatewayServer::new(config, RelayConfig::default(), handle);

        let (addr, task) = server.listen().await.unwrap();
        assert_ne!(addr.port(), 0);

        server.shutdown_token().cancel();
        tokio::time::timeout(std::time::Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }
}
