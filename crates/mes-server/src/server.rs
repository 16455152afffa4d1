//! Server assembly: shared state, router, and the serve loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::extract::State;
use axum::routing::{get, post};
use axum::Router;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use mes_auth::ConnectionAuthenticator;
use mes_store::ConnectionPool;

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::broadcast::BroadcastManager;
use crate::websocket::session;
use crate::{discovery, production};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Topic registry and fan-out engine.
    pub broadcast: Arc<BroadcastManager>,
    /// Handshake credential verifier.
    pub authenticator: Arc<ConnectionAuthenticator>,
    /// `SQLite` connection pool.
    pub pool: ConnectionPool,
    /// Shutdown coordination.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Per-connection outbound channel capacity.
    pub outbound_buffer: usize,
    /// When the server process started.
    pub start_time: Instant,
}

/// The assembled MES realtime server.
pub struct MesServer {
    config: ServerConfig,
    state: AppState,
}

impl MesServer {
    /// Assemble a server from config and an already-migrated pool.
    #[must_use]
    pub fn new(config: ServerConfig, pool: ConnectionPool) -> Self {
        let state = AppState {
            broadcast: Arc::new(BroadcastManager::new()),
            authenticator: Arc::new(ConnectionAuthenticator::from_secret(&config.jwt_secret)),
            pool,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            outbound_buffer: config.outbound_buffer,
            start_time: Instant::now(),
        };
        Self { config, state }
    }

    /// The broadcast manager, for publishing from outside the server.
    #[must_use]
    pub fn broadcast(&self) -> Arc<BroadcastManager> {
        self.state.broadcast.clone()
    }

    /// The shutdown coordinator.
    #[must_use]
    pub fn shutdown(&self) -> Arc<ShutdownCoordinator> {
        self.state.shutdown.clone()
    }

    /// The server config.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the router over this server's state.
    #[must_use]
    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    /// Bind the configured address and serve until shutdown. Returns the
    /// bound address (useful with port 0) and the serve task handle.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener =
            tokio::net::TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let addr = listener.local_addr()?;
        info!(%addr, "listening");

        let app = self.router();
        let token = self.state.shutdown.token();
        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await });
            if let Err(e) = serve.await {
                tracing::error!(error = %e, "server error");
            }
        });
        Ok((addr, handle))
    }
}

/// Build the full route table over `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/health/tenant", get(health::tenant_health))
        .route("/api/v1/websocket-info", get(discovery::websocket_info))
        .route(
            "/api/v1/production/work-orders",
            post(production::create_work_order_handler),
        )
        .route("/ws/dashboard", get(session::ws_dashboard))
        .route("/ws/scheduler", get(session::ws_scheduler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.broadcast.total_subscribers().await;
    let topics = state.broadcast.topic_count();
    Json(health::health_check(state.start_time, connections, topics))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_server() -> MesServer {
        let pool = mes_store::new_in_memory(&mes_store::ConnectionConfig::default()).expect("pool");
        MesServer::new(ServerConfig::default(), pool)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint_reports_ok() {
        let app = test_server().router();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["connections"], 0);
        assert_eq!(json["topics"], 0);
    }

    #[tokio::test]
    async fn tenant_health_requires_header() {
        let app = test_server().router();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health/tenant")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn tenant_health_echoes_normalized_tenant() {
        let app = test_server().router();
        let tenant = mes_core::TenantId::new();
        let upper = tenant.to_string().to_uppercase();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health/tenant")
                    .header("X-Tenant-ID", &upper)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["tenant_id"], tenant.to_string());
    }

    #[tokio::test]
    async fn websocket_info_lists_both_feeds() {
        let app = test_server().router();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/websocket-info")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let endpoints = json["endpoints"].as_array().unwrap();
        assert_eq!(endpoints.len(), 2);
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let app = test_server().router();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
