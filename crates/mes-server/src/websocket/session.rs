//! WebSocket session lifecycle — upgrade, authentication, topic
//! subscription, receive loop, cleanup.
//!
//! Every connection walks the same states: connecting → authenticating →
//! (rejected) | subscribed → active → closed. Rejection happens after the
//! transport handshake completes so the close code (4401/4403) is actually
//! deliverable to the client.

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

use mes_auth::{AuthError, AuthenticatedUser};
use mes_core::envelope::to_payload;
use mes_core::topics::{dashboard_topic, scheduler_topic};
use mes_core::WsEnvelope;
use mes_store::{StoreHandle, kpi};

use super::connection::ClientConnection;
use super::frame::SchedulerFrame;
use crate::server::AppState;

/// Query parameters for the dashboard feed.
#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    /// Bearer credential.
    pub token: Option<String>,
}

/// Query parameters for the scheduler feed.
#[derive(Debug, Deserialize)]
pub struct SchedulerQuery {
    /// Bearer credential.
    pub token: Option<String>,
    /// Optional board the client collaborates on.
    pub board: Option<String>,
}

/// `GET /ws/dashboard` — upgrade and run the dashboard feed.
pub async fn ws_dashboard(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
    headers: HeaderMap,
) -> Response {
    let declared = declared_tenant(&headers);
    ws.on_upgrade(move |socket| async move {
        match state
            .authenticator
            .authenticate(declared.as_deref(), query.token.as_deref())
        {
            Ok(user) => run_dashboard_session(socket, state, user).await,
            Err(err) => reject(socket, err).await,
        }
    })
}

/// `GET /ws/scheduler` — upgrade and run the scheduler feed.
pub async fn ws_scheduler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<SchedulerQuery>,
    headers: HeaderMap,
) -> Response {
    let declared = declared_tenant(&headers);
    ws.on_upgrade(move |socket| async move {
        match state
            .authenticator
            .authenticate(declared.as_deref(), query.token.as_deref())
        {
            Ok(user) => run_scheduler_session(socket, state, user, query.board).await,
            Err(err) => reject(socket, err).await,
        }
    })
}

fn declared_tenant(headers: &HeaderMap) -> Option<String> {
    headers
        .get("X-Tenant-ID")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

/// Close a connection that failed authentication. The transport handshake
/// has already completed, so the close frame carries the reason to the
/// client.
async fn reject(mut socket: WebSocket, err: AuthError) {
    info!(code = err.close_code(), reason = %err, "rejecting connection");
    counter!("ws_rejections_total").increment(1);
    let frame = CloseFrame {
        code: err.close_code(),
        reason: err.to_string().into(),
    };
    let _ = socket.send(Message::Close(Some(frame))).await;
}

/// Run a dashboard feed session: server push only, `ping`/`pong` keepalive.
#[instrument(skip_all, fields(tenant = %user.tenant_id, user = %user.user_id))]
pub async fn run_dashboard_session(socket: WebSocket, state: AppState, user: AuthenticatedUser) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(state.outbound_buffer);
    let connection = Arc::new(ClientConnection::new(
        user.tenant_id,
        user.user_id.clone(),
        send_tx,
    ));
    let conn_id = connection.id.clone();
    let topic = dashboard_topic(&user.tenant_id);

    info!(conn_id = %conn_id, "dashboard client connected");
    counter!("ws_connections_total").increment(1);
    gauge!("ws_connections_active").increment(1.0);

    state.broadcast.connect(&topic, connection.clone()).await;

    // Outbound writer: drains the connection's channel in FIFO order.
    let outbound = tokio::spawn(async move {
        while let Some(text) = send_rx.recv().await {
            if ws_tx.send(Message::Text(text.as_str().into())).await.is_err() {
                break;
            }
        }
    });

    push_initial_snapshot(&state, &connection, None).await;

    while let Some(result) = ws_rx.next().await {
        let msg = match result {
            Ok(m) => m,
            Err(e) => {
                warn!(conn_id = %conn_id, error = %e, "websocket transport error");
                break;
            }
        };
        match msg {
            Message::Text(text) => {
                // The only client-to-server semantics on this feed.
                if text.as_str().eq_ignore_ascii_case("ping") {
                    if !connection.send_text("pong").await {
                        break;
                    }
                }
            }
            Message::Close(_) => {
                info!(conn_id = %conn_id, "client sent close frame");
                break;
            }
            Message::Binary(_) | Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    info!(
        conn_id = %conn_id,
        session_secs = connection.connected_at.elapsed().as_secs(),
        "dashboard client disconnected"
    );
    counter!("ws_disconnections_total").increment(1);
    gauge!("ws_connections_active").decrement(1.0);
    state.broadcast.disconnect(&topic, &conn_id).await;
    outbound.abort();
}

/// Run a scheduler feed session: bidirectional collaboration on one board.
#[instrument(skip_all, fields(tenant = %user.tenant_id, user = %user.user_id, board = ?board))]
pub async fn run_scheduler_session(
    socket: WebSocket,
    state: AppState,
    user: AuthenticatedUser,
    board: Option<String>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(state.outbound_buffer);
    let connection = Arc::new(ClientConnection::new(
        user.tenant_id,
        user.user_id.clone(),
        send_tx,
    ));
    let conn_id = connection.id.clone();
    let topic = scheduler_topic(&user.tenant_id, board.as_deref());

    info!(conn_id = %conn_id, board = board.as_deref(), "scheduler client connected");
    counter!("ws_connections_total").increment(1);
    gauge!("ws_connections_active").increment(1.0);

    state.broadcast.connect(&topic, connection.clone()).await;

    let outbound = tokio::spawn(async move {
        while let Some(text) = send_rx.recv().await {
            if ws_tx.send(Message::Text(text.as_str().into())).await.is_err() {
                break;
            }
        }
    });

    push_initial_snapshot(&state, &connection, board.as_deref()).await;

    while let Some(result) = ws_rx.next().await {
        let msg = match result {
            Ok(m) => m,
            Err(e) => {
                warn!(conn_id = %conn_id, error = %e, "websocket transport error");
                break;
            }
        };
        match msg {
            Message::Text(text) => match SchedulerFrame::parse(text.as_str()) {
                SchedulerFrame::Ping => {
                    if !connection.send_text("pong").await {
                        break;
                    }
                }
                SchedulerFrame::Malformed => {}
                SchedulerFrame::Message { kind, payload } => {
                    // Transient collaboration: rebroadcast to topic-mates,
                    // never persisted, sender excluded.
                    let mut envelope =
                        WsEnvelope::new(format!("scheduler.{kind}")).with_payload(payload);
                    envelope.channel = board.clone();
                    state
                        .broadcast
                        .broadcast(&topic, &envelope, Some(&conn_id))
                        .await;
                }
            },
            Message::Close(_) => {
                info!(conn_id = %conn_id, "client sent close frame");
                break;
            }
            Message::Binary(_) | Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    info!(
        conn_id = %conn_id,
        session_secs = connection.connected_at.elapsed().as_secs(),
        "scheduler client disconnected"
    );
    counter!("ws_disconnections_total").increment(1);
    gauge!("ws_connections_active").decrement(1.0);
    state.broadcast.disconnect(&topic, &conn_id).await;
    outbound.abort();
}

/// Best-effort initial `kpi.snapshot` push. Computation runs inside a
/// tenant scope on a fresh handle; any failure is logged and the push
/// skipped — the connection stays usable either way.
async fn push_initial_snapshot(
    state: &AppState,
    connection: &ClientConnection,
    channel: Option<&str>,
) {
    let snapshot = {
        let conn = match state.pool.get() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "initial snapshot skipped: no store connection");
                return;
            }
        };
        let handle = StoreHandle::new(conn);
        let scope = handle.enter(connection.tenant);
        match kpi::compute_snapshot(&scope) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "initial snapshot skipped: aggregation failed");
                return;
            }
        }
    };

    let payload = match to_payload(&snapshot) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "initial snapshot skipped: payload serialization failed");
            return;
        }
    };
    let mut envelope = WsEnvelope::new("kpi.snapshot").with_payload(payload);
    if let Some(c) = channel {
        envelope = envelope.with_channel(c);
    }
    match serde_json::to_string(&envelope) {
        Ok(json) => {
            if !connection.send(Arc::new(json)).await {
                warn!(conn_id = %connection.id, "initial snapshot not delivered");
            }
        }
        Err(e) => warn!(error = %e, "initial snapshot skipped: envelope serialization failed"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
