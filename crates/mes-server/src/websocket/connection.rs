//! WebSocket client connection state.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use mes_core::{ConnectionId, TenantId, UserId};

/// Represents one admitted WebSocket client.
///
/// The connection belongs to exactly one topic for its lifetime. Liveness is
/// the state of the outbound channel: once the writer task is gone the
/// channel closes, and the next broadcast to this connection prunes it.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: ConnectionId,
    /// Tenant the connection was admitted for.
    pub tenant: TenantId,
    /// Authenticated user behind the connection.
    pub user: UserId,
    /// Send channel to the connection's WebSocket write task.
    tx: mpsc::Sender<Arc<String>>,
    /// When this connection was established.
    pub connected_at: Instant,
}

impl ClientConnection {
    /// Create a new connection handle with a fresh ID.
    pub fn new(tenant: TenantId, user: UserId, tx: mpsc::Sender<Arc<String>>) -> Self {
        Self {
            id: ConnectionId::new(),
            tenant,
            user,
            tx,
            connected_at: Instant::now(),
        }
    }

    /// Deliver a message to the client, waiting for channel capacity.
    ///
    /// The awaited bounded send is what preserves per-subscriber ordering:
    /// messages enqueue in call order and the writer task drains them in
    /// FIFO order. Returns `false` if the channel has closed.
    pub async fn send(&self, message: Arc<String>) -> bool {
        self.tx.send(message).await.is_ok()
    }

    /// Deliver a plain text message to the client.
    pub async fn send_text(&self, text: impl Into<String>) -> bool {
        self.send(Arc::new(text.into())).await
    }

    /// Whether the outbound channel has closed (writer task gone).
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
