//! Topic-keyed message fan-out to connected WebSocket clients.
//!
//! Topics are created lazily on first use and never destroyed (their
//! cardinality is bounded by tenants × boards). Two locks are involved: a
//! global synchronous lock held only for the constant-time get-or-create of
//! a topic entry, and one async lock per topic held across the entire
//! fan-out pass. Holding the topic lock for the whole broadcast keeps the
//! membership snapshot and the prune-on-failure step atomic with respect to
//! concurrent connect/disconnect calls on the same topic; the cost is that
//! broadcasts to one topic serialize and a slow subscriber delays its
//! topic-mates. No operation ever holds two topic locks.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use mes_core::envelope::to_payload;
use mes_core::topics::{dashboard_topic, scheduler_topic};
use mes_core::{ConnectionId, KpiSnapshot, SchedulerEvent, TenantId, WsEnvelope};

use super::connection::ClientConnection;

/// One topic's subscriber set behind its own async lock.
struct Topic {
    subscribers: tokio::sync::Mutex<HashMap<ConnectionId, Arc<ClientConnection>>>,
}

impl Topic {
    fn new() -> Self {
        Self {
            subscribers: tokio::sync::Mutex::new(HashMap::new()),
        }
    }
}

/// Manages topic membership and event broadcasting.
///
/// Explicitly constructed and injected — one per server, no global.
pub struct BroadcastManager {
    topics: Mutex<HashMap<String, Arc<Topic>>>,
}

impl BroadcastManager {
    /// Create a new broadcast manager with no topics.
    pub fn new() -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
        }
    }

    /// Get or lazily create a topic entry. The global lock is held only for
    /// this constant-time step, never across a fan-out.
    fn topic(&self, name: &str) -> Arc<Topic> {
        let mut topics = self.topics.lock();
        topics
            .entry(name.to_owned())
            .or_insert_with(|| Arc::new(Topic::new()))
            .clone()
    }

    /// Look up a topic without creating it.
    fn existing_topic(&self, name: &str) -> Option<Arc<Topic>> {
        self.topics.lock().get(name).cloned()
    }

    /// Subscribe a connection to a topic.
    pub async fn connect(&self, name: &str, connection: Arc<ClientConnection>) {
        let topic = self.topic(name);
        let mut subs = topic.subscribers.lock().await;
        debug!(topic = name, conn_id = %connection.id, "subscriber added");
        let _ = subs.insert(connection.id.clone(), connection);
    }

    /// Remove a connection from a topic. Idempotent; absent topics or
    /// members are fine and the topic is not created.
    pub async fn disconnect(&self, name: &str, connection_id: &ConnectionId) {
        let Some(topic) = self.existing_topic(name) else {
            return;
        };
        let mut subs = topic.subscribers.lock().await;
        if subs.remove(connection_id).is_some() {
            debug!(topic = name, conn_id = %connection_id, "subscriber removed");
        }
    }

    /// Broadcast an envelope to every subscriber of a topic except
    /// `exclude`.
    ///
    /// The envelope is serialized once and shared. Subscribers whose
    /// channel has closed or whose delivery fails are pruned from the
    /// membership before the topic lock is released, so they are gone for
    /// all subsequent broadcasts. Delivery order across subscribers is
    /// unspecified; order to any single subscriber matches call order.
    pub async fn broadcast(
        &self,
        name: &str,
        envelope: &WsEnvelope,
        exclude: Option<&ConnectionId>,
    ) {
        let json = match serde_json::to_string(envelope) {
            Ok(j) => Arc::new(j),
            Err(e) => {
                warn!(kind = %envelope.kind, error = %e, "failed to serialize envelope");
                return;
            }
        };

        let topic = self.topic(name);
        let mut subs = topic.subscribers.lock().await;
        debug!(
            topic = name,
            kind = %envelope.kind,
            recipients = subs.len(),
            "broadcast"
        );

        let mut dead: Vec<ConnectionId> = Vec::new();
        for (id, conn) in subs.iter() {
            if Some(id) == exclude {
                continue;
            }
            if conn.is_closed() || !conn.send(json.clone()).await {
                dead.push(id.clone());
            }
        }
        for id in dead {
            warn!(topic = name, conn_id = %id, "pruning unreachable subscriber");
            let _ = subs.remove(&id);
        }
    }

    /// Wrap a KPI snapshot in an envelope and broadcast it to the tenant's
    /// dashboard topic.
    pub async fn publish_kpi_snapshot(&self, tenant: &TenantId, snapshot: &KpiSnapshot) {
        let payload = match to_payload(snapshot) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "failed to build kpi.snapshot payload");
                return;
            }
        };
        let envelope = WsEnvelope::new("kpi.snapshot").with_payload(payload);
        self.broadcast(&dashboard_topic(tenant), &envelope, None)
            .await;
    }

    /// Wrap a scheduler event in an envelope (type re-namespaced under
    /// `scheduler.`) and broadcast it to the tenant's scheduler topic for
    /// the event's board.
    pub async fn publish_scheduler_event(&self, tenant: &TenantId, event: &SchedulerEvent) {
        let payload = match to_payload(event) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "failed to build scheduler event payload");
                return;
            }
        };
        let mut envelope =
            WsEnvelope::new(format!("scheduler.{}", event.event)).with_payload(payload);
        envelope.channel = event.board.clone();
        self.broadcast(
            &scheduler_topic(tenant, event.board.as_deref()),
            &envelope,
            None,
        )
        .await;
    }

    /// Number of subscribers currently in a topic.
    pub async fn subscriber_count(&self, name: &str) -> usize {
        match self.existing_topic(name) {
            Some(topic) => topic.subscribers.lock().await.len(),
            None => 0,
        }
    }

    /// Number of topics created so far.
    pub fn topic_count(&self) -> usize {
        self.topics.lock().len()
    }

    /// Total subscribers across all topics.
    pub async fn total_subscribers(&self) -> usize {
        let topics: Vec<Arc<Topic>> = self.topics.lock().values().cloned().collect();
        let mut total = 0;
        for topic in topics {
            total += topic.subscribers.lock().await.len();
        }
        total
    }
}

impl Default for BroadcastManager {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use mes_core::UserId;
    use tokio::sync::mpsc;

    fn make_connection_with_rx(
        tenant: TenantId,
    ) -> (Arc<ClientConnection>, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(32);
        let conn = ClientConnection::new(tenant, UserId::from("user-1"), tx);
        (Arc::new(conn), rx)
    }

    fn envelope(kind: &str) -> WsEnvelope {
        WsEnvelope::new(kind)
    }

    #[tokio::test]
    async fn connect_adds_subscriber() {
        let bm = BroadcastManager::new();
        let (conn, _rx) = make_connection_with_rx(TenantId::new());
        bm.connect("t", conn).await;
        assert_eq!(bm.subscriber_count("t").await, 1);
    }

    #[tokio::test]
    async fn disconnect_removes_subscriber() {
        let bm = BroadcastManager::new();
        let (conn, _rx) = make_connection_with_rx(TenantId::new());
        let id = conn.id.clone();
        bm.connect("t", conn).await;
        bm.disconnect("t", &id).await;
        assert_eq!(bm.subscriber_count("t").await, 0);
    }

    #[tokio::test]
    async fn disconnect_is_idempotent_and_creates_nothing() {
        let bm = BroadcastManager::new();
        bm.disconnect("no_such", &ConnectionId::new()).await;
        assert_eq!(bm.topic_count(), 0);

        let (conn, _rx) = make_connection_with_rx(TenantId::new());
        let id = conn.id.clone();
        bm.connect("t", conn).await;
        bm.disconnect("t", &id).await;
        bm.disconnect("t", &id).await;
        assert_eq!(bm.subscriber_count("t").await, 0);
    }

    #[tokio::test]
    async fn broadcast_reaches_all_subscribers() {
        let bm = BroadcastManager::new();
        let tenant = TenantId::new();
        let (c1, mut rx1) = make_connection_with_rx(tenant);
        let (c2, mut rx2) = make_connection_with_rx(tenant);
        bm.connect("t", c1).await;
        bm.connect("t", c2).await;

        bm.broadcast("t", &envelope("kpi.snapshot"), None).await;

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[tokio::test]
    async fn broadcast_excludes_sender() {
        let bm = BroadcastManager::new();
        let tenant = TenantId::new();
        let (sender, mut sender_rx) = make_connection_with_rx(tenant);
        let (other, mut other_rx) = make_connection_with_rx(tenant);
        let sender_id = sender.id.clone();
        bm.connect("t", sender).await;
        bm.connect("t", other).await;

        bm.broadcast("t", &envelope("scheduler.operation.move"), Some(&sender_id))
            .await;

        assert!(sender_rx.try_recv().is_err());
        assert!(other_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn topic_isolation() {
        let bm = BroadcastManager::new();
        let a = TenantId::new();
        let b = TenantId::new();
        let (conn_a, mut rx_a) = make_connection_with_rx(a);
        let (conn_b, mut rx_b) = make_connection_with_rx(b);
        bm.connect(&dashboard_topic(&a), conn_a).await;
        bm.connect(&dashboard_topic(&b), conn_b).await;

        bm.broadcast(&dashboard_topic(&a), &envelope("kpi.snapshot"), None)
            .await;

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn dead_subscriber_pruned_within_broadcast() {
        let bm = BroadcastManager::new();
        let tenant = TenantId::new();
        let (alive, mut alive_rx) = make_connection_with_rx(tenant);
        let (dead, dead_rx) = make_connection_with_rx(tenant);
        drop(dead_rx);
        bm.connect("t", alive).await;
        bm.connect("t", dead).await;
        assert_eq!(bm.subscriber_count("t").await, 2);

        bm.broadcast("t", &envelope("kpi.snapshot"), None).await;

        assert_eq!(bm.subscriber_count("t").await, 1);
        assert!(alive_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn concurrent_connects_all_counted() {
        let bm = Arc::new(BroadcastManager::new());
        let tenant = TenantId::new();
        let mut rxs = Vec::new();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let (conn, rx) = make_connection_with_rx(tenant);
            rxs.push(rx);
            let bm = bm.clone();
            handles.push(tokio::spawn(async move {
                bm.connect("t", conn).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(bm.subscriber_count("t").await, 16);
    }

    #[tokio::test]
    async fn single_subscriber_ordering_preserved() {
        let bm = BroadcastManager::new();
        let (conn, mut rx) = make_connection_with_rx(TenantId::new());
        bm.connect("t", conn).await;

        bm.broadcast("t", &envelope("first"), None).await;
        bm.broadcast("t", &envelope("second"), None).await;

        let a = rx.recv().await.unwrap();
        let b = rx.recv().await.unwrap();
        assert!(a.contains("\"first\""));
        assert!(b.contains("\"second\""));
    }

    #[tokio::test]
    async fn publish_kpi_snapshot_builds_envelope() {
        let bm = BroadcastManager::new();
        let tenant = TenantId::new();
        let (conn, mut rx) = make_connection_with_rx(tenant);
        bm.connect(&dashboard_topic(&tenant), conn).await;

        let snapshot = KpiSnapshot {
            oee: 97.5,
            scrap_rate: 2.5,
            downtime_minutes: 10.0,
            at: chrono::Utc::now(),
        };
        bm.publish_kpi_snapshot(&tenant, &snapshot).await;

        let msg = rx.recv().await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(parsed["type"], "kpi.snapshot");
        assert_eq!(parsed["payload"]["oee"], 97.5);
        assert_eq!(parsed["payload"]["scrap_rate"], 2.5);
    }

    #[tokio::test]
    async fn publish_scheduler_event_renames_type_and_sets_channel() {
        let bm = BroadcastManager::new();
        let tenant = TenantId::new();
        let (conn, mut rx) = make_connection_with_rx(tenant);
        bm.connect(&scheduler_topic(&tenant, Some("line-a")), conn)
            .await;

        let event = SchedulerEvent::new("work_order.created").with_board("line-a");
        bm.publish_scheduler_event(&tenant, &event).await;

        let msg = rx.recv().await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(parsed["type"], "scheduler.work_order.created");
        assert_eq!(parsed["channel"], "line-a");
        assert_eq!(parsed["payload"]["event"], "work_order.created");
    }

    #[tokio::test]
    async fn broadcast_to_empty_topic_is_harmless() {
        let bm = BroadcastManager::new();
        bm.broadcast("empty", &envelope("kpi.snapshot"), None).await;
        assert_eq!(bm.subscriber_count("empty").await, 0);
    }

    #[tokio::test]
    async fn counters() {
        let bm = BroadcastManager::new();
        assert_eq!(bm.topic_count(), 0);
        assert_eq!(bm.total_subscribers().await, 0);

        let (c1, _rx1) = make_connection_with_rx(TenantId::new());
        let (c2, _rx2) = make_connection_with_rx(TenantId::new());
        bm.connect("a", c1).await;
        bm.connect("b", c2).await;
        assert_eq!(bm.topic_count(), 2);
        assert_eq!(bm.total_subscribers().await, 2);
    }
}
