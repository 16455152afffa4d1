//! Wire-level message shapes for the realtime feeds.
//!
//! Every JSON frame the server pushes is a [`WsEnvelope`]. The `type` tag is
//! an open dot-namespaced string (`"kpi.snapshot"`,
//! `"scheduler.operation.move"`, …) — there is deliberately no closed enum,
//! and consumers must ignore types they do not recognize.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::{OperationId, UserId};

/// A single server→client message.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WsEnvelope {
    /// Open dot-namespaced message tag.
    #[serde(rename = "type")]
    pub kind: String,
    /// Free-form message body.
    #[serde(default)]
    pub payload: Map<String, Value>,
    /// When the envelope was built.
    pub at: DateTime<Utc>,
    /// Originating user, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    /// Sub-channel discriminator (the scheduler board).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

impl WsEnvelope {
    /// Create an envelope with the given type tag, stamped with the current
    /// time and an empty payload.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: Map::new(),
            at: Utc::now(),
            user_id: None,
            channel: None,
        }
    }

    /// Attach a payload map.
    #[must_use]
    pub fn with_payload(mut self, payload: Map<String, Value>) -> Self {
        self.payload = payload;
        self
    }

    /// Attach a channel discriminator.
    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Attach the originating user.
    #[must_use]
    pub fn with_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

/// Serialize any value into an envelope payload map.
///
/// Non-object values are wrapped under a `"value"` key so the payload is
/// always a JSON object.
pub fn to_payload<T: Serialize>(value: &T) -> serde_json::Result<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => {
            let mut map = Map::new();
            let _ = map.insert("value".to_owned(), other);
            Ok(map)
        }
    }
}

/// Point-in-time production KPIs for one tenant, pushed to dashboard and
/// scheduler subscribers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KpiSnapshot {
    /// Overall equipment effectiveness, percent.
    pub oee: f64,
    /// Scrap share of total produced quantity, percent.
    pub scrap_rate: f64,
    /// Total logged downtime, minutes.
    pub downtime_minutes: f64,
    /// When the snapshot was computed.
    pub at: DateTime<Utc>,
}

/// A scheduler collaboration event, either client-originated (rebroadcast)
/// or emitted by a domain mutation such as work-order creation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SchedulerEvent {
    /// Event name without the `scheduler.` prefix (`"operation.move"`, …).
    pub event: String,
    /// Event-specific details.
    #[serde(default)]
    pub details: Map<String, Value>,
    /// Affected operation, when the event concerns a single one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<OperationId>,
    /// Scheduler board the event belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board: Option<String>,
    /// When the event happened.
    pub at: DateTime<Utc>,
    /// User who caused the event, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
}

impl SchedulerEvent {
    /// Create an event with the given name, stamped with the current time.
    #[must_use]
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            details: Map::new(),
            operation_id: None,
            board: None,
            at: Utc::now(),
            user_id: None,
        }
    }

    /// Attach event details.
    #[must_use]
    pub fn with_details(mut self, details: Map<String, Value>) -> Self {
        self.details = details;
        self
    }

    /// Attach the board discriminator.
    #[must_use]
    pub fn with_board(mut self, board: impl Into<String>) -> Self {
        self.board = Some(board.into());
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
