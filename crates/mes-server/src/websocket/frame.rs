//! Inbound scheduler frame parsing.
//!
//! Client frames carry an open string `type` tag; interpretation happens
//! here, once, at the boundary. Anything that does not conform — unparsable
//! JSON, a missing or non-string `type` — is [`SchedulerFrame::Malformed`],
//! which callers treat as a silent no-op: malformed input is not an error
//! condition for the channel.

use serde_json::{Map, Value};

/// One parsed client frame on the scheduler feed.
#[derive(Clone, Debug, PartialEq)]
pub enum SchedulerFrame {
    /// Keepalive request, either the literal text `ping` or the enveloped
    /// `{"type": "ping"}`; answered with plain-text `pong`, never
    /// rebroadcast.
    Ping,
    /// A collaboration message to rebroadcast to topic-mates.
    Message {
        /// The client's `type` tag, without the `scheduler.` prefix.
        kind: String,
        /// The client's `payload` object; empty when absent.
        payload: Map<String, Value>,
    },
    /// Input that does not conform to the envelope; dropped.
    Malformed,
}

impl SchedulerFrame {
    /// Parse one text frame.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        // The bare keepalive is the one non-JSON frame clients may send,
        // matched the same way the dashboard feed matches it.
        if text.eq_ignore_ascii_case("ping") {
            return Self::Ping;
        }
        let Ok(value) = serde_json::from_str::<Value>(text) else {
            return Self::Malformed;
        };
        let Some(kind) = value.get("type").and_then(Value::as_str) else {
            return Self::Malformed;
        };
        if kind == "ping" {
            return Self::Ping;
        }
        let payload = value
            .get("payload")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        Self::Message {
            kind: kind.to_owned(),
            payload,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
