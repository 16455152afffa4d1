//! Shared types for the MES realtime backend.
//!
//! This crate defines the vocabulary the other crates speak: branded ID
//! newtypes, the WebSocket wire envelope and its payload shapes, and the
//! deterministic topic-key derivation used by the broadcast layer.

pub mod envelope;
pub mod ids;
pub mod topics;

pub use envelope::{KpiSnapshot, SchedulerEvent, WsEnvelope};
pub use ids::{ConnectionId, OperationId, TenantId, UserId, WorkOrderId};
