//! `GET /api/v1/websocket-info` — static discovery document.
//!
//! WebSocket endpoints have no OpenAPI representation, so this endpoint
//! describes them: paths, required query/header parameters, and the message
//! type catalogue. Descriptive metadata only, not part of the protocol.

use axum::Json;
use serde_json::{Value, json};

/// Serve the discovery document.
pub async fn websocket_info() -> Json<Value> {
    Json(json!({
        "usage": "Connect with a valid user JWT as a 'token' query parameter and include the \
                  'X-Tenant-ID' header. For scheduler collaboration, clients may send messages \
                  which are re-broadcast to all other subscribers. Message format is JSON with \
                  fields: { type: string, payload: object, at: ISO-8601, user_id?: string, \
                  channel?: string }.",
        "security": {
            "token": "JWT must contain 'sub' (user id) and 'tenant_id' matching the X-Tenant-ID header.",
            "header": "X-Tenant-ID: UUID",
        },
        "endpoints": [
            {
                "path": "/ws/dashboard",
                "summary": "Real-time dashboard KPI snapshots (server push).",
                "query": ["token"],
                "headers": ["X-Tenant-ID"],
                "messages": {
                    "server_to_client": ["kpi.snapshot"],
                },
            },
            {
                "path": "/ws/scheduler",
                "summary": "Real-time collaborative scheduler board.",
                "query": ["token", "board?"],
                "headers": ["X-Tenant-ID"],
                "messages": {
                    "client_to_server": ["schedule.update", "operation.move", "operation.assign", "ping"],
                    "server_to_client": [
                        "scheduler.schedule.update",
                        "scheduler.operation.move",
                        "scheduler.operation.assign",
                        "kpi.snapshot",
                    ],
                },
            },
        ],
        "close_codes": {
            "4401": "missing or invalid credential",
            "4403": "declared tenant does not match the credential's tenant claim",
        },
        "notes": "WebSocket endpoints are not represented in the OpenAPI schema; refer to this endpoint for usage.",
    }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
