//! Health endpoints.

use axum::Json;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;
use std::time::Instant;

use mes_core::TenantId;

/// `GET /api/v1/health` response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Current WebSocket subscriber count across all topics.
    pub connections: usize,
    /// Number of topics created so far.
    pub topics: usize,
}

/// Build a health response from live counters.
pub fn health_check(start_time: Instant, connections: usize, topics: usize) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        topics,
    }
}

/// `GET /api/v1/health/tenant` — validates and echoes the `X-Tenant-ID`
/// header, confirming tenant plumbing end to end.
pub async fn tenant_health(headers: HeaderMap) -> Response {
    match extract_tenant(&headers) {
        Ok(tenant) => Json(json!({
            "status": "ok",
            "tenant_id": tenant.to_string(),
        }))
        .into_response(),
        Err(message) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
        }
    }
}

/// Parse the `X-Tenant-ID` header into a normalized tenant ID.
pub fn extract_tenant(headers: &HeaderMap) -> Result<TenantId, &'static str> {
    let Some(raw) = headers.get("X-Tenant-ID").and_then(|v| v.to_str().ok()) else {
        return Err("X-Tenant-ID header is required.");
    };
    TenantId::parse(raw).map_err(|_| "X-Tenant-ID header must be a valid UUID string.")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn status_is_ok() {
        let resp = health_check(Instant::now(), 0, 0);
        assert_eq!(resp.status, "ok");
    }

    #[test]
    fn uptime_increases() {
        let start = Instant::now()
            .checked_sub(std::time::Duration::from_secs(60))
            .unwrap();
        let resp = health_check(start, 0, 0);
        assert!(resp.uptime_secs >= 59);
    }

    #[test]
    fn counters_tracked() {
        let resp = health_check(Instant::now(), 5, 3);
        assert_eq!(resp.connections, 5);
        assert_eq!(resp.topics, 3);
    }

    #[test]
    fn serialization() {
        let resp = health_check(Instant::now(), 2, 1);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["connections"], 2);
        assert_eq!(json["topics"], 1);
        assert!(json["uptime_secs"].is_number());
    }

    #[test]
    fn extract_tenant_valid() {
        let tenant = TenantId::new();
        let mut headers = HeaderMap::new();
        let _ = headers.insert(
            "X-Tenant-ID",
            HeaderValue::from_str(&tenant.to_string()).unwrap(),
        );
        assert_eq!(extract_tenant(&headers).unwrap(), tenant);
    }

    #[test]
    fn extract_tenant_missing() {
        let headers = HeaderMap::new();
        assert!(extract_tenant(&headers).unwrap_err().contains("required"));
    }

    #[test]
    fn extract_tenant_malformed() {
        let mut headers = HeaderMap::new();
        let _ = headers.insert("X-Tenant-ID", HeaderValue::from_static("nope"));
        assert!(extract_tenant(&headers).unwrap_err().contains("valid UUID"));
    }
}
