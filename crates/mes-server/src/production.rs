//! Work-order creation endpoint.
//!
//! The one REST mutation this service owns. Persisting the order is
//! transactional through the store; the follow-up announcements
//! (`scheduler.work_order.created` and a fresh `kpi.snapshot`) are
//! best-effort — a publish failure never rolls back or fails the request.

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use metrics::counter;
use serde::Deserialize;
use serde_json::{Map, json};
use tracing::{error, warn};

use mes_auth::AuthError;
use mes_core::{SchedulerEvent, TenantId, UserId};
use mes_store::production::{self, NewWorkOrder, WorkOrder};
use mes_store::{StoreError, StoreHandle, kpi};

use crate::server::AppState;

/// `POST /api/v1/production/work-orders` request body.
#[derive(Debug, Deserialize)]
pub struct CreateWorkOrderRequest {
    /// Human-facing order number, unique per tenant.
    pub order_no: String,
    /// Initial status; defaults to `"planned"`.
    pub status: Option<String>,
}

/// Persist a work order for `tenant`, then announce it to the tenant's
/// realtime subscribers.
pub async fn create_work_order(
    state: &AppState,
    tenant: TenantId,
    user: Option<&UserId>,
    new: &NewWorkOrder,
) -> Result<WorkOrder, StoreError> {
    let (order, snapshot) = {
        let conn = state.pool.get()?;
        let handle = StoreHandle::new(conn);
        let scope = handle.enter(tenant);
        let order = production::create_work_order(&scope, new)?;
        // Recompute while the scope is open; failure only skips the push.
        let snapshot = match kpi::compute_snapshot(&scope) {
            Ok(s) => Some(s),
            Err(e) => {
                warn!(error = %e, "kpi recompute after work-order insert failed");
                None
            }
        };
        (order, snapshot)
    };

    counter!("work_orders_created_total").increment(1);

    let mut details = Map::new();
    let _ = details.insert("order_no".to_owned(), json!(order.order_no));
    let _ = details.insert("work_order_id".to_owned(), json!(order.id.as_str()));
    let _ = details.insert("status".to_owned(), json!(order.status));
    let mut event = SchedulerEvent::new("work_order.created").with_details(details);
    event.user_id = user.cloned();
    state.broadcast.publish_scheduler_event(&tenant, &event).await;

    if let Some(snapshot) = snapshot {
        state.broadcast.publish_kpi_snapshot(&tenant, &snapshot).await;
    }

    Ok(order)
}

/// Axum handler for `POST /api/v1/production/work-orders`.
///
/// Reuses the WebSocket credential pair on the REST surface: bearer token in
/// `Authorization`, declared tenant in `X-Tenant-ID`.
pub async fn create_work_order_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateWorkOrderRequest>,
) -> Response {
    let declared = headers
        .get("X-Tenant-ID")
        .and_then(|v| v.to_str().ok());
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let user = match state.authenticator.authenticate(declared, token) {
        Ok(user) => user,
        Err(err) => {
            let status = match err {
                AuthError::TenantMismatch => StatusCode::FORBIDDEN,
                AuthError::Missing | AuthError::InvalidCredential => StatusCode::UNAUTHORIZED,
            };
            return (status, Json(json!({ "error": err.to_string() }))).into_response();
        }
    };

    let new = NewWorkOrder {
        order_no: body.order_no,
        status: body.status,
    };
    match create_work_order(&state, user.tenant_id, Some(&user.user_id), &new).await {
        Ok(order) => (StatusCode::CREATED, Json(order)).into_response(),
        Err(err) if err.is_constraint_violation() => (
            StatusCode::CONFLICT,
            Json(json!({ "error": "order_no already exists for this tenant" })),
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "work-order creation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "internal error" })),
            )
                .into_response()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
