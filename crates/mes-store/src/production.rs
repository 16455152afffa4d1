//! Work-order writes and production-log seeding.
//!
//! The wider CRUD surface lives outside this service; what remains here is
//! the mutation the realtime layer announces (`create_work_order`) plus the
//! inserts the KPI aggregation reads from.

use chrono::{DateTime, Utc};
use serde::Serialize;

use mes_core::{OperationId, TenantId, WorkOrderId};

use crate::errors::Result;
use crate::tenant::TenantScope;

/// A persisted work order.
#[derive(Clone, Debug, Serialize)]
pub struct WorkOrder {
    /// Work-order ID.
    pub id: WorkOrderId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Human-facing order number, unique per tenant.
    pub order_no: String,
    /// Lifecycle status.
    pub status: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Input for creating a work order.
#[derive(Clone, Debug)]
pub struct NewWorkOrder {
    /// Human-facing order number, unique per tenant.
    pub order_no: String,
    /// Initial status; defaults to `"planned"`.
    pub status: Option<String>,
}

/// Insert a new work order for the scope's tenant.
pub fn create_work_order(scope: &TenantScope<'_>, new: &NewWorkOrder) -> Result<WorkOrder> {
    let conn = scope.conn()?;
    let order = WorkOrder {
        id: WorkOrderId::new(),
        tenant_id: scope.tenant(),
        order_no: new.order_no.clone(),
        status: new.status.clone().unwrap_or_else(|| "planned".to_owned()),
        created_at: Utc::now(),
    };

    let _ = conn.execute(
        "INSERT INTO work_orders (id, tenant_id, order_no, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            order.id.as_str(),
            order.tenant_id.to_string(),
            order.order_no,
            order.status,
            order.created_at.to_rfc3339(),
        ],
    )?;

    Ok(order)
}

/// Count the scope tenant's work orders.
pub fn count_work_orders(scope: &TenantScope<'_>) -> Result<u64> {
    let conn = scope.conn()?;
    let count: u64 = conn.query_row(
        "SELECT COUNT(*) FROM work_orders WHERE tenant_id = ?1",
        [scope.tenant().to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Record an operation with produced quantities under a work order.
pub fn add_operation(
    scope: &TenantScope<'_>,
    work_order: &WorkOrderId,
    seq: u32,
    quantity_good: f64,
    quantity_scrap: f64,
) -> Result<OperationId> {
    let conn = scope.conn()?;
    let id = OperationId::new();
    let _ = conn.execute(
        "INSERT INTO work_order_operations
             (id, tenant_id, work_order_id, seq, quantity_good, quantity_scrap)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            id.as_str(),
            scope.tenant().to_string(),
            work_order.as_str(),
            seq,
            quantity_good,
            quantity_scrap,
        ],
    )?;
    Ok(id)
}

/// Record a production log entry of an arbitrary type.
pub fn log_event(
    scope: &TenantScope<'_>,
    operation: Option<&OperationId>,
    log_type: &str,
    duration_minutes: f64,
) -> Result<()> {
    let conn = scope.conn()?;
    let _ = conn.execute(
        "INSERT INTO production_logs
             (id, tenant_id, operation_id, log_type, duration_minutes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            OperationId::new().as_str(),
            scope.tenant().to_string(),
            operation.map(OperationId::as_str),
            log_type,
            duration_minutes,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Record a downtime log entry.
pub fn log_downtime(
    scope: &TenantScope<'_>,
    operation: Option<&OperationId>,
    duration_minutes: f64,
) -> Result<()> {
    log_event(scope, operation, "downtime", duration_minutes)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
