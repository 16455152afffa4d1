//! Production KPI aggregation.
//!
//! Read-only: computes one [`KpiSnapshot`] over the operations and
//! production logs of the scope's tenant. Consumed by the realtime layer on
//! connect and after relevant domain mutations; a failure here is logged by
//! the caller and the push skipped, never fatal to a connection.

use chrono::Utc;

use mes_core::KpiSnapshot;

use crate::errors::Result;
use crate::tenant::TenantScope;

/// Compute the current KPI snapshot for the scope's tenant.
///
/// - `scrap_rate` = scrap / (good + scrap) × 100
/// - `oee` = quality rate × 100, where quality is good / (good + scrap)
///   and 1.0 when nothing has been produced
/// - `downtime_minutes` = sum of `downtime` production-log durations
///
/// All values rounded to two decimal places.
pub fn compute_snapshot(scope: &TenantScope<'_>) -> Result<KpiSnapshot> {
    let conn = scope.conn()?;
    let tenant = scope.tenant().to_string();

    let (good, scrap): (f64, f64) = conn.query_row(
        "SELECT COALESCE(SUM(quantity_good), 0), COALESCE(SUM(quantity_scrap), 0)
         FROM work_order_operations
         WHERE tenant_id = ?1",
        [&tenant],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let downtime: f64 = conn.query_row(
        "SELECT COALESCE(SUM(duration_minutes), 0)
         FROM production_logs
         WHERE tenant_id = ?1 AND log_type = 'downtime'",
        [&tenant],
        |row| row.get(0),
    )?;

    let total = good + scrap;
    let quality = if total > 0.0 { good / total } else { 1.0 };
    let scrap_rate = if total > 0.0 { scrap / total * 100.0 } else { 0.0 };

    Ok(KpiSnapshot {
        oee: round2(quality * 100.0),
        scrap_rate: round2(scrap_rate),
        downtime_minutes: round2(downtime),
        at: Utc::now(),
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
