//! Deterministic topic-key derivation.
//!
//! Topics are opaque strings keyed by tenant (dashboard) or tenant plus an
//! optional board (scheduler). The broadcast layer creates them lazily on
//! first subscription and never destroys them; keeping the derivation here
//! guarantees publishers and subscribers compute identical keys.

use crate::ids::TenantId;

/// Topic for a tenant's dashboard feed.
#[must_use]
pub fn dashboard_topic(tenant: &TenantId) -> String {
    format!("dashboard:{tenant}")
}

/// Topic for a tenant's scheduler feed, optionally narrowed to one board.
///
/// An empty board string is treated the same as no board.
#[must_use]
pub fn scheduler_topic(tenant: &TenantId, board: Option<&str>) -> String {
    match board {
        Some(b) if !b.is_empty() => format!("scheduler:{tenant}:{b}"),
        _ => format!("scheduler:{tenant}"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dashboard_keyed_by_tenant() {
        let tenant = TenantId::new();
        assert_eq!(dashboard_topic(&tenant), format!("dashboard:{tenant}"));
    }

    #[test]
    fn scheduler_without_board() {
        let tenant = TenantId::new();
        assert_eq!(
            scheduler_topic(&tenant, None),
            format!("scheduler:{tenant}")
        );
    }

    #[test]
    fn scheduler_with_board() {
        let tenant = TenantId::new();
        assert_eq!(
            scheduler_topic(&tenant, Some("line-a")),
            format!("scheduler:{tenant}:line-a")
        );
    }

    #[test]
    fn empty_board_same_as_none() {
        let tenant = TenantId::new();
        assert_eq!(
            scheduler_topic(&tenant, Some("")),
            scheduler_topic(&tenant, None)
        );
    }

    #[test]
    fn different_tenants_never_collide() {
        let a = TenantId::new();
        let b = TenantId::new();
        assert_ne!(dashboard_topic(&a), dashboard_topic(&b));
        assert_ne!(scheduler_topic(&a, Some("x")), scheduler_topic(&b, Some("x")));
    }
}
