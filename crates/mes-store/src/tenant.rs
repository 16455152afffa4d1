//! Tenant scoping for store access.
//!
//! Every data-access call takes a [`TenantScope`], obtained from
//! [`StoreHandle::enter`]. The handle carries one piece of ambient mutable
//! state — the currently active tenant — and the scope guard guarantees it
//! is reset to the deny-by-default state (`None`) on every exit path,
//! including panics and early returns. Failing to reset would be a
//! tenant-isolation breach, not merely a leak, which is why the reset lives
//! in `Drop` rather than in an explicit close call.
//!
//! Concurrent units of work must use distinct handles; entering a scope
//! while another is active on the same handle is a caller bug and panics.

use parking_lot::Mutex;
use rusqlite::Connection;
use tracing::trace;

use mes_core::TenantId;

use crate::connection::PooledConnection;
use crate::errors::{Result, StoreError};

/// One unit-of-work handle: a pooled connection plus its scoping state.
pub struct StoreHandle {
    conn: PooledConnection,
    active: Mutex<Option<TenantId>>,
}

impl StoreHandle {
    /// Wrap a pooled connection. The handle starts in the deny-by-default
    /// state: no tenant is active and no scoped query can run.
    #[must_use]
    pub fn new(conn: PooledConnection) -> Self {
        Self {
            conn,
            active: Mutex::new(None),
        }
    }

    /// Activate a tenant scope on this handle.
    ///
    /// # Panics
    ///
    /// Panics if a scope is already active on this handle. Nesting is a
    /// caller error with no sound recovery: silently stacking scopes would
    /// make the isolation invariant unverifiable.
    pub fn enter(&self, tenant: TenantId) -> TenantScope<'_> {
        let mut active = self.active.lock();
        assert!(
            active.is_none(),
            "tenant scope already active on this handle"
        );
        *active = Some(tenant);
        trace!(%tenant, "tenant scope entered");
        TenantScope {
            handle: self,
            tenant,
        }
    }

    /// The tenant currently active on this handle, if any.
    #[must_use]
    pub fn active_tenant(&self) -> Option<TenantId> {
        *self.active.lock()
    }
}

/// An active tenant scope. All queries for the unit of work go through this
/// guard, which binds its tenant into every statement.
pub struct TenantScope<'h> {
    handle: &'h StoreHandle,
    tenant: TenantId,
}

impl TenantScope<'_> {
    /// The tenant this scope is bound to.
    #[must_use]
    pub fn tenant(&self) -> TenantId {
        self.tenant
    }

    /// The underlying connection, re-checked against the handle's ambient
    /// scoping state.
    pub(crate) fn conn(&self) -> Result<&Connection> {
        let active = self.handle.active.lock();
        match *active {
            Some(t) if t == self.tenant => Ok(&self.handle.conn),
            _ => Err(StoreError::TenantScopeViolation),
        }
    }
}

impl Drop for TenantScope<'_> {
    fn drop(&mut self) {
        // Unconditional reset to deny-by-default.
        *self.handle.active.lock() = None;
        trace!(tenant = %self.tenant, "tenant scope exited");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
