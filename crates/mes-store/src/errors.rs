//! Error types for the store.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `SQLite` database error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Schema migration failed.
    #[error("migration error: {message}")]
    Migration {
        /// Describes which migration failed and why.
        message: String,
    },

    /// A query was issued through a tenant scope that is no longer the
    /// handle's active scope. Indicates a caller bug; the handle is in its
    /// deny-by-default state and no rows were touched.
    #[error("tenant scope is not active on this handle")]
    TenantScopeViolation,

    /// Requested work order was not found within the active tenant.
    #[error("work order not found: {0}")]
    WorkOrderNotFound(String),
}

impl StoreError {
    /// Whether the underlying failure is a `SQLite` constraint violation
    /// (duplicate key, foreign key, …). Lets callers map conflicts without
    /// depending on `rusqlite` themselves.
    #[must_use]
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Self::Sqlite(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
