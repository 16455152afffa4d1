//! `SQLite`-backed production data store.
//!
//! The store is deliberately small — the wider system's CRUD surface lives
//! elsewhere. What this crate owns is the part the realtime layer depends
//! on: a pooled connection setup, the embedded schema migrations, the
//! tenant scoping guard that keeps every query inside one tenant's rows,
//! the KPI aggregation pushed to subscribers, and the work-order insert
//! that drives the `work_order.created` scheduler event.

pub mod connection;
pub mod errors;
pub mod kpi;
pub mod migrations;
pub mod production;
pub mod tenant;

pub use connection::{ConnectionConfig, ConnectionPool, PooledConnection, new_file, new_in_memory};
pub use errors::{Result, StoreError};
pub use tenant::{StoreHandle, TenantScope};
