//! Axum HTTP + WebSocket server for the MES realtime layer.
//!
//! Exposes two persistent-connection feeds (`/ws/dashboard`,
//! `/ws/scheduler`) gated by a per-connection authentication handshake, a
//! small REST surface (health, discovery, work-order creation), and the
//! broadcast manager that fans messages out to topic subscribers.

pub mod config;
pub mod discovery;
pub mod health;
pub mod production;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use server::{AppState, MesServer};
