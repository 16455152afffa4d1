//! The realtime WebSocket layer.
//!
//! One tokio task per connection plus one outbound writer task fed by a
//! bounded channel; the [`broadcast::BroadcastManager`] is the only state
//! shared between connection tasks.

pub mod broadcast;
pub mod connection;
pub mod frame;
pub mod session;

pub use broadcast::BroadcastManager;
pub use connection::ClientConnection;
