//! Authentication for the realtime feeds.
//!
//! WebSocket clients present a bearer token (`token` query parameter) and a
//! declared tenant (`X-Tenant-ID` header). [`ConnectionAuthenticator`]
//! validates the pair before a connection is admitted to any topic; failures
//! surface only as WebSocket close codes, never as message bodies.

pub mod authenticator;
pub mod errors;
pub mod token;

pub use authenticator::{AuthenticatedUser, ConnectionAuthenticator};
pub use errors::AuthError;
pub use token::{Claims, TokenKeys, decode_token, issue_access_token};
