//! JWT issue and verification (HS256).
//!
//! Access tokens carry the subject, the owning tenant, and role strings.
//! Expiry is validated on decode; an expired token is indistinguishable from
//! a malformed one as far as the connection handshake is concerned.

use chrono::{Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use serde::{Deserialize, Serialize};

use mes_core::TenantId;

/// Claim set embedded in an access token.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject — the user ID.
    pub sub: String,
    /// Tenant the token was issued for.
    pub tenant_id: String,
    /// Role names granted to the subject.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
    /// Issued-at, seconds since the epoch.
    pub iat: i64,
    /// Token kind, `"access"` for everything issued here.
    #[serde(rename = "type", default)]
    pub token_type: String,
}

impl Claims {
    /// Whether the subject holds at least one of the required roles.
    #[must_use]
    pub fn has_any_role(&self, required: &[&str]) -> bool {
        self.roles.iter().any(|r| required.contains(&r.as_str()))
    }
}

/// Signing and verification keys derived from one shared secret.
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenKeys {
    /// Build keys from a shared HS256 secret.
    #[must_use]
    pub fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// Issue a signed access token for `sub` scoped to `tenant`.
pub fn issue_access_token(
    keys: &TokenKeys,
    sub: &str,
    tenant: &TenantId,
    roles: Vec<String>,
    ttl: Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: sub.to_owned(),
        tenant_id: tenant.to_string(),
        roles,
        exp: (now + ttl).timestamp(),
        iat: now.timestamp(),
        token_type: "access".to_owned(),
    };
    encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
}

/// Decode and verify a token, including its expiry.
pub fn decode_token(
    keys: &TokenKeys,
    token: &str,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    decode::<Claims>(token, &keys.decoding, &validation).map(|data| data.claims)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
