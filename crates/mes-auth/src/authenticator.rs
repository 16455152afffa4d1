//! The pre-admission connection handshake.

use tracing::debug;

use mes_core::{TenantId, UserId};

use crate::errors::AuthError;
use crate::token::{TokenKeys, decode_token};

/// The validated identity of an admitted connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// Tenant every query and topic key for this connection is scoped to.
    pub tenant_id: TenantId,
    /// Token subject.
    pub user_id: UserId,
}

/// Validates a connection's declared tenant and bearer credential.
///
/// Stateless: holds only the verification keys, retains nothing per
/// connection.
pub struct ConnectionAuthenticator {
    keys: TokenKeys,
}

impl ConnectionAuthenticator {
    /// Create an authenticator over the given keys.
    #[must_use]
    pub fn new(keys: TokenKeys) -> Self {
        Self { keys }
    }

    /// Create an authenticator from a shared HS256 secret.
    #[must_use]
    pub fn from_secret(secret: &str) -> Self {
        Self::new(TokenKeys::from_secret(secret))
    }

    /// Validate a connection attempt.
    ///
    /// Checks run in a fixed order, each with its own failure mode:
    /// 1. tenant and credential both present, else [`AuthError::Missing`]
    /// 2. credential decodes as a valid unexpired token, else
    ///    [`AuthError::InvalidCredential`]
    /// 3. token tenant claim equals the declared tenant after UUID
    ///    normalization, else [`AuthError::TenantMismatch`]
    /// 4. token subject non-empty, else [`AuthError::InvalidCredential`]
    pub fn authenticate(
        &self,
        declared_tenant: Option<&str>,
        credential: Option<&str>,
    ) -> Result<AuthenticatedUser, AuthError> {
        let (declared, credential) = match (declared_tenant, credential) {
            (Some(t), Some(c)) if !t.is_empty() && !c.is_empty() => (t, c),
            _ => return Err(AuthError::Missing),
        };

        let claims = decode_token(&self.keys, credential).map_err(|e| {
            debug!(error = %e, "credential failed verification");
            AuthError::InvalidCredential
        })?;

        let declared = TenantId::parse(declared).map_err(|_| AuthError::TenantMismatch)?;
        let claimed =
            TenantId::parse(&claims.tenant_id).map_err(|_| AuthError::TenantMismatch)?;
        if claimed != declared {
            return Err(AuthError::TenantMismatch);
        }

        if claims.sub.is_empty() {
            return Err(AuthError::InvalidCredential);
        }

        Ok(AuthenticatedUser {
            tenant_id: claimed,
            user_id: UserId::from(claims.sub),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::issue_access_token;
    use chrono::Duration;

    const SECRET: &str = "test-secret";

    fn authenticator() -> ConnectionAuthenticator {
        ConnectionAuthenticator::from_secret(SECRET)
    }

    fn token_for(sub: &str, tenant: &TenantId, ttl_minutes: i64) -> String {
        issue_access_token(
            &TokenKeys::from_secret(SECRET),
            sub,
            tenant,
            vec![],
            Duration::minutes(ttl_minutes),
        )
        .unwrap()
    }

    #[test]
    fn valid_pair_is_admitted() {
        let tenant = TenantId::new();
        let token = token_for("user-1", &tenant, 30);
        let user = authenticator()
            .authenticate(Some(&tenant.to_string()), Some(&token))
            .unwrap();
        assert_eq!(user.tenant_id, tenant);
        assert_eq!(user.user_id.as_str(), "user-1");
    }

    #[test]
    fn missing_credential() {
        let tenant = TenantId::new();
        let err = authenticator()
            .authenticate(Some(&tenant.to_string()), None)
            .unwrap_err();
        assert_eq!(err, AuthError::Missing);
    }

    #[test]
    fn missing_tenant() {
        let tenant = TenantId::new();
        let token = token_for("user-1", &tenant, 30);
        let err = authenticator().authenticate(None, Some(&token)).unwrap_err();
        assert_eq!(err, AuthError::Missing);
    }

    #[test]
    fn empty_strings_count_as_missing() {
        let err = authenticator().authenticate(Some(""), Some("")).unwrap_err();
        assert_eq!(err, AuthError::Missing);
    }

    #[test]
    fn expired_token_is_invalid() {
        let tenant = TenantId::new();
        let token = token_for("user-1", &tenant, -5);
        let err = authenticator()
            .authenticate(Some(&tenant.to_string()), Some(&token))
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidCredential);
    }

    #[test]
    fn garbage_token_is_invalid() {
        let tenant = TenantId::new();
        let err = authenticator()
            .authenticate(Some(&tenant.to_string()), Some("nonsense"))
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidCredential);
    }

    #[test]
    fn tenant_mismatch() {
        let tenant = TenantId::new();
        let other = TenantId::new();
        let token = token_for("user-1", &tenant, 30);
        let err = authenticator()
            .authenticate(Some(&other.to_string()), Some(&token))
            .unwrap_err();
        assert_eq!(err, AuthError::TenantMismatch);
    }

    #[test]
    fn unparsable_declared_tenant_is_mismatch() {
        let tenant = TenantId::new();
        let token = token_for("user-1", &tenant, 30);
        let err = authenticator()
            .authenticate(Some("not-a-uuid"), Some(&token))
            .unwrap_err();
        assert_eq!(err, AuthError::TenantMismatch);
    }

    #[test]
    fn tenant_comparison_is_case_insensitive() {
        let tenant = TenantId::new();
        let token = token_for("user-1", &tenant, 30);
        let upper = tenant.to_string().to_uppercase();
        let user = authenticator()
            .authenticate(Some(&upper), Some(&token))
            .unwrap();
        assert_eq!(user.tenant_id, tenant);
    }

    #[test]
    fn empty_subject_is_invalid() {
        let tenant = TenantId::new();
        let token = token_for("", &tenant, 30);
        let err = authenticator()
            .authenticate(Some(&tenant.to_string()), Some(&token))
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidCredential);
    }
}
