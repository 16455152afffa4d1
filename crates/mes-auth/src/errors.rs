//! Auth error types.

/// Errors rejecting a WebSocket connection attempt.
///
/// The protocol has no in-band error channel for a rejected connection, so
/// each variant maps to a close reason code via [`AuthError::close_code`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Tenant header or credential not supplied.
    #[error("missing tenant or credential")]
    Missing,

    /// Credential failed to decode, is expired, or carries no subject.
    #[error("invalid credential")]
    InvalidCredential,

    /// Declared tenant does not match the credential's tenant claim.
    #[error("tenant mismatch")]
    TenantMismatch,
}

impl AuthError {
    /// WebSocket close code delivered to the rejected client.
    #[must_use]
    pub fn close_code(&self) -> u16 {
        match self {
            Self::Missing | Self::InvalidCredential => 4401,
            Self::TenantMismatch => 4403,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_display() {
        assert_eq!(AuthError::Missing.to_string(), "missing tenant or credential");
    }

    #[test]
    fn invalid_credential_display() {
        assert_eq!(AuthError::InvalidCredential.to_string(), "invalid credential");
    }

    #[test]
    fn tenant_mismatch_display() {
        assert_eq!(AuthError::TenantMismatch.to_string(), "tenant mismatch");
    }

    #[test]
    fn close_codes() {
        assert_eq!(AuthError::Missing.close_code(), 4401);
        assert_eq!(AuthError::InvalidCredential.close_code(), 4401);
        assert_eq!(AuthError::TenantMismatch.close_code(), 4403);
    }
}
