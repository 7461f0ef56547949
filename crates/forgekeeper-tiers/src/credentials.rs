//! Capability-typed tier credentials.
//!
//! The two-credential separation is a security invariant, modeled in
//! the type system rather than checked at call time:
//!
//! - [`WriteCredential`] is what the automated path holds. Every
//!   transport method that deletes or modifies requires an
//!   [`AdminCredential`], so a compromised source host holding only
//!   the write credential structurally cannot destroy its backups.
//! - [`AdminCredential`] is minted from an operator-supplied file at
//!   invocation time and is never referenced from configuration,
//!   never persisted on the source host, and never `Debug`-printed.

use std::path::Path;

use forgekeeper_core::{FkError, Result};

/// The automated write credential: create-only capability.
#[derive(Clone)]
pub struct WriteCredential {
    token: String,
}

impl WriteCredential {
    /// Load the credential token from a file, trimming trailing
    /// whitespace. An unreadable or empty file is a configuration
    /// error, surfaced at startup.
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            FkError::Config(format!(
                "cannot read write credential {}: {e}",
                path.display()
            ))
        })?;
        Self::from_token(raw.trim())
    }

    /// Build from a raw token value (tests, in-memory transports)
    pub fn from_token(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.is_empty() {
            return Err(FkError::Config("write credential is empty".into()));
        }
        Ok(Self { token })
    }

    /// The bearer token, exposed only to transports
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl std::fmt::Debug for WriteCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteCredential").finish_non_exhaustive()
    }
}

/// The out-of-band administrator credential: delete/prune capability.
///
/// Only the privileged CLI path constructs one of these, from a path
/// the operator supplies for that single invocation.
#[derive(Clone)]
pub struct AdminCredential {
    token: String,
}

impl AdminCredential {
    /// Load the administrator token from an operator-supplied file
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            FkError::Config(format!(
                "cannot read admin credential {}: {e}",
                path.display()
            ))
        })?;
        let token = raw.trim();
        if token.is_empty() {
            return Err(FkError::Config("admin credential is empty".into()));
        }
        Ok(Self {
            token: token.to_string(),
        })
    }

    /// Build from a raw token value (tests only)
    #[must_use]
    pub fn from_token_unchecked(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// The bearer token, exposed only to transports
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl std::fmt::Debug for AdminCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredential").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_write_token_is_config_error() {
        let err = WriteCredential::from_token("").unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn debug_never_leaks_tokens() {
        let write = WriteCredential::from_token("super-secret").unwrap();
        let admin = AdminCredential::from_token_unchecked("even-more-secret");
        let rendered = format!("{write:?} {admin:?}");
        assert!(!rendered.contains("secret"));
    }

    #[tokio::test]
    async fn missing_credential_file_is_config_error() {
        let err = WriteCredential::load(Path::new("/nonexistent/cred"))
            .await
            .unwrap_err();
        assert!(matches!(err, FkError::Config(_)));
    }
}
