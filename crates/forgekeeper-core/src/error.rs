use thiserror::Error;

/// Result type alias for forgekeeper operations
pub type Result<T> = std::result::Result<T, FkError>;

/// Errors that can occur across the backup, verification, and recovery paths
#[derive(Error, Debug)]
pub enum FkError {
    /// Configuration is missing or invalid - fatal at startup, never retried
    #[error("configuration error: {0}")]
    Config(String),

    /// A tier transport failed (unreachable endpoint, refused connection).
    /// Retried with backoff, then downgraded to a tier-scoped warning.
    #[error("transport error on tier '{tier}': {reason}")]
    Transport {
        /// Tier whose transport failed
        tier: String,
        /// What went wrong
        reason: String,
    },

    /// A remote operation exceeded its deadline
    #[error("operation timed out after {0} seconds")]
    Timeout(u64),

    /// A snapshot failed an integrity check (missing artifact class,
    /// checksum mismatch, stale). Never silently tolerated.
    #[error("integrity error for snapshot '{snapshot}': {reason}")]
    Integrity {
        /// Snapshot that failed the check
        snapshot: String,
        /// What the check found
        reason: String,
    },

    /// The enforcement probe succeeded where it must fail: the automated
    /// credential was able to delete or modify. Security incident.
    #[error("policy violation on tier '{tier}': {reason}")]
    PolicyViolation {
        /// Tier whose immutability guarantee failed
        tier: String,
        /// Evidence from the probe
        reason: String,
    },

    /// A recovery step failed; the state machine halts at the current state
    #[error("recovery step failed in state '{state}': {reason}")]
    RecoveryStep {
        /// State the session was in when the step failed
        state: String,
        /// What went wrong
        reason: String,
    },

    /// Another session already holds the advisory lock on this target
    #[error("recovery already active for target '{0}'")]
    TargetLocked(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing/serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl FkError {
    /// Returns true if the error is worth retrying with backoff
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Timeout(_))
    }

    /// Process exit code for this failure class, so calling automation
    /// can branch without parsing messages.
    ///
    /// 0 is reserved for success, 1 for anything not listed here.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Transport { .. } | Self::Timeout(_) => 3,
            Self::Integrity { .. } | Self::PolicyViolation { .. } => 4,
            Self::RecoveryStep { .. } | Self::TargetLocked(_) => 5,
            _ => 1,
        }
    }

    /// Convenience constructor for transport failures
    pub fn transport(tier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transport {
            tier: tier.into(),
            reason: reason.into(),
        }
    }

    /// Convenience constructor for integrity failures
    pub fn integrity(snapshot: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Integrity {
            snapshot: snapshot.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_distinguish_failure_classes() {
        assert_eq!(FkError::Config("x".into()).exit_code(), 2);
        assert_eq!(FkError::transport("offsite", "refused").exit_code(), 3);
        assert_eq!(FkError::integrity("s1", "bad sum").exit_code(), 4);
        assert_eq!(
            FkError::RecoveryStep {
                state: "DataRestored".into(),
                reason: "partial write".into()
            }
            .exit_code(),
            5
        );
        assert_eq!(FkError::Internal("x".into()).exit_code(), 1);
    }

    #[test]
    fn only_transport_class_is_retryable() {
        assert!(FkError::transport("t", "down").is_retryable());
        assert!(FkError::Timeout(30).is_retryable());
        assert!(!FkError::Config("x".into()).is_retryable());
        assert!(!FkError::integrity("s", "r").is_retryable());
        assert!(!FkError::PolicyViolation {
            tier: "t".into(),
            reason: "delete succeeded".into()
        }
        .is_retryable());
    }
}
