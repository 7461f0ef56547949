use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::RetentionPolicy;

/// Mutability guarantee a storage tier offers.
///
/// The mode decides which credentials may touch the tier and whether a
/// snapshot stored there counts toward "recoverable".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TierMode {
    /// On-host staging copy; holds no unique data, auto-prunable
    MutableLocal,
    /// Remote repository where the automated credential can create but
    /// never delete or modify
    AppendOnlyRemote,
    /// Object storage with a retention lock; not even the owner can
    /// delete before the lock expires
    WormRemote,
}

impl TierMode {
    /// True for tiers whose copies count toward "recoverable"
    #[must_use]
    pub const fn counts_as_recoverable(self) -> bool {
        !matches!(self, Self::MutableLocal)
    }

    /// True for tiers where destructive operations require the
    /// out-of-band administrator credential
    #[must_use]
    pub const fn requires_admin_for_prune(self) -> bool {
        !matches!(self, Self::MutableLocal)
    }
}

impl std::fmt::Display for TierMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MutableLocal => write!(f, "mutable-local"),
            Self::AppendOnlyRemote => write!(f, "append-only-remote"),
            Self::WormRemote => write!(f, "worm-remote"),
        }
    }
}

/// Static description of one storage tier.
///
/// The credential referenced here is the *automated write* credential;
/// the administrator credential is deliberately absent from this
/// structure and from any file the source host persists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierSpec {
    /// Unique tier name (e.g. "local", "offsite", "vault")
    pub name: String,

    /// Transport endpoint (ssh://..., https://..., or a local path)
    pub endpoint: String,

    /// Mutability guarantee
    pub mode: TierMode,

    /// Path to the automated write credential file
    pub credential_path: PathBuf,

    /// Retention policy applied at prune time
    #[serde(default)]
    pub retention: RetentionPolicy,

    /// Maximum acceptable age of the newest snapshot before the tier
    /// is flagged stale (hours)
    pub max_snapshot_age_hours: u32,
}

impl TierSpec {
    /// Staleness threshold as a chrono duration
    #[must_use]
    pub fn max_snapshot_age(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.max_snapshot_age_hours))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_remote_tiers_count_as_recoverable() {
        assert!(!TierMode::MutableLocal.counts_as_recoverable());
        assert!(TierMode::AppendOnlyRemote.counts_as_recoverable());
        assert!(TierMode::WormRemote.counts_as_recoverable());
    }

    #[test]
    fn remote_tiers_require_admin_for_prune() {
        assert!(!TierMode::MutableLocal.requires_admin_for_prune());
        assert!(TierMode::AppendOnlyRemote.requires_admin_for_prune());
        assert!(TierMode::WormRemote.requires_admin_for_prune());
    }

    #[test]
    fn mode_serializes_kebab_case() {
        let json = serde_json::to_string(&TierMode::AppendOnlyRemote).unwrap();
        assert_eq!(json, "\"append-only-remote\"");
        let back: TierMode = serde_json::from_str("\"worm-remote\"").unwrap();
        assert_eq!(back, TierMode::WormRemote);
    }
}
