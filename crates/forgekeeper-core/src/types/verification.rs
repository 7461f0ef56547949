use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{SnapshotId, TierMode};

/// Outcome of one tier check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerifyStatus {
    /// Tier reachable, newest snapshot fresh, complete, checksum valid
    Ok,
    /// Newest snapshot is older than the tier's freshness threshold
    Stale,
    /// Tier transport failed after retries
    Unreachable,
    /// Checksum mismatch or missing artifact class
    Corrupt,
    /// Enforcement probe succeeded where it must be denied
    PolicyViolation,
}

impl VerifyStatus {
    /// True only for a clean pass
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl std::fmt::Display for VerifyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Stale => write!(f, "stale"),
            Self::Unreachable => write!(f, "unreachable"),
            Self::Corrupt => write!(f, "corrupt"),
            Self::PolicyViolation => write!(f, "policy-violation"),
        }
    }
}

/// Result of verifying one tier.
///
/// Two results describe the same outcome when everything but
/// `checked_at` matches; `verify_all` twice in a row with no
/// intervening writes must produce pairwise-same outcomes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    /// Tier that was checked
    pub tier: String,

    /// Mutability mode of that tier (copied for recoverability filtering)
    pub tier_mode: TierMode,

    /// Newest snapshot seen on the tier, if listing succeeded
    pub snapshot_id: Option<SnapshotId>,

    /// When the check ran
    pub checked_at: DateTime<Utc>,

    /// Check outcome
    pub status: VerifyStatus,

    /// Human-readable evidence for non-ok statuses
    #[serde(default)]
    pub detail: Option<String>,
}

impl VerificationResult {
    /// Equality modulo `checked_at`
    #[must_use]
    pub fn same_outcome(&self, other: &Self) -> bool {
        self.tier == other.tier
            && self.tier_mode == other.tier_mode
            && self.snapshot_id == other.snapshot_id
            && self.status == other.status
            && self.detail == other.detail
    }

    /// True when this result makes its snapshot recoverable: an `ok`
    /// check on a tier whose copies count (i.e. not mutable-local).
    #[must_use]
    pub fn makes_recoverable(&self) -> bool {
        self.status.is_ok()
            && self.tier_mode.counts_as_recoverable()
            && self.snapshot_id.is_some()
    }
}

/// Aggregate health across all tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    /// Every tier passed
    Ok,
    /// Some tier failed but at least one recoverable copy remains
    Degraded,
    /// No recoverable copy exists, or the immutability guarantee failed
    Critical,
}

impl OverallStatus {
    /// Fold per-tier results into an overall status.
    ///
    /// A policy violation is always `Critical`: it silently breaks the
    /// ransomware guarantee even while backups look healthy.
    #[must_use]
    pub fn from_results(results: &[VerificationResult]) -> Self {
        if results
            .iter()
            .any(|r| r.status == VerifyStatus::PolicyViolation)
        {
            return Self::Critical;
        }

        let any_recoverable = results.iter().any(VerificationResult::makes_recoverable);
        let all_ok = results.iter().all(|r| r.status.is_ok());

        if !any_recoverable {
            Self::Critical
        } else if all_ok {
            Self::Ok
        } else {
            Self::Degraded
        }
    }
}

impl std::fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Degraded => write!(f, "degraded"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// One full verification pass across every configured tier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    /// Per-tier results, in configuration order
    pub results: Vec<VerificationResult>,

    /// Folded overall status
    pub overall: OverallStatus,

    /// When the pass started
    pub started_at: DateTime<Utc>,
}

impl VerificationReport {
    /// Build a report, folding the overall status from the results
    #[must_use]
    pub fn new(results: Vec<VerificationResult>, started_at: DateTime<Utc>) -> Self {
        let overall = OverallStatus::from_results(&results);
        Self {
            results,
            overall,
            started_at,
        }
    }

    /// Newest snapshot with a recoverable (`ok`, non-local) result
    #[must_use]
    pub fn newest_recoverable(&self) -> Option<&SnapshotId> {
        self.results
            .iter()
            .filter(|r| r.makes_recoverable())
            .filter_map(|r| r.snapshot_id.as_ref())
            .max()
    }

    /// True when a specific snapshot is recoverable per this report
    #[must_use]
    pub fn is_recoverable(&self, id: &SnapshotId) -> bool {
        self.results
            .iter()
            .any(|r| r.makes_recoverable() && r.snapshot_id.as_ref() == Some(id))
    }
}
