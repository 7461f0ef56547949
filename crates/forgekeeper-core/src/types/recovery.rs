use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SnapshotId;

/// States of a recovery session, forward-only except the explicit
/// rollback branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// Session created; nothing touched yet
    Requested,
    /// Snapshot confirmed recoverable and echo-confirmed by the caller
    Validated,
    /// Pre-change configuration of the target captured
    RollbackPointCaptured,
    /// Target environment provisioned
    Provisioned,
    /// Configuration artifacts placed on the target
    ConfigRestored,
    /// Data archive restored; previous data state is gone
    DataRestored,
    /// Service reconfigured against the restored state
    ServiceReconfigured,
    /// Health and structural checks ran
    Verified,
    /// Terminal: recovery finished
    Completed,
    /// Terminal unless rolled back: a step failed
    Failed,
    /// Terminal: configuration rollback executed
    RolledBack,
}

impl SessionState {
    /// Position in the forward path; terminal branches sort last.
    const fn rank(self) -> u8 {
        match self {
            Self::Requested => 0,
            Self::Validated => 1,
            Self::RollbackPointCaptured => 2,
            Self::Provisioned => 3,
            Self::ConfigRestored => 4,
            Self::DataRestored => 5,
            Self::ServiceReconfigured => 6,
            Self::Verified => 7,
            Self::Completed => 8,
            Self::Failed => 9,
            Self::RolledBack => 10,
        }
    }

    /// Next state on the forward path, if any
    #[must_use]
    pub const fn next_forward(self) -> Option<Self> {
        match self {
            Self::Requested => Some(Self::Validated),
            Self::Validated => Some(Self::RollbackPointCaptured),
            Self::RollbackPointCaptured => Some(Self::Provisioned),
            Self::Provisioned => Some(Self::ConfigRestored),
            Self::ConfigRestored => Some(Self::DataRestored),
            Self::DataRestored => Some(Self::ServiceReconfigured),
            Self::ServiceReconfigured => Some(Self::Verified),
            Self::Verified => Some(Self::Completed),
            Self::Completed | Self::Failed | Self::RolledBack => None,
        }
    }

    /// True for states no session ever leaves (rollback excepted for
    /// `Failed`)
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::RolledBack)
    }

}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Requested => "Requested",
            Self::Validated => "Validated",
            Self::RollbackPointCaptured => "RollbackPointCaptured",
            Self::Provisioned => "Provisioned",
            Self::ConfigRestored => "ConfigRestored",
            Self::DataRestored => "DataRestored",
            Self::ServiceReconfigured => "ServiceReconfigured",
            Self::Verified => "Verified",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
            Self::RolledBack => "RolledBack",
        };
        write!(f, "{name}")
    }
}

/// Why a rollback request was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RollbackRejection {
    /// The data restore already executed; the previous data state was
    /// being discarded and cannot be restored
    DataRestoreIrreversible,
    /// No rollback point was captured for this session
    NoRollbackPoint,
    /// Only failed sessions can roll back
    SessionNotFailed,
}

impl std::fmt::Display for RollbackRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DataRestoreIrreversible => write!(f, "data-restore-irreversible"),
            Self::NoRollbackPoint => write!(f, "no-rollback-point"),
            Self::SessionNotFailed => write!(f, "session-not-failed"),
        }
    }
}

/// Human approval attached to a session before it may advance past
/// `Validated` when it was created automatically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRecord {
    /// Operator who approved
    pub approved_by: String,

    /// When the approval was recorded
    pub approved_at: DateTime<Utc>,

    /// Optional free-form note
    #[serde(default)]
    pub note: Option<String>,
}

/// A completed transition in the session's ordered step log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    /// State entered
    pub state: SessionState,

    /// When the transition completed
    pub at: DateTime<Utc>,
}

/// Captured pre-change configuration used for rollback
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackPoint {
    /// When the capture ran
    pub captured_at: DateTime<Utc>,

    /// Opaque reference to the captured configuration bundle
    /// (location on the capture store, not the bundle itself)
    pub config_ref: String,
}

/// One supervised recovery run against a single target environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoverySession {
    /// Session id, unique per process lifetime
    pub id: String,

    /// Target environment identifier (advisory lock key)
    pub target_env: String,

    /// Snapshot being restored
    pub snapshot: SnapshotId,

    /// Current state
    pub state: SessionState,

    /// Ordered log of completed transitions
    pub steps: Vec<StepRecord>,

    /// Captured pre-change configuration, if any existed
    #[serde(default)]
    pub rollback_point: Option<RollbackPoint>,

    /// Operator approval, required before `Validated` for auto-created
    /// sessions
    #[serde(default)]
    pub approval: Option<ApprovalRecord>,

    /// State the failing step was attempting when the session failed
    #[serde(default)]
    pub failed_at: Option<SessionState>,

    /// Failure detail
    #[serde(default)]
    pub failure: Option<String>,

    /// True when the session was created by the risk trigger rather
    /// than an operator
    #[serde(default)]
    pub auto_created: bool,

    /// When the session was created
    pub created_at: DateTime<Utc>,
}

impl RecoverySession {
    /// Create a fresh session in `Requested`
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        target_env: impl Into<String>,
        snapshot: SnapshotId,
        auto_created: bool,
    ) -> Self {
        Self {
            id: id.into(),
            target_env: target_env.into(),
            snapshot,
            state: SessionState::Requested,
            steps: Vec::new(),
            rollback_point: None,
            approval: None,
            failed_at: None,
            failure: None,
            auto_created,
            created_at: Utc::now(),
        }
    }

    /// Whether a rollback is currently permitted, or why not.
    ///
    /// Rollback restores configuration only, and only while the failure
    /// happened at or before the config restore. Once the data restore
    /// ran, the prior data state was already being discarded.
    pub fn rollback_eligibility(&self) -> Result<(), RollbackRejection> {
        if self.state != SessionState::Failed {
            return Err(RollbackRejection::SessionNotFailed);
        }
        let failed_at = self.failed_at.unwrap_or(SessionState::Failed);
        if failed_at.rank() > SessionState::ConfigRestored.rank() {
            return Err(RollbackRejection::DataRestoreIrreversible);
        }
        if self.rollback_point.is_none() {
            return Err(RollbackRejection::NoRollbackPoint);
        }
        Ok(())
    }

    /// True when this auto-created session still awaits its human
    /// approval gate
    #[must_use]
    pub fn awaiting_approval(&self) -> bool {
        self.auto_created && self.approval.is_none() && self.state == SessionState::Requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn session() -> RecoverySession {
        RecoverySession::new(
            "rs-1",
            "production",
            SnapshotId::new("forge", Utc.timestamp_opt(1_700_000_000, 0).unwrap()),
            false,
        )
    }

    #[test]
    fn forward_path_ends_at_completed() {
        let mut state = SessionState::Requested;
        let mut hops = 0;
        while let Some(next) = state.next_forward() {
            state = next;
            hops += 1;
        }
        assert_eq!(state, SessionState::Completed);
        assert_eq!(hops, 8);
    }

    #[test]
    fn rollback_rejected_when_not_failed() {
        let s = session();
        assert_eq!(
            s.rollback_eligibility(),
            Err(RollbackRejection::SessionNotFailed)
        );
    }

    #[test]
    fn rollback_rejected_after_data_restore() {
        let mut s = session();
        s.state = SessionState::Failed;
        s.failed_at = Some(SessionState::ServiceReconfigured);
        s.rollback_point = Some(RollbackPoint {
            captured_at: Utc::now(),
            config_ref: "capture/production/1".into(),
        });
        assert_eq!(
            s.rollback_eligibility(),
            Err(RollbackRejection::DataRestoreIrreversible)
        );
    }

    #[test]
    fn rollback_allowed_at_config_restore_failure() {
        let mut s = session();
        s.state = SessionState::Failed;
        s.failed_at = Some(SessionState::ConfigRestored);
        s.rollback_point = Some(RollbackPoint {
            captured_at: Utc::now(),
            config_ref: "capture/production/1".into(),
        });
        assert_eq!(s.rollback_eligibility(), Ok(()));
    }

    #[test]
    fn rollback_needs_a_rollback_point() {
        let mut s = session();
        s.state = SessionState::Failed;
        s.failed_at = Some(SessionState::Provisioned);
        assert_eq!(
            s.rollback_eligibility(),
            Err(RollbackRejection::NoRollbackPoint)
        );
    }

    #[test]
    fn auto_sessions_wait_for_approval() {
        let mut s = RecoverySession::new(
            "rs-2",
            "production",
            SnapshotId::new("forge", Utc.timestamp_opt(1_700_000_000, 0).unwrap()),
            true,
        );
        assert!(s.awaiting_approval());
        s.approval = Some(ApprovalRecord {
            approved_by: "ops".into(),
            approved_at: Utc::now(),
            note: None,
        });
        assert!(!s.awaiting_approval());
    }
}
