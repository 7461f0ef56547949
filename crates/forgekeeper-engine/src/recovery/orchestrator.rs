//! The recovery state machine.
//!
//! A session moves strictly forward through
//! `Requested -> Validated -> RollbackPointCaptured -> Provisioned ->
//! ConfigRestored -> DataRestored -> ServiceReconfigured -> Verified ->
//! Completed`. A step failure parks the session in `Failed` with the
//! state it was attempting recorded; nothing is retried implicitly.
//! Rollback restores configuration only and exists solely for failures
//! at or before the config restore.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{error, info, instrument};

use forgekeeper_core::hash::sha256_bytes;
use forgekeeper_core::{
    ArtifactClass, FkError, Manifest, RecoverySession, Result, RollbackPoint, SessionState,
    SnapshotId, StepRecord, VerificationReport,
};
use forgekeeper_tiers::RepoTransport;

use crate::alert::{Alert, AlertSeverity, AlertSink};
use crate::recovery::locks::TargetLockRegistry;

/// Provisions and tears down target environments
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Make the target environment exist and be reachable
    async fn provision(&self, target_env: &str) -> Result<()>;

    /// Destroy an environment again (drill targets only)
    async fn teardown(&self, target_env: &str) -> Result<()>;
}

/// Applies restored artifacts to a target environment
#[async_trait]
pub trait RestoreTarget: Send + Sync {
    /// Capture the target's current configuration for rollback;
    /// returns an opaque reference to the captured bundle
    async fn capture_config(&self, target_env: &str) -> Result<String>;

    /// Place configuration and secrets artifacts on the target
    async fn restore_config(&self, target_env: &str, config: &[u8], secrets: &[u8]) -> Result<()>;

    /// Restore the data archive. Destructive: the target's previous
    /// data state is discarded.
    async fn restore_data(&self, target_env: &str, data: &[u8]) -> Result<()>;

    /// Reconfigure the service against the restored state
    async fn reconfigure(&self, target_env: &str) -> Result<()>;

    /// Re-apply a previously captured configuration bundle
    async fn rollback_config(&self, target_env: &str, config_ref: &str) -> Result<()>;
}

/// Post-restore health verification
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Check service health and readiness on the target
    async fn check(&self, target_env: &str) -> Result<()>;
}

/// An operator- or risk-initiated recovery request
#[derive(Debug, Clone)]
pub struct RecoveryRequest {
    /// Target environment to restore into
    pub target_env: String,

    /// Snapshot to restore
    pub snapshot: SnapshotId,

    /// Confirmation token: must echo the exact snapshot id string.
    /// Guards against restoring a different snapshot than the one the
    /// operator looked at.
    pub confirmation: String,
}

/// Drives recovery sessions through the state machine.
pub struct RecoveryOrchestrator {
    locks: TargetLockRegistry,
    transport: Arc<dyn RepoTransport>,
    provisioner: Arc<dyn Provisioner>,
    target: Arc<dyn RestoreTarget>,
    probe: Arc<dyn HealthProbe>,
    alerts: Arc<dyn AlertSink>,
    session_seq: AtomicU64,
}

impl RecoveryOrchestrator {
    /// Wire an orchestrator to its collaborators. `transport` is the
    /// tier the snapshot is restored from.
    pub fn new(
        transport: Arc<dyn RepoTransport>,
        provisioner: Arc<dyn Provisioner>,
        target: Arc<dyn RestoreTarget>,
        probe: Arc<dyn HealthProbe>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            locks: TargetLockRegistry::new(),
            transport,
            provisioner,
            target,
            probe,
            alerts,
            session_seq: AtomicU64::new(1),
        }
    }

    /// The advisory lock registry (shared with status reporting)
    #[must_use]
    pub const fn locks(&self) -> &TargetLockRegistry {
        &self.locks
    }

    /// Tear down a drill target through the provisioner
    pub async fn teardown_target(&self, target_env: &str) -> Result<()> {
        self.provisioner.teardown(target_env).await
    }

    fn next_session_id(&self) -> String {
        format!("rs-{}", self.session_seq.fetch_add(1, Ordering::Relaxed))
    }

    /// Create a session from the risk trigger. It stays parked in
    /// `Requested` until an operator approves and resumes it.
    pub fn request_auto(&self, target_env: &str, snapshot: SnapshotId) -> RecoverySession {
        let session = RecoverySession::new(self.next_session_id(), target_env, snapshot, true);
        info!(
            session = %session.id,
            target = %session.target_env,
            snapshot = %session.snapshot,
            "auto recovery session created, awaiting approval"
        );
        session
    }

    /// Run an operator-initiated recovery end to end.
    ///
    /// # Errors
    ///
    /// Rejections before anything destructive surface as errors: a held
    /// target lock, a confirmation mismatch, or a snapshot the report
    /// does not list as recoverable. Once past validation, step
    /// failures are recorded *in* the returned session instead.
    pub async fn run(
        &self,
        request: RecoveryRequest,
        report: &VerificationReport,
    ) -> Result<RecoverySession> {
        let mut session = RecoverySession::new(
            self.next_session_id(),
            request.target_env.clone(),
            request.snapshot.clone(),
            false,
        );
        self.execute(&mut session, &request.confirmation, report)
            .await?;
        Ok(session)
    }

    /// Resume an approved auto-created session.
    pub async fn resume(
        &self,
        session: &mut RecoverySession,
        confirmation: &str,
        report: &VerificationReport,
    ) -> Result<()> {
        if session.awaiting_approval() {
            return Err(FkError::RecoveryStep {
                state: session.state.to_string(),
                reason: "session awaits operator approval".into(),
            });
        }
        if session.state != SessionState::Requested {
            return Err(FkError::RecoveryStep {
                state: session.state.to_string(),
                reason: "only sessions in Requested can be resumed".into(),
            });
        }
        self.execute(session, confirmation, report).await
    }

    #[instrument(skip_all, fields(session = %session.id, target = %session.target_env))]
    async fn execute(
        &self,
        session: &mut RecoverySession,
        confirmation: &str,
        report: &VerificationReport,
    ) -> Result<()> {
        // Advisory lock: held for the whole run, released on return.
        let _guard = self.locks.acquire(&session.target_env)?;

        // Validation gate. Nothing has been touched yet, so failures
        // here are plain errors rather than a Failed session.
        let expected = session.snapshot.to_string();
        if confirmation != expected {
            return Err(FkError::RecoveryStep {
                state: session.state.to_string(),
                reason: format!("confirmation token does not match snapshot '{expected}'"),
            });
        }
        if !report.is_recoverable(&session.snapshot) {
            return Err(FkError::RecoveryStep {
                state: session.state.to_string(),
                reason: format!("snapshot '{expected}' is not recoverable per the latest sweep"),
            });
        }
        advance(session, SessionState::Validated);

        // Rollback point, before any change to the target.
        match self.target.capture_config(&session.target_env).await {
            Ok(config_ref) => {
                session.rollback_point = Some(RollbackPoint {
                    captured_at: Utc::now(),
                    config_ref,
                });
                advance(session, SessionState::RollbackPointCaptured);
            }
            Err(e) => return self.fail(session, SessionState::RollbackPointCaptured, &e).await,
        }

        if let Err(e) = self.provisioner.provision(&session.target_env).await {
            return self.fail(session, SessionState::Provisioned, &e).await;
        }
        advance(session, SessionState::Provisioned);

        let manifest = match self.transport.fetch_manifest(&session.snapshot).await {
            Ok(m) => m,
            Err(e) => return self.fail(session, SessionState::ConfigRestored, &e).await,
        };

        let config = self
            .fetch_verified(&session.snapshot, &manifest, ArtifactClass::Config)
            .await;
        let secrets = self
            .fetch_verified(&session.snapshot, &manifest, ArtifactClass::Secrets)
            .await;
        match (config, secrets) {
            (Ok(config), Ok(secrets)) => {
                if let Err(e) = self
                    .target
                    .restore_config(&session.target_env, &config, &secrets)
                    .await
                {
                    return self.fail(session, SessionState::ConfigRestored, &e).await;
                }
                advance(session, SessionState::ConfigRestored);
            }
            (Err(e), _) | (_, Err(e)) => {
                return self.fail(session, SessionState::ConfigRestored, &e).await;
            }
        }

        match self
            .fetch_verified(&session.snapshot, &manifest, ArtifactClass::DataArchive)
            .await
        {
            Ok(data) => {
                if let Err(e) = self.target.restore_data(&session.target_env, &data).await {
                    return self.fail(session, SessionState::DataRestored, &e).await;
                }
                advance(session, SessionState::DataRestored);
            }
            Err(e) => return self.fail(session, SessionState::DataRestored, &e).await,
        }

        if let Err(e) = self.target.reconfigure(&session.target_env).await {
            return self.fail(session, SessionState::ServiceReconfigured, &e).await;
        }
        advance(session, SessionState::ServiceReconfigured);

        if let Err(e) = self.probe.check(&session.target_env).await {
            return self.fail(session, SessionState::Verified, &e).await;
        }
        advance(session, SessionState::Verified);
        advance(session, SessionState::Completed);

        info!(snapshot = %session.snapshot, "recovery completed");
        Ok(())
    }

    /// Fetch one artifact and verify it against its manifest entry.
    async fn fetch_verified(
        &self,
        id: &SnapshotId,
        manifest: &Manifest,
        class: ArtifactClass,
    ) -> Result<Vec<u8>> {
        let entry = manifest
            .entry(class)
            .ok_or_else(|| FkError::integrity(id.to_string(), format!("manifest lacks {class}")))?;
        let bytes = self.transport.fetch_artifact(id, &entry.path).await?;
        let actual = sha256_bytes(&bytes);
        if actual != entry.sha256 {
            return Err(FkError::integrity(
                id.to_string(),
                format!("{class} artifact checksum mismatch"),
            ));
        }
        Ok(bytes)
    }

    /// Record a step failure in the session and alert. The session is
    /// the source of truth for what happened; the call itself returns
    /// Ok so callers inspect the session rather than unwind.
    async fn fail(
        &self,
        session: &mut RecoverySession,
        attempted: SessionState,
        cause: &FkError,
    ) -> Result<()> {
        error!(
            session = %session.id,
            attempted = %attempted,
            error = %cause,
            "recovery step failed"
        );
        session.failed_at = Some(attempted);
        session.failure = Some(cause.to_string());
        advance(session, SessionState::Failed);
        self.alerts
            .raise(Alert::new(
                AlertSeverity::Critical,
                "recovery-failed",
                format!(
                    "session {} failed while attempting {attempted}: {cause}",
                    session.id
                ),
            ))
            .await;
        Ok(())
    }

    /// Roll a failed session's configuration back to its captured
    /// rollback point.
    pub async fn rollback(&self, session: &mut RecoverySession) -> Result<()> {
        session.rollback_eligibility().map_err(|rejection| {
            FkError::RecoveryStep {
                state: session.state.to_string(),
                reason: format!("rollback rejected: {rejection}"),
            }
        })?;
        // Eligibility guarantees the point exists.
        let config_ref = session
            .rollback_point
            .as_ref()
            .map(|p| p.config_ref.clone())
            .ok_or_else(|| FkError::Internal("eligible session lost its rollback point".into()))?;
        self.target
            .rollback_config(&session.target_env, &config_ref)
            .await?;
        advance(session, SessionState::RolledBack);
        info!(session = %session.id, config_ref = %config_ref, "configuration rolled back");
        Ok(())
    }
}

fn advance(session: &mut RecoverySession, state: SessionState) {
    session.state = state;
    session.steps.push(StepRecord {
        state,
        at: Utc::now(),
    });
}
