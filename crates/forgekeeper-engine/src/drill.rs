//! Restore drill: a full recovery rehearsal into a throwaway target.
//!
//! The drill exercises the exact production restore path, not a
//! simulation of it. The ephemeral target is torn down whether the
//! drill passes or fails; a teardown failure is reported but never
//! masks the drill result.

use chrono::Utc;
use tracing::{info, warn};

use forgekeeper_core::{FkError, RecoverySession, Result, SessionState, VerificationReport};

use crate::recovery::orchestrator::{RecoveryOrchestrator, RecoveryRequest};

/// Result of one drill run
#[derive(Debug)]
pub struct DrillOutcome {
    /// The session the rehearsal produced
    pub session: RecoverySession,

    /// True when the session reached `Completed`
    pub passed: bool,

    /// Teardown failure detail, if the ephemeral target survived
    pub teardown_failure: Option<String>,
}

/// Runs restore drills against ephemeral targets.
pub struct DrillRunner<'a> {
    orchestrator: &'a RecoveryOrchestrator,
    target_prefix: String,
}

impl<'a> DrillRunner<'a> {
    /// Create a runner; drill targets are named `<prefix>-<timestamp>`
    pub fn new(orchestrator: &'a RecoveryOrchestrator, target_prefix: impl Into<String>) -> Self {
        Self {
            orchestrator,
            target_prefix: target_prefix.into(),
        }
    }

    /// Rehearse a restore of the newest recoverable snapshot.
    ///
    /// # Errors
    ///
    /// Fails before provisioning anything when the report holds no
    /// recoverable snapshot.
    pub async fn run(&self, report: &VerificationReport) -> Result<DrillOutcome> {
        let snapshot = report.newest_recoverable().cloned().ok_or_else(|| {
            FkError::integrity("latest-sweep", "no recoverable snapshot to drill against")
        })?;
        let target_env = format!(
            "{}-{}",
            self.target_prefix,
            Utc::now().format("%Y%m%dT%H%M%SZ")
        );
        info!(target = %target_env, snapshot = %snapshot, "restore drill starting");

        // The drill supplies its own confirmation echo: there is no
        // human in the loop and the target is disposable.
        let request = RecoveryRequest {
            target_env: target_env.clone(),
            snapshot: snapshot.clone(),
            confirmation: snapshot.to_string(),
        };
        let run_result = self.orchestrator.run(request, report).await;

        // Teardown happens regardless of how the run went.
        let teardown_failure = match self.orchestrator.teardown_target(&target_env).await {
            Ok(()) => None,
            Err(e) => {
                warn!(target = %target_env, error = %e, "drill target teardown failed");
                Some(e.to_string())
            }
        };

        let session = run_result?;
        let passed = session.state == SessionState::Completed;
        if passed {
            info!(session = %session.id, "restore drill passed");
        } else {
            warn!(
                session = %session.id,
                failed_at = ?session.failed_at,
                "restore drill failed"
            );
        }
        Ok(DrillOutcome {
            session,
            passed,
            teardown_failure,
        })
    }
}
