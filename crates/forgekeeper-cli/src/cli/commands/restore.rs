//! `fkeeper restore` - supervised recovery into a target environment.
//!
//! A fresh verification sweep always precedes the restore: the snapshot
//! must be recoverable *now*, not at some point in the past. The
//! operator confirms by echoing the exact snapshot id, interactively or
//! via `--confirm`; `--yes` skips the echo for unattended runs. With
//! `latest` the sweep itself picks the snapshot, so the confirmation
//! echo is always against the resolved concrete id.

use anyhow::Result;
use colored::Colorize;

use forgekeeper::{
    FkError, RecoveryRequest, RecoverySession, SessionState, SnapshotId, VerificationReport,
};

use super::Context;
use crate::cli::args::RestoreArgs;
use crate::output::{render_structured, OutputFormat};

/// Sentinel resolving to the newest recoverable snapshot
const LATEST: &str = "latest";

pub async fn execute(ctx: Context, args: RestoreArgs) -> Result<()> {
    // An explicit id must parse before any tier is touched; `latest`
    // can only resolve once the sweep has run.
    let requested = match args.snapshot.as_str() {
        LATEST => None,
        raw => Some(raw.parse::<SnapshotId>().map_err(FkError::Config)?),
    };
    let spec = ctx.restore_tier(args.from_tier.as_deref())?;
    let target_env = args
        .target
        .clone()
        .unwrap_or_else(|| ctx.config.target_env.clone());

    let verifier = ctx.verifier().await?;
    let report = verifier.verify_all().await;
    let snapshot = resolve_snapshot(requested, &report)?;
    let confirmation = confirmation_token(&args, &snapshot, &target_env)?;

    let orchestrator = ctx.orchestrator(spec).await?;
    let request = RecoveryRequest {
        target_env,
        snapshot,
        confirmation,
    };
    let mut session = orchestrator.run(request, &report).await?;

    // The session is gone when this process exits, so a rollback-
    // eligible failure rolls back now or never.
    let mut rollback_error = None;
    if session.state == SessionState::Failed && session.rollback_eligibility().is_ok() {
        if let Err(e) = orchestrator.rollback(&mut session).await {
            rollback_error = Some(e.to_string());
        }
    }

    match ctx.output {
        OutputFormat::Pretty if !ctx.quiet => {
            print_session_pretty(&session, rollback_error.as_deref());
        }
        OutputFormat::Pretty => {}
        format => println!("{}", render_structured(format, &session)?),
    }

    match session.state {
        SessionState::Completed => Ok(()),
        state => Err(FkError::RecoveryStep {
            state: state.to_string(),
            reason: session
                .failure
                .clone()
                .unwrap_or_else(|| "recovery did not complete".into()),
        }
        .into()),
    }
}

/// Pick the snapshot to restore: the explicit id, or for `latest` the
/// newest one the sweep lists as recoverable.
fn resolve_snapshot(
    requested: Option<SnapshotId>,
    report: &VerificationReport,
) -> std::result::Result<SnapshotId, FkError> {
    match requested {
        Some(id) => Ok(id),
        None => report.newest_recoverable().cloned().ok_or_else(|| {
            FkError::Config(
                "cannot resolve 'latest': the sweep found no recoverable snapshot".into(),
            )
        }),
    }
}

/// The confirmation token handed to the orchestrator.
///
/// `--yes` supplies the resolved id itself; `--confirm` passes the
/// operator's echo through unaltered, so a mismatch still fails
/// validation; otherwise the operator types the id at a prompt.
fn confirmation_token(
    args: &RestoreArgs,
    snapshot: &SnapshotId,
    target_env: &str,
) -> std::result::Result<String, FkError> {
    if args.yes {
        return Ok(snapshot.to_string());
    }
    if let Some(echo) = &args.confirm {
        return Ok(echo.clone());
    }
    prompt_for_id(snapshot, target_env)
}

/// Interactive confirmation on stderr, so stdout stays parseable.
fn prompt_for_id(
    snapshot: &SnapshotId,
    target_env: &str,
) -> std::result::Result<String, FkError> {
    use std::io::{BufRead, Write};

    let mut stderr = std::io::stderr();
    write!(
        stderr,
        "About to restore {snapshot} into '{target_env}'.\nType the snapshot id to confirm: "
    )?;
    stderr.flush()?;

    let mut echo = String::new();
    std::io::stdin().lock().read_line(&mut echo)?;
    Ok(echo.trim().to_string())
}

pub(super) fn print_session_pretty(session: &RecoverySession, rollback_error: Option<&str>) {
    println!("{} {}", "Session:".bold(), session.id.cyan().bold());
    println!("  {} {}", "Snapshot:".bold(), session.snapshot);
    println!("  {} {}", "Target:".bold(), session.target_env);
    println!();
    for step in &session.steps {
        println!(
            "  {} {} ({})",
            "✓".green(),
            step.state,
            step.at.format("%H:%M:%S")
        );
    }

    match session.state {
        SessionState::Completed => {
            println!();
            println!("{}", "Recovery completed.".green().bold());
        }
        SessionState::RolledBack => {
            println!();
            println!(
                "{} failed at {}, configuration rolled back",
                "Recovery".yellow().bold(),
                session
                    .failed_at
                    .map_or_else(|| "unknown".to_string(), |s| s.to_string())
            );
            if let Some(failure) = &session.failure {
                println!("  {failure}");
            }
        }
        SessionState::Failed => {
            println!();
            println!(
                "{} at {}",
                "Recovery failed".red().bold(),
                session
                    .failed_at
                    .map_or_else(|| "unknown".to_string(), |s| s.to_string())
            );
            if let Some(failure) = &session.failure {
                println!("  {failure}");
            }
            match session.rollback_eligibility() {
                Ok(()) => {}
                Err(rejection) => println!("  no rollback: {rejection}"),
            }
            if let Some(error) = rollback_error {
                println!("  rollback attempt failed: {error}");
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use forgekeeper::{TierMode, VerificationResult, VerifyStatus};

    fn recoverable(tier: &str, hour: u32) -> VerificationResult {
        VerificationResult {
            tier: tier.into(),
            tier_mode: TierMode::AppendOnlyRemote,
            snapshot_id: Some(SnapshotId::new(
                "forge",
                Utc.with_ymd_and_hms(2026, 8, 30, hour, 0, 0).unwrap(),
            )),
            checked_at: Utc::now(),
            status: VerifyStatus::Ok,
            detail: None,
        }
    }

    fn args(snapshot: &str, yes: bool, confirm: Option<&str>) -> RestoreArgs {
        RestoreArgs {
            snapshot: snapshot.into(),
            yes,
            confirm: confirm.map(Into::into),
            target: None,
            from_tier: None,
        }
    }

    #[test]
    fn latest_resolves_to_the_newest_recoverable_snapshot() {
        let report = VerificationReport::new(
            vec![recoverable("offsite", 2), recoverable("vault", 4)],
            Utc::now(),
        );
        let id = resolve_snapshot(None, &report).unwrap();
        assert_eq!(id.to_string(), "forge-20260830T040000Z");
    }

    #[test]
    fn latest_without_a_recoverable_copy_is_refused() {
        let mut down = recoverable("offsite", 2);
        down.status = VerifyStatus::Unreachable;
        let report = VerificationReport::new(vec![down], Utc::now());
        let err = resolve_snapshot(None, &report).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("latest"));
    }

    #[test]
    fn explicit_id_is_not_second_guessed() {
        let report = VerificationReport::new(vec![recoverable("vault", 4)], Utc::now());
        let wanted = SnapshotId::new("forge", Utc.with_ymd_and_hms(2026, 8, 29, 2, 0, 0).unwrap());
        let id = resolve_snapshot(Some(wanted.clone()), &report).unwrap();
        assert_eq!(id, wanted);
    }

    #[test]
    fn yes_confirms_with_the_resolved_id() {
        let id = SnapshotId::new("forge", Utc.with_ymd_and_hms(2026, 8, 30, 4, 0, 0).unwrap());
        let token = confirmation_token(&args("latest", true, None), &id, "production").unwrap();
        assert_eq!(token, id.to_string());
    }

    #[test]
    fn confirm_echo_passes_through_unaltered() {
        // A wrong echo must reach the orchestrator as typed, so its
        // byte-equality check rejects the restore.
        let id = SnapshotId::new("forge", Utc.with_ymd_and_hms(2026, 8, 30, 4, 0, 0).unwrap());
        let token =
            confirmation_token(&args("latest", false, Some("forge-wrong")), &id, "production")
                .unwrap();
        assert_eq!(token, "forge-wrong");
    }
}
