//! `fkeeper verify` - integrity sweep across the configured tiers.

use anyhow::Result;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use forgekeeper::{FkError, OverallStatus, VerificationReport, VerifyStatus};

use super::Context;
use crate::cli::args::VerifyArgs;
use crate::output::{render_structured, OutputFormat};

#[derive(Tabled)]
struct TierRow {
    #[tabled(rename = "Tier")]
    tier: String,
    #[tabled(rename = "Mode")]
    mode: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Newest snapshot")]
    snapshot: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

pub async fn execute(ctx: Context, args: VerifyArgs) -> Result<()> {
    let verifier = ctx.verifier().await?;
    let report = match &args.tier {
        Some(name) => {
            let spec = ctx.tier_spec(name)?;
            let handle = ctx.handle(spec).await?;
            let started_at = chrono::Utc::now();
            let result = verifier.verify_tier(&handle).await;
            VerificationReport::new(vec![result], started_at)
        }
        None => verifier.verify_all().await,
    };

    match ctx.output {
        OutputFormat::Pretty if !ctx.quiet => print_report_pretty(&report),
        OutputFormat::Pretty => {}
        format => println!("{}", render_structured(format, &report)?),
    }

    // Any failed check fails the invocation so cron and CI notice;
    // exit 0 is reserved for an all-clean sweep.
    match sweep_error(&report) {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

/// Map a sweep with failed checks onto the error for the worst one.
///
/// Integrity-class failures (corrupt, stale, violated policy) outrank
/// transport-class ones (unreachable), matching the exit codes: 4 says
/// the copies themselves are suspect, 3 says a tier could not be asked.
fn sweep_error(report: &VerificationReport) -> Option<FkError> {
    if report.overall == OverallStatus::Critical {
        return Some(FkError::integrity(
            "latest-sweep",
            "no recoverable copy on any remote tier",
        ));
    }

    let mut unreachable = None;
    let mut suspect = None;
    for result in &report.results {
        let failing = match result.status {
            VerifyStatus::Ok => continue,
            VerifyStatus::Unreachable => &mut unreachable,
            VerifyStatus::Stale | VerifyStatus::Corrupt | VerifyStatus::PolicyViolation => {
                &mut suspect
            }
        };
        if failing.is_none() {
            *failing = Some(result);
        }
    }

    if let Some(result) = suspect {
        return Some(FkError::integrity(
            &result.tier,
            failure_detail(result),
        ));
    }
    unreachable.map(|result| FkError::transport(&result.tier, failure_detail(result)))
}

fn failure_detail(result: &forgekeeper::VerificationResult) -> String {
    match &result.detail {
        Some(detail) => format!("{}: {detail}", result.status),
        None => result.status.to_string(),
    }
}

fn print_report_pretty(report: &VerificationReport) {
    let rows: Vec<TierRow> = report
        .results
        .iter()
        .map(|r| TierRow {
            tier: r.tier.clone(),
            mode: r.tier_mode.to_string(),
            status: colorize_status(r.status),
            snapshot: r
                .snapshot_id
                .as_ref()
                .map_or_else(|| "-".to_string(), ToString::to_string),
            detail: r.detail.clone().unwrap_or_default(),
        })
        .collect();

    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
    println!();

    let overall = match report.overall {
        OverallStatus::Ok => "ok".green().bold(),
        OverallStatus::Degraded => "degraded".yellow().bold(),
        OverallStatus::Critical => "critical".red().bold(),
    };
    println!("{} {overall}", "Overall:".bold());

    match report.newest_recoverable() {
        Some(id) => println!("{} {id}", "Newest recoverable:".bold()),
        None => println!(
            "{} {}",
            "Newest recoverable:".bold(),
            "none - no intact copy on a protected tier".red()
        ),
    }
}

fn colorize_status(status: VerifyStatus) -> String {
    match status {
        VerifyStatus::Ok => status.to_string().green().to_string(),
        VerifyStatus::Stale => status.to_string().yellow().to_string(),
        VerifyStatus::Unreachable | VerifyStatus::Corrupt => {
            status.to_string().red().to_string()
        }
        VerifyStatus::PolicyViolation => status.to_string().red().bold().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use forgekeeper::{SnapshotId, TierMode, VerificationResult};

    fn result(tier: &str, mode: TierMode, status: VerifyStatus) -> VerificationResult {
        VerificationResult {
            tier: tier.into(),
            tier_mode: mode,
            snapshot_id: Some(SnapshotId::new(
                "forge",
                Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            )),
            checked_at: Utc::now(),
            status,
            detail: None,
        }
    }

    #[test]
    fn clean_sweep_is_not_an_error() {
        let report = VerificationReport::new(
            vec![result("vault", TierMode::WormRemote, VerifyStatus::Ok)],
            Utc::now(),
        );
        assert!(sweep_error(&report).is_none());
    }

    #[test]
    fn degraded_by_unreachable_tier_exits_transport() {
        // One tier down, another still holding a good copy: degraded,
        // but the invocation must not exit 0 with a failed check in it.
        let report = VerificationReport::new(
            vec![
                result("offsite", TierMode::AppendOnlyRemote, VerifyStatus::Unreachable),
                result("vault", TierMode::WormRemote, VerifyStatus::Ok),
            ],
            Utc::now(),
        );
        assert_eq!(report.overall, OverallStatus::Degraded);
        let err = sweep_error(&report).unwrap();
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("offsite"));
    }

    #[test]
    fn corrupt_copy_outranks_unreachable_tier() {
        let report = VerificationReport::new(
            vec![
                result("offsite", TierMode::AppendOnlyRemote, VerifyStatus::Unreachable),
                result("mirror", TierMode::AppendOnlyRemote, VerifyStatus::Corrupt),
                result("vault", TierMode::WormRemote, VerifyStatus::Ok),
            ],
            Utc::now(),
        );
        let err = sweep_error(&report).unwrap();
        assert_eq!(err.exit_code(), 4);
        assert!(err.to_string().contains("mirror"));
    }

    #[test]
    fn critical_sweep_exits_integrity() {
        let report = VerificationReport::new(
            vec![result(
                "offsite",
                TierMode::AppendOnlyRemote,
                VerifyStatus::Unreachable,
            )],
            Utc::now(),
        );
        assert_eq!(report.overall, OverallStatus::Critical);
        assert_eq!(sweep_error(&report).unwrap().exit_code(), 4);
    }
}
