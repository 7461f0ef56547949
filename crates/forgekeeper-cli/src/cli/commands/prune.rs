//! `fkeeper prune` - retention enforcement.
//!
//! Remote tiers only delete with the out-of-band administrator
//! credential, supplied per invocation via `--admin-credential`; the
//! automated write credential cannot reach this code path. Without the
//! flag only `--dry-run` planning is possible. The staging tier trusts
//! the host it lives on and expires by age instead of buckets.

use anyhow::Result;
use chrono::Utc;
use colored::Colorize;
use serde::Serialize;

use forgekeeper::{
    AdminCredential, FkError, RetentionEngine, SnapshotId, TierMode, TierSpec,
};

use super::Context;
use crate::cli::args::PruneArgs;
use crate::output::{render_structured, OutputFormat};

#[derive(Serialize)]
struct PruneReport {
    tier: String,
    dry_run: bool,
    kept: Vec<String>,
    deleted: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    refused: Vec<RefusedDeletion>,
}

#[derive(Serialize)]
struct RefusedDeletion {
    snapshot: String,
    reason: String,
}

pub async fn execute(ctx: Context, args: PruneArgs) -> Result<()> {
    let spec = ctx.tier_spec(&args.tier)?;
    let report = if spec.mode == TierMode::MutableLocal {
        expire_staging(&ctx, spec, &args).await?
    } else {
        prune_remote(&ctx, spec, &args).await?
    };

    match ctx.output {
        OutputFormat::Pretty if !ctx.quiet => print_prune_pretty(&report),
        OutputFormat::Pretty => {}
        format => println!("{}", render_structured(format, &report)?),
    }
    Ok(())
}

async fn prune_remote(ctx: &Context, spec: &TierSpec, args: &PruneArgs) -> Result<PruneReport> {
    let transport = ctx.transport(spec).await?;

    if args.dry_run {
        let archives = transport.list_archives(None).await?;
        let plan = RetentionEngine::plan(&spec.retention, &archives)?;
        return Ok(PruneReport {
            tier: spec.name.clone(),
            dry_run: true,
            kept: render_ids(&plan.kept),
            deleted: render_ids(&plan.prunable),
            refused: Vec::new(),
        });
    }

    let admin_path = args.admin_credential.as_deref().ok_or_else(|| {
        FkError::Config(format!(
            "tier '{}' deletes only with --admin-credential; use --dry-run to preview",
            spec.name
        ))
    })?;
    let admin = AdminCredential::load(admin_path).await?;

    let outcome = RetentionEngine::prune(&transport, spec.mode, &spec.retention, &admin).await?;
    Ok(PruneReport {
        tier: outcome.tier,
        dry_run: false,
        kept: render_ids(&outcome.kept),
        deleted: render_ids(&outcome.deleted),
        refused: outcome
            .refused
            .into_iter()
            .map(|(id, reason)| RefusedDeletion {
                snapshot: id.to_string(),
                reason,
            })
            .collect(),
    })
}

/// Staging expiry: age-based, using the tier's own credential since the
/// directory lives on the host anyway.
async fn expire_staging(ctx: &Context, spec: &TierSpec, args: &PruneArgs) -> Result<PruneReport> {
    let transport = ctx.transport(spec).await?;
    let max_age = spec.max_snapshot_age();

    if args.dry_run {
        let now = Utc::now();
        let archives = transport.list_archives(None).await?;
        let (expired, kept): (Vec<_>, Vec<_>) = archives
            .into_iter()
            .partition(|e| now - e.id.created_at > max_age);
        return Ok(PruneReport {
            tier: spec.name.clone(),
            dry_run: true,
            kept: kept.iter().map(|e| e.id.to_string()).collect(),
            deleted: expired.iter().map(|e| e.id.to_string()).collect(),
            refused: Vec::new(),
        });
    }

    let admin = AdminCredential::load(&spec.credential_path).await?;
    let expired = RetentionEngine::expire_staging(&transport, spec.mode, max_age, &admin).await?;
    let remaining = transport.list_archives(None).await?;
    Ok(PruneReport {
        tier: spec.name.clone(),
        dry_run: false,
        kept: remaining.iter().map(|e| e.id.to_string()).collect(),
        deleted: render_ids(&expired),
        refused: Vec::new(),
    })
}

fn render_ids(ids: &[SnapshotId]) -> Vec<String> {
    ids.iter().map(ToString::to_string).collect()
}

fn print_prune_pretty(report: &PruneReport) {
    let verb = if report.dry_run {
        "would delete".yellow()
    } else {
        "deleted".red()
    };
    println!(
        "{} {}: keeping {}, {verb} {}",
        "Tier".bold(),
        report.tier,
        report.kept.len(),
        report.deleted.len()
    );
    for id in &report.deleted {
        println!("  {} {id}", "-".red());
    }
    for refusal in &report.refused {
        println!(
            "  {} {} refused: {}",
            "!".yellow(),
            refusal.snapshot,
            refusal.reason
        );
    }
    if report.dry_run {
        println!();
        println!(
            "{}",
            "Dry run; re-run with --admin-credential to delete.".dimmed()
        );
    }
}
