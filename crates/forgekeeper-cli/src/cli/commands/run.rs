//! `fkeeper run` - the always-on duty loops.
//!
//! Snapshot pushing, WORM export, verification, and retention each run
//! on their own cadence from `[schedule]`; a slow tier delays only its
//! own loop. The WORM export runs coarser than the snapshot push and
//! raises a critical alert whenever the store takes an object without
//! its retention lock.

use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tracing::{info, warn};

use forgekeeper::{
    AdminCredential, Alert, AlertSeverity, AlertSink, FkError, ImmutableTierWriter,
    ObjectStoreClient, RepoTransport, RetentionEngine, Scheduler, Snapshot, SnapshotId,
    SnapshotProducer, TierMode, TierSpec, WriteCredential,
};

use super::snapshot::{push_tier, FileArtifacts};
use super::Context;
use crate::config::ArtifactsConfig;

pub async fn execute(ctx: Context) -> Result<()> {
    let artifacts = ctx.config.artifacts.clone().ok_or_else(|| {
        FkError::Config("no [artifacts] section; the run loops need the bundle paths".into())
    })?;
    let schedule = ctx.config.schedule.clone();

    let mut scheduler = Scheduler::new();

    {
        let ctx = ctx.clone();
        let artifacts = artifacts.clone();
        scheduler.every(
            "snapshot",
            minutes(schedule.snapshot_interval_minutes),
            move || {
                let ctx = ctx.clone();
                let artifacts = artifacts.clone();
                async move {
                    if let Err(e) = snapshot_tick(&ctx, &artifacts).await {
                        warn!(error = %e, "snapshot loop tick failed");
                    }
                }
            },
        );
    }

    {
        let ctx = ctx.clone();
        let artifacts = artifacts.clone();
        scheduler.every(
            "worm-export",
            minutes(schedule.export_interval_minutes),
            move || {
                let ctx = ctx.clone();
                let artifacts = artifacts.clone();
                async move {
                    if let Err(e) = export_tick(&ctx, &artifacts).await {
                        warn!(error = %e, "worm export tick failed");
                    }
                }
            },
        );
    }

    {
        let ctx = ctx.clone();
        scheduler.every(
            "verify",
            minutes(schedule.verify_interval_minutes),
            move || {
                let ctx = ctx.clone();
                async move {
                    if let Err(e) = verify_tick(&ctx).await {
                        warn!(error = %e, "verification tick failed");
                    }
                }
            },
        );
    }

    {
        let ctx = ctx.clone();
        scheduler.every(
            "retention",
            minutes(schedule.retention_interval_minutes),
            move || {
                let ctx = ctx.clone();
                async move { retention_tick(&ctx).await }
            },
        );
    }

    info!(loops = ?scheduler.running(), "forgekeeper running; ctrl-c stops");
    tokio::signal::ctrl_c().await?;
    scheduler.shutdown();
    info!("forgekeeper stopped");
    Ok(())
}

fn minutes(m: u32) -> Duration {
    Duration::from_secs(u64::from(m) * 60)
}

/// One Tier Writer pass: bundle the artifacts, push to the staging and
/// append-only tiers. The WORM tiers belong to the export loop.
async fn snapshot_tick(ctx: &Context, artifacts: &ArtifactsConfig) -> Result<()> {
    let (mut snapshot, payload) = produce(ctx, artifacts).await?;
    for spec in ctx
        .config
        .tiers
        .iter()
        .filter(|t| t.mode != TierMode::WormRemote)
    {
        let push = push_tier(ctx, spec, &snapshot, &payload).await;
        if push.ok {
            snapshot.confirm_tier(spec.name.clone());
            info!(tier = %push.tier, snapshot = %snapshot.id, "scheduled snapshot pushed");
        } else {
            let detail = push.error.unwrap_or_else(|| "unknown error".into());
            warn!(tier = %push.tier, error = %detail, "scheduled snapshot push failed");
            ctx.alerts()
                .raise(Alert::new(
                    AlertSeverity::Warning,
                    "snapshot-push-failed",
                    format!("tier {}: {detail}", push.tier),
                ))
                .await;
        }
    }
    Ok(())
}

/// One Immutable Tier Writer pass over every WORM tier.
async fn export_tick(ctx: &Context, artifacts: &ArtifactsConfig) -> Result<()> {
    let worm: Vec<&TierSpec> = ctx
        .config
        .tiers
        .iter()
        .filter(|t| t.mode == TierMode::WormRemote)
        .collect();
    if worm.is_empty() {
        return Ok(());
    }

    let (snapshot, payload) = produce(ctx, artifacts).await?;
    for spec in worm {
        if let Err(e) = export_to(ctx, spec, &snapshot, payload.clone()).await {
            warn!(tier = %spec.name, error = %e, "worm export failed");
        }
    }
    Ok(())
}

async fn export_to(
    ctx: &Context,
    spec: &TierSpec,
    snapshot: &Snapshot,
    payload: Vec<u8>,
) -> Result<()> {
    let retain_days = lock_days(spec)?;
    let client = ObjectStoreClient::builder(&spec.name, &spec.endpoint).build()?;
    let credential = WriteCredential::load(&spec.credential_path).await?;
    let writer = ImmutableTierWriter::new(client, credential, retain_days);

    let receipt = writer.export(snapshot, payload).await?;
    if receipt.lock_applied {
        info!(tier = %spec.name, key = %receipt.object_key, "worm export locked");
    } else {
        // The object landed but is deletable. Never count it as a
        // protected copy; the operator has to chase the store.
        ctx.alerts()
            .raise(Alert::new(
                AlertSeverity::Critical,
                "worm-export-unlocked",
                format!(
                    "tier {}: object {} stored without its retention lock and is not \
                     ransomware-protected",
                    spec.name, receipt.object_key
                ),
            ))
            .await;
    }
    Ok(())
}

/// One full verification sweep. The verifier raises its own alerts;
/// this only records the pass.
async fn verify_tick(ctx: &Context) -> Result<()> {
    let verifier = ctx.verifier().await?;
    let report = verifier.verify_all().await;
    info!(
        overall = %report.overall,
        newest = report
            .newest_recoverable()
            .map_or_else(|| "none".to_string(), ToString::to_string),
        "scheduled verification sweep complete"
    );
    Ok(())
}

/// One Retention Manager pass. The automated credential cannot delete
/// on remote tiers, so this expires staging, reports what a prune
/// would remove, and keeps the WORM locks from lapsing on kept
/// snapshots.
async fn retention_tick(ctx: &Context) {
    for spec in &ctx.config.tiers {
        if let Err(e) = retention_pass(ctx, spec).await {
            warn!(tier = %spec.name, error = %e, "retention pass failed");
        }
    }
}

async fn retention_pass(ctx: &Context, spec: &TierSpec) -> Result<()> {
    let transport = ctx.transport(spec).await?;
    match spec.mode {
        TierMode::MutableLocal => {
            let admin = AdminCredential::load(&spec.credential_path).await?;
            let expired = RetentionEngine::expire_staging(
                transport.as_ref(),
                spec.mode,
                spec.max_snapshot_age(),
                &admin,
            )
            .await?;
            if !expired.is_empty() {
                info!(tier = %spec.name, expired = expired.len(), "staging snapshots expired");
            }
        }
        TierMode::AppendOnlyRemote | TierMode::WormRemote => {
            let archives = transport.list_archives(None).await?;
            let plan = RetentionEngine::plan(&spec.retention, &archives)?;
            if !plan.prunable.is_empty() {
                ctx.alerts()
                    .raise(Alert::new(
                        AlertSeverity::Info,
                        "retention-pending",
                        format!(
                            "tier {}: {} snapshots past retention; run `fkeeper prune --tier {}` \
                             with the administrator credential",
                            spec.name,
                            plan.prunable.len(),
                            spec.name
                        ),
                    ))
                    .await;
            }
            if spec.mode == TierMode::WormRemote {
                maintain_locks(spec, &plan.kept).await?;
            }
        }
    }
    Ok(())
}

/// Keep every retained WORM snapshot locked at least `min_lock_days`
/// out. Locks only ever lengthen; prunable snapshots are left to lapse.
async fn maintain_locks(spec: &TierSpec, kept: &[SnapshotId]) -> Result<()> {
    let retain_days = lock_days(spec)?;
    let client = ObjectStoreClient::builder(&spec.name, &spec.endpoint).build()?;
    let credential = WriteCredential::load(&spec.credential_path).await?;
    let writer = ImmutableTierWriter::new(client.clone(), credential, retain_days);

    let horizon = Utc::now() + chrono::Duration::days(i64::from(retain_days));
    for id in kept {
        let key = id.to_string();
        let meta = client.head(&key).await?;
        if meta.lock_until.map_or(true, |until| until < horizon) {
            let extended = writer.extend_lock(&key, retain_days).await?;
            info!(tier = %spec.name, key = %key, lock_until = %extended, "retention lock extended");
        }
    }
    Ok(())
}

fn lock_days(spec: &TierSpec) -> Result<u32, FkError> {
    spec.retention.min_lock_days.ok_or_else(|| {
        FkError::Config(format!(
            "tier '{}': worm-remote needs retention.min_lock_days",
            spec.name
        ))
    })
}

async fn produce(ctx: &Context, artifacts: &ArtifactsConfig) -> Result<(Snapshot, Vec<u8>)> {
    let producer = FileArtifacts::new(
        ctx.config.source_host.clone(),
        &artifacts.config_bundle,
        &artifacts.secrets_bundle,
        &artifacts.data_archive,
    );
    Ok(producer.produce().await?)
}
