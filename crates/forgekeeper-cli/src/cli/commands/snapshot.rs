//! `fkeeper snapshot` - bundle the forge artifacts and push to every tier.
//!
//! The payload is the three artifacts concatenated in manifest order;
//! the per-entry sizes in the manifest delimit them on the far side.

use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use colored::Colorize;
use serde::Serialize;

use forgekeeper::{
    ensure_complete, hash::sha256_bytes, ArtifactClass, FkError, Manifest, ManifestEntry,
    Snapshot, SnapshotId, SnapshotProducer, TierSpec, TierWriter, WriteCredential,
};

use super::Context;
use crate::cli::args::SnapshotArgs;
use crate::output::{render_structured, OutputFormat};

#[derive(Serialize)]
struct PushReport {
    snapshot: String,
    size_bytes: u64,
    checksum: String,
    tiers: Vec<TierPush>,
}

#[derive(Serialize)]
pub(super) struct TierPush {
    pub(super) tier: String,
    pub(super) ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) remote_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) error: Option<String>,
}

/// Produces snapshots from artifact files the backup job laid down.
pub struct FileArtifacts {
    source_host: String,
    config_bundle: PathBuf,
    secrets_bundle: PathBuf,
    data_archive: PathBuf,
}

impl FileArtifacts {
    pub fn new(
        source_host: impl Into<String>,
        config_bundle: impl Into<PathBuf>,
        secrets_bundle: impl Into<PathBuf>,
        data_archive: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source_host: source_host.into(),
            config_bundle: config_bundle.into(),
            secrets_bundle: secrets_bundle.into(),
            data_archive: data_archive.into(),
        }
    }
}

#[async_trait]
impl SnapshotProducer for FileArtifacts {
    async fn produce(&self) -> forgekeeper::Result<(Snapshot, Vec<u8>)> {
        let id = SnapshotId::new(&self.source_host, Utc::now());

        let mut entries = Vec::with_capacity(ArtifactClass::REQUIRED.len());
        let mut payload = Vec::new();
        let sources = [
            (ArtifactClass::Config, &self.config_bundle),
            (ArtifactClass::Secrets, &self.secrets_bundle),
            (ArtifactClass::DataArchive, &self.data_archive),
        ];
        for (class, source) in sources {
            let bytes = tokio::fs::read(source).await.map_err(|e| {
                FkError::Config(format!(
                    "cannot read {class} artifact {}: {e}",
                    source.display()
                ))
            })?;
            entries.push(ManifestEntry {
                class,
                path: artifact_name(class, source),
                size_bytes: bytes.len() as u64,
                sha256: sha256_bytes(&bytes),
            });
            payload.extend_from_slice(&bytes);
        }

        let snapshot = Snapshot {
            id,
            size_bytes: payload.len() as u64,
            checksum: sha256_bytes(&payload),
            manifest: Manifest { entries },
            tiers: Default::default(),
        };
        ensure_complete(&snapshot)?;
        Ok((snapshot, payload))
    }
}

pub async fn execute(ctx: Context, args: SnapshotArgs) -> Result<()> {
    let producer = FileArtifacts {
        source_host: ctx.config.source_host.clone(),
        config_bundle: args.config_bundle,
        secrets_bundle: args.secrets_bundle,
        data_archive: args.data_archive,
    };
    let (mut snapshot, payload) = producer.produce().await?;

    let mut pushes = Vec::with_capacity(ctx.config.tiers.len());
    for spec in &ctx.config.tiers {
        let push = push_tier(&ctx, spec, &snapshot, &payload).await;
        if push.ok {
            snapshot.confirm_tier(spec.name.clone());
        }
        pushes.push(push);
    }

    let report = PushReport {
        snapshot: snapshot.id.to_string(),
        size_bytes: snapshot.size_bytes,
        checksum: snapshot.checksum.clone(),
        tiers: pushes,
    };

    match ctx.output {
        OutputFormat::Pretty if !ctx.quiet => print_pushes_pretty(&report),
        OutputFormat::Pretty => {}
        format => println!("{}", render_structured(format, &report)?),
    }

    // A snapshot that only landed on the staging tier protects nothing.
    let any_recoverable = ctx
        .config
        .tiers
        .iter()
        .filter(|t| t.mode.counts_as_recoverable())
        .any(|t| snapshot.tiers.contains(&t.name));
    if !any_recoverable {
        return Err(FkError::transport(
            "snapshot",
            "no remote tier accepted the snapshot",
        )
        .into());
    }
    Ok(())
}

pub(super) async fn push_tier(
    ctx: &Context,
    spec: &TierSpec,
    snapshot: &Snapshot,
    payload: &[u8],
) -> TierPush {
    let failed = |error: String| TierPush {
        tier: spec.name.clone(),
        ok: false,
        remote_id: None,
        attempts: None,
        error: Some(error),
    };

    let transport = match ctx.transport(spec).await {
        Ok(t) => t,
        Err(e) => return failed(e.to_string()),
    };
    let credential = match WriteCredential::load(&spec.credential_path).await {
        Ok(c) => c,
        Err(e) => return failed(e.to_string()),
    };

    match TierWriter::new(transport, credential).push(snapshot, payload).await {
        Ok(receipt) => TierPush {
            tier: spec.name.clone(),
            ok: true,
            remote_id: Some(receipt.remote_id),
            attempts: Some(receipt.attempts),
            error: None,
        },
        Err(e) => failed(e.to_string()),
    }
}

/// Manifest path for an artifact: the source file name, or a canonical
/// name when the path has none.
fn artifact_name(class: ArtifactClass, source: &Path) -> String {
    source
        .file_name()
        .and_then(|n| n.to_str())
        .map_or_else(|| format!("{class}.tar"), ToString::to_string)
}

fn print_pushes_pretty(report: &PushReport) {
    println!("{} {}", "Snapshot:".bold(), report.snapshot.cyan().bold());
    println!("  {} {} bytes", "Size:".bold(), report.size_bytes);
    println!("  {} {}", "Checksum:".bold(), report.checksum);
    println!();
    for push in &report.tiers {
        if push.ok {
            let attempts = push.attempts.unwrap_or(1);
            let note = if attempts > 1 {
                format!(" ({attempts} attempts)")
            } else {
                String::new()
            };
            println!("  {} {}{note}", "pushed".green(), push.tier);
        } else {
            println!(
                "  {} {}: {}",
                "failed".red(),
                push.tier,
                push.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
}
