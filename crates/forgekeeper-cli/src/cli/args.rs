//! Command-line argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::output::OutputFormat;

/// Backup tiering, integrity verification, and recovery orchestration
/// for a self-hosted collaboration forge.
///
/// Snapshots are pushed to append-only and WORM tiers the automated
/// credential cannot destroy; verify sweeps prove the copies are still
/// there, intact, and protected.
#[derive(Parser, Debug)]
#[command(name = "fkeeper")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file (or set FORGEKEEPER_CONFIG)
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum)]
    pub output: Option<OutputFormat>,

    /// Increase log verbosity
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress logs and informational output; structured output and
    /// exit codes still happen
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run an integrity sweep across the configured tiers
    Verify(VerifyArgs),

    /// Summarize tier health and the newest recoverable snapshot
    Status,

    /// Bundle the forge artifacts into a snapshot and push it to every tier
    Snapshot(SnapshotArgs),

    /// Run a supervised recovery into a target environment
    Restore(RestoreArgs),

    /// Apply retention, gated on the administrator credential
    Prune(PruneArgs),

    /// Score anomaly indicators against the automatic-recovery threshold
    Risk(RiskArgs),

    /// Rehearse a full restore into a throwaway target
    Drill(DrillArgs),

    /// Run the always-on loops: snapshot, WORM export, verify, retention
    Run,
}

// ============================================================================
// Verify command
// ============================================================================

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Verify a single tier instead of all of them
    #[arg(short, long)]
    pub tier: Option<String>,
}

// ============================================================================
// Snapshot command
// ============================================================================

#[derive(Args, Debug)]
pub struct SnapshotArgs {
    /// Service configuration bundle
    #[arg(long, value_name = "PATH")]
    pub config_bundle: PathBuf,

    /// Secrets and credentials bundle
    #[arg(long, value_name = "PATH")]
    pub secrets_bundle: PathBuf,

    /// Repository data archive
    #[arg(long, value_name = "PATH")]
    pub data_archive: PathBuf,
}

// ============================================================================
// Restore command
// ============================================================================

#[derive(Args, Debug)]
pub struct RestoreArgs {
    /// Snapshot id to restore (e.g. forge-prod-1-20260830T020000Z), or
    /// `latest` for the newest snapshot the preceding sweep proves
    /// recoverable
    pub snapshot: String,

    /// Skip the interactive confirmation prompt
    #[arg(long)]
    pub yes: bool,

    /// Non-interactive confirmation: must echo the exact snapshot id
    #[arg(long, value_name = "SNAPSHOT_ID", conflicts_with = "yes")]
    pub confirm: Option<String>,

    /// Target environment (defaults to target_env from config)
    #[arg(short, long)]
    pub target: Option<String>,

    /// Tier to restore from (defaults to the first recoverable tier)
    #[arg(long)]
    pub from_tier: Option<String>,
}

// ============================================================================
// Prune command
// ============================================================================

#[derive(Args, Debug)]
pub struct PruneArgs {
    /// Tier to prune
    #[arg(short, long)]
    pub tier: String,

    /// Administrator credential file for this invocation; remote tiers
    /// refuse to prune without it
    #[arg(long, value_name = "PATH")]
    pub admin_credential: Option<PathBuf>,

    /// Show what would be kept and deleted without deleting anything
    #[arg(long)]
    pub dry_run: bool,
}

// ============================================================================
// Risk command
// ============================================================================

#[derive(Args, Debug)]
pub struct RiskArgs {
    /// Anomaly indicator, repeatable (severity: low, medium, high)
    #[arg(short, long = "indicator", value_name = "NAME:SEVERITY[:DETAIL]")]
    pub indicators: Vec<String>,

    /// On a crossed threshold, run a sweep and park an approval-gated
    /// recovery session against the newest recoverable snapshot
    #[arg(long)]
    pub evaluate: bool,
}

// ============================================================================
// Drill command
// ============================================================================

#[derive(Args, Debug)]
pub struct DrillArgs {
    /// Tier to restore from (defaults to the first recoverable tier)
    #[arg(long)]
    pub from_tier: Option<String>,

    /// Override the configured drill target prefix
    #[arg(long)]
    pub target_prefix: Option<String>,
}
