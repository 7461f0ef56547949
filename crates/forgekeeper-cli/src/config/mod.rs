//! Configuration loading and startup validation.
//!
//! Configuration comes from a TOML file: `--config PATH`, else the
//! `FORGEKEEPER_CONFIG` environment variable, else `forgekeeper.toml`
//! in the working directory. Validation runs once at startup and is
//! fatal: a partially valid configuration protecting the wrong thing
//! is worse than a refusal to start.
//!
//! The administrator credential is deliberately absent here. It can
//! only arrive through a per-invocation command-line flag.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use forgekeeper::{FkError, TierMode, TierSpec};

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "FORGEKEEPER_CONFIG";

/// Default config file name, resolved against the working directory
pub const DEFAULT_CONFIG_FILE: &str = "forgekeeper.toml";

/// Risk aggregator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Sliding window for indicator scoring, in minutes
    #[serde(default = "default_risk_window")]
    pub window_minutes: u32,
}

const fn default_risk_window() -> u32 {
    60
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            window_minutes: default_risk_window(),
        }
    }
}

/// Cadences for the always-on loops, in minutes.
///
/// The WORM export runs coarser than the snapshot push; the export is
/// the expensive, cold-tier copy of an already-pushed snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Snapshot push to staging and append-only tiers
    #[serde(default = "default_snapshot_interval")]
    pub snapshot_interval_minutes: u32,

    /// Export to WORM tiers
    #[serde(default = "default_export_interval")]
    pub export_interval_minutes: u32,

    /// Full verification sweep
    #[serde(default = "default_verify_interval")]
    pub verify_interval_minutes: u32,

    /// Staging expiry and retention planning
    #[serde(default = "default_retention_interval")]
    pub retention_interval_minutes: u32,
}

const fn default_snapshot_interval() -> u32 {
    60
}

const fn default_export_interval() -> u32 {
    1440
}

const fn default_verify_interval() -> u32 {
    360
}

const fn default_retention_interval() -> u32 {
    1440
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            snapshot_interval_minutes: default_snapshot_interval(),
            export_interval_minutes: default_export_interval(),
            verify_interval_minutes: default_verify_interval(),
            retention_interval_minutes: default_retention_interval(),
        }
    }
}

/// Artifact files the backup job lays down; the snapshot and export
/// loops bundle these on every tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    /// Service configuration bundle
    pub config_bundle: PathBuf,

    /// Secrets and credentials bundle
    pub secrets_bundle: PathBuf,

    /// Repository data archive
    pub data_archive: PathBuf,
}

/// Restore drill settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrillConfig {
    /// Prefix for ephemeral drill target names
    #[serde(default = "default_drill_prefix")]
    pub target_prefix: String,
}

fn default_drill_prefix() -> String {
    "fkeeper-drill".to_string()
}

impl Default for DrillConfig {
    fn default() -> Self {
        Self {
            target_prefix: default_drill_prefix(),
        }
    }
}

/// Shell hooks the recovery orchestrator drives.
///
/// Each hook runs with `FK_TARGET_ENV` set; restore hooks additionally
/// receive artifact paths and rollback hooks the captured reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryHooks {
    /// Provision the target environment
    pub provision_cmd: String,

    /// Tear a drill target down again
    pub teardown_cmd: String,

    /// Capture current target configuration; prints a reference on stdout
    pub capture_config_cmd: String,

    /// Place config and secrets bundles (`FK_CONFIG_PATH`, `FK_SECRETS_PATH`)
    pub restore_config_cmd: String,

    /// Restore the data archive (`FK_DATA_PATH`)
    pub restore_data_cmd: String,

    /// Reconfigure the service against the restored state
    pub reconfigure_cmd: String,

    /// Re-apply a captured configuration (`FK_CONFIG_REF`)
    pub rollback_cmd: String,

    /// Health and readiness check
    pub health_cmd: String,
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host snapshots are taken from; becomes the snapshot id prefix
    pub source_host: String,

    /// Default recovery target environment
    pub target_env: String,

    /// Configured storage tiers, in verification order
    #[serde(default, rename = "tier")]
    pub tiers: Vec<TierSpec>,

    #[serde(default)]
    pub risk: RiskConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Artifact sources; `run` and the snapshot loops need them
    #[serde(default)]
    pub artifacts: Option<ArtifactsConfig>,

    #[serde(default)]
    pub drill: DrillConfig,

    /// Recovery hooks; restore and drill refuse to run without them
    #[serde(default)]
    pub recovery: Option<RecoveryHooks>,
}

impl Config {
    /// Resolve the config file path from flag, environment, or default
    #[must_use]
    pub fn resolve_path(flag: Option<&Path>) -> PathBuf {
        flag.map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Load and validate configuration.
    ///
    /// # Errors
    ///
    /// `FkError::Config` on unreadable file, parse failure, or any
    /// validation problem; every problem found is listed at once.
    pub fn load(path: &Path) -> Result<Self, FkError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FkError::Config(format!("cannot read config {}: {e}", path.display()))
        })?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| FkError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for problems; all are reported together.
    pub fn validate(&self) -> Result<(), FkError> {
        let mut problems = Vec::new();

        if self.source_host.is_empty() {
            problems.push("source_host is empty".to_string());
        }
        if self.target_env.is_empty() {
            problems.push("target_env is empty".to_string());
        }
        if self.tiers.is_empty() {
            problems.push("no [[tier]] entries configured".to_string());
        }
        if !self
            .tiers
            .iter()
            .any(|t| t.mode.counts_as_recoverable())
        {
            problems.push(
                "no append-only-remote or worm-remote tier; nothing would count as recoverable"
                    .to_string(),
            );
        }

        for (name, minutes) in [
            ("snapshot", self.schedule.snapshot_interval_minutes),
            ("export", self.schedule.export_interval_minutes),
            ("verify", self.schedule.verify_interval_minutes),
            ("retention", self.schedule.retention_interval_minutes),
        ] {
            if minutes == 0 {
                problems.push(format!("schedule: {name} interval must be positive"));
            }
        }
        if self.schedule.export_interval_minutes < self.schedule.snapshot_interval_minutes {
            problems.push(
                "schedule: export_interval_minutes is finer than snapshot_interval_minutes; \
                 the worm export is the coarser cadence"
                    .to_string(),
            );
        }

        let mut seen = std::collections::HashSet::new();
        for tier in &self.tiers {
            let at = format!("tier '{}'", tier.name);
            if !seen.insert(tier.name.as_str()) {
                problems.push(format!("{at}: duplicate name"));
            }
            if tier.endpoint.is_empty() {
                problems.push(format!("{at}: endpoint is empty"));
            }
            if tier.credential_path.as_os_str().is_empty() {
                problems.push(format!("{at}: credential_path is empty"));
            }
            if tier.max_snapshot_age_hours == 0 {
                problems.push(format!("{at}: max_snapshot_age_hours must be positive"));
            }
            if tier.retention.is_empty() {
                problems.push(format!(
                    "{at}: retention keeps nothing; pruning would delete every snapshot"
                ));
            }
            if tier.mode == TierMode::WormRemote && tier.retention.min_lock_days.is_none() {
                problems.push(format!("{at}: worm-remote tier needs retention.min_lock_days"));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(FkError::Config(format!(
                "invalid configuration:\n  - {}",
                problems.join("\n  - ")
            )))
        }
    }

    /// Look up a tier by name
    #[must_use]
    pub fn tier(&self, name: &str) -> Option<&TierSpec> {
        self.tiers.iter().find(|t| t.name == name)
    }

    /// The risk window as a chrono duration
    #[must_use]
    pub fn risk_window(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.risk.window_minutes))
    }
}
