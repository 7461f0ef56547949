//! Scheduled integrity verification across every configured tier.
//!
//! A sweep inspects each tier independently: reachability, freshness of
//! the newest snapshot, manifest completeness, a sampled checksum
//! recomputation, and on append-only and WORM tiers the enforcement
//! probe. Checksum sampling is deterministic over the repository
//! contents, so two sweeps with no intervening writes produce the same
//! outcome for every tier.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};

use forgekeeper_core::{OverallStatus, VerificationReport, VerificationResult, VerifyStatus};
use forgekeeper_tiers::{DeleteAttempt, RepoTransport, WriteCredential};

use crate::alert::{Alert, AlertSeverity, AlertSink};

/// Object name used for the enforcement probe. It never corresponds to
/// a real archive, so a broken remote that honors the delete loses
/// nothing while still revealing itself.
pub const PROBE_OBJECT: &str = "fk-probe";

/// Tunables for a verification sweep
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Object name the enforcement probe attempts to delete
    pub probe_object: String,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            probe_object: PROBE_OBJECT.to_string(),
        }
    }
}

/// One tier as seen by the verifier
pub struct TierHandle {
    /// Transport to the tier
    pub transport: Arc<dyn RepoTransport>,

    /// Mutability mode, copied into every result
    pub mode: forgekeeper_core::TierMode,

    /// Freshness threshold for the newest snapshot
    pub max_snapshot_age: chrono::Duration,

    /// Automated write credential for this tier
    pub credential: WriteCredential,
}

/// Runs verification sweeps and raises alerts on guarantee loss.
pub struct Verifier {
    tiers: Vec<TierHandle>,
    config: VerifierConfig,
    alerts: Arc<dyn AlertSink>,
}

impl Verifier {
    /// Build a verifier over the configured tiers
    pub fn new(tiers: Vec<TierHandle>, config: VerifierConfig, alerts: Arc<dyn AlertSink>) -> Self {
        Self {
            tiers,
            config,
            alerts,
        }
    }

    /// Run one full sweep. Individual tier failures fold into their
    /// result; this method itself does not fail.
    pub async fn verify_all(&self) -> VerificationReport {
        let started_at = Utc::now();
        let mut results = Vec::with_capacity(self.tiers.len());
        for tier in &self.tiers {
            results.push(self.verify_tier(tier).await);
        }
        let report = VerificationReport::new(results, started_at);

        match report.overall {
            OverallStatus::Ok => {
                info!(tiers = report.results.len(), "verification sweep ok");
            }
            OverallStatus::Degraded => {
                warn!("verification sweep degraded");
                self.alerts
                    .raise(Alert::new(
                        AlertSeverity::Warning,
                        "tier-degraded",
                        summarize_failures(&report),
                    ))
                    .await;
            }
            OverallStatus::Critical => {
                warn!("verification sweep critical");
                self.alerts
                    .raise(Alert::new(
                        AlertSeverity::Critical,
                        "no-recoverable-copy",
                        summarize_failures(&report),
                    ))
                    .await;
            }
        }
        report
    }

    /// Verify a single tier.
    #[instrument(skip_all, fields(tier = tier.transport.tier_name()))]
    pub async fn verify_tier(&self, tier: &TierHandle) -> VerificationResult {
        let name = tier.transport.tier_name().to_string();
        let checked_at = Utc::now();
        let fail = |snapshot_id, status, detail: String| VerificationResult {
            tier: name.clone(),
            tier_mode: tier.mode,
            snapshot_id,
            checked_at,
            status,
            detail: Some(detail),
        };

        if let Err(e) = tier.transport.ping().await {
            return fail(None, VerifyStatus::Unreachable, e.to_string());
        }

        let archives = match tier.transport.list_archives(None).await {
            Ok(a) => a,
            Err(e) => return fail(None, VerifyStatus::Unreachable, e.to_string()),
        };
        let Some(newest) = archives.last().cloned() else {
            return fail(None, VerifyStatus::Stale, "tier holds no snapshots".into());
        };
        let newest_id = Some(newest.id.clone());

        let age = checked_at - newest.id.created_at;
        if age > tier.max_snapshot_age {
            return fail(
                newest_id,
                VerifyStatus::Stale,
                format!("newest snapshot is {}h old", age.num_hours()),
            );
        }

        match tier.transport.fetch_manifest(&newest.id).await {
            Ok(manifest) => {
                let missing = manifest.missing_classes();
                if !missing.is_empty() {
                    let classes: Vec<String> =
                        missing.iter().map(ToString::to_string).collect();
                    return fail(
                        newest_id,
                        VerifyStatus::Corrupt,
                        format!("manifest missing classes: {}", classes.join(", ")),
                    );
                }
            }
            Err(e) => {
                return fail(
                    newest_id,
                    VerifyStatus::Corrupt,
                    format!("manifest unreadable: {e}"),
                );
            }
        }

        for entry in sample_archives(&archives) {
            match tier.transport.recompute_checksum(&entry.id).await {
                Ok(actual) if actual == entry.checksum => {}
                Ok(actual) => {
                    return fail(
                        newest_id,
                        VerifyStatus::Corrupt,
                        format!(
                            "checksum mismatch on {}: recorded {} recomputed {actual}",
                            entry.id, entry.checksum
                        ),
                    );
                }
                Err(e) => {
                    return fail(
                        newest_id,
                        VerifyStatus::Unreachable,
                        format!("checksum recompute failed: {e}"),
                    );
                }
            }
        }

        if tier.mode.counts_as_recoverable() {
            match tier
                .transport
                .attempt_delete(&tier.credential, &self.config.probe_object)
                .await
            {
                Ok(DeleteAttempt::Denied) => {}
                Ok(DeleteAttempt::Deleted) => {
                    // The remote honored a delete from the automated
                    // credential. Every copy on this tier is erasable
                    // by an attacker holding that credential.
                    self.alerts
                        .raise(Alert::new(
                            AlertSeverity::Critical,
                            "policy-violation",
                            format!("tier '{name}' honored a delete from the write credential"),
                        ))
                        .await;
                    return fail(
                        newest_id,
                        VerifyStatus::PolicyViolation,
                        "write credential was able to delete".into(),
                    );
                }
                Err(e) => {
                    return fail(
                        newest_id,
                        VerifyStatus::Unreachable,
                        format!("enforcement probe failed: {e}"),
                    );
                }
            }
        }

        VerificationResult {
            tier: name,
            tier_mode: tier.mode,
            snapshot_id: newest_id,
            checked_at,
            status: VerifyStatus::Ok,
            detail: None,
        }
    }
}

/// Deterministic checksum sample: always the newest archive, plus one
/// older archive chosen by the newest timestamp modulo the count. No
/// randomness, so repeated sweeps over unchanged contents sample the
/// same archives.
fn sample_archives(
    archives: &[forgekeeper_tiers::ArchiveEntry],
) -> Vec<&forgekeeper_tiers::ArchiveEntry> {
    let Some(newest) = archives.last() else {
        return Vec::new();
    };
    let mut sample = vec![newest];
    if archives.len() > 1 {
        let older = newest.id.created_at.timestamp().unsigned_abs() as usize % (archives.len() - 1);
        sample.push(&archives[older]);
    }
    sample
}

fn summarize_failures(report: &VerificationReport) -> String {
    let failures: Vec<String> = report
        .results
        .iter()
        .filter(|r| !r.status.is_ok())
        .map(|r| {
            format!(
                "{}={} ({})",
                r.tier,
                r.status,
                r.detail.as_deref().unwrap_or("no detail")
            )
        })
        .collect();
    if failures.is_empty() {
        "no recoverable copy on any non-local tier".to_string()
    } else {
        failures.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::testing::CapturingSink;
    use chrono::{Duration, Utc};
    use forgekeeper_core::{
        ArtifactClass, Manifest, ManifestEntry, Snapshot, SnapshotId, TierMode,
    };
    use forgekeeper_tiers::transport::memory::MemoryRepo;

    fn complete_manifest() -> Manifest {
        let mut manifest = Manifest::default();
        for class in ArtifactClass::REQUIRED {
            manifest.entries.push(ManifestEntry {
                class,
                path: format!("{class}.tar"),
                size_bytes: 10,
                sha256: "ab".repeat(32),
            });
        }
        manifest
    }

    fn fresh_snapshot(age: Duration) -> Snapshot {
        Snapshot {
            id: SnapshotId::new("forge", Utc::now() - age),
            size_bytes: 30,
            checksum: "ab".repeat(32),
            manifest: complete_manifest(),
            tiers: Default::default(),
        }
    }

    fn handle(repo: &Arc<MemoryRepo>, mode: TierMode) -> TierHandle {
        TierHandle {
            transport: Arc::clone(repo) as Arc<dyn RepoTransport>,
            mode,
            max_snapshot_age: Duration::hours(26),
            credential: WriteCredential::from_token("write-token").unwrap(),
        }
    }

    fn verifier(tiers: Vec<TierHandle>) -> (Verifier, Arc<CapturingSink>) {
        let sink = Arc::new(CapturingSink::default());
        let verifier = Verifier::new(
            tiers,
            VerifierConfig::default(),
            Arc::clone(&sink) as Arc<dyn AlertSink>,
        );
        (verifier, sink)
    }

    #[tokio::test]
    async fn healthy_remote_tier_verifies_ok() {
        let repo = Arc::new(MemoryRepo::new("offsite", "admin"));
        repo.seed(fresh_snapshot(Duration::hours(1)));

        let (verifier, sink) = verifier(vec![handle(&repo, TierMode::AppendOnlyRemote)]);
        let report = verifier.verify_all().await;
        assert_eq!(report.overall, OverallStatus::Ok);
        assert!(sink.taken().is_empty());
    }

    #[tokio::test]
    async fn empty_tier_is_stale() {
        let repo = Arc::new(MemoryRepo::new("offsite", "admin"));
        let (verifier, _) = verifier(vec![handle(&repo, TierMode::AppendOnlyRemote)]);
        let result = verifier.verify_tier(&handle(&repo, TierMode::AppendOnlyRemote)).await;
        assert_eq!(result.status, VerifyStatus::Stale);
    }

    #[tokio::test]
    async fn old_newest_snapshot_is_stale() {
        let repo = Arc::new(MemoryRepo::new("offsite", "admin"));
        repo.seed(fresh_snapshot(Duration::hours(48)));

        let (verifier, _) = verifier(vec![handle(&repo, TierMode::AppendOnlyRemote)]);
        let report = verifier.verify_all().await;
        assert_eq!(report.results[0].status, VerifyStatus::Stale);
        assert_eq!(report.overall, OverallStatus::Critical);
    }

    #[tokio::test]
    async fn corrupted_checksum_is_corrupt() {
        let repo = Arc::new(MemoryRepo::new("offsite", "admin"));
        let snapshot = fresh_snapshot(Duration::hours(1));
        let id = snapshot.id.clone();
        repo.seed(snapshot);
        repo.corrupt(&id);

        let (verifier, _) = verifier(vec![handle(&repo, TierMode::AppendOnlyRemote)]);
        let report = verifier.verify_all().await;
        assert_eq!(report.results[0].status, VerifyStatus::Corrupt);
    }

    #[tokio::test]
    async fn broken_append_only_enforcement_is_policy_violation() {
        let repo = Arc::new(MemoryRepo::new("offsite", "admin"));
        repo.seed(fresh_snapshot(Duration::hours(1)));
        repo.set_enforces_append_only(false);

        let (verifier, sink) = verifier(vec![handle(&repo, TierMode::AppendOnlyRemote)]);
        let report = verifier.verify_all().await;
        assert_eq!(report.results[0].status, VerifyStatus::PolicyViolation);
        assert_eq!(report.overall, OverallStatus::Critical);

        let alerts = sink.taken();
        assert!(alerts
            .iter()
            .any(|a| a.title == "policy-violation" && a.severity == AlertSeverity::Critical));
    }

    #[tokio::test]
    async fn local_tier_skips_enforcement_probe() {
        // A mutable-local tier legitimately honors deletes; probing it
        // must not flag a violation.
        let repo = Arc::new(MemoryRepo::new("local", "admin"));
        repo.seed(fresh_snapshot(Duration::hours(1)));
        repo.set_enforces_append_only(false);

        let (verifier, _) = verifier(vec![handle(&repo, TierMode::MutableLocal)]);
        let result = verifier.verify_tier(&handle(&repo, TierMode::MutableLocal)).await;
        assert_eq!(result.status, VerifyStatus::Ok);
    }

    #[tokio::test]
    async fn repeated_sweeps_produce_same_outcomes() {
        let repo = Arc::new(MemoryRepo::new("offsite", "admin"));
        repo.seed(fresh_snapshot(Duration::hours(20)));
        repo.seed(fresh_snapshot(Duration::hours(10)));
        repo.seed(fresh_snapshot(Duration::hours(1)));

        let (verifier, _) = verifier(vec![handle(&repo, TierMode::AppendOnlyRemote)]);
        let first = verifier.verify_all().await;
        let second = verifier.verify_all().await;
        assert_eq!(first.results.len(), second.results.len());
        for (a, b) in first.results.iter().zip(&second.results) {
            assert!(a.same_outcome(b));
        }
    }

    #[tokio::test]
    async fn unreachable_tier_folds_into_result() {
        let repo = Arc::new(MemoryRepo::new("offsite", "admin"));
        repo.set_reachable(false);

        let (verifier, _) = verifier(vec![handle(&repo, TierMode::AppendOnlyRemote)]);
        let report = verifier.verify_all().await;
        assert_eq!(report.results[0].status, VerifyStatus::Unreachable);
    }
}
