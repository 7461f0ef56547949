//! Keep-N retention pruning over calendar-aligned buckets.
//!
//! The keep set is computed newest-first: for every period, the newest
//! snapshot of each of the N most recent populated buckets survives. A
//! snapshot survives if *any* period claims it. Everything else is
//! prunable, and on append-only and WORM tiers actually deleting it
//! requires the out-of-band administrator credential, supplied for one
//! invocation only.

use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use tracing::{info, warn};

use forgekeeper_core::{FkError, Period, Result, RetentionPolicy, SnapshotId, TierMode};
use forgekeeper_tiers::{AdminCredential, ArchiveEntry, RepoTransport};

/// Which snapshots a prune would keep and delete
#[derive(Debug, Clone)]
pub struct PrunePlan {
    /// Snapshots claimed by at least one period bucket
    pub kept: Vec<SnapshotId>,

    /// Snapshots no period claims, oldest first
    pub prunable: Vec<SnapshotId>,
}

/// Result of an executed prune
#[derive(Debug, Clone)]
pub struct PruneOutcome {
    /// Tier that was pruned
    pub tier: String,

    /// Snapshots that survived
    pub kept: Vec<SnapshotId>,

    /// Snapshots actually deleted
    pub deleted: Vec<SnapshotId>,

    /// Deletions the tier refused, with the reason. A WORM object
    /// under an active retention lock lands here, which is the store
    /// working as intended.
    pub refused: Vec<(SnapshotId, String)>,
}

/// Computes keep sets and executes prunes against a tier.
pub struct RetentionEngine;

impl RetentionEngine {
    /// Compute the keep/prune split for a set of archives.
    ///
    /// Deterministic for a given archive set: buckets are wall-clock
    /// UTC calendar units, and within a bucket the newest snapshot
    /// wins.
    ///
    /// # Errors
    ///
    /// Refuses a policy that keeps nothing, since executing it would
    /// delete every snapshot on the tier.
    pub fn plan(policy: &RetentionPolicy, archives: &[ArchiveEntry]) -> Result<PrunePlan> {
        if policy.is_empty() {
            return Err(FkError::Config(
                "retention policy keeps nothing; refusing to plan a full wipe".into(),
            ));
        }

        let mut ids: Vec<&SnapshotId> = archives.iter().map(|a| &a.id).collect();
        ids.sort();
        ids.reverse(); // newest first

        let mut kept: BTreeSet<&SnapshotId> = BTreeSet::new();
        for period in Period::ALL {
            let keep_n = policy.keep_for(period);
            if keep_n == 0 {
                continue;
            }
            let mut buckets_seen: HashMap<String, ()> = HashMap::new();
            for id in &ids {
                let key = period.bucket_key(id.created_at);
                if buckets_seen.contains_key(&key) {
                    // An earlier (newer) snapshot already owns this bucket.
                    continue;
                }
                if buckets_seen.len() as u32 >= keep_n {
                    break;
                }
                buckets_seen.insert(key, ());
                kept.insert(id);
            }
        }

        let mut kept_ids: Vec<SnapshotId> = kept.iter().map(|id| (*id).clone()).collect();
        kept_ids.sort();
        let mut prunable: Vec<SnapshotId> = ids
            .iter()
            .copied()
            .filter(|id| !kept.contains(id))
            .cloned()
            .collect();
        prunable.sort();
        Ok(PrunePlan {
            kept: kept_ids,
            prunable,
        })
    }

    /// Execute a prune against a tier.
    ///
    /// On tiers whose mode requires it, the administrator credential
    /// must be supplied; without it only a [`Self::plan`] (dry run) is
    /// possible. Refused deletions do not abort the prune.
    pub async fn prune(
        transport: &dyn RepoTransport,
        mode: TierMode,
        policy: &RetentionPolicy,
        admin: &AdminCredential,
    ) -> Result<PruneOutcome> {
        let tier = transport.tier_name().to_string();
        let archives = transport.list_archives(None).await?;
        let plan = Self::plan(policy, &archives)?;

        let mut deleted = Vec::new();
        let mut refused = Vec::new();
        for id in &plan.prunable {
            match transport.admin_delete(admin, id).await {
                Ok(()) => deleted.push(id.clone()),
                Err(e) => {
                    warn!(tier = %tier, snapshot = %id, error = %e, "prune deletion refused");
                    refused.push((id.clone(), e.to_string()));
                }
            }
        }
        info!(
            tier = %tier,
            mode = %mode,
            kept = plan.kept.len(),
            deleted = deleted.len(),
            refused = refused.len(),
            "prune complete"
        );
        Ok(PruneOutcome {
            tier,
            kept: plan.kept,
            deleted,
            refused,
        })
    }

    /// Age-based expiry for the staging tier only. The staging copy
    /// holds no unique data once confirmed remotely, so snapshots past
    /// `max_age` go regardless of bucket membership.
    pub async fn expire_staging(
        transport: &dyn RepoTransport,
        mode: TierMode,
        max_age: chrono::Duration,
        admin: &AdminCredential,
    ) -> Result<Vec<SnapshotId>> {
        if mode != TierMode::MutableLocal {
            return Err(FkError::Config(format!(
                "age-based expiry is restricted to the staging tier, not {mode}"
            )));
        }
        let now = Utc::now();
        let archives = transport.list_archives(None).await?;
        let mut expired = Vec::new();
        for entry in archives {
            if now - entry.id.created_at > max_age {
                transport.admin_delete(admin, &entry.id).await?;
                expired.push(entry.id);
            }
        }
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use forgekeeper_tiers::transport::memory::MemoryRepo;
    use forgekeeper_tiers::WriteCredential;

    fn entry(y: i32, mo: u32, d: u32, h: u32) -> ArchiveEntry {
        ArchiveEntry {
            id: SnapshotId::new("forge", Utc.with_ymd_and_hms(y, mo, d, h, 0, 0).unwrap()),
            size_bytes: 1,
            checksum: "ab".repeat(32),
        }
    }

    #[test]
    fn empty_policy_is_refused() {
        let policy = RetentionPolicy {
            keep_hourly: 0,
            keep_daily: 0,
            keep_weekly: 0,
            keep_monthly: 0,
            min_lock_days: None,
        };
        let err = RetentionEngine::plan(&policy, &[entry(2025, 6, 1, 0)]).unwrap_err();
        assert!(matches!(err, FkError::Config(_)));
    }

    #[test]
    fn newest_per_daily_bucket_survives() {
        let policy = RetentionPolicy {
            keep_hourly: 0,
            keep_daily: 2,
            keep_weekly: 0,
            keep_monthly: 0,
            min_lock_days: None,
        };
        // Two snapshots on June 2nd, one on June 1st, one on May 20th.
        let archives = vec![
            entry(2025, 5, 20, 12),
            entry(2025, 6, 1, 9),
            entry(2025, 6, 2, 3),
            entry(2025, 6, 2, 15),
        ];
        let plan = RetentionEngine::plan(&policy, &archives).unwrap();

        // June 2nd keeps only its newest (15:00); May 20th falls
        // outside the two most recent daily buckets.
        let kept_hours: Vec<i64> = plan
            .kept
            .iter()
            .map(|id| id.created_at.timestamp())
            .collect();
        assert_eq!(plan.kept.len(), 2);
        assert!(kept_hours.contains(
            &Utc.with_ymd_and_hms(2025, 6, 2, 15, 0, 0).unwrap().timestamp()
        ));
        assert!(kept_hours.contains(
            &Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap().timestamp()
        ));
        assert_eq!(plan.prunable.len(), 2);
    }

    #[test]
    fn periods_union_their_keep_sets() {
        let policy = RetentionPolicy {
            keep_hourly: 1,
            keep_daily: 0,
            keep_weekly: 0,
            keep_monthly: 1,
            min_lock_days: None,
        };
        let archives = vec![entry(2025, 5, 1, 8), entry(2025, 6, 2, 15)];
        let plan = RetentionEngine::plan(&policy, &archives).unwrap();
        // Hourly claims the newest; monthly also claims the newest
        // (June's newest) but only 1 monthly bucket, so May goes.
        assert_eq!(plan.kept.len(), 1);
        assert_eq!(plan.prunable.len(), 1);
    }

    #[test]
    fn plan_is_deterministic() {
        let policy = RetentionPolicy::default();
        let archives = vec![
            entry(2025, 6, 1, 1),
            entry(2025, 6, 1, 2),
            entry(2025, 6, 2, 3),
            entry(2025, 5, 28, 9),
        ];
        let a = RetentionEngine::plan(&policy, &archives).unwrap();
        let b = RetentionEngine::plan(&policy, &archives).unwrap();
        assert_eq!(a.kept, b.kept);
        assert_eq!(a.prunable, b.prunable);
    }

    #[tokio::test]
    async fn prune_deletes_only_unclaimed_snapshots() {
        let repo = MemoryRepo::new("offsite", "admin-token");
        let write = WriteCredential::from_token("w").unwrap();
        for entry in [
            entry(2025, 6, 2, 3),
            entry(2025, 6, 2, 15),
            entry(2025, 6, 1, 9),
        ] {
            let snapshot = forgekeeper_core::Snapshot {
                id: entry.id,
                size_bytes: 1,
                checksum: "ab".repeat(32),
                manifest: forgekeeper_core::Manifest::default(),
                tiers: Default::default(),
            };
            repo.create_archive(&write, &snapshot, b"x").await.unwrap();
        }

        let policy = RetentionPolicy {
            keep_hourly: 0,
            keep_daily: 2,
            keep_weekly: 0,
            keep_monthly: 0,
            min_lock_days: None,
        };
        let admin = AdminCredential::from_token_unchecked("admin-token");
        let outcome =
            RetentionEngine::prune(&repo, TierMode::AppendOnlyRemote, &policy, &admin)
                .await
                .unwrap();
        assert_eq!(outcome.deleted.len(), 1);
        assert_eq!(repo.held_ids().len(), 2);
    }

    #[tokio::test]
    async fn refused_deletion_does_not_abort_prune() {
        let repo = MemoryRepo::new("vault", "admin-token");
        let write = WriteCredential::from_token("w").unwrap();
        for e in [entry(2025, 6, 2, 3), entry(2025, 6, 2, 15)] {
            let snapshot = forgekeeper_core::Snapshot {
                id: e.id,
                size_bytes: 1,
                checksum: "ab".repeat(32),
                manifest: forgekeeper_core::Manifest::default(),
                tiers: Default::default(),
            };
            repo.create_archive(&write, &snapshot, b"x").await.unwrap();
        }
        let policy = RetentionPolicy {
            keep_hourly: 1,
            keep_daily: 0,
            keep_weekly: 0,
            keep_monthly: 0,
            min_lock_days: None,
        };
        // Wrong token: every delete is refused, none succeed, and the
        // prune still returns an outcome instead of erroring out.
        let admin = AdminCredential::from_token_unchecked("wrong");
        let outcome = RetentionEngine::prune(&repo, TierMode::WormRemote, &policy, &admin)
            .await
            .unwrap();
        assert!(outcome.deleted.is_empty());
        assert_eq!(outcome.refused.len(), 1);
        assert_eq!(repo.held_ids().len(), 2);
    }

    #[tokio::test]
    async fn staging_expiry_rejects_remote_tiers() {
        let repo = MemoryRepo::new("offsite", "admin-token");
        let admin = AdminCredential::from_token_unchecked("admin-token");
        let err = RetentionEngine::expire_staging(
            &repo,
            TierMode::AppendOnlyRemote,
            chrono::Duration::hours(1),
            &admin,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, FkError::Config(_)));
    }
}
