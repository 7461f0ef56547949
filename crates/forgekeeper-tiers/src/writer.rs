//! Push path from the local tier to a remote transport.

use tracing::{debug, info, warn};

use forgekeeper_core::{Result, Snapshot};

use crate::config::RetryConfig;
use crate::credentials::WriteCredential;
use crate::transport::RepoTransport;

/// Proof that a snapshot landed on a remote tier
#[derive(Debug, Clone)]
pub struct PushReceipt {
    /// Tier that accepted the archive
    pub tier: String,

    /// Remote identifier the tier assigned
    pub remote_id: String,

    /// Attempts consumed, including the successful one
    pub attempts: u32,
}

/// Pushes snapshots to one remote tier with retry and backoff.
///
/// A failed push never touches the local copy. The snapshot stays on
/// the mutable tier and the failure surfaces as an unreachable tier in
/// the next verification sweep.
pub struct TierWriter<T> {
    transport: T,
    credential: WriteCredential,
    retry: RetryConfig,
}

impl<T: RepoTransport> TierWriter<T> {
    /// Create a writer over a transport
    pub fn new(transport: T, credential: WriteCredential) -> Self {
        Self {
            transport,
            credential,
            retry: RetryConfig::default(),
        }
    }

    /// Override the retry configuration
    #[must_use]
    pub fn retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// The transport this writer pushes to
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Push one snapshot, retrying retryable failures with exponential
    /// backoff. Non-retryable errors surface immediately.
    pub async fn push(&self, snapshot: &Snapshot, payload: &[u8]) -> Result<PushReceipt> {
        let tier = self.transport.tier_name().to_string();
        let mut attempt = 0u32;
        loop {
            match self
                .transport
                .create_archive(&self.credential, snapshot, payload)
                .await
            {
                Ok(remote_id) => {
                    info!(tier = %tier, snapshot = %snapshot.id, attempts = attempt + 1, "push complete");
                    return Ok(PushReceipt {
                        tier,
                        remote_id,
                        attempts: attempt + 1,
                    });
                }
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    let backoff = self.retry.backoff_for(attempt);
                    warn!(
                        tier = %tier,
                        snapshot = %snapshot.id,
                        attempt = attempt + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "push attempt failed, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    debug!(tier = %tier, snapshot = %snapshot.id, "push abandoned: {e}");
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::MemoryRepo;
    use chrono::{TimeZone, Utc};
    use forgekeeper_core::{FkError, Manifest, SnapshotId};
    use std::time::Duration;

    fn snapshot() -> Snapshot {
        Snapshot {
            id: SnapshotId::new("forge", Utc.timestamp_opt(1_000, 0).unwrap()),
            size_bytes: 4,
            checksum: "ab".repeat(32),
            manifest: Manifest::default(),
            tiers: Default::default(),
        }
    }

    #[tokio::test]
    async fn push_lands_on_reachable_tier() {
        let repo = MemoryRepo::new("offsite", "admin-token");
        let writer = TierWriter::new(repo, WriteCredential::from_token("w").unwrap());

        let receipt = writer.push(&snapshot(), b"data").await.unwrap();
        assert_eq!(receipt.tier, "offsite");
        assert_eq!(receipt.attempts, 1);
        assert_eq!(writer.transport().held_ids().len(), 1);
    }

    #[tokio::test]
    async fn push_gives_up_after_retries_exhausted() {
        let repo = MemoryRepo::new("offsite", "admin-token");
        repo.set_reachable(false);
        let retry = RetryConfig::new()
            .max_retries(2)
            .initial_backoff(Duration::from_millis(1));
        let writer =
            TierWriter::new(repo, WriteCredential::from_token("w").unwrap()).retry_config(retry);

        let err = writer.push(&snapshot(), b"data").await.unwrap_err();
        assert!(matches!(err, FkError::Transport { .. }));
        // Nothing arrived remotely.
        assert!(writer.transport().held_ids().is_empty());
    }
}
