//! The repository transport abstraction.
//!
//! Every tier is reached through [`RepoTransport`], which returns typed
//! response structures rather than text to be scraped. Destructive
//! operations take an [`AdminCredential`] parameter; the automated path
//! never holds one, so the capability is absent by construction. The
//! single exception is [`RepoTransport::attempt_delete`], which exists
//! for the enforcement probe: it tries a delete *with the write
//! credential* precisely because the remote is expected to deny it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use forgekeeper_core::{Manifest, Result, Snapshot, SnapshotId};

use crate::credentials::{AdminCredential, WriteCredential};

/// One archive as listed by a tier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveEntry {
    /// Snapshot identity encoded in the archive name
    pub id: SnapshotId,

    /// Stored payload size in bytes
    pub size_bytes: u64,

    /// Content checksum recorded at write time (hex SHA-256)
    pub checksum: String,
}

/// Repository-level metadata returned by a reachability check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoInfo {
    /// Number of archives held
    pub archive_count: u64,

    /// Total stored bytes
    pub total_bytes: u64,

    /// Last modification the repository reports
    pub last_modified: Option<DateTime<Utc>>,
}

/// Outcome of a delete attempted with the automated write credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteAttempt {
    /// The remote refused - the append-only guarantee holds
    Denied,
    /// The remote deleted the object - the guarantee has silently
    /// failed and must be escalated as a policy violation
    Deleted,
}

/// Transport to one storage tier, with typed responses.
#[async_trait]
pub trait RepoTransport: Send + Sync {
    /// Name of the tier this transport serves
    fn tier_name(&self) -> &str;

    /// Reachability check plus repository metadata
    async fn ping(&self) -> Result<RepoInfo>;

    /// List archives, newest last; `last` limits to the N newest
    async fn list_archives(&self, last: Option<usize>) -> Result<Vec<ArchiveEntry>>;

    /// Store a snapshot as a new archive. Create-only: there is no
    /// corresponding delete on this trait for the write credential.
    async fn create_archive(
        &self,
        credential: &WriteCredential,
        snapshot: &Snapshot,
        payload: &[u8],
    ) -> Result<String>;

    /// Fetch the manifest stored with an archive
    async fn fetch_manifest(&self, id: &SnapshotId) -> Result<Manifest>;

    /// Fetch one artifact's content from an archive
    async fn fetch_artifact(&self, id: &SnapshotId, path: &str) -> Result<Vec<u8>>;

    /// Ask the remote to recompute the content checksum of an archive
    async fn recompute_checksum(&self, id: &SnapshotId) -> Result<String>;

    /// Enforcement probe: attempt a delete with the *write* credential
    /// against the given object name. Expected outcome on append-only
    /// and WORM tiers is [`DeleteAttempt::Denied`].
    async fn attempt_delete(
        &self,
        credential: &WriteCredential,
        object: &str,
    ) -> Result<DeleteAttempt>;

    /// Privileged delete for retention pruning. Unreachable without an
    /// [`AdminCredential`] value.
    async fn admin_delete(&self, credential: &AdminCredential, id: &SnapshotId) -> Result<()>;
}

// Writers and engines hold transports behind `Arc`.
#[async_trait]
impl<T: RepoTransport + ?Sized> RepoTransport for std::sync::Arc<T> {
    fn tier_name(&self) -> &str {
        (**self).tier_name()
    }

    async fn ping(&self) -> Result<RepoInfo> {
        (**self).ping().await
    }

    async fn list_archives(&self, last: Option<usize>) -> Result<Vec<ArchiveEntry>> {
        (**self).list_archives(last).await
    }

    async fn create_archive(
        &self,
        credential: &WriteCredential,
        snapshot: &Snapshot,
        payload: &[u8],
    ) -> Result<String> {
        (**self).create_archive(credential, snapshot, payload).await
    }

    async fn fetch_manifest(&self, id: &SnapshotId) -> Result<Manifest> {
        (**self).fetch_manifest(id).await
    }

    async fn fetch_artifact(&self, id: &SnapshotId, path: &str) -> Result<Vec<u8>> {
        (**self).fetch_artifact(id, path).await
    }

    async fn recompute_checksum(&self, id: &SnapshotId) -> Result<String> {
        (**self).recompute_checksum(id).await
    }

    async fn attempt_delete(
        &self,
        credential: &WriteCredential,
        object: &str,
    ) -> Result<DeleteAttempt> {
        (**self).attempt_delete(credential, object).await
    }

    async fn admin_delete(&self, credential: &AdminCredential, id: &SnapshotId) -> Result<()> {
        (**self).admin_delete(credential, id).await
    }
}

pub mod memory {
    //! In-memory transport used by engine and CLI tests.

    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use forgekeeper_core::FkError;

    use super::{
        ArchiveEntry, AdminCredential, DeleteAttempt, Manifest, RepoInfo, RepoTransport, Result,
        Snapshot, SnapshotId, WriteCredential,
    };
    use async_trait::async_trait;

    struct StoredArchive {
        snapshot: Snapshot,
        payload: Vec<u8>,
        /// When set, `recompute_checksum` reports this instead of the
        /// recorded checksum (simulates silent corruption)
        corrupted_checksum: Option<String>,
    }

    struct Inner {
        archives: BTreeMap<SnapshotId, StoredArchive>,
        reachable: bool,
        /// When false the remote forgets to enforce append-only and
        /// honors deletes from the write credential
        enforces_append_only: bool,
        ping_count: u64,
    }

    /// An in-memory append-only repository for tests.
    pub struct MemoryRepo {
        tier: String,
        admin_token: String,
        inner: Mutex<Inner>,
    }

    impl MemoryRepo {
        /// Create an empty, reachable, enforcing repository
        #[must_use]
        pub fn new(tier: impl Into<String>, admin_token: impl Into<String>) -> Self {
            Self {
                tier: tier.into(),
                admin_token: admin_token.into(),
                inner: Mutex::new(Inner {
                    archives: BTreeMap::new(),
                    reachable: true,
                    enforces_append_only: true,
                    ping_count: 0,
                }),
            }
        }

        /// Toggle reachability
        pub fn set_reachable(&self, reachable: bool) {
            self.inner.lock().unwrap().reachable = reachable;
        }

        /// Toggle append-only enforcement (to exercise the probe)
        pub fn set_enforces_append_only(&self, enforces: bool) {
            self.inner.lock().unwrap().enforces_append_only = enforces;
        }

        /// Mark an archive as silently corrupted
        pub fn corrupt(&self, id: &SnapshotId) {
            let mut inner = self.inner.lock().unwrap();
            if let Some(archive) = inner.archives.get_mut(id) {
                archive.corrupted_checksum = Some("00".repeat(32));
            }
        }

        /// Seed an archive directly (bypassing the writer)
        pub fn seed(&self, snapshot: Snapshot) {
            let mut inner = self.inner.lock().unwrap();
            inner.archives.insert(
                snapshot.id.clone(),
                StoredArchive {
                    snapshot,
                    payload: Vec::new(),
                    corrupted_checksum: None,
                },
            );
        }

        /// Snapshot ids currently held, oldest first
        #[must_use]
        pub fn held_ids(&self) -> Vec<SnapshotId> {
            self.inner.lock().unwrap().archives.keys().cloned().collect()
        }

        fn check_reachable(&self) -> Result<()> {
            if self.inner.lock().unwrap().reachable {
                Ok(())
            } else {
                Err(FkError::transport(&self.tier, "endpoint unreachable"))
            }
        }
    }

    #[async_trait]
    impl RepoTransport for MemoryRepo {
        fn tier_name(&self) -> &str {
            &self.tier
        }

        async fn ping(&self) -> Result<RepoInfo> {
            self.check_reachable()?;
            let mut inner = self.inner.lock().unwrap();
            inner.ping_count += 1;
            Ok(RepoInfo {
                archive_count: inner.archives.len() as u64,
                total_bytes: inner
                    .archives
                    .values()
                    .map(|a| a.snapshot.size_bytes)
                    .sum(),
                last_modified: inner.archives.keys().last().map(|id| id.created_at),
            })
        }

        async fn list_archives(&self, last: Option<usize>) -> Result<Vec<ArchiveEntry>> {
            self.check_reachable()?;
            let inner = self.inner.lock().unwrap();
            let mut entries: Vec<ArchiveEntry> = inner
                .archives
                .values()
                .map(|a| ArchiveEntry {
                    id: a.snapshot.id.clone(),
                    size_bytes: a.snapshot.size_bytes,
                    checksum: a.snapshot.checksum.clone(),
                })
                .collect();
            if let Some(n) = last {
                let skip = entries.len().saturating_sub(n);
                entries.drain(..skip);
            }
            Ok(entries)
        }

        async fn create_archive(
            &self,
            _credential: &WriteCredential,
            snapshot: &Snapshot,
            payload: &[u8],
        ) -> Result<String> {
            self.check_reachable()?;
            let mut inner = self.inner.lock().unwrap();
            let remote_id = format!("{}/{}", self.tier, snapshot.id);
            inner.archives.insert(
                snapshot.id.clone(),
                StoredArchive {
                    snapshot: snapshot.clone(),
                    payload: payload.to_vec(),
                    corrupted_checksum: None,
                },
            );
            Ok(remote_id)
        }

        async fn fetch_manifest(&self, id: &SnapshotId) -> Result<Manifest> {
            self.check_reachable()?;
            let inner = self.inner.lock().unwrap();
            inner
                .archives
                .get(id)
                .map(|a| a.snapshot.manifest.clone())
                .ok_or_else(|| FkError::integrity(id.to_string(), "archive not found"))
        }

        async fn fetch_artifact(&self, id: &SnapshotId, _path: &str) -> Result<Vec<u8>> {
            self.check_reachable()?;
            let inner = self.inner.lock().unwrap();
            inner
                .archives
                .get(id)
                .map(|a| a.payload.clone())
                .ok_or_else(|| FkError::integrity(id.to_string(), "archive not found"))
        }

        async fn recompute_checksum(&self, id: &SnapshotId) -> Result<String> {
            self.check_reachable()?;
            let inner = self.inner.lock().unwrap();
            let archive = inner
                .archives
                .get(id)
                .ok_or_else(|| FkError::integrity(id.to_string(), "archive not found"))?;
            Ok(archive
                .corrupted_checksum
                .clone()
                .unwrap_or_else(|| archive.snapshot.checksum.clone()))
        }

        async fn attempt_delete(
            &self,
            _credential: &WriteCredential,
            object: &str,
        ) -> Result<DeleteAttempt> {
            self.check_reachable()?;
            let mut inner = self.inner.lock().unwrap();
            if inner.enforces_append_only {
                return Ok(DeleteAttempt::Denied);
            }
            // Broken remote: the delete goes through.
            if let Ok(id) = object.parse::<SnapshotId>() {
                inner.archives.remove(&id);
            }
            Ok(DeleteAttempt::Deleted)
        }

        async fn admin_delete(
            &self,
            credential: &AdminCredential,
            id: &SnapshotId,
        ) -> Result<()> {
            self.check_reachable()?;
            if credential.token() != self.admin_token {
                return Err(FkError::transport(&self.tier, "admin credential rejected"));
            }
            let mut inner = self.inner.lock().unwrap();
            inner
                .archives
                .remove(id)
                .map(|_| ())
                .ok_or_else(|| FkError::integrity(id.to_string(), "archive not found"))
        }
    }

    impl std::fmt::Debug for MemoryRepo {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("MemoryRepo")
                .field("tier", &self.tier)
                .finish_non_exhaustive()
        }
    }
}
