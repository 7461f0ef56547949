//! On-host staging tier backed by a plain directory.
//!
//! Layout: one directory per snapshot under the root, holding the
//! payload, the manifest, and a small metadata file. The staging tier
//! is mutable by design; it trusts the host it lives on and performs
//! no credential checks. Nothing unique lives here once a snapshot is
//! confirmed on a remote tier.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use forgekeeper_core::hash::sha256_file;
use forgekeeper_core::{FkError, Manifest, Result, Snapshot, SnapshotId};

use crate::credentials::{AdminCredential, WriteCredential};
use crate::transport::{ArchiveEntry, DeleteAttempt, RepoInfo, RepoTransport};

const PAYLOAD_FILE: &str = "payload.bin";
const MANIFEST_FILE: &str = "manifest.json";
const META_FILE: &str = "meta.json";

#[derive(Serialize, Deserialize)]
struct StoredMeta {
    size_bytes: u64,
    checksum: String,
    stored_at: DateTime<Utc>,
}

/// Staging repository in a local directory.
pub struct LocalRepo {
    tier: String,
    root: PathBuf,
}

impl LocalRepo {
    /// Open (creating if needed) a staging repository at `root`.
    pub async fn open(tier: impl Into<String>, root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            FkError::Config(format!(
                "cannot create staging directory {}: {e}",
                root.display()
            ))
        })?;
        Ok(Self {
            tier: tier.into(),
            root,
        })
    }

    /// Directory the repository lives in
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn archive_dir(&self, id: &SnapshotId) -> PathBuf {
        self.root.join(id.to_string())
    }

    async fn read_meta(&self, dir: &Path) -> Result<StoredMeta> {
        let raw = tokio::fs::read(dir.join(META_FILE)).await?;
        Ok(serde_json::from_slice(&raw)?)
    }

    async fn entries(&self) -> Result<Vec<ArchiveEntry>> {
        let mut dirents = tokio::fs::read_dir(&self.root).await?;
        let mut entries = Vec::new();
        while let Some(dirent) = dirents.next_entry().await? {
            let Ok(name) = dirent.file_name().into_string() else {
                continue;
            };
            let Ok(id) = name.parse::<SnapshotId>() else {
                // Not an archive directory; leave it alone.
                continue;
            };
            let meta = self.read_meta(&dirent.path()).await?;
            entries.push(ArchiveEntry {
                id,
                size_bytes: meta.size_bytes,
                checksum: meta.checksum,
            });
        }
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(entries)
    }
}

#[async_trait]
impl RepoTransport for LocalRepo {
    fn tier_name(&self) -> &str {
        &self.tier
    }

    async fn ping(&self) -> Result<RepoInfo> {
        let entries = self.entries().await?;
        Ok(RepoInfo {
            archive_count: entries.len() as u64,
            total_bytes: entries.iter().map(|e| e.size_bytes).sum(),
            last_modified: entries.last().map(|e| e.id.created_at),
        })
    }

    async fn list_archives(&self, last: Option<usize>) -> Result<Vec<ArchiveEntry>> {
        let mut entries = self.entries().await?;
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
        let dir = self.archive_dir(&snapshot.id);
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(PAYLOAD_FILE), payload).await?;
        tokio::fs::write(
            dir.join(MANIFEST_FILE),
            serde_json::to_vec_pretty(&snapshot.manifest)?,
        )
        .await?;
        let meta = StoredMeta {
            size_bytes: payload.len() as u64,
            checksum: snapshot.checksum.clone(),
            stored_at: Utc::now(),
        };
        tokio::fs::write(dir.join(META_FILE), serde_json::to_vec_pretty(&meta)?).await?;
        Ok(dir.display().to_string())
    }

    async fn fetch_manifest(&self, id: &SnapshotId) -> Result<Manifest> {
        let raw = tokio::fs::read(self.archive_dir(id).join(MANIFEST_FILE))
            .await
            .map_err(|_| FkError::integrity(id.to_string(), "archive not found"))?;
        Ok(serde_json::from_slice(&raw)?)
    }

    async fn fetch_artifact(&self, id: &SnapshotId, _path: &str) -> Result<Vec<u8>> {
        tokio::fs::read(self.archive_dir(id).join(PAYLOAD_FILE))
            .await
            .map_err(|_| FkError::integrity(id.to_string(), "archive not found"))
    }

    async fn recompute_checksum(&self, id: &SnapshotId) -> Result<String> {
        sha256_file(&self.archive_dir(id).join(PAYLOAD_FILE)).await
    }

    async fn attempt_delete(
        &self,
        _credential: &WriteCredential,
        object: &str,
    ) -> Result<DeleteAttempt> {
        // Mutable by design: the staging tier honors deletes. The
        // enforcement probe is never pointed at this tier.
        let Ok(id) = object.parse::<SnapshotId>() else {
            return Ok(DeleteAttempt::Denied);
        };
        match tokio::fs::remove_dir_all(self.archive_dir(&id)).await {
            Ok(()) => Ok(DeleteAttempt::Deleted),
            Err(_) => Ok(DeleteAttempt::Denied),
        }
    }

    async fn admin_delete(&self, _credential: &AdminCredential, id: &SnapshotId) -> Result<()> {
        tokio::fs::remove_dir_all(self.archive_dir(id))
            .await
            .map_err(|_| FkError::integrity(id.to_string(), "archive not found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use forgekeeper_core::hash::sha256_bytes;

    fn snapshot(secs: i64, payload: &[u8]) -> Snapshot {
        Snapshot {
            id: SnapshotId::new("forge", Utc.timestamp_opt(secs, 0).unwrap()),
            size_bytes: payload.len() as u64,
            checksum: sha256_bytes(payload),
            manifest: Manifest::default(),
            tiers: Default::default(),
        }
    }

    #[tokio::test]
    async fn archives_round_trip_through_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let repo = LocalRepo::open("local", dir.path()).await.unwrap();
        let write = WriteCredential::from_token("w").unwrap();

        let snap = snapshot(1_000_000, b"staged");
        repo.create_archive(&write, &snap, b"staged").await.unwrap();

        let listed = repo.list_archives(None).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, snap.id);

        let payload = repo.fetch_artifact(&snap.id, "data-archive.tar").await.unwrap();
        assert_eq!(payload, b"staged");

        // Recomputed checksum matches the recorded one.
        assert_eq!(
            repo.recompute_checksum(&snap.id).await.unwrap(),
            listed[0].checksum
        );
    }

    #[tokio::test]
    async fn staging_tier_honors_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let repo = LocalRepo::open("local", dir.path()).await.unwrap();
        let write = WriteCredential::from_token("w").unwrap();
        let snap = snapshot(1_000_000, b"staged");
        repo.create_archive(&write, &snap, b"staged").await.unwrap();

        let outcome = repo
            .attempt_delete(&write, &snap.id.to_string())
            .await
            .unwrap();
        assert_eq!(outcome, DeleteAttempt::Deleted);
        assert!(repo.list_archives(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn foreign_directories_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir(dir.path().join("lost+found")).await.unwrap();
        let repo = LocalRepo::open("local", dir.path()).await.unwrap();
        assert!(repo.list_archives(None).await.unwrap().is_empty());
    }
}
