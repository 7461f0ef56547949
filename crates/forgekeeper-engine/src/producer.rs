//! Snapshot production seam.
//!
//! How artifacts get gathered differs per deployment; the engine and
//! scheduler only need something that yields a complete snapshot plus
//! its payload bytes on demand.

use async_trait::async_trait;

use forgekeeper_core::{FkError, Result, Snapshot};

/// Produces snapshots of the protected service.
#[async_trait]
pub trait SnapshotProducer: Send + Sync {
    /// Assemble a fresh snapshot and the payload bytes to push.
    ///
    /// Implementations must return a manifest covering every required
    /// artifact class; [`ensure_complete`] is the shared check.
    async fn produce(&self) -> Result<(Snapshot, Vec<u8>)>;
}

/// Reject a snapshot whose manifest misses a required artifact class.
pub fn ensure_complete(snapshot: &Snapshot) -> Result<()> {
    let missing = snapshot.manifest.missing_classes();
    if missing.is_empty() {
        return Ok(());
    }
    let classes: Vec<String> = missing.iter().map(ToString::to_string).collect();
    Err(FkError::integrity(
        snapshot.id.to_string(),
        format!("manifest misses required classes: {}", classes.join(", ")),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use forgekeeper_core::{ArtifactClass, Manifest, ManifestEntry, SnapshotId};

    fn snapshot_with(classes: &[ArtifactClass]) -> Snapshot {
        let entries = classes
            .iter()
            .map(|&class| ManifestEntry {
                class,
                path: format!("{class}.tar"),
                size_bytes: 1,
                sha256: "ab".repeat(32),
            })
            .collect();
        Snapshot {
            id: SnapshotId::new("forge", Utc.timestamp_opt(1_000, 0).unwrap()),
            size_bytes: 3,
            checksum: "ab".repeat(32),
            manifest: Manifest { entries },
            tiers: Default::default(),
        }
    }

    #[test]
    fn complete_manifest_passes() {
        assert!(ensure_complete(&snapshot_with(&ArtifactClass::REQUIRED)).is_ok());
    }

    #[test]
    fn missing_secrets_is_an_integrity_error() {
        let err = ensure_complete(&snapshot_with(&[
            ArtifactClass::Config,
            ArtifactClass::DataArchive,
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("secrets"));
        assert_eq!(err.exit_code(), 4);
    }
}
