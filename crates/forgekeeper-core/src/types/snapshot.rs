use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

/// Identity of a snapshot: the producing host plus its creation instant.
///
/// Ordering follows `created_at` (then host for determinism), so the
/// maximum of a set of ids is always the newest snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotId {
    /// Host the snapshot was taken from
    pub source_host: String,

    /// Creation timestamp (UTC); monotonically increasing per source
    pub created_at: DateTime<Utc>,
}

impl SnapshotId {
    /// Create a new snapshot id
    #[must_use]
    pub fn new(source_host: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            source_host: source_host.into(),
            created_at,
        }
    }
}

impl PartialOrd for SnapshotId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SnapshotId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.created_at
            .cmp(&other.created_at)
            .then_with(|| self.source_host.cmp(&other.source_host))
    }
}

impl std::fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}-{}",
            self.source_host,
            self.created_at.format("%Y%m%dT%H%M%SZ")
        )
    }
}

impl FromStr for SnapshotId {
    type Err = String;

    /// Parse `<host>-<YYYYMMDDTHHMMSSZ>`. The host itself may contain
    /// hyphens; the timestamp is the final hyphen-separated field.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, stamp) = s
            .rsplit_once('-')
            .ok_or_else(|| format!("invalid snapshot id: {s}"))?;
        if host.is_empty() {
            return Err(format!("invalid snapshot id: {s}"));
        }
        let naive = chrono::NaiveDateTime::parse_from_str(stamp, "%Y%m%dT%H%M%SZ")
            .map_err(|e| format!("invalid snapshot timestamp '{stamp}': {e}"))?;
        Ok(Self {
            source_host: host.to_string(),
            created_at: naive.and_utc(),
        })
    }
}

/// Artifact classes a complete snapshot must carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactClass {
    /// Service configuration bundle
    Config,
    /// Secrets bundle (encryption keys, tokens)
    Secrets,
    /// The main data archive
    DataArchive,
}

impl ArtifactClass {
    /// Every class a snapshot must contain to be considered complete
    pub const REQUIRED: [Self; 3] = [Self::Config, Self::Secrets, Self::DataArchive];
}

impl std::fmt::Display for ArtifactClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config => write!(f, "config"),
            Self::Secrets => write!(f, "secrets"),
            Self::DataArchive => write!(f, "data-archive"),
        }
    }
}

/// One artifact inside a snapshot manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Which artifact class this file satisfies
    pub class: ArtifactClass,

    /// Path relative to the snapshot root
    pub path: String,

    /// Size in bytes
    pub size_bytes: u64,

    /// Lowercase hex SHA-256 of the artifact content
    pub sha256: String,
}

/// Manifest enumerating the artifacts a snapshot carries.
///
/// A snapshot is "complete" only if the manifest and every referenced
/// artifact are present; [`Manifest::missing_classes`] reports the gap.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    /// Artifacts in this snapshot
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Required artifact classes not satisfied by any entry
    #[must_use]
    pub fn missing_classes(&self) -> Vec<ArtifactClass> {
        ArtifactClass::REQUIRED
            .into_iter()
            .filter(|c| !self.entries.iter().any(|e| e.class == *c))
            .collect()
    }

    /// True when every required artifact class is present
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing_classes().is_empty()
    }

    /// Look up the entry for a class, if present
    #[must_use]
    pub fn entry(&self, class: ArtifactClass) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| e.class == class)
    }

    /// Total payload size across all entries
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.size_bytes).sum()
    }
}

/// An immutable, timestamped bundle of configuration and data artifacts.
///
/// The struct records which tiers have *confirmed* holding the snapshot;
/// confirmation is only ever added, mirroring the snapshot's own
/// write-once nature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Snapshot identity
    pub id: SnapshotId,

    /// Total size in bytes
    pub size_bytes: u64,

    /// Content checksum over the whole bundle (hex SHA-256)
    pub checksum: String,

    /// Manifest of contained artifacts
    pub manifest: Manifest,

    /// Names of tiers confirmed to hold this snapshot
    #[serde(default)]
    pub tiers: BTreeSet<String>,
}

impl Snapshot {
    /// Record that a tier confirmed holding this snapshot
    pub fn confirm_tier(&mut self, tier: impl Into<String>) {
        self.tiers.insert(tier.into());
    }

    /// Age of the snapshot relative to `now`
    #[must_use]
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.id.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn id(secs: i64) -> SnapshotId {
        SnapshotId::new("forge", Utc.timestamp_opt(secs, 0).unwrap())
    }

    #[test]
    fn ids_order_by_creation_time() {
        let older = id(1_000);
        let newer = id(2_000);
        assert!(newer > older);
        assert_eq!([&older, &newer].iter().max().unwrap().created_at, newer.created_at);
    }

    #[test]
    fn id_roundtrips_through_display() {
        let original = SnapshotId::new(
            "forge-prod-1",
            Utc.with_ymd_and_hms(2025, 6, 1, 3, 30, 0).unwrap(),
        );
        let rendered = original.to_string();
        assert_eq!(rendered, "forge-prod-1-20250601T033000Z");
        let parsed: SnapshotId = rendered.parse().unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn id_parse_rejects_garbage() {
        assert!("nodash".parse::<SnapshotId>().is_err());
        assert!("host-notatime".parse::<SnapshotId>().is_err());
        assert!("-20250601T033000Z".parse::<SnapshotId>().is_err());
    }

    #[test]
    fn manifest_reports_missing_classes() {
        let mut manifest = Manifest::default();
        manifest.entries.push(ManifestEntry {
            class: ArtifactClass::Config,
            path: "etc/forge/forge.rb".into(),
            size_bytes: 1024,
            sha256: "ab".repeat(32),
        });

        let missing = manifest.missing_classes();
        assert_eq!(missing, vec![ArtifactClass::Secrets, ArtifactClass::DataArchive]);
        assert!(!manifest.is_complete());
    }

    #[test]
    fn complete_manifest_has_no_gaps() {
        let manifest = Manifest {
            entries: ArtifactClass::REQUIRED
                .into_iter()
                .map(|class| ManifestEntry {
                    class,
                    path: format!("{class}"),
                    size_bytes: 1,
                    sha256: "00".repeat(32),
                })
                .collect(),
        };
        assert!(manifest.is_complete());
        assert_eq!(manifest.total_bytes(), 3);
    }
}
