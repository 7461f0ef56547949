//! Slow-cadence export to the WORM tier.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use forgekeeper_core::{FkError, Result, Snapshot};

use crate::credentials::WriteCredential;
use crate::object_store::ObjectStoreClient;

/// What the store acknowledged for one exported snapshot.
///
/// `lock_applied` is the protection claim: an export with
/// `lock_applied == false` landed its bytes but is deletable, and must
/// never be reported as ransomware-protected.
#[derive(Debug, Clone)]
pub struct ExportReceipt {
    /// Object key the store assigned
    pub object_key: String,

    /// Checksum the store verified at write time
    pub checksum: String,

    /// Whether the store acknowledged the retention lock
    pub lock_applied: bool,

    /// Lock expiry the store acknowledged, when it did
    pub lock_until: Option<DateTime<Utc>>,
}

/// Exports selected snapshots to the WORM object store.
///
/// An export that lands without its lock is still an export: the
/// object exists and the receipt says so, so the caller can alert and
/// try to extend the lock instead of losing track of the copy.
pub struct ImmutableTierWriter {
    client: ObjectStoreClient,
    credential: WriteCredential,
    retain_days: u32,
}

impl ImmutableTierWriter {
    /// Create a writer applying the given lock length to every export
    pub const fn new(
        client: ObjectStoreClient,
        credential: WriteCredential,
        retain_days: u32,
    ) -> Self {
        Self {
            client,
            credential,
            retain_days,
        }
    }

    /// Export one snapshot under a retention lock.
    ///
    /// The receipt always carries the object key; check `lock_applied`
    /// before counting the copy as protected.
    pub async fn export(&self, snapshot: &Snapshot, payload: Vec<u8>) -> Result<ExportReceipt> {
        let key = snapshot.id.to_string();
        let meta = self
            .client
            .put_locked(
                &self.credential,
                &key,
                payload,
                &snapshot.checksum,
                self.retain_days,
            )
            .await?;
        match meta.lock_until {
            Some(lock_until) => info!(
                tier = %self.client.tier_name(),
                key = %meta.key,
                lock_until = %lock_until,
                "worm export locked"
            ),
            None => warn!(
                tier = %self.client.tier_name(),
                key = %meta.key,
                "store accepted the object without a retention lock"
            ),
        }
        Ok(ExportReceipt {
            object_key: meta.key,
            checksum: meta.checksum,
            lock_applied: meta.lock_until.is_some(),
            lock_until: meta.lock_until,
        })
    }

    /// Extend the lock on an already-exported snapshot. The store
    /// refuses shortening, so this can only push expiry further out.
    pub async fn extend_lock(&self, object_key: &str, retain_days: u32) -> Result<DateTime<Utc>> {
        let meta = self
            .client
            .extend_lock(&self.credential, object_key, retain_days)
            .await?;
        meta.lock_until.ok_or_else(|| FkError::PolicyViolation {
            tier: self.client.tier_name().to_string(),
            reason: format!("lock extension on {object_key} left the object unlocked"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use forgekeeper_core::{Manifest, SnapshotId};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn snapshot() -> Snapshot {
        Snapshot {
            id: SnapshotId::new("forge", Utc.with_ymd_and_hms(2025, 6, 1, 3, 30, 0).unwrap()),
            size_bytes: 4,
            checksum: "ab".repeat(32),
            manifest: Manifest::default(),
            tiers: Default::default(),
        }
    }

    async fn writer(server: &MockServer) -> ImmutableTierWriter {
        let client = ObjectStoreClient::builder("vault", server.uri())
            .build()
            .unwrap();
        ImmutableTierWriter::new(client, WriteCredential::from_token("w").unwrap(), 90)
    }

    #[tokio::test]
    async fn unlocked_export_keeps_the_key_and_reports_unprotected() {
        // The store takes the bytes but never acknowledges the lock.
        // The object exists, so the receipt must say so; losing the key
        // here would orphan the copy.
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "key": "forge-20250601T033000Z",
                "size_bytes": 4,
                "checksum": "ab".repeat(32),
                "lock_until": null,
            })))
            .mount(&server)
            .await;

        let receipt = writer(&server)
            .await
            .export(&snapshot(), b"data".to_vec())
            .await
            .unwrap();
        assert_eq!(receipt.object_key, "forge-20250601T033000Z");
        assert!(!receipt.lock_applied);
        assert!(receipt.lock_until.is_none());
    }

    #[tokio::test]
    async fn export_returns_receipt_when_locked() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("x-fk-lock-until", "2025-09-01T00:00:00Z")
                    .set_body_json(serde_json::json!({
                        "key": "forge-20250601T033000Z",
                        "size_bytes": 4,
                        "checksum": "ab".repeat(32),
                        "lock_until": null,
                    })),
            )
            .mount(&server)
            .await;

        let receipt = writer(&server)
            .await
            .export(&snapshot(), b"data".to_vec())
            .await
            .unwrap();
        assert_eq!(receipt.object_key, "forge-20250601T033000Z");
        assert!(receipt.lock_applied);
        assert_eq!(
            receipt.lock_until,
            Some(Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).unwrap())
        );
    }
}
