//! WORM object-storage client with retention-lock headers.
//!
//! The coldest tier is an HTTP object store in compliance mode: each
//! object carries a retention lock the store itself enforces. The
//! client surfaces honestly whether the store acknowledged the lock,
//! because an export that lands without its lock is not a WORM copy.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::HeaderValue;
use reqwest::{Client as HttpClient, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use forgekeeper_core::{FkError, Manifest, Result, Snapshot, SnapshotId};

use crate::credentials::{AdminCredential, WriteCredential};
use crate::transport::{ArchiveEntry, DeleteAttempt, RepoInfo, RepoTransport};

/// Checksum the store verified at write time
const CHECKSUM_HEADER: &str = "x-fk-checksum";

/// Requested retention-lock length in days
const RETAIN_DAYS_HEADER: &str = "x-fk-retain-days";

/// Lock expiry the store acknowledges on writes and HEADs
const LOCK_UNTIL_HEADER: &str = "x-fk-lock-until";

/// Default request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Object metadata as reported by a HEAD request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Object key
    pub key: String,

    /// Stored size in bytes
    pub size_bytes: u64,

    /// Checksum the store holds for the object (hex SHA-256)
    pub checksum: String,

    /// Retention-lock expiry, when the store enforces one
    pub lock_until: Option<DateTime<Utc>>,
}

impl ObjectMeta {
    /// Whether the retention lock is active at `now`
    #[must_use]
    pub fn locked_at(&self, now: DateTime<Utc>) -> bool {
        self.lock_until.is_some_and(|until| until > now)
    }
}

/// HTTP client for a retention-locking object store.
#[derive(Clone)]
pub struct ObjectStoreClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: HttpClient,
    tier: String,
    base_url: String,
}

/// Builder for [`ObjectStoreClient`]
pub struct ObjectStoreClientBuilder {
    tier: String,
    base_url: String,
    timeout: Duration,
}

impl ObjectStoreClientBuilder {
    fn new(tier: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            tier: tier.into(),
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the request timeout
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the client
    ///
    /// # Errors
    ///
    /// Returns `FkError::Config` when the HTTP client cannot be built.
    pub fn build(self) -> Result<ObjectStoreClient> {
        let http = HttpClient::builder()
            .timeout(self.timeout)
            .user_agent(concat!("forgekeeper/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FkError::Config(format!("http client: {e}")))?;
        Ok(ObjectStoreClient {
            inner: Arc::new(ClientInner {
                http,
                tier: self.tier,
                base_url: self.base_url.trim_end_matches('/').to_string(),
            }),
        })
    }
}

impl ObjectStoreClient {
    /// Create a builder for the given tier name and base URL
    #[must_use]
    pub fn builder(
        tier: impl Into<String>,
        base_url: impl Into<String>,
    ) -> ObjectStoreClientBuilder {
        ObjectStoreClientBuilder::new(tier, base_url)
    }

    /// Tier name this client serves
    #[must_use]
    pub fn tier_name(&self) -> &str {
        &self.inner.tier
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.inner.base_url)
    }

    fn transport_err(&self, context: &str, e: &reqwest::Error) -> FkError {
        FkError::transport(&self.inner.tier, format!("{context}: {e}"))
    }

    async fn expect_json<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            return Err(FkError::transport(
                &self.inner.tier,
                format!("unexpected status {status}"),
            ));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| self.transport_err("response body", &e))
    }

    /// Store metadata for the whole bucket
    pub async fn info(&self) -> Result<RepoInfo> {
        let url = self.url("/v1/info");
        debug!(tier = %self.inner.tier, url = %url, "GET info");
        let response = self
            .inner
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport_err("info", &e))?;
        self.expect_json(response).await
    }

    /// List stored objects, oldest first
    pub async fn list(&self, last: Option<usize>) -> Result<Vec<ArchiveEntry>> {
        let url = self.url("/v1/archives");
        let mut request = self.inner.http.get(&url);
        if let Some(n) = last {
            request = request.query(&[("last", n.to_string())]);
        }
        let response = request
            .send()
            .await
            .map_err(|e| self.transport_err("list", &e))?;
        self.expect_json(response).await
    }

    /// Write an object under a retention lock.
    ///
    /// The returned metadata reflects what the store acknowledged. A
    /// missing `lock_until` means the store took the bytes but not the
    /// lock; such an object exists but is not ransomware-protected.
    pub async fn put_locked(
        &self,
        credential: &WriteCredential,
        key: &str,
        payload: Vec<u8>,
        checksum: &str,
        retain_days: u32,
    ) -> Result<ObjectMeta> {
        let url = self.url(&format!("/v1/archives/{key}"));
        debug!(tier = %self.inner.tier, key, retain_days, "PUT locked object");
        let response = self
            .inner
            .http
            .put(&url)
            .bearer_auth(credential.token())
            .header(CHECKSUM_HEADER, checksum)
            .header(RETAIN_DAYS_HEADER, retain_days)
            .body(payload)
            .send()
            .await
            .map_err(|e| self.transport_err("put", &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FkError::transport(
                &self.inner.tier,
                format!("put {key} failed with {status}"),
            ));
        }
        let lock_until = parse_lock_header(response.headers().get(LOCK_UNTIL_HEADER));
        if lock_until.is_none() {
            warn!(tier = %self.inner.tier, key, "store did not acknowledge retention lock");
        }
        let meta: ObjectMeta = self.expect_json(response).await?;
        // Trust the header over the body for the lock expiry.
        Ok(ObjectMeta { lock_until, ..meta })
    }

    /// HEAD one object
    pub async fn head(&self, key: &str) -> Result<ObjectMeta> {
        let url = self.url(&format!("/v1/archives/{key}"));
        let response = self
            .inner
            .http
            .head(&url)
            .send()
            .await
            .map_err(|e| self.transport_err("head", &e))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FkError::integrity(key, "object not found"));
        }
        if !status.is_success() {
            return Err(FkError::transport(
                &self.inner.tier,
                format!("head {key} failed with {status}"),
            ));
        }
        let headers = response.headers();
        let size_bytes = headers
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let checksum = headers
            .get(CHECKSUM_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        Ok(ObjectMeta {
            key: key.to_string(),
            size_bytes,
            checksum,
            lock_until: parse_lock_header(headers.get(LOCK_UNTIL_HEADER)),
        })
    }

    /// Fetch an object's bytes
    pub async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let url = self.url(&format!("/v1/archives/{key}"));
        let response = self
            .inner
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport_err("get", &e))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FkError::integrity(key, "object not found"));
        }
        if !status.is_success() {
            return Err(FkError::transport(
                &self.inner.tier,
                format!("get {key} failed with {status}"),
            ));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.transport_err("get body", &e))?;
        Ok(bytes.to_vec())
    }

    /// Extend an object's retention lock. Locks only ever lengthen; a
    /// request earlier than the current expiry is refused by the store.
    pub async fn extend_lock(
        &self,
        credential: &WriteCredential,
        key: &str,
        retain_days: u32,
    ) -> Result<ObjectMeta> {
        let url = self.url(&format!("/v1/archives/{key}/lock"));
        debug!(tier = %self.inner.tier, key, retain_days, "POST extend lock");
        let response = self
            .inner
            .http
            .post(&url)
            .bearer_auth(credential.token())
            .header(RETAIN_DAYS_HEADER, retain_days)
            .send()
            .await
            .map_err(|e| self.transport_err("extend lock", &e))?;
        self.expect_json(response).await
    }

    /// Issue a DELETE with the given bearer token. Returns the raw
    /// status so callers can tell "refused" from "gone".
    async fn delete_with_token(&self, token: &str, key: &str) -> Result<StatusCode> {
        let url = self.url(&format!("/v1/archives/{key}"));
        let response = self
            .inner
            .http
            .delete(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| self.transport_err("delete", &e))?;
        Ok(response.status())
    }
}

fn parse_lock_header(value: Option<&HeaderValue>) -> Option<DateTime<Utc>> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// [`RepoTransport`] adapter over the object store.
///
/// Writes go through [`ObjectStoreClient::put_locked`] with the tier's
/// configured retention length, so every archive on this tier is born
/// under an active lock.
pub struct WormTier {
    client: ObjectStoreClient,
    retain_days: u32,
}

impl WormTier {
    /// Wrap a client with the lock length applied to new archives
    #[must_use]
    pub const fn new(client: ObjectStoreClient, retain_days: u32) -> Self {
        Self {
            client,
            retain_days,
        }
    }

    /// The underlying object-store client
    #[must_use]
    pub const fn client(&self) -> &ObjectStoreClient {
        &self.client
    }
}

#[async_trait]
impl RepoTransport for WormTier {
    fn tier_name(&self) -> &str {
        self.client.tier_name()
    }

    async fn ping(&self) -> Result<RepoInfo> {
        self.client.info().await
    }

    async fn list_archives(&self, last: Option<usize>) -> Result<Vec<ArchiveEntry>> {
        self.client.list(last).await
    }

    async fn create_archive(
        &self,
        credential: &WriteCredential,
        snapshot: &Snapshot,
        payload: &[u8],
    ) -> Result<String> {
        let key = snapshot.id.to_string();
        let meta = self
            .client
            .put_locked(
                credential,
                &key,
                payload.to_vec(),
                &snapshot.checksum,
                self.retain_days,
            )
            .await?;
        if meta.lock_until.is_none() {
            // The object exists either way. The verifier's lock checks
            // and the enforcement probe report the missing protection;
            // failing here would lose track of the stored copy.
            warn!(
                tier = %self.client.tier_name(),
                key = %key,
                "store accepted {key} without a retention lock"
            );
        }
        Ok(meta.key)
    }

    async fn fetch_manifest(&self, id: &SnapshotId) -> Result<Manifest> {
        let bytes = self.client.get(&format!("{id}/manifest")).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn fetch_artifact(&self, id: &SnapshotId, path: &str) -> Result<Vec<u8>> {
        self.client.get(&format!("{id}/{path}")).await
    }

    async fn recompute_checksum(&self, id: &SnapshotId) -> Result<String> {
        let meta = self.client.head(&id.to_string()).await?;
        Ok(meta.checksum)
    }

    async fn attempt_delete(
        &self,
        credential: &WriteCredential,
        object: &str,
    ) -> Result<DeleteAttempt> {
        let status = self
            .client
            .delete_with_token(credential.token(), object)
            .await?;
        match status {
            StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED | StatusCode::LOCKED => {
                Ok(DeleteAttempt::Denied)
            }
            s if s.is_success() => Ok(DeleteAttempt::Deleted),
            s => Err(FkError::transport(
                self.client.tier_name(),
                format!("probe delete returned {s}"),
            )),
        }
    }

    async fn admin_delete(&self, credential: &AdminCredential, id: &SnapshotId) -> Result<()> {
        let status = self
            .client
            .delete_with_token(credential.token(), &id.to_string())
            .await?;
        if status.is_success() {
            return Ok(());
        }
        if status == StatusCode::LOCKED {
            // Lock still active. The store is doing its job.
            return Err(FkError::transport(
                self.client.tier_name(),
                format!("{id} is under an active retention lock"),
            ));
        }
        Err(FkError::transport(
            self.client.tier_name(),
            format!("admin delete of {id} failed with {status}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> ObjectStoreClient {
        ObjectStoreClient::builder("vault", server.uri())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn put_locked_surfaces_acknowledged_lock() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/v1/archives/forge-20250601T033000Z"))
            .and(header(RETAIN_DAYS_HEADER, "90"))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header(LOCK_UNTIL_HEADER, "2025-09-01T00:00:00Z")
                    .set_body_json(serde_json::json!({
                        "key": "forge-20250601T033000Z",
                        "size_bytes": 4,
                        "checksum": "ab".repeat(32),
                        "lock_until": null,
                    })),
            )
            .mount(&server)
            .await;

        let write = WriteCredential::from_token("write-token").unwrap();
        let meta = client(&server)
            .put_locked(
                &write,
                "forge-20250601T033000Z",
                b"data".to_vec(),
                &"ab".repeat(32),
                90,
            )
            .await
            .unwrap();
        assert!(meta.lock_until.is_some());
    }

    #[tokio::test]
    async fn put_without_lock_acknowledgement_reports_none() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "key": "k",
                "size_bytes": 4,
                "checksum": "ab".repeat(32),
                "lock_until": null,
            })))
            .mount(&server)
            .await;

        let write = WriteCredential::from_token("write-token").unwrap();
        let meta = client(&server)
            .put_locked(&write, "k", b"data".to_vec(), &"ab".repeat(32), 90)
            .await
            .unwrap();
        assert!(meta.lock_until.is_none());
    }

    #[tokio::test]
    async fn worm_create_without_lock_still_returns_the_key() {
        // An unlocked write is an unprotected copy, not a lost one; the
        // enforcement probe is what flags the store's failure.
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

        let tier = WormTier::new(client(&server), 90);
        let write = WriteCredential::from_token("write-token").unwrap();
        let snapshot = sample_snapshot();
        let key = tier.create_archive(&write, &snapshot, b"data").await.unwrap();
        assert_eq!(key, "forge-20250601T033000Z");
    }

    #[tokio::test]
    async fn probe_delete_forbidden_means_denied() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let tier = WormTier::new(client(&server), 90);
        let write = WriteCredential::from_token("write-token").unwrap();
        let outcome = tier.attempt_delete(&write, "fk-probe").await.unwrap();
        assert_eq!(outcome, DeleteAttempt::Denied);
    }

    #[tokio::test]
    async fn probe_delete_success_means_deleted() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let tier = WormTier::new(client(&server), 90);
        let write = WriteCredential::from_token("write-token").unwrap();
        let outcome = tier.attempt_delete(&write, "fk-probe").await.unwrap();
        assert_eq!(outcome, DeleteAttempt::Deleted);
    }

    #[tokio::test]
    async fn admin_delete_under_active_lock_fails() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(423))
            .mount(&server)
            .await;

        let tier = WormTier::new(client(&server), 90);
        let admin = AdminCredential::from_token_unchecked("admin-token");
        let id = sample_snapshot().id;
        let err = tier.admin_delete(&admin, &id).await.unwrap_err();
        assert!(matches!(err, FkError::Transport { .. }));
    }

    #[tokio::test]
    async fn head_parses_lock_header() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/v1/archives/k"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header(CHECKSUM_HEADER, "ab".repeat(32).as_str())
                    .insert_header(LOCK_UNTIL_HEADER, "2099-01-01T00:00:00Z"),
            )
            .mount(&server)
            .await;

        let meta = client(&server).head("k").await.unwrap();
        assert!(meta.locked_at(Utc::now()));
    }

    fn sample_snapshot() -> Snapshot {
        use chrono::TimeZone;
        Snapshot {
            id: SnapshotId::new("forge", Utc.with_ymd_and_hms(2025, 6, 1, 3, 30, 0).unwrap()),
            size_bytes: 4,
            checksum: "ab".repeat(32),
            manifest: Manifest::default(),
            tiers: Default::default(),
        }
    }
}
