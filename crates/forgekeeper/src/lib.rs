//! Backup tiering, integrity verification, and recovery orchestration
//! for a self-hosted collaboration forge.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use forgekeeper::{
//!     LogAlertSink, SshRepoClient, TierHandle, Verifier, VerifierConfig, WriteCredential,
//! };
//!
//! #[tokio::main]
//! async fn main() -> forgekeeper::Result<()> {
//!     let offsite = SshRepoClient::new("offsite", "ssh://backup@box.example.net/./repo")?;
//!     let credential = WriteCredential::load("/etc/forgekeeper/offsite.cred".as_ref()).await?;
//!
//!     let verifier = Verifier::new(
//!         vec![TierHandle {
//!             transport: Arc::new(offsite),
//!             mode: forgekeeper::TierMode::AppendOnlyRemote,
//!             max_snapshot_age: chrono::Duration::hours(26),
//!             credential,
//!         }],
//!         VerifierConfig::default(),
//!         Arc::new(LogAlertSink),
//!     );
//!
//!     let report = verifier.verify_all().await;
//!     println!("overall: {}", report.overall);
//!     Ok(())
//! }
//! ```

// Re-export core types
pub use forgekeeper_core::*;

// Re-export tier transports and writers
pub use forgekeeper_tiers::{
    AdminCredential, ArchiveEntry, DeleteAttempt, ExportReceipt, ImmutableTierWriter, LocalRepo,
    ObjectMeta, ObjectStoreClient, PushReceipt, RepoInfo, RepoTransport, RetryConfig,
    SshRepoClient, TierWriter, WormTier, WriteCredential,
};

// Re-export the engine
pub use forgekeeper_engine::{
    ensure_complete, Alert, AlertSeverity, AlertSink, DrillOutcome, DrillRunner, HealthProbe,
    LogAlertSink,
    Provisioner, PruneOutcome, PrunePlan, RecoveryOrchestrator, RecoveryRequest, RestoreTarget,
    RetentionEngine, RiskAggregator, Scheduler, SnapshotProducer, TargetLockGuard,
    TargetLockRegistry, TierHandle, Verifier, VerifierConfig,
};

// Re-export key runtime for convenience
pub use serde;
pub use serde_json;
pub use tokio;
