//! The forgekeeper engine: verification sweeps, retention pruning,
//! risk aggregation, recovery orchestration, and the restore drill.
//!
//! Everything here works against the [`forgekeeper_tiers::RepoTransport`]
//! abstraction, so engines are exercised in tests with in-memory tiers
//! and in production with SSH and object-store transports.

pub mod alert;
pub mod drill;
pub mod producer;
pub mod recovery;
pub mod retention;
pub mod risk;
pub mod scheduler;
pub mod verifier;

pub use alert::{Alert, AlertSeverity, AlertSink, LogAlertSink};
pub use drill::{DrillOutcome, DrillRunner};
pub use producer::{ensure_complete, SnapshotProducer};
pub use recovery::locks::{TargetLockRegistry, TargetLockGuard};
pub use recovery::orchestrator::{
    HealthProbe, Provisioner, RecoveryOrchestrator, RecoveryRequest, RestoreTarget,
};
pub use retention::{PruneOutcome, PrunePlan, RetentionEngine};
pub use risk::RiskAggregator;
pub use scheduler::Scheduler;
pub use verifier::{TierHandle, Verifier, VerifierConfig};
