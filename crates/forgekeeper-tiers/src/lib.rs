//! Tier transports and writers for forgekeeper.
//!
//! This crate owns everything that touches a storage tier:
//!
//! - **Credentials**: capability-typed handles; the automated
//!   [`WriteCredential`] structurally cannot delete, the
//!   [`AdminCredential`] exists only out of band
//! - **Transports**: the [`RepoTransport`] trait with typed responses,
//!   an SSH-tunneled append-only repository client, and a WORM
//!   object-storage client with retention-lock headers
//! - **Writers**: [`TierWriter`] (push with retry/backoff) and
//!   [`ImmutableTierWriter`] (slow-cadence WORM export)

pub mod config;
pub mod credentials;
pub mod immutable;
pub mod local;
pub mod object_store;
pub mod ssh;
pub mod transport;
pub mod writer;

pub use config::RetryConfig;
pub use credentials::{AdminCredential, WriteCredential};
pub use immutable::{ExportReceipt, ImmutableTierWriter};
pub use local::LocalRepo;
pub use object_store::{ObjectMeta, ObjectStoreClient, WormTier};
pub use ssh::SshRepoClient;
pub use transport::{ArchiveEntry, DeleteAttempt, RepoInfo, RepoTransport};
pub use writer::{PushReceipt, TierWriter};
