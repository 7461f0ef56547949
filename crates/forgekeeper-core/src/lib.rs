//! Core types for the forgekeeper backup engine.
//!
//! This crate provides the foundational model shared by every other
//! forgekeeper crate:
//!
//! - **Types**: snapshots, tiers, retention policies, verification
//!   results, recovery sessions, risk assessments
//! - **Errors**: the [`FkError`] taxonomy with per-class exit codes
//! - **Hashing**: streaming SHA-256 helpers for artifact checksums
//!
//! # Example
//!
//! ```rust,ignore
//! use forgekeeper_core::{Snapshot, VerificationResult, Result};
//!
//! fn newest_recoverable(results: &[VerificationResult]) -> Option<&VerificationResult> {
//!     results.iter().filter(|r| r.status.is_ok()).max_by_key(|r| &r.snapshot_id)
//! }
//! ```

mod error;
pub mod hash;
pub mod types;

pub use error::{FkError, Result};
pub use types::*;
