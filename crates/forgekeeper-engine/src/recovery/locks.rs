//! Advisory per-target recovery locks.
//!
//! One recovery session per target environment: a second request for a
//! held target is rejected, never queued, since the second caller must
//! decide afresh against the state the first run leaves behind.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use forgekeeper_core::{FkError, Result};

/// Process-wide registry of held target locks
#[derive(Debug, Clone, Default)]
pub struct TargetLockRegistry {
    held: Arc<Mutex<HashSet<String>>>,
}

impl TargetLockRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for a target, or reject if held.
    pub fn acquire(&self, target_env: &str) -> Result<TargetLockGuard> {
        let mut held = self.held.lock().map_err(|_| poisoned())?;
        if !held.insert(target_env.to_string()) {
            return Err(FkError::TargetLocked(target_env.to_string()));
        }
        Ok(TargetLockGuard {
            registry: Arc::clone(&self.held),
            target_env: target_env.to_string(),
        })
    }

    /// Whether a target is currently locked
    #[must_use]
    pub fn is_locked(&self, target_env: &str) -> bool {
        self.held
            .lock()
            .map(|held| held.contains(target_env))
            .unwrap_or(true)
    }
}

fn poisoned() -> FkError {
    FkError::Internal("target lock registry poisoned".into())
}

/// Holds one target lock; released on drop.
#[derive(Debug)]
pub struct TargetLockGuard {
    registry: Arc<Mutex<HashSet<String>>>,
    target_env: String,
}

impl TargetLockGuard {
    /// Target this guard locks
    #[must_use]
    pub fn target_env(&self) -> &str {
        &self.target_env
    }
}

impl Drop for TargetLockGuard {
    fn drop(&mut self) {
        if let Ok(mut held) = self.registry.lock() {
            held.remove(&self.target_env);
        }
    }
}
