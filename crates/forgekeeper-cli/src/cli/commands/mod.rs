//! Command implementations.

pub mod drill;
pub mod prune;
pub mod restore;
pub mod risk;
pub mod run;
pub mod snapshot;
pub mod status;
pub mod verify;

use std::sync::Arc;

use forgekeeper::{
    AlertSink, FkError, LocalRepo, LogAlertSink, ObjectStoreClient, RecoveryOrchestrator,
    RepoTransport, SshRepoClient, TierHandle, TierMode, TierSpec, Verifier, VerifierConfig,
    WormTier, WriteCredential,
};

use crate::config::Config;
use crate::hooks::CommandHooks;
use crate::output::OutputFormat;

/// Shared context for all commands.
#[derive(Clone)]
pub struct Context {
    /// Validated configuration
    pub config: Config,

    /// Output format
    pub output: OutputFormat,

    /// Suppress informational output; structured results and exit
    /// codes still happen
    pub quiet: bool,
}

impl Context {
    /// The alert sink every engine component reports into.
    pub fn alerts(&self) -> Arc<dyn AlertSink> {
        Arc::new(LogAlertSink)
    }

    /// Build the transport for a tier from its mode and endpoint.
    pub async fn transport(&self, spec: &TierSpec) -> anyhow::Result<Arc<dyn RepoTransport>> {
        let transport: Arc<dyn RepoTransport> = match spec.mode {
            TierMode::MutableLocal => {
                Arc::new(LocalRepo::open(&spec.name, spec.endpoint.as_str()).await?)
            }
            TierMode::AppendOnlyRemote => {
                Arc::new(SshRepoClient::new(&spec.name, &spec.endpoint)?)
            }
            TierMode::WormRemote => {
                let retain_days = spec.retention.min_lock_days.ok_or_else(|| {
                    FkError::Config(format!(
                        "tier '{}': worm-remote needs retention.min_lock_days",
                        spec.name
                    ))
                })?;
                let client = ObjectStoreClient::builder(&spec.name, &spec.endpoint).build()?;
                Arc::new(WormTier::new(client, retain_days))
            }
        };
        Ok(transport)
    }

    /// A verifier-ready handle for one tier, credential loaded.
    pub async fn handle(&self, spec: &TierSpec) -> anyhow::Result<TierHandle> {
        Ok(TierHandle {
            transport: self.transport(spec).await?,
            mode: spec.mode,
            max_snapshot_age: spec.max_snapshot_age(),
            credential: WriteCredential::load(&spec.credential_path).await?,
        })
    }

    /// Handles for every configured tier, in configuration order.
    pub async fn tier_handles(&self) -> anyhow::Result<Vec<TierHandle>> {
        let mut handles = Vec::with_capacity(self.config.tiers.len());
        for spec in &self.config.tiers {
            handles.push(self.handle(spec).await?);
        }
        Ok(handles)
    }

    /// A verifier over every configured tier.
    pub async fn verifier(&self) -> anyhow::Result<Verifier> {
        Ok(Verifier::new(
            self.tier_handles().await?,
            VerifierConfig::default(),
            self.alerts(),
        ))
    }

    /// Look up a tier by name, or fail with the valid names.
    pub fn tier_spec(&self, name: &str) -> anyhow::Result<&TierSpec> {
        self.config.tier(name).ok_or_else(|| {
            let known: Vec<&str> = self.config.tiers.iter().map(|t| t.name.as_str()).collect();
            FkError::Config(format!(
                "no tier named '{name}' (configured: {})",
                known.join(", ")
            ))
            .into()
        })
    }

    /// The tier a restore or drill reads from: the named one, or the
    /// first recoverable tier in configuration order.
    pub fn restore_tier(&self, requested: Option<&str>) -> anyhow::Result<&TierSpec> {
        match requested {
            Some(name) => {
                let spec = self.tier_spec(name)?;
                if !spec.mode.counts_as_recoverable() {
                    return Err(FkError::Config(format!(
                        "tier '{name}' is staging-only; restore from a remote tier"
                    ))
                    .into());
                }
                Ok(spec)
            }
            None => self
                .config
                .tiers
                .iter()
                .find(|t| t.mode.counts_as_recoverable())
                .ok_or_else(|| {
                    FkError::Config("no recoverable tier configured".into()).into()
                }),
        }
    }

    /// The recovery hooks, shared across the collaborator seats.
    pub fn hooks(&self) -> anyhow::Result<Arc<CommandHooks>> {
        let hooks = self.config.recovery.clone().ok_or_else(|| {
            FkError::Config(
                "no [recovery] hooks configured; restore and drill need them".into(),
            )
        })?;
        Ok(Arc::new(CommandHooks::new(hooks)))
    }

    /// An orchestrator restoring from the given tier, with the shell
    /// hooks in every collaborator seat.
    pub async fn orchestrator(&self, from: &TierSpec) -> anyhow::Result<RecoveryOrchestrator> {
        let hooks = self.hooks()?;
        Ok(RecoveryOrchestrator::new(
            self.transport(from).await?,
            hooks.clone(),
            hooks.clone(),
            hooks,
            self.alerts(),
        ))
    }
}
