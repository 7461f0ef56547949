//! Shell-hook implementations of the recovery collaborator traits.
//!
//! Deployments differ in how a target is provisioned and how the forge
//! service is driven, so the orchestrator's collaborators are shell
//! commands from the `[recovery]` config section. Hooks communicate
//! through environment variables and, for the capture hook, stdout.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use forgekeeper::{FkError, HealthProbe, Provisioner, RestoreTarget, Result};

use crate::config::RecoveryHooks;

/// Runs the configured recovery hooks through `sh -c`.
pub struct CommandHooks {
    hooks: RecoveryHooks,
}

impl CommandHooks {
    /// Wrap a hook configuration
    #[must_use]
    pub const fn new(hooks: RecoveryHooks) -> Self {
        Self { hooks }
    }

    async fn run(&self, name: &str, cmd: &str, envs: &[(&str, String)]) -> Result<String> {
        debug!(hook = name, "running recovery hook");
        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(cmd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in envs {
            command.env(key, value);
        }
        let output = command.output().await.map_err(|e| {
            FkError::Internal(format!("hook '{name}' could not be spawned: {e}"))
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FkError::Internal(format!(
                "hook '{name}' exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Spill artifact bytes to a private temp file for a hook to read.
    async fn spill(&self, label: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = std::env::temp_dir().join(format!(
            "fkeeper-{label}-{}-{}",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        tokio::fs::write(&path, bytes).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)).await?;
        }
        Ok(path)
    }
}

async fn cleanup(paths: &[PathBuf]) {
    for path in paths {
        let _ = tokio::fs::remove_file(path).await;
    }
}

#[async_trait]
impl Provisioner for CommandHooks {
    async fn provision(&self, target_env: &str) -> Result<()> {
        self.run(
            "provision",
            &self.hooks.provision_cmd,
            &[("FK_TARGET_ENV", target_env.to_string())],
        )
        .await
        .map(|_| ())
    }

    async fn teardown(&self, target_env: &str) -> Result<()> {
        self.run(
            "teardown",
            &self.hooks.teardown_cmd,
            &[("FK_TARGET_ENV", target_env.to_string())],
        )
        .await
        .map(|_| ())
    }
}

#[async_trait]
impl RestoreTarget for CommandHooks {
    async fn capture_config(&self, target_env: &str) -> Result<String> {
        let reference = self
            .run(
                "capture-config",
                &self.hooks.capture_config_cmd,
                &[("FK_TARGET_ENV", target_env.to_string())],
            )
            .await?;
        if reference.is_empty() {
            return Err(FkError::Internal(
                "capture-config hook printed no reference".into(),
            ));
        }
        Ok(reference)
    }

    async fn restore_config(&self, target_env: &str, config: &[u8], secrets: &[u8]) -> Result<()> {
        let config_path = self.spill("config", config).await?;
        let secrets_path = self.spill("secrets", secrets).await?;
        let result = self
            .run(
                "restore-config",
                &self.hooks.restore_config_cmd,
                &[
                    ("FK_TARGET_ENV", target_env.to_string()),
                    ("FK_CONFIG_PATH", config_path.display().to_string()),
                    ("FK_SECRETS_PATH", secrets_path.display().to_string()),
                ],
            )
            .await;
        cleanup(&[config_path, secrets_path]).await;
        result.map(|_| ())
    }

    async fn restore_data(&self, target_env: &str, data: &[u8]) -> Result<()> {
        let data_path = self.spill("data", data).await?;
        let result = self
            .run(
                "restore-data",
                &self.hooks.restore_data_cmd,
                &[
                    ("FK_TARGET_ENV", target_env.to_string()),
                    ("FK_DATA_PATH", data_path.display().to_string()),
                ],
            )
            .await;
        cleanup(&[data_path]).await;
        result.map(|_| ())
    }

    async fn reconfigure(&self, target_env: &str) -> Result<()> {
        self.run(
            "reconfigure",
            &self.hooks.reconfigure_cmd,
            &[("FK_TARGET_ENV", target_env.to_string())],
        )
        .await
        .map(|_| ())
    }

    async fn rollback_config(&self, target_env: &str, config_ref: &str) -> Result<()> {
        self.run(
            "rollback",
            &self.hooks.rollback_cmd,
            &[
                ("FK_TARGET_ENV", target_env.to_string()),
                ("FK_CONFIG_REF", config_ref.to_string()),
            ],
        )
        .await
        .map(|_| ())
    }
}

#[async_trait]
impl HealthProbe for CommandHooks {
    async fn check(&self, target_env: &str) -> Result<()> {
        self.run(
            "health",
            &self.hooks.health_cmd,
            &[("FK_TARGET_ENV", target_env.to_string())],
        )
        .await
        .map(|_| ())
    }
}
