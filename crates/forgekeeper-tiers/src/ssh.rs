//! Append-only repository client over an SSH-tunneled serve protocol.
//!
//! The remote side runs `forgekeeper-vault serve` (the repository
//! agent) behind a forced SSH command. Each operation spawns one `ssh`
//! invocation, writes a single JSON request frame to stdin, and reads
//! a JSON response frame from stdout. Deletion capability lives in the
//! remote agent's credential check: a write token is refused, which is
//! exactly what the enforcement probe relies on.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::debug;
use url::Url;

use forgekeeper_core::{FkError, Manifest, Result, Snapshot, SnapshotId};

use crate::credentials::{AdminCredential, WriteCredential};
use crate::transport::{ArchiveEntry, DeleteAttempt, RepoInfo, RepoTransport};

/// Default per-operation timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Client for an `ssh://user@host/repo-path` append-only repository.
#[derive(Debug)]
pub struct SshRepoClient {
    tier: String,
    destination: String,
    repo_path: String,
    timeout: Duration,
}

impl SshRepoClient {
    /// Parse an `ssh://` endpoint into a client.
    ///
    /// # Errors
    ///
    /// Returns `FkError::Config` when the endpoint is not a valid
    /// `ssh://` URL with host and path.
    pub fn new(tier: impl Into<String>, endpoint: &str) -> Result<Self> {
        let tier = tier.into();
        let url = Url::parse(endpoint)
            .map_err(|e| FkError::Config(format!("tier '{tier}' endpoint '{endpoint}': {e}")))?;
        if url.scheme() != "ssh" {
            return Err(FkError::Config(format!(
                "tier '{tier}' endpoint must be ssh://, got '{endpoint}'"
            )));
        }
        let host = url
            .host_str()
            .ok_or_else(|| FkError::Config(format!("tier '{tier}' endpoint has no host")))?;
        let destination = if url.username().is_empty() {
            host.to_string()
        } else {
            format!("{}@{host}", url.username())
        };
        Ok(Self {
            tier,
            destination,
            repo_path: url.path().to_string(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Override the per-operation timeout
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run one request frame through a fresh ssh invocation.
    ///
    /// `trailer` is raw payload written after the frame (archive
    /// content for create operations).
    async fn rpc(&self, request: &Frame<'_>, trailer: Option<&[u8]>) -> Result<Reply> {
        let mut child = Command::new("ssh")
            .arg("-o")
            .arg("BatchMode=yes")
            .arg(&self.destination)
            .arg("forgekeeper-vault")
            .arg("serve")
            .arg("--repo")
            .arg(&self.repo_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| FkError::transport(&self.tier, format!("ssh spawn failed: {e}")))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| FkError::transport(&self.tier, "ssh stdin unavailable"))?;
        let mut frame = serde_json::to_vec(request)?;
        frame.push(b'\n');

        let run = async {
            stdin.write_all(&frame).await?;
            if let Some(payload) = trailer {
                stdin.write_all(payload).await?;
            }
            stdin.shutdown().await?;
            drop(stdin);

            let mut stdout = child
                .stdout
                .take()
                .ok_or_else(|| std::io::Error::other("ssh stdout unavailable"))?;
            let mut out = Vec::new();
            stdout.read_to_end(&mut out).await?;
            let status = child.wait().await?;
            Ok::<(Vec<u8>, std::process::ExitStatus), std::io::Error>((out, status))
        };

        let (out, status) = match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok(v)) => v,
            Ok(Err(e)) => {
                return Err(FkError::transport(&self.tier, format!("ssh io failed: {e}")));
            }
            Err(_) => {
                // Reap the child so it doesn't linger past the deadline.
                let _ = child.kill().await;
                return Err(FkError::Timeout(self.timeout.as_secs()));
            }
        };

        if !status.success() {
            return Err(FkError::transport(
                &self.tier,
                format!("ssh exited with {status}"),
            ));
        }

        let line = out
            .split(|b| *b == b'\n')
            .next()
            .filter(|l| !l.is_empty())
            .ok_or_else(|| FkError::transport(&self.tier, "empty response frame"))?;
        debug!(tier = %self.tier, bytes = line.len(), "repo response frame");
        Ok(serde_json::from_slice(line)?)
    }

    fn unexpected(&self, reply: &Reply) -> FkError {
        let detail = match reply {
            Reply::Ok { .. } => "unexpected ok reply".to_string(),
            Reply::Denied { reason } => format!("denied: {reason}"),
            Reply::Error { message } => format!("repository error: {message}"),
        };
        FkError::transport(&self.tier, detail)
    }
}

/// Request frame sent to the repository agent
#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
enum Frame<'a> {
    Ping,
    ListArchives {
        last: Option<usize>,
    },
    CreateArchive {
        token: &'a str,
        snapshot: &'a Snapshot,
        payload_len: u64,
    },
    FetchManifest {
        archive: String,
    },
    FetchArtifact {
        archive: String,
        path: &'a str,
    },
    RecomputeChecksum {
        archive: String,
    },
    Delete {
        token: &'a str,
        object: &'a str,
    },
}

/// Response frame from the repository agent
#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
enum Reply {
    Ok {
        #[serde(default)]
        body: serde_json::Value,
    },
    Denied {
        #[serde(default)]
        reason: String,
    },
    Error {
        message: String,
    },
}

#[async_trait]
impl RepoTransport for SshRepoClient {
    fn tier_name(&self) -> &str {
        &self.tier
    }

    async fn ping(&self) -> Result<RepoInfo> {
        match self.rpc(&Frame::Ping, None).await? {
            Reply::Ok { body } => Ok(serde_json::from_value(body)?),
            other => Err(self.unexpected(&other)),
        }
    }

    async fn list_archives(&self, last: Option<usize>) -> Result<Vec<ArchiveEntry>> {
        match self.rpc(&Frame::ListArchives { last }, None).await? {
            Reply::Ok { body } => Ok(serde_json::from_value(body)?),
            other => Err(self.unexpected(&other)),
        }
    }

    async fn create_archive(
        &self,
        credential: &WriteCredential,
        snapshot: &Snapshot,
        payload: &[u8],
    ) -> Result<String> {
        let frame = Frame::CreateArchive {
            token: credential.token(),
            snapshot,
            payload_len: payload.len() as u64,
        };
        match self.rpc(&frame, Some(payload)).await? {
            Reply::Ok { body } => Ok(serde_json::from_value(body)?),
            Reply::Denied { reason } => Err(FkError::transport(
                &self.tier,
                format!("create refused: {reason}"),
            )),
            other @ Reply::Error { .. } => Err(self.unexpected(&other)),
        }
    }

    async fn fetch_manifest(&self, id: &SnapshotId) -> Result<Manifest> {
        let frame = Frame::FetchManifest {
            archive: id.to_string(),
        };
        match self.rpc(&frame, None).await? {
            Reply::Ok { body } => Ok(serde_json::from_value(body)?),
            other => Err(self.unexpected(&other)),
        }
    }

    async fn fetch_artifact(&self, id: &SnapshotId, path: &str) -> Result<Vec<u8>> {
        let frame = Frame::FetchArtifact {
            archive: id.to_string(),
            path,
        };
        match self.rpc(&frame, None).await? {
            Reply::Ok { body } => {
                let hex_payload: String = serde_json::from_value(body)?;
                hex::decode(&hex_payload).map_err(|e| {
                    FkError::transport(&self.tier, format!("artifact payload malformed: {e}"))
                })
            }
            other => Err(self.unexpected(&other)),
        }
    }

    async fn recompute_checksum(&self, id: &SnapshotId) -> Result<String> {
        let frame = Frame::RecomputeChecksum {
            archive: id.to_string(),
        };
        match self.rpc(&frame, None).await? {
            Reply::Ok { body } => Ok(serde_json::from_value(body)?),
            other => Err(self.unexpected(&other)),
        }
    }

    async fn attempt_delete(
        &self,
        credential: &WriteCredential,
        object: &str,
    ) -> Result<DeleteAttempt> {
        let frame = Frame::Delete {
            token: credential.token(),
            object,
        };
        match self.rpc(&frame, None).await? {
            Reply::Denied { .. } => Ok(DeleteAttempt::Denied),
            // The agent deleted with a write token: the guarantee failed.
            Reply::Ok { .. } => Ok(DeleteAttempt::Deleted),
            other @ Reply::Error { .. } => Err(self.unexpected(&other)),
        }
    }

    async fn admin_delete(&self, credential: &AdminCredential, id: &SnapshotId) -> Result<()> {
        let object = id.to_string();
        let frame = Frame::Delete {
            token: credential.token(),
            object: &object,
        };
        match self.rpc(&frame, None).await? {
            Reply::Ok { .. } => Ok(()),
            Reply::Denied { reason } => Err(FkError::transport(
                &self.tier,
                format!("admin delete refused: {reason}"),
            )),
            other @ Reply::Error { .. } => Err(self.unexpected(&other)),
        }
    }
}
