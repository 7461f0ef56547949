//! Streaming SHA-256 hashing via `ring::digest`.

use ring::digest::{Context, SHA256};
use std::path::Path;
use tokio::io::AsyncReadExt;

use crate::error::{FkError, Result};

/// Buffer size for streaming file reads (64 KiB).
const BUF_SIZE: usize = 64 * 1024;

/// Compute SHA-256 of an artifact file, streaming so multi-gigabyte
/// data archives never land in memory whole.
///
/// Returns lowercase hex-encoded digest.
///
/// # Errors
///
/// Returns `FkError::Io` if the file cannot be opened or read.
pub async fn sha256_file(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path).await.map_err(FkError::Io)?;

    let mut context = Context::new(&SHA256);
    let mut buf = vec![0u8; BUF_SIZE];

    loop {
        let n = file.read(&mut buf).await.map_err(FkError::Io)?;
        if n == 0 {
            break;
        }
        context.update(&buf[..n]);
    }

    let digest = context.finish();
    Ok(hex::encode(digest.as_ref()))
}

/// Compute SHA-256 of raw bytes (manifest content, probe sentinels).
#[must_use]
pub fn sha256_bytes(data: &[u8]) -> String {
    let digest = ring::digest::digest(&SHA256, data);
    hex::encode(digest.as_ref())
}
