// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable run metadata: one KV entry plus an on-disk sidecar holding
//! the captured process output.

use crate::handle::BundleProcessHandle;
use chrono::{DateTime, Utc};
use duffel_adapters::WaitStatus;
use duffel_core::JobId;
use duffel_storage::{KeySpace, KvError, KvStore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Well-known key of the single metadata entry in the debug-bundle
/// key space.
pub const DEBUG_BUNDLE_METADATA_KEY: &[u8] = b"debug_bundle_metadata";

/// Schema version written into both records.
const RECORD_VERSION: u32 = 1;

/// Errors from metadata persistence
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("kv store error: {0}")]
    Kv(#[from] KvError),
    #[error("serialization error: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("process has not reached a terminal state")]
    ProcessStillRunning,
}

/// Durable record of one finished collector run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    #[serde(rename = "v")]
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub job_id: JobId,
    pub bundle_file_path: PathBuf,
    pub process_output_file_path: PathBuf,
    /// Lowercase hex SHA-256 of the bundle file; empty when the run
    /// did not produce a usable bundle.
    pub sha256: String,
    pub wait_status: WaitStatus,
}

/// Sidecar record of the captured stdout/stderr lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessOutputRecord {
    #[serde(rename = "v")]
    pub version: u32,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

/// Persists run metadata into the KV store and the sidecar file.
#[derive(Clone)]
pub struct MetadataStore {
    kv: Arc<KvStore>,
}

impl MetadataStore {
    pub fn new(kv: Arc<KvStore>) -> Self {
        Self { kv }
    }

    /// Record the outcome of a finished run.
    ///
    /// For a successful run whose bundle file exists the record carries
    /// the bundle's SHA-256; a successful run with no bundle file is
    /// logged and skipped entirely. If the sidecar write fails after
    /// the KV entry landed, a best-effort background removal of the KV
    /// entry keeps the two consistent — a concurrent KV reader may
    /// observe the entry for the short window until that removal lands.
    pub async fn write(
        &self,
        job_id: JobId,
        handle: &BundleProcessHandle,
    ) -> Result<(), MetadataError> {
        let wait_status = handle.wait_status().ok_or(MetadataError::ProcessStillRunning)?;
        let bundle_path = handle.bundle_file_path();

        let mut sha256 = String::new();
        if wait_status.success() {
            if !tokio::fs::try_exists(bundle_path).await? {
                tracing::warn!(
                    %job_id,
                    path = %bundle_path.display(),
                    "bundle file missing after successful run, not recording metadata"
                );
                return Ok(());
            }
            sha256 = sha256_file(bundle_path).await?;
        }

        let metadata = RunMetadata {
            version: RECORD_VERSION,
            created_at: handle.created_at(),
            job_id,
            bundle_file_path: bundle_path.to_path_buf(),
            process_output_file_path: handle.process_output_file_path().to_path_buf(),
            sha256,
            wait_status,
        };
        let encoded = serde_json::to_vec(&metadata)?;
        tracing::debug!(%job_id, "recording run metadata in the kv store");
        self.kv.put(KeySpace::DebugBundle, DEBUG_BUNDLE_METADATA_KEY, encoded).await?;

        let record = ProcessOutputRecord {
            version: RECORD_VERSION,
            stdout: handle.stdout_lines(),
            stderr: handle.stderr_lines(),
        };
        let encoded = serde_json::to_vec(&record)?;
        let output_path = handle.process_output_file_path();
        match write_file(output_path, &encoded).await {
            Ok(()) => {
                tracing::debug!(%job_id, path = %output_path.display(), "wrote process output");
            }
            Err(e) => {
                tracing::warn!(
                    %job_id,
                    path = %output_path.display(),
                    error = %e,
                    "failed to write process output, rolling back metadata entry"
                );
                let kv = Arc::clone(&self.kv);
                tokio::spawn(async move {
                    if let Err(e) = kv.remove(KeySpace::DebugBundle, DEBUG_BUNDLE_METADATA_KEY).await
                    {
                        tracing::warn!(error = %e, "metadata rollback failed");
                    }
                });
            }
        }
        Ok(())
    }

    /// Read back the current metadata entry, if one exists.
    pub async fn read(&self) -> Result<Option<RunMetadata>, MetadataError> {
        match self.kv.get(KeySpace::DebugBundle, DEBUG_BUNDLE_METADATA_KEY).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Delete the metadata entry. Absent entries are not an error.
    pub async fn remove(&self) -> Result<(), MetadataError> {
        self.kv.remove(KeySpace::DebugBundle, DEBUG_BUNDLE_METADATA_KEY).await?;
        Ok(())
    }
}

async fn write_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(contents).await?;
    file.flush().await?;
    Ok(())
}

/// Streaming SHA-256 of a file, hex-encoded.
async fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
#[path = "metadata_tests.rs"]
mod tests;
