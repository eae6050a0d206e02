// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handle over one in-flight collector child process.

use chrono::{DateTime, Utc};
use duffel_adapters::{ExternalProcess, ProcessError, WaitStatus};
use duffel_core::{BundleStatus, JobId};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Owns one spawned collector process: its output buffers, artifact
/// paths, creation timestamp, and terminal status.
///
/// The controller replaces the handle atomically under the control
/// mutex and drops it only after the child has reached a terminal
/// state.
pub struct BundleProcessHandle {
    job_id: JobId,
    process: ExternalProcess,
    bundle_path: PathBuf,
    process_output_path: PathBuf,
    created_at: DateTime<Utc>,
    stdout: Arc<Mutex<Vec<String>>>,
    stderr: Arc<Mutex<Vec<String>>>,
    wait_status: Mutex<Option<WaitStatus>>,
}

impl BundleProcessHandle {
    /// Wrap an already-spawned process and install the line-buffered
    /// output consumers.
    pub fn new(
        job_id: JobId,
        process: ExternalProcess,
        bundle_path: PathBuf,
        process_output_path: PathBuf,
        created_at: DateTime<Utc>,
    ) -> Self {
        let stdout = Arc::new(Mutex::new(Vec::new()));
        let stderr = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&stdout);
        process.set_stdout_consumer(move |line| sink.lock().push(line));
        let sink = Arc::clone(&stderr);
        process.set_stderr_consumer(move |line| sink.lock().push(line));
        Self {
            job_id,
            process,
            bundle_path,
            process_output_path,
            created_at,
            stdout,
            stderr,
            wait_status: Mutex::new(None),
        }
    }

    /// Await child exit and record the terminal status. A failed wait
    /// records a synthetic `Exited(1)` before propagating the error, so
    /// the run still reads as terminal.
    pub async fn wait(&self) -> std::io::Result<WaitStatus> {
        match self.process.wait().await {
            Ok(status) => {
                *self.wait_status.lock() = Some(status);
                Ok(status)
            }
            Err(e) => {
                *self.wait_status.lock() = Some(WaitStatus::Exited(1));
                Err(e)
            }
        }
    }

    /// Forward graceful termination to the child.
    pub async fn terminate(&self, grace: Duration) -> Result<(), ProcessError> {
        self.process.terminate(grace).await
    }

    pub fn status(&self) -> BundleStatus {
        match *self.wait_status.lock() {
            None => BundleStatus::Running,
            Some(WaitStatus::Exited(0)) => BundleStatus::Success,
            Some(_) => BundleStatus::Error,
        }
    }

    pub fn wait_status(&self) -> Option<WaitStatus> {
        *self.wait_status.lock()
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn bundle_file_path(&self) -> &Path {
        &self.bundle_path
    }

    pub fn process_output_file_path(&self) -> &Path {
        &self.process_output_path
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn stdout_lines(&self) -> Vec<String> {
        self.stdout.lock().clone()
    }

    pub fn stderr_lines(&self) -> Vec<String> {
        self.stderr.lock().clone()
    }
}

impl Drop for BundleProcessHandle {
    fn drop(&mut self) {
        // The controller must never discard a handle whose child is
        // still alive; wait() has to resolve first.
        debug_assert!(
            !self.process.is_running(),
            "dropping bundle process handle while the child is still running"
        );
    }
}

#[cfg(test)]
#[path = "handle_tests.rs"]
mod tests;
