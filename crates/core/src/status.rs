// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bundle run status and the status snapshot returned to callers.

use crate::job::JobId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Observable state of a bundle run.
///
/// Transitions are monotone: `Running` moves to exactly one of `Success`
/// or `Error` and never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BundleStatus {
    /// The collector child process is still alive.
    Running,
    /// The child exited with code 0.
    Success,
    /// The child exited non-zero, was signaled, or the wait failed.
    Error,
}

crate::simple_display! {
    BundleStatus {
        Running => "running",
        Success => "success",
        Error => "error",
    }
}

/// Point-in-time snapshot of the current (or last) bundle run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleStatusData {
    pub job_id: JobId,
    pub status: BundleStatus,
    pub created_at: DateTime<Utc>,
    /// File name of the bundle artifact (not its full path).
    pub file_name: String,
    /// Size of the bundle file; populated only for successful runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}
