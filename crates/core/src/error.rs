// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy for the public bundle operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by the public debug-bundle operations.
///
/// These are control-flow results, not exceptions: callers match on the
/// variant (or its stable [`code`](BundleError::code)) to decide what to
/// surface. Only genuinely exceptional conditions collapse into
/// [`Internal`](BundleError::Internal).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BundleError {
    #[error("collector binary {path} not present")]
    CollectorBinaryNotPresent { path: PathBuf },
    #[error("debug bundle process already running")]
    ProcessAlreadyRunning,
    #[error("debug bundle process not running")]
    ProcessNotRunning,
    #[error("debug bundle process never started")]
    NeverStarted,
    #[error("job id not recognized")]
    JobIdNotRecognized,
    #[error("debug bundle process failed")]
    ProcessFailed,
    #[error("invalid parameters: {reason}")]
    InvalidParameters { reason: String },
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl BundleError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Stable snake_case tag for wire surfaces and logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::CollectorBinaryNotPresent { .. } => "collector_binary_not_present",
            Self::ProcessAlreadyRunning => "process_already_running",
            Self::ProcessNotRunning => "process_not_running",
            Self::NeverStarted => "never_started",
            Self::JobIdNotRecognized => "job_id_not_recognized",
            Self::ProcessFailed => "process_failed",
            Self::InvalidParameters { .. } => "invalid_parameters",
            Self::Internal { .. } => "internal_error",
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
