// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! External child-process facility.
//!
//! [`ExternalProcess`] spawns a child from an argument vector with piped
//! stdout/stderr and exposes the three operations the supervisor needs:
//! line-buffered output consumers, a single awaited `wait`, and graceful
//! termination (SIGTERM, grace period, SIGKILL). Termination relies on a
//! concurrent `wait` call to reap the child; the supervisor always has
//! one in flight.

use serde::{Deserialize, Serialize};
use std::io;
use std::process::Stdio;
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;

/// Errors from external-process operations
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("empty argument vector")]
    EmptyArgv,
    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("process already completed")]
    AlreadyCompleted,
    #[error("failed to signal process: {0}")]
    Signal(#[source] io::Error),
}

/// Terminal state of a waited-on child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitStatus {
    /// The child exited on its own with this code.
    Exited(i32),
    /// The child was killed by this signal.
    Signaled(i32),
}

impl WaitStatus {
    pub fn success(self) -> bool {
        matches!(self, WaitStatus::Exited(0))
    }

    fn from_exit_status(status: std::process::ExitStatus) -> Self {
        use std::os::unix::process::ExitStatusExt;
        match status.code() {
            Some(code) => WaitStatus::Exited(code),
            None => WaitStatus::Signaled(status.signal().unwrap_or(0)),
        }
    }
}

impl std::fmt::Display for WaitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WaitStatus::Exited(code) => write!(f, "exited with code {code}"),
            WaitStatus::Signaled(sig) => write!(f, "killed by signal {sig}"),
        }
    }
}

/// One spawned child process with piped stdout/stderr.
#[derive(Debug)]
pub struct ExternalProcess {
    pid: i32,
    child: tokio::sync::Mutex<Child>,
    stdout: StdMutex<Option<tokio::process::ChildStdout>>,
    stderr: StdMutex<Option<tokio::process::ChildStderr>>,
    done_tx: watch::Sender<bool>,
    done_rx: watch::Receiver<bool>,
}

impl ExternalProcess {
    /// Spawn `argv[0]` with the remaining arguments. Stdin is closed;
    /// stdout and stderr are piped for the consumer hooks.
    pub fn spawn(argv: &[String]) -> Result<Self, ProcessError> {
        let (program, args) = argv.split_first().ok_or(ProcessError::EmptyArgv)?;
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let mut child = cmd
            .spawn()
            .map_err(|e| ProcessError::Spawn { command: program.clone(), source: e })?;
        let pid = child.id().ok_or_else(|| ProcessError::Spawn {
            command: program.clone(),
            source: io::Error::other("child exited before a pid was assigned"),
        })? as i32;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (done_tx, done_rx) = watch::channel(false);
        Ok(Self {
            pid,
            child: tokio::sync::Mutex::new(child),
            stdout: StdMutex::new(stdout),
            stderr: StdMutex::new(stderr),
            done_tx,
            done_rx,
        })
    }

    pub fn pid(&self) -> i32 {
        self.pid
    }

    /// Install a line-buffered stdout consumer. Each line the child
    /// writes is delivered as one `String`; the reader task stops at EOF.
    /// May be installed at most once.
    pub fn set_stdout_consumer(&self, consumer: impl FnMut(String) + Send + 'static) {
        let stream = self.stdout.lock().unwrap_or_else(|e| e.into_inner()).take();
        spawn_line_reader(stream, consumer);
    }

    /// Install a line-buffered stderr consumer. Same contract as
    /// [`set_stdout_consumer`](Self::set_stdout_consumer).
    pub fn set_stderr_consumer(&self, consumer: impl FnMut(String) + Send + 'static) {
        let stream = self.stderr.lock().unwrap_or_else(|e| e.into_inner()).take();
        spawn_line_reader(stream, consumer);
    }

    /// True until the child has been reaped by [`wait`](Self::wait).
    pub fn is_running(&self) -> bool {
        !*self.done_rx.borrow()
    }

    /// Await child exit. Completion is observable through
    /// [`is_running`](Self::is_running) afterwards, even when the wait
    /// itself failed.
    pub async fn wait(&self) -> io::Result<WaitStatus> {
        let mut child = self.child.lock().await;
        let result = child.wait().await;
        self.done_tx.send_replace(true);
        result.map(WaitStatus::from_exit_status)
    }

    /// Ask the child to stop: SIGTERM, up to `grace` to exit, then
    /// SIGKILL. Needs a concurrent [`wait`](Self::wait) to observe the
    /// exit. Returns [`ProcessError::AlreadyCompleted`] if the child is
    /// already gone.
    pub async fn terminate(&self, grace: Duration) -> Result<(), ProcessError> {
        if !self.is_running() {
            return Err(ProcessError::AlreadyCompleted);
        }
        signal(self.pid, libc::SIGTERM)?;
        let mut done = self.done_rx.clone();
        let exited = tokio::time::timeout(grace, done.wait_for(|done| *done)).await;
        if exited.is_err() {
            tracing::warn!(pid = self.pid, "child ignored SIGTERM, sending SIGKILL");
            match signal(self.pid, libc::SIGKILL) {
                // Lost the race against a clean exit; that is fine.
                Err(ProcessError::AlreadyCompleted) => {}
                other => other?,
            }
        }
        Ok(())
    }
}

fn spawn_line_reader(
    stream: Option<impl AsyncRead + Unpin + Send + 'static>,
    mut consumer: impl FnMut(String) + Send + 'static,
) {
    debug_assert!(stream.is_some(), "output consumer installed twice");
    let Some(stream) = stream else { return };
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => consumer(line),
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(error = %e, "child output stream closed uncleanly");
                    break;
                }
            }
        }
    });
}

fn signal(pid: i32, sig: i32) -> Result<(), ProcessError> {
    // Safety: plain kill(2) on a pid we spawned; no memory is touched.
    let rc = unsafe { libc::kill(pid, sig) };
    if rc == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        return Err(ProcessError::AlreadyCompleted);
    }
    Err(ProcessError::Signal(err))
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
