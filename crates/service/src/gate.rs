// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shutdown gate: a counting barrier over in-flight operations.
//!
//! Every public operation (and the background wait task) holds a
//! [`GateTicket`] for its lifetime. Shutdown closes the gate and waits
//! until every ticket has been dropped before tearing anything down.

use tokio_util::task::task_tracker::{TaskTracker, TaskTrackerToken};

/// Counting barrier blocking shutdown until admitted operations finish.
#[derive(Clone, Debug, Default)]
pub struct Gate {
    tracker: TaskTracker,
}

/// Held for the duration of one admitted operation.
#[derive(Debug)]
pub struct GateTicket {
    _token: TaskTrackerToken,
}

impl Gate {
    pub fn new() -> Self {
        Self { tracker: TaskTracker::new() }
    }

    /// Admit one operation. The gate stays open for entry even while
    /// draining; serialization of late entries is the control mutex's
    /// business, drain completion is ours.
    pub fn enter(&self) -> GateTicket {
        GateTicket { _token: self.tracker.token() }
    }

    /// Close the gate and wait for every outstanding ticket to drop.
    pub async fn close(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }

    #[cfg(test)]
    pub(crate) fn outstanding(&self) -> usize {
        self.tracker.len()
    }
}

#[cfg(test)]
#[path = "gate_tests.rs"]
mod tests;
