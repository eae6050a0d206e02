// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live-bound configuration values.
//!
//! A [`BindingSource`] owns a configuration value; every [`Binding`]
//! handed out from it observes updates. Operations snapshot the value
//! once at entry (`get`) so a concurrent config change cannot split one
//! operation across two values; interested parties subscribe to the
//! change stream to react when a new value lands.

use tokio::sync::watch;

/// Writable side of a live-bound configuration value.
#[derive(Debug)]
pub struct BindingSource<T> {
    tx: watch::Sender<T>,
}

impl<T> BindingSource<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Hand out a read-side binding observing this source.
    pub fn binding(&self) -> Binding<T> {
        Binding { rx: self.tx.subscribe() }
    }

    /// Publish a new value. Bindings created before or after the call
    /// all observe it.
    pub fn set(&self, value: T) {
        self.tx.send_replace(value);
    }
}

/// Read side of a live-bound configuration value.
#[derive(Debug, Clone)]
pub struct Binding<T> {
    rx: watch::Receiver<T>,
}

impl<T: Clone> Binding<T> {
    /// A binding whose value never changes (tests and fixed deployments).
    pub fn fixed(value: T) -> Self {
        let (tx, rx) = watch::channel(value);
        // Dropping the sender freezes the value; `get` keeps working.
        drop(tx);
        Self { rx }
    }

    /// Snapshot the current value.
    pub fn get(&self) -> T {
        self.rx.borrow().clone()
    }

    /// Change stream for callers that want to react to updates.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.rx.clone()
    }
}

#[cfg(test)]
#[path = "binding_tests.rs"]
mod tests;
