// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Share-nothing shard runtime with cross-shard dispatch.
//!
//! Each shard is one OS thread running a current-thread tokio runtime
//! inside a `LocalSet`. Work reaches a shard as a boxed closure over an
//! unbounded channel and runs to completion on that shard's thread;
//! results travel back on a oneshot. Callers that are not on any shard
//! (e.g. a request-handling runtime) dispatch exactly the same way.

use std::cell::Cell;
use std::future::Future;
use tokio::sync::{mpsc, oneshot};

pub type ShardId = usize;

thread_local! {
    static CURRENT_SHARD: Cell<Option<ShardId>> = const { Cell::new(None) };
}

/// Shard id of the calling thread, or `None` off the shard set.
pub fn current_shard() -> Option<ShardId> {
    CURRENT_SHARD.with(|c| c.get())
}

type ShardTask = Box<dyn FnOnce() + Send + 'static>;

/// A fixed set of shard threads accepting cross-shard invocations.
pub struct ShardSet {
    senders: parking_lot::Mutex<Vec<mpsc::UnboundedSender<ShardTask>>>,
    threads: parking_lot::Mutex<Vec<std::thread::JoinHandle<()>>>,
    count: usize,
}

impl ShardSet {
    /// Spin up `count` shard threads (ids `0..count`).
    pub fn new(count: usize) -> std::io::Result<Self> {
        let mut senders = Vec::with_capacity(count);
        let mut threads = Vec::with_capacity(count);
        for id in 0..count {
            let (tx, rx) = mpsc::unbounded_channel::<ShardTask>();
            let thread = std::thread::Builder::new()
                .name(format!("shard-{id}"))
                .spawn(move || run_shard(id, rx))?;
            senders.push(tx);
            threads.push(thread);
        }
        Ok(Self {
            senders: parking_lot::Mutex::new(senders),
            threads: parking_lot::Mutex::new(threads),
            count,
        })
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Run `f` on `shard` and return its result on the calling task.
    ///
    /// The closure is built on the target shard, so the future it
    /// returns does not need to be `Send`.
    pub async fn invoke_on<F, Fut, T>(&self, shard: ShardId, f: F) -> T
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let task: ShardTask = Box::new(move || {
            tokio::task::spawn_local(async move {
                // A dropped receiver just means the caller went away.
                let _ = tx.send(f().await);
            });
        });
        let sender = self
            .senders
            .lock()
            .get(shard)
            .cloned()
            .expect("invoked on an unknown or stopped shard");
        sender.send(task).expect("shard runtime terminated");
        match rx.await {
            Ok(value) => value,
            Err(_) => panic!("shard {shard} dropped an invocation before completing it"),
        }
    }

    /// Stop accepting work and join the shard threads.
    ///
    /// Callers must drain their in-flight operations first (the service
    /// gate does this); an invocation still pending when its shard stops
    /// is dropped and panics the awaiting task.
    pub fn shutdown(&self) {
        self.senders.lock().clear();
        let threads = std::mem::take(&mut *self.threads.lock());
        for thread in threads {
            if thread.join().is_err() {
                tracing::error!("shard thread panicked during shutdown");
            }
        }
    }
}

fn run_shard(id: ShardId, mut rx: mpsc::UnboundedReceiver<ShardTask>) {
    CURRENT_SHARD.with(|c| c.set(Some(id)));
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(shard = id, error = %e, "failed to build shard runtime");
            return;
        }
    };
    let local = tokio::task::LocalSet::new();
    local.block_on(&runtime, async move {
        while let Some(task) = rx.recv().await {
            task();
        }
    });
}

#[cfg(test)]
#[path = "shard_tests.rs"]
mod tests;
