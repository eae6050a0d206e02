// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::test]
async fn test_invoke_returns_value_to_caller() {
    let shards = ShardSet::new(2).unwrap();
    let value = shards.invoke_on(1, || async { 6 * 7 }).await;
    assert_eq!(value, 42);
    shards.shutdown();
}

#[tokio::test]
async fn test_closure_runs_on_target_shard() {
    let shards = ShardSet::new(3).unwrap();
    assert_eq!(current_shard(), None);

    let observed = shards.invoke_on(2, || async { current_shard() }).await;
    assert_eq!(observed, Some(2));
    shards.shutdown();
}

#[tokio::test]
async fn test_invocations_on_one_shard_share_its_thread() {
    let shards = ShardSet::new(2).unwrap();
    let counter = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    let shards = Arc::new(shards);
    for _ in 0..16 {
        let shards = Arc::clone(&shards);
        let counter = Arc::clone(&counter);
        handles.push(tokio::spawn(async move {
            shards
                .invoke_on(0, move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(counter.load(Ordering::SeqCst), 16);
    shards.shutdown();
}

#[tokio::test]
async fn test_invoke_can_await_inside_closure() {
    let shards = ShardSet::new(1).unwrap();
    let value = shards
        .invoke_on(0, || async {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            "done"
        })
        .await;
    assert_eq!(value, "done");
    shards.shutdown();
}
