// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::Utc;

fn spawn_handle(script: &str) -> BundleProcessHandle {
    let argv: Vec<String> = vec!["sh".into(), "-c".into(), script.into()];
    let process = ExternalProcess::spawn(&argv).unwrap();
    BundleProcessHandle::new(
        JobId::new(),
        process,
        PathBuf::from("/tmp/bundle.zip"),
        PathBuf::from("/tmp/bundle.out"),
        Utc::now(),
    )
}

#[tokio::test]
async fn test_status_is_running_until_wait_resolves() {
    let handle = spawn_handle("sleep 0.2");
    assert_eq!(handle.status(), BundleStatus::Running);
    assert_eq!(handle.wait_status(), None);

    handle.wait().await.unwrap();
    assert_eq!(handle.status(), BundleStatus::Success);
}

#[tokio::test]
async fn test_nonzero_exit_reads_as_error() {
    let handle = spawn_handle("exit 7");
    let status = handle.wait().await.unwrap();
    assert_eq!(status, WaitStatus::Exited(7));
    assert_eq!(handle.status(), BundleStatus::Error);
}

#[tokio::test]
async fn test_captured_output_is_split_per_stream() {
    let handle = spawn_handle("echo out1; echo err1 >&2; echo out2");
    handle.wait().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(handle.stdout_lines(), vec!["out1".to_string(), "out2".to_string()]);
    assert_eq!(handle.stderr_lines(), vec!["err1".to_string()]);
}

#[tokio::test]
async fn test_terminate_transitions_to_error() {
    let handle = std::sync::Arc::new(spawn_handle("sleep 60"));
    let waiter = {
        let handle = std::sync::Arc::clone(&handle);
        tokio::spawn(async move { handle.wait().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    handle.terminate(Duration::from_secs(1)).await.unwrap();
    waiter.await.unwrap().unwrap();

    assert_eq!(handle.status(), BundleStatus::Error);
}

#[tokio::test]
async fn test_snapshot_fields() {
    let handle = spawn_handle("true");
    assert_eq!(handle.bundle_file_path(), Path::new("/tmp/bundle.zip"));
    assert_eq!(handle.process_output_file_path(), Path::new("/tmp/bundle.out"));
    handle.wait().await.unwrap();
}
