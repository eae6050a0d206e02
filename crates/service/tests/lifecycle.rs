// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end lifecycle specs driving the service against dummy
//! collector scripts.

use duffel_core::{Binding, BindingSource, BundleError, BundleParameters, BundleStatus, JobId};
use duffel_service::{BundleService, ServiceConfig, ShardSet, DEBUG_BUNDLE_METADATA_KEY};
use duffel_storage::{KeySpace, KvStore};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
    shards: Arc<ShardSet>,
    kv: Arc<KvStore>,
    service: BundleService,
}

impl Fixture {
    /// Stand up a service whose collector is a shell script running
    /// `body` with `$out` bound to the `--output` argument.
    fn with_collector(body: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let collector = write_collector(dir.path(), body);
        Self::with_collector_path(dir, collector)
    }

    /// Stand up a service pointing at a collector path that may not exist.
    fn with_collector_path(dir: TempDir, collector: PathBuf) -> Self {
        let shards = Arc::new(ShardSet::new(2).unwrap());
        let kv = Arc::new(KvStore::open(dir.path().join("kv")).unwrap());
        let config = ServiceConfig {
            data_dir: dir.path().to_path_buf(),
            collector_path: Binding::fixed(collector),
            storage_dir: Binding::fixed(Some(dir.path().join("bundles"))),
        };
        let service = BundleService::new(Arc::clone(&shards), Arc::clone(&kv), config);
        Self { dir, shards, kv, service }
    }

    fn bundle_path(&self, job_id: JobId) -> PathBuf {
        self.dir.path().join("bundles").join(format!("{job_id}.zip"))
    }

    fn output_path(&self, job_id: JobId) -> PathBuf {
        self.dir.path().join("bundles").join(format!("{job_id}.out"))
    }

    async fn await_terminal(&self) -> BundleStatus {
        for _ in 0..200 {
            let status = self.service.status().await.unwrap();
            if status.status != BundleStatus::Running {
                return status.status;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("bundle run did not reach a terminal state");
    }

    async fn await_file(&self, path: &Path) {
        for _ in 0..200 {
            if tokio::fs::try_exists(path).await.unwrap() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("file {} never appeared", path.display());
    }

    async fn teardown(self) {
        self.service.stop().await;
        self.shards.shutdown();
    }
}

/// Write an executable collector script. The script binds `$out` to the
/// value following `--output`, then runs `body`.
fn write_collector(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("collector.sh");
    let script = format!(
        "#!/bin/sh\nout=\"\"\nprev=\"\"\nfor arg in \"$@\"; do\n  if [ \"$prev\" = \"--output\" ]; then out=\"$arg\"; fi\n  prev=\"$arg\"\ndone\n{body}\n"
    );
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[tokio::test]
async fn test_missing_collector_binary() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("no-such-collector");
    let fx = Fixture::with_collector_path(dir, missing);

    let err = fx.service.initiate(JobId::new(), BundleParameters::default()).await.unwrap_err();
    assert_eq!(err.code(), "collector_binary_not_present");

    let err = fx.service.status().await.unwrap_err();
    assert_eq!(err, BundleError::NeverStarted);

    fx.teardown().await;
}

#[tokio::test]
async fn test_successful_run_produces_bundle_and_metadata() {
    let fx = Fixture::with_collector("echo collecting; printf fives > \"$out\"");
    let job = JobId::new();

    fx.service.initiate(job, BundleParameters::default()).await.unwrap();
    assert_eq!(fx.await_terminal().await, BundleStatus::Success);
    // Give the output reader tasks a moment to drain EOF.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let status = fx.service.status().await.unwrap();
    assert_eq!(status.job_id, job);
    assert_eq!(status.file_name, format!("{job}.zip"));
    assert_eq!(status.file_size, Some(5));
    assert_eq!(status.stdout, vec!["collecting".to_string()]);

    assert!(tokio::fs::try_exists(fx.bundle_path(job)).await.unwrap());
    fx.await_file(&fx.output_path(job)).await;

    // Metadata lands after the background wait task runs.
    for _ in 0..200 {
        if fx.kv.get(KeySpace::DebugBundle, DEBUG_BUNDLE_METADATA_KEY).await.unwrap().is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    let entry = fx.kv.get(KeySpace::DebugBundle, DEBUG_BUNDLE_METADATA_KEY).await.unwrap();
    assert!(entry.is_some(), "kv metadata entry missing after successful run");

    let path = fx.service.path(job).await.unwrap();
    assert_eq!(path, fx.bundle_path(job));

    fx.teardown().await;
}

#[tokio::test]
async fn test_failed_run_keeps_artifacts_for_inspection() {
    let fx = Fixture::with_collector("echo broken >&2; exit 2");
    let job = JobId::new();

    fx.service.initiate(job, BundleParameters::default()).await.unwrap();
    assert_eq!(fx.await_terminal().await, BundleStatus::Error);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let status = fx.service.status().await.unwrap();
    assert_eq!(status.file_size, None);
    assert_eq!(status.stderr, vec!["broken".to_string()]);

    let err = fx.service.path(job).await.unwrap_err();
    assert_eq!(err, BundleError::ProcessFailed);

    // Delete is allowed after an error, even with no bundle file.
    fx.service.delete(job).await.unwrap();

    fx.teardown().await;
}

#[tokio::test]
async fn test_cancel_while_running() {
    let fx = Fixture::with_collector("sleep 60");
    let job = JobId::new();

    fx.service.initiate(job, BundleParameters::default()).await.unwrap();

    // A second initiate while running is refused.
    let err = fx.service.initiate(JobId::new(), BundleParameters::default()).await.unwrap_err();
    assert_eq!(err, BundleError::ProcessAlreadyRunning);

    // Unknown job ids cannot cancel the live run.
    let err = fx.service.cancel(JobId::new()).await.unwrap_err();
    assert_eq!(err, BundleError::JobIdNotRecognized);

    fx.service.cancel(job).await.unwrap();
    assert_eq!(fx.await_terminal().await, BundleStatus::Error);

    let err = fx.service.cancel(job).await.unwrap_err();
    assert_eq!(err, BundleError::ProcessNotRunning);

    fx.teardown().await;
}

#[tokio::test]
async fn test_initiate_from_non_service_shard() {
    let fx = Fixture::with_collector(
        "echo spawned >> \"$(dirname \"$out\")/spawns.log\"; printf ok > \"$out\"",
    );
    let job = JobId::new();

    let service = fx.service.clone();
    let result = fx
        .shards
        .invoke_on(1, move || async move {
            service.initiate(job, BundleParameters::default()).await
        })
        .await;
    result.unwrap();

    assert_eq!(fx.await_terminal().await, BundleStatus::Success);

    let spawns =
        tokio::fs::read_to_string(fx.dir.path().join("bundles").join("spawns.log")).await.unwrap();
    assert_eq!(spawns.lines().count(), 1, "service shard must observe exactly one spawn");

    fx.teardown().await;
}

#[tokio::test]
async fn test_sequential_runs_replace_previous_artifacts() {
    let fx = Fixture::with_collector("printf fives > \"$out\"");
    let first = JobId::new();
    let second = JobId::new();

    fx.service.initiate(first, BundleParameters::default()).await.unwrap();
    assert_eq!(fx.await_terminal().await, BundleStatus::Success);
    fx.await_file(&fx.output_path(first)).await;

    fx.service.initiate(second, BundleParameters::default()).await.unwrap();

    // Cleanup runs before the new spawn, so the old artifacts are
    // already gone when initiate returns.
    assert!(!tokio::fs::try_exists(fx.bundle_path(first)).await.unwrap());
    assert!(!tokio::fs::try_exists(fx.output_path(first)).await.unwrap());

    assert_eq!(fx.await_terminal().await, BundleStatus::Success);
    let err = fx.service.path(first).await.unwrap_err();
    assert_eq!(err, BundleError::JobIdNotRecognized);
    fx.service.path(second).await.unwrap();

    fx.teardown().await;
}

#[tokio::test]
async fn test_status_reports_created_at_and_running() {
    let fx = Fixture::with_collector("sleep 60");
    let job = JobId::new();

    fx.service.initiate(job, BundleParameters::default()).await.unwrap();

    let status = fx.service.status().await.unwrap();
    assert_eq!(status.status, BundleStatus::Running);
    assert_eq!(status.file_size, None);

    // Path is refused while the run is still in flight.
    let err = fx.service.path(job).await.unwrap_err();
    assert_eq!(err, BundleError::ProcessAlreadyRunning);
    let err = fx.service.delete(job).await.unwrap_err();
    assert_eq!(err, BundleError::ProcessAlreadyRunning);

    fx.service.cancel(job).await.unwrap();
    fx.await_terminal().await;
    fx.teardown().await;
}

#[tokio::test]
async fn test_storage_dir_rebind_moves_later_runs() {
    let dir = TempDir::new().unwrap();
    let collector = write_collector(dir.path(), "printf fives > \"$out\"");
    let shards = Arc::new(ShardSet::new(2).unwrap());
    let kv = Arc::new(KvStore::open(dir.path().join("kv")).unwrap());
    let storage_dir = BindingSource::new(Some(dir.path().join("bundles-a")));
    let config = ServiceConfig {
        data_dir: dir.path().to_path_buf(),
        collector_path: Binding::fixed(collector),
        storage_dir: storage_dir.binding(),
    };
    let service = BundleService::new(Arc::clone(&shards), kv, config);

    let first = JobId::new();
    service.initiate(first, BundleParameters::default()).await.unwrap();
    let path = await_path(&service, first).await;
    assert!(path.starts_with(dir.path().join("bundles-a")));

    // Re-binding the storage dir redirects the next run; the snapshot
    // taken at initiate keeps each run's artifacts in one directory.
    storage_dir.set(Some(dir.path().join("bundles-b")));
    let second = JobId::new();
    service.initiate(second, BundleParameters::default()).await.unwrap();
    let path = await_path(&service, second).await;
    assert!(path.starts_with(dir.path().join("bundles-b")));

    service.stop().await;
    shards.shutdown();
}

/// Poll `path` until the run finishes successfully.
async fn await_path(service: &BundleService, job_id: JobId) -> PathBuf {
    for _ in 0..200 {
        if let Ok(path) = service.path(job_id).await {
            return path;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("bundle for {job_id} never became available");
}

#[tokio::test]
async fn test_delete_removes_bundle_file() {
    let fx = Fixture::with_collector("printf fives > \"$out\"");
    let job = JobId::new();

    fx.service.initiate(job, BundleParameters::default()).await.unwrap();
    assert_eq!(fx.await_terminal().await, BundleStatus::Success);

    fx.service.delete(job).await.unwrap();
    assert!(!tokio::fs::try_exists(fx.bundle_path(job)).await.unwrap());

    // Deleting again still succeeds; the removal is idempotent.
    fx.service.delete(job).await.unwrap();

    fx.teardown().await;
}
