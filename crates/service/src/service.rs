// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The debug-bundle lifecycle controller.
//!
//! One instance, pinned to the service shard, owns the single process
//! slot. Public operations enter the gate, route to the service shard,
//! and (except for status reads) serialize on a fair control mutex.
//! The slot only ever moves `empty -> running -> success | error`, and
//! a new run replaces a terminal slot after its artifacts are cleaned.

use crate::args::{build_collector_args, join_redacted};
use crate::gate::Gate;
use crate::handle::BundleProcessHandle;
use crate::metadata::{MetadataError, MetadataStore};
use crate::shard::{current_shard, ShardId, ShardSet};
use duffel_adapters::{ExternalProcess, ProcessError};
use duffel_core::{
    Binding, BundleError, BundleParameters, BundleStatus, BundleStatusData, Clock, JobId,
    SystemClock,
};
use duffel_storage::KvStore;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Shard that owns all mutation of debug-bundle state.
pub const SERVICE_SHARD: ShardId = 0;

/// Directory appended to the data dir when no storage dir is configured.
pub const DEBUG_BUNDLE_DIR_NAME: &str = "debug-bundle";

/// Grace given to the child on cancel and on shutdown.
const TERMINATE_GRACE: Duration = Duration::from_secs(1);

/// Everything the service needs at construction time.
pub struct ServiceConfig {
    /// Node data directory; the fallback storage dir lives under it.
    pub data_dir: PathBuf,
    /// Live-bound path of the collector binary.
    pub collector_path: Binding<PathBuf>,
    /// Live-bound storage-dir override; `None` falls back to
    /// `<data_dir>/debug-bundle`.
    pub storage_dir: Binding<Option<PathBuf>>,
}

struct ServiceInner<C: Clock> {
    shards: Arc<ShardSet>,
    metadata: MetadataStore,
    data_dir: PathBuf,
    collector_path: Binding<PathBuf>,
    storage_dir: Binding<Option<PathBuf>>,
    gate: Gate,
    /// Serializes every state-changing operation, FIFO across shards.
    control: Mutex<()>,
    /// The process slot. Swapped only while holding `control`; read
    /// lock-free by status snapshots.
    handle: RwLock<Option<Arc<BundleProcessHandle>>>,
    clock: C,
}

/// Cheaply cloneable handle to the debug-bundle service.
pub struct BundleService<C: Clock = SystemClock> {
    inner: Arc<ServiceInner<C>>,
}

impl<C: Clock> Clone for BundleService<C> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl BundleService<SystemClock> {
    pub fn new(shards: Arc<ShardSet>, kv: Arc<KvStore>, config: ServiceConfig) -> Self {
        Self::with_clock(shards, kv, config, SystemClock)
    }
}

impl<C: Clock> BundleService<C> {
    pub fn with_clock(
        shards: Arc<ShardSet>,
        kv: Arc<KvStore>,
        config: ServiceConfig,
        clock: C,
    ) -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                shards,
                metadata: MetadataStore::new(kv),
                data_dir: config.data_dir,
                collector_path: config.collector_path,
                storage_dir: config.storage_dir,
                gate: Gate::new(),
                control: Mutex::new(()),
                handle: RwLock::new(None),
                clock,
            }),
        }
    }

    /// Log startup diagnostics and watch for storage-dir changes. A
    /// missing collector binary is reported but not fatal: `initiate`
    /// re-checks on every call.
    pub async fn start(&self) {
        let collector = self.inner.collector_path.get();
        if !matches!(tokio::fs::try_exists(&collector).await, Ok(true)) {
            tracing::error!(
                path = %collector.display(),
                "collector binary does not exist; debug bundle creation is unavailable until this is fixed"
            );
        }

        let mut changes = self.inner.storage_dir.subscribe();
        let service = self.clone();
        tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                tracing::debug!(
                    dir = %service.effective_storage_dir().display(),
                    "debug bundle storage directory changed"
                );
            }
        });
        tracing::debug!("debug bundle service started");
    }

    /// Stop the service: terminate a still-running child (with grace),
    /// then drain the gate.
    pub async fn stop(&self) {
        tracing::debug!("debug bundle service stopping");
        let service = self.clone();
        self.inner
            .shards
            .invoke_on(SERVICE_SHARD, move || async move {
                let handle = service.inner.handle.read().clone();
                if let Some(handle) = handle {
                    if handle.status() == BundleStatus::Running {
                        if let Err(e) = handle.terminate(TERMINATE_GRACE).await {
                            tracing::warn!(
                                error = %e,
                                "failed to terminate running process while stopping service"
                            );
                        }
                    }
                }
            })
            .await;
        self.inner.gate.close().await;
    }

    /// Start collecting a debug bundle under `job_id`.
    pub async fn initiate(
        &self,
        job_id: JobId,
        params: BundleParameters,
    ) -> Result<(), BundleError> {
        let _ticket = self.inner.gate.enter();
        if current_shard() != Some(SERVICE_SHARD) {
            let service = self.clone();
            return self
                .inner
                .shards
                .invoke_on(SERVICE_SHARD, move || async move {
                    service.initiate_local(job_id, params).await
                })
                .await;
        }
        self.initiate_local(job_id, params).await
    }

    /// Cancel the running collection for `job_id`.
    pub async fn cancel(&self, job_id: JobId) -> Result<(), BundleError> {
        let _ticket = self.inner.gate.enter();
        if current_shard() != Some(SERVICE_SHARD) {
            let service = self.clone();
            return self
                .inner
                .shards
                .invoke_on(SERVICE_SHARD, move || async move {
                    service.cancel_local(job_id).await
                })
                .await;
        }
        self.cancel_local(job_id).await
    }

    /// Snapshot the state of the current (or last) run.
    pub async fn status(&self) -> Result<BundleStatusData, BundleError> {
        let _ticket = self.inner.gate.enter();
        if current_shard() != Some(SERVICE_SHARD) {
            let service = self.clone();
            return self
                .inner
                .shards
                .invoke_on(SERVICE_SHARD, move || async move { service.status_local().await })
                .await;
        }
        self.status_local().await
    }

    /// Absolute path of the finished bundle for `job_id`.
    pub async fn path(&self, job_id: JobId) -> Result<PathBuf, BundleError> {
        let _ticket = self.inner.gate.enter();
        if current_shard() != Some(SERVICE_SHARD) {
            let service = self.clone();
            return self
                .inner
                .shards
                .invoke_on(SERVICE_SHARD, move || async move { service.path_local(job_id).await })
                .await;
        }
        self.path_local(job_id).await
    }

    /// Delete the bundle artifact of the finished run for `job_id`.
    pub async fn delete(&self, job_id: JobId) -> Result<(), BundleError> {
        let _ticket = self.inner.gate.enter();
        if current_shard() != Some(SERVICE_SHARD) {
            let service = self.clone();
            return self
                .inner
                .shards
                .invoke_on(SERVICE_SHARD, move || async move {
                    service.delete_local(job_id).await
                })
                .await;
        }
        self.delete_local(job_id).await
    }

    /// Effective storage directory under the current configuration.
    pub fn effective_storage_dir(&self) -> PathBuf {
        self.inner
            .storage_dir
            .get()
            .unwrap_or_else(|| self.inner.data_dir.join(DEBUG_BUNDLE_DIR_NAME))
    }

    async fn initiate_local(
        &self,
        job_id: JobId,
        params: BundleParameters,
    ) -> Result<(), BundleError> {
        let _units = self.inner.control.lock().await;

        let collector = self.inner.collector_path.get();
        if !file_exists(&collector).await? {
            return Err(BundleError::CollectorBinaryNotPresent { path: collector });
        }

        if let Some(handle) = self.inner.handle.read().clone() {
            if handle.status() == BundleStatus::Running {
                return Err(BundleError::ProcessAlreadyRunning);
            }
        }

        if let Err(e) = self.cleanup_previous_run().await {
            return Err(BundleError::internal(format!("failed to clean up previous run: {e}")));
        }

        // Snapshot the directory now; a config change mid-operation
        // must not split the two artifact paths across directories.
        let output_dir = self.effective_storage_dir();
        if let Err(e) = tokio::fs::create_dir_all(&output_dir).await {
            return Err(BundleError::internal(format!(
                "failed to create debug bundle directory {}: {e}",
                output_dir.display()
            )));
        }

        let bundle_path = output_dir.join(format!("{job_id}.zip"));
        let process_output_path = output_dir.join(format!("{job_id}.out"));

        let argv = build_collector_args(&collector, &bundle_path, &params)?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!(%job_id, argv = %join_redacted(&argv), "starting debug bundle collection");
        }

        let process = match ExternalProcess::spawn(&argv) {
            Ok(process) => process,
            Err(e) => {
                *self.inner.handle.write() = None;
                return Err(BundleError::internal(format!(
                    "starting debug bundle collection failed: {e}"
                )));
            }
        };
        let handle = Arc::new(BundleProcessHandle::new(
            job_id,
            process,
            bundle_path,
            process_output_path,
            self.inner.clock.utc_now(),
        ));
        *self.inner.handle.write() = Some(Arc::clone(&handle));

        // Background wait: holds its own gate ticket so shutdown waits
        // for the metadata write, and never lets an error escape.
        let service = self.clone();
        let ticket = self.inner.gate.enter();
        tokio::spawn(async move {
            let _ticket = ticket;
            match handle.wait().await {
                Ok(status) => {
                    tracing::debug!(%job_id, %status, "debug bundle process finished");
                    service.handle_wait_result(job_id).await;
                }
                Err(e) => {
                    tracing::error!(%job_id, error = %e, "wait failed while running debug bundle process");
                }
            }
        });

        Ok(())
    }

    async fn cancel_local(&self, job_id: JobId) -> Result<(), BundleError> {
        let _units = self.inner.control.lock().await;
        let Some(handle) = self.inner.handle.read().clone() else {
            return Err(BundleError::NeverStarted);
        };
        if handle.status() != BundleStatus::Running {
            return Err(BundleError::ProcessNotRunning);
        }
        if handle.job_id() != job_id {
            return Err(BundleError::JobIdNotRecognized);
        }
        match handle.terminate(TERMINATE_GRACE).await {
            Ok(()) => Ok(()),
            Err(ProcessError::AlreadyCompleted) => Err(BundleError::ProcessNotRunning),
            Err(e) => Err(BundleError::internal(e.to_string())),
        }
    }

    async fn status_local(&self) -> Result<BundleStatusData, BundleError> {
        // No control mutex: the slot pointer is swapped only under it,
        // and terminal transitions are monotone, so this read is a
        // consistent snapshot.
        let Some(handle) = self.inner.handle.read().clone() else {
            return Err(BundleError::NeverStarted);
        };
        let status = handle.status();

        let mut file_size = None;
        if status == BundleStatus::Success {
            let path = handle.bundle_file_path();
            match tokio::fs::metadata(path).await {
                Ok(metadata) => file_size = Some(metadata.len()),
                Err(e) => {
                    return Err(BundleError::internal(format!(
                        "failed to get file size for debug bundle file {}: {e}",
                        path.display()
                    )));
                }
            }
        }

        let file_name = handle
            .bundle_file_path()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(BundleStatusData {
            job_id: handle.job_id(),
            status,
            created_at: handle.created_at(),
            file_name,
            file_size,
            stdout: handle.stdout_lines(),
            stderr: handle.stderr_lines(),
        })
    }

    async fn path_local(&self, job_id: JobId) -> Result<PathBuf, BundleError> {
        let _units = self.inner.control.lock().await;
        let Some(handle) = self.inner.handle.read().clone() else {
            return Err(BundleError::NeverStarted);
        };
        match handle.status() {
            BundleStatus::Running => return Err(BundleError::ProcessAlreadyRunning),
            BundleStatus::Error => return Err(BundleError::ProcessFailed),
            BundleStatus::Success => {}
        }
        if handle.job_id() != job_id {
            return Err(BundleError::JobIdNotRecognized);
        }
        let path = handle.bundle_file_path();
        if !file_exists(path).await? {
            return Err(BundleError::internal(format!(
                "debug bundle file {} not found",
                path.display()
            )));
        }
        Ok(path.to_path_buf())
    }

    async fn delete_local(&self, job_id: JobId) -> Result<(), BundleError> {
        let _units = self.inner.control.lock().await;
        let Some(handle) = self.inner.handle.read().clone() else {
            return Err(BundleError::NeverStarted);
        };
        // A failed run may still have produced a partial bundle file,
        // so only Running blocks deletion.
        if handle.status() == BundleStatus::Running {
            return Err(BundleError::ProcessAlreadyRunning);
        }
        if handle.job_id() != job_id {
            return Err(BundleError::JobIdNotRecognized);
        }
        let path = handle.bundle_file_path();
        let removed = match tokio::fs::try_exists(path).await {
            Ok(true) => tokio::fs::remove_file(path).await,
            Ok(false) => Ok(()),
            Err(e) => Err(e),
        };
        if let Err(e) = removed {
            return Err(BundleError::internal(format!(
                "failed to delete debug bundle file {}: {e}",
                path.display()
            )));
        }
        Ok(())
    }

    /// Remove the previous run's artifacts: bundle file, process-output
    /// file, and the KV metadata entry.
    async fn cleanup_previous_run(&self) -> Result<(), MetadataError> {
        let Some(previous) = self.inner.handle.read().clone() else {
            return Ok(());
        };
        let bundle = previous.bundle_file_path();
        if tokio::fs::try_exists(bundle).await? {
            tracing::debug!(path = %bundle.display(), "cleaning up previous debug bundle");
            tokio::fs::remove_file(bundle).await?;
        }
        let output = previous.process_output_file_path();
        if tokio::fs::try_exists(output).await? {
            tracing::debug!(path = %output.display(), "cleaning up previous process output");
            tokio::fs::remove_file(output).await?;
        }
        self.inner.metadata.remove().await?;
        Ok(())
    }

    /// Runs on the service shard after `wait` resolves: re-acquire the
    /// control mutex and persist the run metadata. Errors are logged,
    /// never propagated.
    async fn handle_wait_result(&self, job_id: JobId) {
        let _units = self.inner.control.lock().await;
        tracing::debug!(%job_id, "wait completed for debug bundle job");
        let Some(handle) = self.inner.handle.read().clone() else {
            return;
        };
        // A later initiate may already have replaced the slot.
        if handle.job_id() != job_id {
            tracing::debug!(
                %job_id,
                "not recording metadata, another process already started"
            );
            return;
        }
        if let Err(e) = self.inner.metadata.write(job_id, &handle).await {
            tracing::warn!(%job_id, error = %e, "failed to record metadata for debug bundle job");
        }
    }
}

async fn file_exists(path: &Path) -> Result<bool, BundleError> {
    tokio::fs::try_exists(path).await.map_err(|e| {
        BundleError::internal(format!("failed to check {}: {e}", path.display()))
    })
}
