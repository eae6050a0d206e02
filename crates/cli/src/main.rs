// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `duffel`: run one debug-bundle collection end to end.
//!
//! Stands up the shard set, the KV store, and the service in-process,
//! initiates a collection, polls status to a terminal state, and prints
//! where the bundle landed. Useful for smoke-testing a collector binary
//! and the service wiring outside the full node.

use anyhow::Context;
use clap::Parser;
use duffel_core::{Binding, BundleParameters, BundleStatus, JobId};
use duffel_service::{BundleService, ServiceConfig, ShardSet};
use duffel_storage::KvStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "duffel", about = "Run one debug-bundle collection")]
struct Args {
    /// Path to the collector binary
    #[arg(long)]
    collector: PathBuf,
    /// Data directory (bundles land under <data-dir>/debug-bundle
    /// unless --storage-dir is given)
    #[arg(long)]
    data_dir: PathBuf,
    /// Storage directory override for bundle artifacts
    #[arg(long)]
    storage_dir: Option<PathBuf>,
    /// Number of shards to run
    #[arg(long, default_value_t = 2)]
    shards: usize,
    /// Only collect logs newer than this (date/time string)
    #[arg(long)]
    logs_since: Option<String>,
    /// Only collect logs older than this (date/time string)
    #[arg(long)]
    logs_until: Option<String>,
    /// Cap the collected logs at this many bytes
    #[arg(long)]
    logs_size_limit_bytes: Option<u64>,
    /// Metrics sampling interval in seconds
    #[arg(long)]
    metrics_interval_seconds: Option<u64>,
    /// Partitions to include (repeatable)
    #[arg(long)]
    partition: Vec<String>,
    /// Kubernetes namespace to pass to the collector
    #[arg(long)]
    namespace: Option<String>,
}

impl Args {
    fn parameters(&self) -> BundleParameters {
        BundleParameters {
            logs_since: self.logs_since.clone(),
            logs_until: self.logs_until.clone(),
            logs_size_limit_bytes: self.logs_size_limit_bytes,
            metrics_interval_seconds: self.metrics_interval_seconds,
            partition: (!self.partition.is_empty()).then(|| self.partition.clone()),
            k8s_namespace: self.namespace.clone(),
            ..Default::default()
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let params = args.parameters();

    let shards = Arc::new(ShardSet::new(args.shards.max(1)).context("failed to start shards")?);
    let kv = Arc::new(
        KvStore::open(args.data_dir.join("kv")).context("failed to open the kv store")?,
    );
    let config = ServiceConfig {
        data_dir: args.data_dir.clone(),
        collector_path: Binding::fixed(args.collector.clone()),
        storage_dir: Binding::fixed(args.storage_dir.clone()),
    };
    let service = BundleService::new(Arc::clone(&shards), kv, config);
    service.start().await;

    let job_id = JobId::new();
    tracing::info!(%job_id, "initiating debug bundle collection");
    service
        .initiate(job_id, params)
        .await
        .map_err(|e| anyhow::anyhow!("initiate failed ({}): {e}", e.code()))?;

    let status = loop {
        let status = service
            .status()
            .await
            .map_err(|e| anyhow::anyhow!("status failed ({}): {e}", e.code()))?;
        if status.status != BundleStatus::Running {
            break status;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    };

    match status.status {
        BundleStatus::Success => {
            let path = service
                .path(job_id)
                .await
                .map_err(|e| anyhow::anyhow!("path failed ({}): {e}", e.code()))?;
            println!(
                "bundle ready: {} ({} bytes)",
                path.display(),
                status.file_size.unwrap_or(0)
            );
        }
        BundleStatus::Error => {
            eprintln!("collection failed; collector stderr:");
            for line in &status.stderr {
                eprintln!("  {line}");
            }
        }
        BundleStatus::Running => unreachable!("loop exits only on a terminal status"),
    }

    service.stop().await;
    shards.shutdown();
    Ok(())
}
