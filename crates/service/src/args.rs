// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Collector CLI argument construction.
//!
//! The collector contract: `<collector> debug bundle --output <bundle>
//! --verbose` followed by one argument group per set parameter field, in
//! a fixed order. Byte-valued numbers get a `B` suffix, durations an
//! `s` suffix, and `-X` options use `key=value` with no whitespace.

use duffel_core::{is_valid_k8s_namespace, AuthnOptions, BundleError, BundleParameters};
use std::path::Path;

const OUTPUT_FLAG: &str = "--output";
const VERBOSE_FLAG: &str = "--verbose";
const USERNAME_FLAG: &str = "-Xuser";
const PASSWORD_FLAG: &str = "-Xpass";
const SASL_MECHANISM_FLAG: &str = "-Xsasl.mechanism";
const CONTROLLER_LOGS_SIZE_LIMIT_FLAG: &str = "--controller-logs-size-limit";
const CPU_PROFILER_WAIT_FLAG: &str = "--cpu-profiler-wait";
const LOGS_SINCE_FLAG: &str = "--logs-since";
const LOGS_SIZE_LIMIT_FLAG: &str = "--logs-size-limit";
const LOGS_UNTIL_FLAG: &str = "--logs-until";
const METRICS_INTERVAL_FLAG: &str = "--metrics-interval";
const PARTITION_FLAG: &str = "--partition";
const TLS_ENABLED_FLAG: &str = "-Xtls.enabled";
const TLS_INSECURE_SKIP_VERIFY_FLAG: &str = "-Xtls.insecure_skip_verify";
const NAMESPACE_FLAG: &str = "--namespace";

/// Build the collector argument vector for one run.
///
/// Fails with `invalid_parameters` (and no other effect) when a field
/// fails validation.
pub fn build_collector_args(
    collector_path: &Path,
    bundle_path: &Path,
    params: &BundleParameters,
) -> Result<Vec<String>, BundleError> {
    let mut argv = vec![
        collector_path.display().to_string(),
        "debug".to_string(),
        "bundle".to_string(),
        OUTPUT_FLAG.to_string(),
        bundle_path.display().to_string(),
        VERBOSE_FLAG.to_string(),
    ];
    if let Some(AuthnOptions::Scram { username, password, mechanism }) = &params.authn {
        argv.push(format!("{USERNAME_FLAG}={username}"));
        argv.push(format!("{PASSWORD_FLAG}={password}"));
        argv.push(format!("{SASL_MECHANISM_FLAG}={mechanism}"));
    }
    if let Some(limit) = params.controller_logs_size_limit_bytes {
        argv.push(CONTROLLER_LOGS_SIZE_LIMIT_FLAG.to_string());
        argv.push(format!("{limit}B"));
    }
    if let Some(secs) = params.cpu_profiler_wait_seconds {
        argv.push(CPU_PROFILER_WAIT_FLAG.to_string());
        argv.push(format!("{secs}s"));
    }
    if let Some(since) = &params.logs_since {
        argv.push(LOGS_SINCE_FLAG.to_string());
        argv.push(since.clone());
    }
    if let Some(limit) = params.logs_size_limit_bytes {
        argv.push(LOGS_SIZE_LIMIT_FLAG.to_string());
        argv.push(format!("{limit}B"));
    }
    if let Some(until) = &params.logs_until {
        argv.push(LOGS_UNTIL_FLAG.to_string());
        argv.push(until.clone());
    }
    if let Some(secs) = params.metrics_interval_seconds {
        argv.push(METRICS_INTERVAL_FLAG.to_string());
        argv.push(format!("{secs}s"));
    }
    if let Some(partitions) = &params.partition {
        argv.push(PARTITION_FLAG.to_string());
        argv.push(partitions.join(" "));
    }
    if let Some(enabled) = params.tls_enabled {
        argv.push(format!("{TLS_ENABLED_FLAG}={enabled}"));
    }
    if let Some(skip) = params.tls_insecure_skip_verify {
        argv.push(format!("{TLS_INSECURE_SKIP_VERIFY_FLAG}={skip}"));
    }
    if let Some(ns) = &params.k8s_namespace {
        if !is_valid_k8s_namespace(ns) {
            return Err(BundleError::InvalidParameters {
                reason: format!("invalid k8s namespace name {ns:?}"),
            });
        }
        argv.push(NAMESPACE_FLAG.to_string());
        argv.push(ns.clone());
    }
    Ok(argv)
}

fn contains_sensitive_info(arg: &str) -> bool {
    arg.contains(PASSWORD_FLAG)
}

/// Join an argument vector for logging, dropping any argument carrying
/// credential material.
pub fn join_redacted(argv: &[String]) -> String {
    let mut joined = String::new();
    for arg in argv.iter().filter(|arg| !contains_sensitive_info(arg)) {
        if !joined.is_empty() {
            joined.push(' ');
        }
        joined.push_str(arg);
    }
    joined
}

#[cfg(test)]
#[path = "args_tests.rs"]
mod tests;
