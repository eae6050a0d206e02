// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Caller-supplied parameters for a collector run.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Kubernetes namespaces are RFC 1123 labels: 63 characters at most.
const MAX_K8S_NAMESPACE_LEN: usize = 63;

static RFC1123_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?$")
        .expect("constant regex pattern is valid")
});

/// Check that `ns` is a valid RFC 1123 label usable as a k8s namespace:
/// non-empty, at most 63 characters, alphanumeric at both ends, and only
/// alphanumerics or `-` in between.
pub fn is_valid_k8s_namespace(ns: &str) -> bool {
    !ns.is_empty() && ns.len() <= MAX_K8S_NAMESPACE_LEN && RFC1123_LABEL.is_match(ns)
}

/// Authentication material forwarded to the collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthnOptions {
    Scram {
        username: String,
        password: String,
        mechanism: String,
    },
}

/// Optional knobs for one collector run. Every field maps to one
/// collector CLI argument group; unset fields emit nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BundleParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authn: Option<AuthnOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_logs_size_limit_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_profiler_wait_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs_since: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs_size_limit_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs_until: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_interval_seconds: Option<u64>,
    /// Partitions passed through as one space-joined argument.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_insecure_skip_verify: Option<bool>,
    /// Validated against the RFC 1123 label rule at argv-build time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k8s_namespace: Option<String>,
}

#[cfg(test)]
#[path = "params_tests.rs"]
mod tests;
