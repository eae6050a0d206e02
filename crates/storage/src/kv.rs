// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable keyed byte-blob store with namespaced key spaces.
//!
//! Each key space maps to a subdirectory under the store root and each
//! key to one file inside it, named with the lowercase hex of the key
//! bytes. Writes land in a temp file, are fsynced, and are renamed into
//! place so a crash leaves either the old value or the new one, never a
//! torn file.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Errors from key-value store operations
#[derive(Debug, Error)]
pub enum KvError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Namespaces for keys. Each space is isolated: the same key in two
/// spaces names two independent entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeySpace {
    DebugBundle,
}

impl KeySpace {
    fn dir_name(self) -> &'static str {
        match self {
            KeySpace::DebugBundle => "debug_bundle",
        }
    }
}

/// File-backed key-value store.
pub struct KvStore {
    root: PathBuf,
}

impl KvStore {
    /// Open (or create) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, KvError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Durably store `value` under `key`, replacing any previous value.
    pub async fn put(&self, space: KeySpace, key: &[u8], value: Vec<u8>) -> Result<(), KvError> {
        let dir = self.root.join(space.dir_name());
        tokio::fs::create_dir_all(&dir).await?;
        let name = hex_name(key);
        let tmp = dir.join(format!("{name}.tmp"));
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&value).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp, dir.join(name)).await?;
        Ok(())
    }

    /// Fetch the value stored under `key`, if any.
    pub async fn get(&self, space: KeySpace, key: &[u8]) -> Result<Option<Vec<u8>>, KvError> {
        match tokio::fs::read(self.entry_path(space, key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove the entry under `key`. Removing an absent key is not an error.
    pub async fn remove(&self, space: KeySpace, key: &[u8]) -> Result<(), KvError> {
        match tokio::fs::remove_file(self.entry_path(space, key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn entry_path(&self, space: KeySpace, key: &[u8]) -> PathBuf {
        self.root.join(space.dir_name()).join(hex_name(key))
    }
}

fn hex_name(key: &[u8]) -> String {
    use std::fmt::Write;
    let mut name = String::with_capacity(key.len() * 2);
    for byte in key {
        let _ = write!(name, "{byte:02x}");
    }
    name
}

#[cfg(test)]
#[path = "kv_tests.rs"]
mod tests;
