// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::path::PathBuf;

#[test]
fn test_get_returns_initial_value() {
    let source = BindingSource::new(42u32);
    assert_eq!(source.binding().get(), 42);
}

#[test]
fn test_set_is_observed_by_existing_bindings() {
    let source = BindingSource::new(PathBuf::from("/a"));
    let binding = source.binding();
    source.set(PathBuf::from("/b"));
    assert_eq!(binding.get(), PathBuf::from("/b"));
}

#[test]
fn test_fixed_binding_never_changes() {
    let binding = Binding::fixed("static".to_string());
    assert_eq!(binding.get(), "static");
}

#[tokio::test]
async fn test_subscribe_sees_change() {
    let source = BindingSource::new(1u64);
    let mut rx = source.binding().subscribe();
    source.set(2);
    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow(), 2);
}
