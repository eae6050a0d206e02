// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn test_parse_roundtrip() {
    let id = JobId::new();
    let parsed = JobId::parse(&id.to_string()).unwrap();
    assert_eq!(id, parsed);
}

#[test]
fn test_parse_rejects_garbage() {
    assert!(JobId::parse("not-a-uuid").is_err());
}

#[test]
fn test_serde_transparent() {
    let id = JobId::parse("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"67e55044-10b1-426f-9247-bb680e5fe0c8\"");
    let back: JobId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}

#[test]
fn test_new_ids_are_distinct() {
    assert_ne!(JobId::new(), JobId::new());
}
