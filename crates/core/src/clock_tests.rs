// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn test_system_clock_advances() {
    let clock = SystemClock;
    let a = clock.now();
    let b = clock.now();
    assert!(b >= a);
}

#[test]
fn test_fake_clock_advance() {
    let clock = FakeClock::new();
    let start = clock.now();
    let utc_start = clock.utc_now();

    clock.advance(Duration::from_secs(90));

    assert_eq!(clock.now() - start, Duration::from_secs(90));
    assert_eq!((clock.utc_now() - utc_start).num_seconds(), 90);
}

#[test]
fn test_fake_clock_set_utc() {
    let clock = FakeClock::new();
    let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    clock.set_utc(at);
    assert_eq!(clock.utc_now(), at);
}

#[test]
fn test_fake_clock_clones_share_time() {
    let clock = FakeClock::new();
    let other = clock.clone();
    clock.advance(Duration::from_secs(5));
    assert_eq!(clock.now(), other.now());
}
