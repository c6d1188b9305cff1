// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    spawn = { ErrorKind::SpawnFailure, "SPAWN_FAILURE" },
    deadline = { ErrorKind::DeadlineExceeded, "DEADLINE_EXCEEDED" },
    transport = { ErrorKind::TransportError, "TRANSPORT_ERROR" },
    frame = { ErrorKind::FrameTooLarge, "FRAME_TOO_LARGE" },
    no_pool = { ErrorKind::NoPool, "NO_POOL" },
)]
fn kind_strings_are_stable(kind: ErrorKind, expected: &str) {
    assert_eq!(kind.as_str(), expected);
    // Serde uses the same names as as_str
    assert_eq!(serde_json::to_string(&kind).unwrap(), format!("\"{}\"", expected));
}

#[test]
fn kinds_round_trip_through_serde() {
    for kind in [
        ErrorKind::SpawnFailure,
        ErrorKind::MaxWorkersReached,
        ErrorKind::PoolStopped,
        ErrorKind::SchedulerStopped,
        ErrorKind::BundleLoadError,
        ErrorKind::HandlerError,
        ErrorKind::DeadlineExceeded,
        ErrorKind::TransportError,
        ErrorKind::QueueOverflow,
        ErrorKind::PortPoolExhausted,
        ErrorKind::InstanceManagerClosed,
        ErrorKind::FrameTooLarge,
        ErrorKind::InvalidFrame,
        ErrorKind::UnknownCommand,
        ErrorKind::NoPool,
    ] {
        let json = serde_json::to_string(&kind).unwrap();
        let back: ErrorKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, kind);
    }
}

#[test]
fn stopped_kinds_are_not_retryable() {
    assert!(!ErrorKind::PoolStopped.retryable());
    assert!(!ErrorKind::SchedulerStopped.retryable());
    assert!(!ErrorKind::InstanceManagerClosed.retryable());
    assert!(ErrorKind::PortPoolExhausted.retryable());
}
