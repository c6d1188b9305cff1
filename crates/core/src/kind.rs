// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stable error-kind strings.
//!
//! Every error that crosses the wire or the HTTP edge carries one of these
//! names. The strings are part of the external interface; renaming one is a
//! breaking change.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    #[serde(rename = "SPAWN_FAILURE")]
    SpawnFailure,
    #[serde(rename = "MAX_WORKERS_REACHED")]
    MaxWorkersReached,
    #[serde(rename = "POOL_STOPPED")]
    PoolStopped,
    #[serde(rename = "SCHEDULER_STOPPED")]
    SchedulerStopped,
    #[serde(rename = "BUNDLE_LOAD_ERROR")]
    BundleLoadError,
    #[serde(rename = "HANDLER_ERROR")]
    HandlerError,
    #[serde(rename = "DEADLINE_EXCEEDED")]
    DeadlineExceeded,
    #[serde(rename = "TRANSPORT_ERROR")]
    TransportError,
    #[serde(rename = "QUEUE_OVERFLOW")]
    QueueOverflow,
    #[serde(rename = "PORT_POOL_EXHAUSTED")]
    PortPoolExhausted,
    #[serde(rename = "INSTANCE_MANAGER_CLOSED")]
    InstanceManagerClosed,
    #[serde(rename = "FRAME_TOO_LARGE")]
    FrameTooLarge,
    #[serde(rename = "INVALID_FRAME")]
    InvalidFrame,
    #[serde(rename = "UNKNOWN_COMMAND")]
    UnknownCommand,
    #[serde(rename = "NO_POOL")]
    NoPool,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::SpawnFailure => "SPAWN_FAILURE",
            ErrorKind::MaxWorkersReached => "MAX_WORKERS_REACHED",
            ErrorKind::PoolStopped => "POOL_STOPPED",
            ErrorKind::SchedulerStopped => "SCHEDULER_STOPPED",
            ErrorKind::BundleLoadError => "BUNDLE_LOAD_ERROR",
            ErrorKind::HandlerError => "HANDLER_ERROR",
            ErrorKind::DeadlineExceeded => "DEADLINE_EXCEEDED",
            ErrorKind::TransportError => "TRANSPORT_ERROR",
            ErrorKind::QueueOverflow => "QUEUE_OVERFLOW",
            ErrorKind::PortPoolExhausted => "PORT_POOL_EXHAUSTED",
            ErrorKind::InstanceManagerClosed => "INSTANCE_MANAGER_CLOSED",
            ErrorKind::FrameTooLarge => "FRAME_TOO_LARGE",
            ErrorKind::InvalidFrame => "INVALID_FRAME",
            ErrorKind::UnknownCommand => "UNKNOWN_COMMAND",
            ErrorKind::NoPool => "NO_POOL",
        }
    }

    /// True when the caller may reasonably retry the same request.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::SpawnFailure
                | ErrorKind::QueueOverflow
                | ErrorKind::PortPoolExhausted
                | ErrorKind::DeadlineExceeded
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
#[path = "kind_tests.rs"]
mod tests;
