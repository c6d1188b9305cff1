// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use fp_core::ErrorKind;
use thiserror::Error;

/// Errors from instance acquisition and lifecycle.
#[derive(Debug, Error)]
pub enum InstanceError {
    /// The bounded port pool is empty. Retryable once an instance is
    /// evicted.
    #[error("no free ports for a new instance")]
    PortsExhausted,

    #[error("instance manager is closed")]
    Closed,

    #[error("failed to launch instance: {0}")]
    Spawn(String),

    #[error("instance data directory error: {0}")]
    DataDir(#[from] std::io::Error),
}

impl InstanceError {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            InstanceError::PortsExhausted => Some(ErrorKind::PortPoolExhausted),
            InstanceError::Closed => Some(ErrorKind::InstanceManagerClosed),
            InstanceError::Spawn(_) => Some(ErrorKind::SpawnFailure),
            InstanceError::DataDir(_) => None,
        }
    }
}
