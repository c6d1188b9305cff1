// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker launching seam.
//!
//! The [`WorkerLauncher`] trait is the boundary between pool logic and the
//! operating system: the production [`ProcessLauncher`] execs a runtime
//! binary with the worker script, while the scripted launcher (test
//! support) runs an in-process fake over duplex pipes. Pool, scheduler,
//! and worker logic never know the difference.

mod process;
#[cfg(any(test, feature = "test-support"))]
mod scripted;

pub use process::{ProcessLauncher, RuntimeCommands};
#[cfg(any(test, feature = "test-support"))]
pub use scripted::{ReplyKind, ScriptedLauncher, ScriptedReply};

use crate::error::WorkerError;
use async_trait::async_trait;
use fp_core::{FunctionId, RuntimeTag, WorkerId};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};

/// Everything needed to launch one worker process.
#[derive(Debug, Clone)]
pub struct WorkerSpec {
    pub worker_id: WorkerId,
    pub function: FunctionId,
    pub version: String,
    pub runtime: RuntimeTag,
    pub bundle_path: PathBuf,
    /// User-declared environment from the deployment spec. Reserved names
    /// are filtered before injection.
    pub env: Vec<(String, String)>,
}

/// Handle on a launched child: captured stdio plus a process guard.
pub struct WorkerConnection {
    pub stdin: Box<dyn AsyncWrite + Send + Unpin>,
    pub stdout: Box<dyn AsyncRead + Send + Unpin>,
    pub guard: Arc<dyn ProcessGuard>,
}

/// Liveness and termination control over one child process.
#[async_trait]
pub trait ProcessGuard: Send + Sync {
    fn is_alive(&self) -> bool;

    /// Ask the child to exit gracefully. Safe to call repeatedly.
    fn signal_term(&self);

    /// Kill without ceremony. Safe to call repeatedly.
    fn force_kill(&self);

    /// Wait until the child exits, up to `timeout`. Returns true once the
    /// child is gone.
    async fn wait_exit(&self, timeout: Duration) -> bool;
}

/// Launches worker children for a pool.
#[async_trait]
pub trait WorkerLauncher: Send + Sync {
    async fn launch(&self, spec: &WorkerSpec) -> Result<WorkerConnection, WorkerError>;
}
