// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Functions execution engine: workers, pools, and the scheduler.
//!
//! A [`Worker`] is one long-lived child process speaking NDJSON over its
//! stdio. A [`Pool`] owns the workers for one `(function, version)` and
//! hands them out one at a time. The [`Scheduler`] is the single entry
//! point from the control edge, queueing invocations behind saturated
//! pools in FIFO order.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod error;
mod launcher;
mod logstore;
mod message;
mod pool;
mod scheduler;
mod worker;

pub use error::{PoolError, ScheduleError, WorkerError};
pub use launcher::{
    ProcessGuard, ProcessLauncher, RuntimeCommands, WorkerConnection, WorkerLauncher, WorkerSpec,
};
pub use logstore::{JsonlSink, LogSink, LogStore, MemorySink};
pub use message::{codes, ErrorBody, InvokeBody, LogBody, MessageKind, ResponseBody, WorkerMessage};
pub use pool::{Acquired, Pool, PoolConfig, PoolSpec};
pub use scheduler::{Scheduler, SchedulerConfig};
pub use worker::{Worker, WorkerState};

#[cfg(any(test, feature = "test-support"))]
pub use launcher::{ReplyKind, ScriptedLauncher, ScriptedReply};
