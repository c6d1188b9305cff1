// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error types and their stable wire kinds.

use fp_core::{ErrorKind, FunctionId};
use thiserror::Error;

/// Errors from one worker process.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Child failed to exec or never emitted its ready line.
    #[error("spawn failed: {0}")]
    SpawnFailure(String),

    /// Child could not import the deployed bundle.
    #[error("bundle load failed: {0}")]
    BundleLoad(String),

    /// The handler threw. Not a transport failure; the worker stays usable.
    #[error("handler error: {message}")]
    Handler { message: String },

    /// The invocation's deadline elapsed. `controller_side` distinguishes
    /// our defensive timeout (worker is dead) from the child reporting its
    /// own deadline (worker stays usable).
    #[error("deadline exceeded")]
    DeadlineExceeded { controller_side: bool },

    /// Stdio closed, a line failed to parse, or ids mismatched.
    #[error("transport error: {0}")]
    Transport(String),

    /// The caller cancelled while waiting on the worker.
    #[error("invocation cancelled")]
    Cancelled,
}

impl WorkerError {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            WorkerError::SpawnFailure(_) => Some(ErrorKind::SpawnFailure),
            WorkerError::BundleLoad(_) => Some(ErrorKind::BundleLoadError),
            WorkerError::Handler { .. } => Some(ErrorKind::HandlerError),
            WorkerError::DeadlineExceeded { .. } => Some(ErrorKind::DeadlineExceeded),
            WorkerError::Transport(_) => Some(ErrorKind::TransportError),
            WorkerError::Cancelled => None,
        }
    }
}

/// Errors from pool acquisition.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Warm queue empty and the pool is at `max_workers`. The scheduler
    /// converts this into a queue wait.
    #[error("pool is saturated")]
    Saturated,

    #[error("pool is stopped")]
    Stopped,

    #[error(transparent)]
    Spawn(WorkerError),
}

impl PoolError {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            PoolError::Saturated => Some(ErrorKind::MaxWorkersReached),
            PoolError::Stopped => Some(ErrorKind::PoolStopped),
            PoolError::Spawn(e) => e.kind(),
        }
    }
}

/// Errors surfaced by `Scheduler::schedule`.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("scheduler is stopped")]
    Stopped,

    #[error("pool is stopped")]
    PoolStopped,

    #[error("no pool registered for {0}")]
    NoPool(FunctionId),

    #[error("invocation queue for {0} is full")]
    QueueOverflow(FunctionId),

    /// The caller cancelled while queued or in flight.
    #[error("invocation cancelled")]
    Cancelled,

    #[error(transparent)]
    Worker(#[from] WorkerError),
}

impl ScheduleError {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ScheduleError::Stopped => Some(ErrorKind::SchedulerStopped),
            ScheduleError::PoolStopped => Some(ErrorKind::PoolStopped),
            ScheduleError::NoPool(_) => Some(ErrorKind::NoPool),
            ScheduleError::QueueOverflow(_) => Some(ErrorKind::QueueOverflow),
            ScheduleError::Cancelled => None,
            ScheduleError::Worker(e) => e.kind(),
        }
    }
}
