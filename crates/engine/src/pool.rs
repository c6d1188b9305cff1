// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-`(function, version)` worker pool.
//!
//! Warm workers wait in a FIFO queue; busy workers sit in a set. The
//! invariant `|warm| + |busy| + spawning ≤ max_workers` holds at every
//! point, so concurrent acquires cannot overshoot capacity while a spawn
//! is in flight.

use crate::error::PoolError;
use crate::launcher::{WorkerLauncher, WorkerSpec};
use crate::logstore::LogStore;
use crate::worker::Worker;
use fp_core::{Clock, FunctionId, RuntimeTag, SystemClock, WorkerId};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Bound on concurrent worker terminations during `stop`.
const STOP_DEADLINE: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_workers: usize,
    pub warm_workers: usize,
    pub idle_ttl: Duration,
    pub spawn_timeout: Duration,
    pub sweep_interval: Duration,
    /// Slack past the invocation deadline before the controller gives up
    /// on the child.
    pub invoke_grace: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            warm_workers: 1,
            idle_ttl: Duration::from_secs(300),
            spawn_timeout: Duration::from_secs(10),
            sweep_interval: Duration::from_secs(30),
            invoke_grace: Duration::from_secs(2),
        }
    }
}

/// What a pool serves: one version of one function.
#[derive(Debug, Clone)]
pub struct PoolSpec {
    pub function: FunctionId,
    pub version: String,
    pub runtime: RuntimeTag,
    pub bundle_path: PathBuf,
    pub env: Vec<(String, String)>,
}

/// A worker handed out by `acquire`, tagged when it was freshly spawned.
pub struct Acquired {
    pub worker: Arc<Worker>,
    pub cold_start: bool,
}

#[derive(Default)]
struct PoolInner {
    warm: VecDeque<Arc<Worker>>,
    busy: HashMap<WorkerId, Arc<Worker>>,
    /// Spawns in flight, counted against capacity.
    spawning: usize,
    stopped: bool,
}

pub struct Pool<C: Clock = SystemClock> {
    spec: PoolSpec,
    launcher: Arc<dyn WorkerLauncher>,
    cfg: PoolConfig,
    clock: C,
    logs: Option<Arc<LogStore>>,
    inner: Mutex<PoolInner>,
    released: Notify,
    sweeper: Mutex<Option<CancellationToken>>,
}

impl<C: Clock> Pool<C> {
    pub fn new(
        spec: PoolSpec,
        launcher: Arc<dyn WorkerLauncher>,
        cfg: PoolConfig,
        clock: C,
        logs: Option<Arc<LogStore>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            spec,
            launcher,
            cfg,
            clock,
            logs,
            inner: Mutex::new(PoolInner::default()),
            released: Notify::new(),
            sweeper: Mutex::new(None),
        })
    }

    pub fn function(&self) -> &FunctionId {
        &self.spec.function
    }

    pub fn version(&self) -> &str {
        &self.spec.version
    }

    pub fn config(&self) -> &PoolConfig {
        &self.cfg
    }

    /// `(warm, busy)` sizes, for tests and status reporting.
    pub fn counts(&self) -> (usize, usize) {
        let inner = self.inner.lock();
        (inner.warm.len(), inner.busy.len())
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.lock().stopped
    }

    /// Pop a warm worker, or spawn within capacity, or report saturation.
    pub async fn acquire(&self) -> Result<Acquired, PoolError> {
        {
            let mut inner = self.inner.lock();
            if inner.stopped {
                return Err(PoolError::Stopped);
            }
            if let Some(worker) = inner.warm.pop_front() {
                inner.busy.insert(worker.id().clone(), Arc::clone(&worker));
                return Ok(Acquired { worker, cold_start: false });
            }
            if inner.warm.len() + inner.busy.len() + inner.spawning >= self.cfg.max_workers {
                return Err(PoolError::Saturated);
            }
            inner.spawning += 1;
        }

        // Spawn outside the lock; the reserved slot keeps capacity honest.
        let spec = WorkerSpec {
            worker_id: WorkerId::generate(),
            function: self.spec.function.clone(),
            version: self.spec.version.clone(),
            runtime: self.spec.runtime,
            bundle_path: self.spec.bundle_path.clone(),
            env: self.spec.env.clone(),
        };
        let result =
            Worker::spawn(self.launcher.as_ref(), spec, self.cfg.spawn_timeout, self.logs.clone())
                .await;

        let mut inner = self.inner.lock();
        inner.spawning -= 1;
        match result {
            Err(e) => {
                drop(inner);
                // The reserved slot is free again; wake a queued drainer.
                self.released.notify_one();
                Err(PoolError::Spawn(e))
            }
            Ok(worker) => {
                if inner.stopped {
                    drop(inner);
                    worker.terminate_detached();
                    return Err(PoolError::Stopped);
                }
                inner.busy.insert(worker.id().clone(), Arc::clone(&worker));
                let cold_start = inner.warm.is_empty() && inner.busy.len() == 1;
                Ok(Acquired { worker, cold_start })
            }
        }
    }

    /// Hand a worker back. Unhealthy workers are terminated; healthy ones
    /// rejoin the warm queue while it is below `warm_workers`.
    pub fn release(&self, worker: Arc<Worker>) {
        let terminate = {
            let mut inner = self.inner.lock();
            inner.busy.remove(worker.id());
            if inner.stopped || !worker.health_check() {
                true
            } else if inner.warm.len() < self.cfg.warm_workers {
                worker.touch(self.clock.epoch_ms());
                inner.warm.push_back(Arc::clone(&worker));
                false
            } else {
                true
            }
        };
        if terminate {
            worker.terminate_detached();
        }
        self.released.notify_one();
    }

    /// Wait until capacity may have freed (a release or failed spawn).
    pub async fn wait_released(&self) {
        self.released.notified().await;
    }

    /// Terminate warm workers idle past the TTL. Busy workers are never
    /// touched.
    pub fn evict_idle(&self) {
        let ttl_ms = self.cfg.idle_ttl.as_millis() as u64;
        let now = self.clock.epoch_ms();
        let expired: Vec<Arc<Worker>> = {
            let mut inner = self.inner.lock();
            let (keep, evict): (VecDeque<_>, VecDeque<_>) = inner
                .warm
                .drain(..)
                .partition(|w| now.saturating_sub(w.last_used_ms()) <= ttl_ms);
            inner.warm = keep;
            evict.into_iter().collect()
        };
        for worker in expired {
            tracing::info!(
                worker_id = %worker.id(),
                function = %self.spec.function,
                "evicting idle worker"
            );
            worker.terminate_detached();
        }
    }

    /// Start the periodic idle sweep. No-op if already running.
    pub fn start_sweeper(self: Arc<Self>) {
        let cancel = {
            let mut sweeper = self.sweeper.lock();
            if sweeper.is_some() {
                return;
            }
            let cancel = CancellationToken::new();
            *sweeper = Some(cancel.clone());
            cancel
        };
        let pool = self;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(pool.cfg.sweep_interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = interval.tick() => pool.evict_idle(),
                }
            }
        });
    }

    /// Stop the pool: no further acquires, all workers terminated
    /// concurrently within a bounded deadline.
    pub async fn stop(&self) {
        let workers: Vec<Arc<Worker>> = {
            let mut inner = self.inner.lock();
            if inner.stopped {
                Vec::new()
            } else {
                inner.stopped = true;
                let mut workers: Vec<_> = inner.warm.drain(..).collect();
                workers.extend(inner.busy.drain().map(|(_, w)| w));
                workers
            }
        };
        if let Some(cancel) = self.sweeper.lock().take() {
            cancel.cancel();
        }
        let terminations = workers.iter().map(|w| w.terminate());
        if tokio::time::timeout(STOP_DEADLINE, futures_util::future::join_all(terminations))
            .await
            .is_err()
        {
            tracing::warn!(function = %self.spec.function, "pool stop exceeded its deadline");
        }
        self.released.notify_one();
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
