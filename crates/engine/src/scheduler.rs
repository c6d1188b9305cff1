// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler: single entry point in front of the pools.
//!
//! Saturation becomes a FIFO queue wait per function, drained by one task
//! per function as pool capacity frees. Dispatch order equals enqueue
//! order; completion order is up to the workers.

use crate::error::{PoolError, ScheduleError, WorkerError};
use crate::pool::{Acquired, Pool};
use fp_core::{Clock, FunctionId, InvocationId, InvocationOutcome, InvocationRequest, SystemClock};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Per-function cap on queued invocations; beyond it `schedule`
    /// returns an overload error instead of blocking unboundedly.
    pub queue_cap: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { queue_cap: 256 }
    }
}

struct QueuedInvocation {
    invocation: InvocationId,
    request: InvocationRequest,
    cancel: CancellationToken,
    result_tx: oneshot::Sender<Result<InvocationOutcome, ScheduleError>>,
}

#[derive(Default)]
struct FunctionQueue {
    entries: VecDeque<QueuedInvocation>,
    draining: bool,
}

/// Cheap cloneable handle; all state lives behind the shared inner.
pub struct Scheduler<C: Clock = SystemClock> {
    shared: Arc<Shared<C>>,
}

impl<C: Clock> Clone for Scheduler<C> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

struct Shared<C: Clock> {
    pools: RwLock<HashMap<FunctionId, Arc<Pool<C>>>>,
    queues: Mutex<HashMap<FunctionId, FunctionQueue>>,
    cfg: SchedulerConfig,
    stopped: AtomicBool,
}

impl<C: Clock> Scheduler<C> {
    pub fn new(cfg: SchedulerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                pools: RwLock::new(HashMap::new()),
                queues: Mutex::new(HashMap::new()),
                cfg,
                stopped: AtomicBool::new(false),
            }),
        }
    }

    pub fn register_pool(&self, pool: Arc<Pool<C>>) {
        self.shared.pools.write().insert(pool.function().clone(), pool);
    }

    pub fn unregister_pool(&self, function: &FunctionId) -> Option<Arc<Pool<C>>> {
        self.shared.pools.write().remove(function)
    }

    pub fn pool(&self, function: &FunctionId) -> Option<Arc<Pool<C>>> {
        self.shared.pools.read().get(function).cloned()
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::Acquire)
    }

    /// Run one invocation through the function's pool, queueing behind it
    /// when saturated.
    pub async fn schedule(
        &self,
        function: &FunctionId,
        request: InvocationRequest,
        cancel: CancellationToken,
    ) -> Result<InvocationOutcome, ScheduleError> {
        if self.is_stopped() {
            return Err(ScheduleError::Stopped);
        }
        let pool =
            self.pool(function).ok_or_else(|| ScheduleError::NoPool(function.clone()))?;
        match pool.acquire().await {
            Ok(acquired) => dispatch(&pool, acquired, request, &cancel).await,
            Err(PoolError::Saturated) => self.enqueue(function, pool, request, cancel).await,
            Err(PoolError::Stopped) => Err(ScheduleError::PoolStopped),
            Err(PoolError::Spawn(e)) => Err(ScheduleError::Worker(e)),
        }
    }

    /// Park the invocation behind the saturated pool and wait for its
    /// result or cancellation.
    async fn enqueue(
        &self,
        function: &FunctionId,
        pool: Arc<Pool<C>>,
        request: InvocationRequest,
        cancel: CancellationToken,
    ) -> Result<InvocationOutcome, ScheduleError> {
        let invocation = InvocationId::generate();
        let (result_tx, result_rx) = oneshot::channel();
        {
            let mut queues = self.shared.queues.lock();
            let queue = queues.entry(function.clone()).or_default();
            if queue.entries.len() >= self.shared.cfg.queue_cap {
                return Err(ScheduleError::QueueOverflow(function.clone()));
            }
            queue.entries.push_back(QueuedInvocation {
                invocation: invocation.clone(),
                request,
                cancel: cancel.clone(),
                result_tx,
            });
            if !queue.draining {
                queue.draining = true;
                let function = function.clone();
                tokio::spawn(Arc::clone(&self.shared).drain_queue(function, pool));
            }
        }
        tokio::select! {
            result = result_rx => result.unwrap_or(Err(ScheduleError::Stopped)),
            _ = cancel.cancelled() => {
                self.shared.remove_queued(function, &invocation);
                Err(ScheduleError::Cancelled)
            }
        }
    }

    /// Stop scheduling: fail queued work, then stop every pool
    /// concurrently.
    pub async fn stop(&self) {
        self.shared.stopped.store(true, Ordering::Release);
        let functions: Vec<FunctionId> = self.shared.queues.lock().keys().cloned().collect();
        for function in &functions {
            self.shared.fail_queue(function, || ScheduleError::Stopped);
        }
        let pools: Vec<Arc<Pool<C>>> =
            self.shared.pools.write().drain().map(|(_, p)| p).collect();
        futures_util::future::join_all(pools.iter().map(|p| p.stop())).await;
    }
}

impl<C: Clock> Shared<C> {
    /// Best-effort removal of a cancelled entry that has not yet been
    /// dispatched.
    fn remove_queued(&self, function: &FunctionId, invocation: &InvocationId) {
        let mut queues = self.queues.lock();
        if let Some(queue) = queues.get_mut(function) {
            queue.entries.retain(|e| &e.invocation != invocation);
        }
    }

    /// Pop the head of the queue, flipping `draining` off when empty.
    fn pop_queued(&self, function: &FunctionId) -> Option<QueuedInvocation> {
        let mut queues = self.queues.lock();
        let queue = queues.get_mut(function)?;
        match queue.entries.pop_front() {
            Some(entry) => Some(entry),
            None => {
                queue.draining = false;
                None
            }
        }
    }

    async fn drain_queue(self: Arc<Self>, function: FunctionId, pool: Arc<Pool<C>>) {
        loop {
            match pool.acquire().await {
                Ok(acquired) => match self.pop_queued(&function) {
                    Some(entry) if entry.cancel.is_cancelled() => {
                        pool.release(acquired.worker);
                    }
                    Some(entry) => {
                        // Dispatch order is fixed here; execution runs
                        // concurrently across workers.
                        let pool = Arc::clone(&pool);
                        tokio::spawn(async move {
                            let result =
                                dispatch(&pool, acquired, entry.request, &entry.cancel).await;
                            let _ = entry.result_tx.send(result);
                        });
                    }
                    None => {
                        pool.release(acquired.worker);
                        return;
                    }
                },
                Err(PoolError::Saturated) => {
                    if self.stopped.load(Ordering::Acquire) {
                        self.fail_queue(&function, || ScheduleError::Stopped);
                        return;
                    }
                    pool.wait_released().await;
                }
                Err(PoolError::Stopped) => {
                    self.fail_queue(&function, || ScheduleError::PoolStopped);
                    return;
                }
                Err(PoolError::Spawn(e)) => {
                    // The spawn failure lands on the head invocation; the
                    // rest stay queued for the next attempt.
                    match self.pop_queued(&function) {
                        Some(entry) => {
                            let _ = entry.result_tx.send(Err(ScheduleError::Worker(e)));
                        }
                        None => return,
                    }
                }
            }
        }
    }

    /// Fail every queued invocation for a function and mark its drainer
    /// stopped.
    fn fail_queue(&self, function: &FunctionId, make_err: impl Fn() -> ScheduleError) {
        let entries: Vec<QueuedInvocation> = {
            let mut queues = self.queues.lock();
            match queues.get_mut(function) {
                Some(queue) => {
                    queue.draining = false;
                    queue.entries.drain(..).collect()
                }
                None => Vec::new(),
            }
        };
        for entry in entries {
            let _ = entry.result_tx.send(Err(make_err()));
        }
    }
}

/// Invoke on an acquired worker and always release it before returning.
async fn dispatch<C: Clock>(
    pool: &Pool<C>,
    acquired: Acquired,
    request: InvocationRequest,
    cancel: &CancellationToken,
) -> Result<InvocationOutcome, ScheduleError> {
    let invocation = InvocationId::generate();
    let started = std::time::Instant::now();
    let result = acquired
        .worker
        .invoke(&invocation, &request, cancel, pool.config().invoke_grace)
        .await;
    let outcome = match result {
        Ok(body) => match body.decode_body() {
            Ok(bytes) => Ok(InvocationOutcome {
                status: body.status,
                headers: body.headers,
                body: bytes,
                execution_time: started.elapsed(),
                cold_start: acquired.cold_start,
            }),
            Err(e) => {
                acquired.worker.poison(&format!("undecodable response body: {}", e));
                Err(ScheduleError::Worker(WorkerError::Transport(format!(
                    "undecodable response body: {}",
                    e
                ))))
            }
        },
        Err(e) => Err(ScheduleError::Worker(e)),
    };
    pool.release(acquired.worker);
    outcome
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
