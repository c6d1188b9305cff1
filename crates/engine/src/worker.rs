// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One worker: a long-lived child process serving invocations serially.
//!
//! The pool enforces one invocation in flight; the worker holds a single
//! pending slot and treats any protocol violation (unparseable line, id
//! mismatch, stdio closure) as a transport failure, which is terminal.

use crate::error::WorkerError;
use crate::launcher::{ProcessGuard, WorkerLauncher, WorkerSpec};
use crate::logstore::LogStore;
use crate::message::{codes, ErrorBody, MessageKind, ResponseBody, WorkerMessage};
use fp_core::{
    Clock, FunctionId, InvocationId, InvocationRequest, LogEntry, LogLevel, SystemClock, WorkerId,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// How long a terminating worker gets between SIGTERM and the force-kill.
const TERMINATE_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Spawning,
    Ready,
    Busy,
    Terminating,
    Dead,
}

enum ChildReply {
    Response(ResponseBody),
    Failure(ErrorBody),
}

struct Pending {
    invocation: String,
    tx: oneshot::Sender<ChildReply>,
}

pub struct Worker {
    id: WorkerId,
    function: FunctionId,
    version: String,
    state: Mutex<WorkerState>,
    last_used_ms: AtomicU64,
    stdin: tokio::sync::Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
    pending: Mutex<Option<Pending>>,
    guard: Arc<dyn ProcessGuard>,
    logs: Option<Arc<LogStore>>,
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker").finish_non_exhaustive()
    }
}

impl Worker {
    /// Launch a child and block until its ready line or the spawn timeout.
    pub async fn spawn(
        launcher: &dyn WorkerLauncher,
        spec: WorkerSpec,
        spawn_timeout: Duration,
        logs: Option<Arc<LogStore>>,
    ) -> Result<Arc<Self>, WorkerError> {
        let connection = launcher.launch(&spec).await?;
        let (ready_tx, ready_rx) = oneshot::channel();

        let worker = Arc::new(Worker {
            id: spec.worker_id.clone(),
            function: spec.function.clone(),
            version: spec.version.clone(),
            state: Mutex::new(WorkerState::Spawning),
            last_used_ms: AtomicU64::new(SystemClock.epoch_ms()),
            stdin: tokio::sync::Mutex::new(connection.stdin),
            pending: Mutex::new(None),
            guard: connection.guard,
            logs,
        });

        let reader = Arc::clone(&worker);
        tokio::spawn(reader.read_loop(connection.stdout, ready_tx));

        match tokio::time::timeout(spawn_timeout, ready_rx).await {
            Ok(Ok(())) => {
                *worker.state.lock() = WorkerState::Ready;
                tracing::debug!(worker_id = %worker.id, function = %worker.function, "worker ready");
                Ok(worker)
            }
            Ok(Err(_)) => {
                worker.terminate().await;
                Err(WorkerError::SpawnFailure("worker exited before reporting ready".into()))
            }
            Err(_) => {
                worker.terminate().await;
                Err(WorkerError::SpawnFailure(format!(
                    "no ready message within {}ms",
                    spawn_timeout.as_millis()
                )))
            }
        }
    }

    pub fn id(&self) -> &WorkerId {
        &self.id
    }

    pub fn function(&self) -> &FunctionId {
        &self.function
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock()
    }

    pub fn touch(&self, epoch_ms: u64) {
        self.last_used_ms.store(epoch_ms, Ordering::Relaxed);
    }

    pub fn last_used_ms(&self) -> u64 {
        self.last_used_ms.load(Ordering::Relaxed)
    }

    /// Alive process, open stdio, and not on the way out.
    pub fn health_check(&self) -> bool {
        matches!(*self.state.lock(), WorkerState::Ready | WorkerState::Busy)
            && self.guard.is_alive()
    }

    /// Send one invoke line and wait for the matching response or error.
    ///
    /// The wait is bounded by the request deadline plus `grace`; if the
    /// child never answers in that window, or the caller cancels, the
    /// worker is marked Dead so a half-finished handler is never reused.
    pub async fn invoke(
        &self,
        invocation: &InvocationId,
        request: &InvocationRequest,
        cancel: &CancellationToken,
        grace: Duration,
    ) -> Result<ResponseBody, WorkerError> {
        let line = WorkerMessage::invoke(invocation, request)
            .and_then(|m| m.to_line())
            .map_err(|e| WorkerError::Transport(format!("failed to encode invoke: {}", e)))?;

        {
            let mut state = self.state.lock();
            match *state {
                WorkerState::Ready => *state = WorkerState::Busy,
                other => {
                    return Err(WorkerError::Transport(format!(
                        "worker is {:?}, not ready",
                        other
                    )))
                }
            }
        }

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock();
            if pending.is_some() {
                self.fail_transport("second invoke while one is in flight");
                return Err(WorkerError::Transport(
                    "second invoke while one is in flight".into(),
                ));
            }
            *pending = Some(Pending { invocation: invocation.to_string(), tx });
        }

        {
            let mut stdin = self.stdin.lock().await;
            if let Err(e) = stdin.write_all(line.as_bytes()).await {
                self.fail_transport(&format!("stdin write failed: {}", e));
                return Err(WorkerError::Transport(format!("stdin write failed: {}", e)));
            }
            if let Err(e) = stdin.flush().await {
                self.fail_transport(&format!("stdin flush failed: {}", e));
                return Err(WorkerError::Transport(format!("stdin flush failed: {}", e)));
            }
        }

        let wait = request.deadline() + grace;
        tokio::select! {
            reply = rx => match reply {
                Ok(ChildReply::Response(body)) => {
                    self.back_to_ready();
                    Ok(body)
                }
                Ok(ChildReply::Failure(body)) => Err(self.classify_failure(body)),
                // Reader dropped the pending sender: transport death.
                Err(_) => Err(WorkerError::Transport("worker died mid-invocation".into())),
            },
            _ = tokio::time::sleep(wait) => {
                tracing::warn!(
                    worker_id = %self.id,
                    invocation = %invocation,
                    wait_ms = wait.as_millis() as u64,
                    "worker missed the invocation deadline, marking dead"
                );
                self.pending.lock().take();
                *self.state.lock() = WorkerState::Dead;
                self.guard.signal_term();
                Err(WorkerError::DeadlineExceeded { controller_side: true })
            }
            _ = cancel.cancelled() => {
                // The worker may still be mid-handler; never reuse it.
                self.pending.lock().take();
                *self.state.lock() = WorkerState::Dead;
                self.guard.signal_term();
                Err(WorkerError::Cancelled)
            }
        }
    }

    /// Graceful signal, bounded wait, then force-kill. Idempotent.
    pub async fn terminate(&self) {
        {
            let mut state = self.state.lock();
            if matches!(*state, WorkerState::Dead) {
                return;
            }
            *state = WorkerState::Terminating;
        }
        self.pending.lock().take();
        self.guard.signal_term();
        if !self.guard.wait_exit(TERMINATE_GRACE).await {
            tracing::warn!(worker_id = %self.id, "worker ignored termination signal, force killing");
            self.guard.force_kill();
            let _ = self.guard.wait_exit(Duration::from_secs(1)).await;
        }
        *self.state.lock() = WorkerState::Dead;
    }

    /// Terminate on a background task; for callers holding locks.
    pub fn terminate_detached(self: Arc<Self>) {
        tokio::spawn(async move { self.terminate().await });
    }

    async fn read_loop(
        self: Arc<Self>,
        stdout: Box<dyn AsyncRead + Send + Unpin>,
        ready_tx: oneshot::Sender<()>,
    ) {
        let mut ready_tx = Some(ready_tx);
        let mut lines = BufReader::new(stdout).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let msg = match WorkerMessage::parse(line) {
                        Ok(msg) => msg,
                        Err(e) => {
                            self.fail_transport(&format!("unparseable worker line: {}", e));
                            break;
                        }
                    };
                    match msg.kind {
                        MessageKind::Ready => {
                            if let Some(tx) = ready_tx.take() {
                                let _ = tx.send(());
                            }
                        }
                        MessageKind::Response => match msg.response_body() {
                            Ok(body) => {
                                if !self.deliver(&msg.id, ChildReply::Response(body)) {
                                    break;
                                }
                            }
                            Err(e) => {
                                self.fail_transport(&format!("bad response payload: {}", e));
                                break;
                            }
                        },
                        MessageKind::Error => match msg.error_body() {
                            Ok(body) => {
                                if !self.deliver(&msg.id, ChildReply::Failure(body)) {
                                    break;
                                }
                            }
                            Err(e) => {
                                self.fail_transport(&format!("bad error payload: {}", e));
                                break;
                            }
                        },
                        MessageKind::Log => self.forward_log(&msg),
                        MessageKind::Invoke => {
                            self.fail_transport("worker sent an invoke line");
                            break;
                        }
                    }
                }
                Ok(None) => {
                    // EOF. Only a failure if we weren't already shutting down.
                    let shutting_down = matches!(
                        *self.state.lock(),
                        WorkerState::Terminating | WorkerState::Dead
                    );
                    if shutting_down {
                        self.pending.lock().take();
                    } else {
                        self.fail_transport("worker stdio closed");
                    }
                    break;
                }
                Err(e) => {
                    self.fail_transport(&format!("stdio read failed: {}", e));
                    break;
                }
            }
        }
    }

    /// Route a reply to the pending invocation. Returns false when the id
    /// mismatch killed the worker.
    fn deliver(&self, id: &str, reply: ChildReply) -> bool {
        let pending = self.pending.lock().take();
        match pending {
            Some(p) if p.invocation == id => {
                let _ = p.tx.send(reply);
                true
            }
            Some(p) => {
                // Put nothing back; the invocation fails via the dropped sender.
                drop(p);
                self.fail_transport(&format!("reply id {} does not match in-flight invocation", id));
                false
            }
            None => {
                // Late reply after a controller-side deadline or cancel.
                tracing::debug!(worker_id = %self.id, id, "discarding unsolicited worker reply");
                true
            }
        }
    }

    fn classify_failure(&self, body: ErrorBody) -> WorkerError {
        match body.code.as_deref() {
            Some(codes::DEADLINE_EXCEEDED) => {
                // The child enforced its own deadline; it is still healthy.
                self.back_to_ready();
                WorkerError::DeadlineExceeded { controller_side: false }
            }
            Some(codes::BUNDLE_LOAD_ERROR) => {
                *self.state.lock() = WorkerState::Dead;
                self.guard.signal_term();
                WorkerError::BundleLoad(body.message)
            }
            _ => {
                // Handler errors are not transport errors.
                self.back_to_ready();
                WorkerError::Handler { message: body.message }
            }
        }
    }

    fn back_to_ready(&self) {
        let mut state = self.state.lock();
        if matches!(*state, WorkerState::Busy) {
            *state = WorkerState::Ready;
        }
    }

    /// Mark the worker transport-dead from outside, e.g. when a response
    /// decodes to garbage after the protocol layer accepted it.
    pub(crate) fn poison(&self, reason: &str) {
        self.fail_transport(reason);
    }

    fn fail_transport(&self, message: &str) {
        tracing::warn!(
            worker_id = %self.id,
            function = %self.function,
            message,
            "worker transport failure"
        );
        *self.state.lock() = WorkerState::Dead;
        self.pending.lock().take();
        self.guard.force_kill();
    }

    fn forward_log(&self, msg: &WorkerMessage) {
        let Some(store) = &self.logs else { return };
        let body = match msg.log_body() {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!(worker_id = %self.id, error = %e, "bad log payload from worker");
                return;
            }
        };
        let level = LogLevel::parse(&body.level).unwrap_or(LogLevel::Info);
        store.append(LogEntry {
            function: self.function.clone(),
            invocation: InvocationId::from(msg.id.as_str()),
            level,
            message: body.message,
            timestamp_ms: SystemClock.epoch_ms(),
            metadata: body.metadata,
        });
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
