// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process scripted launcher for tests.
//!
//! Behaves like a real worker child over duplex pipes: emits a ready line,
//! then answers each invoke according to the script closure. Lets pool and
//! scheduler tests exercise cold starts, handler errors, deadlines, and
//! transport failures without any runtime binary.

use super::{ProcessGuard, WorkerConnection, WorkerLauncher, WorkerSpec};
use crate::error::WorkerError;
use crate::message::{ErrorBody, InvokeBody, LogBody, MessageKind, ResponseBody, WorkerMessage};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio_util::sync::CancellationToken;

type ScriptFn = dyn Fn(InvokeBody) -> ScriptedReply + Send + Sync;

/// What the scripted worker does with one invoke.
#[derive(Debug, Clone)]
pub enum ReplyKind {
    Respond { status: u16, body: Vec<u8> },
    Fail { message: String, code: Option<String> },
    /// Never answer; the controller's deadline has to fire.
    Hang,
    /// Close stdio mid-invocation (transport failure).
    Close,
}

/// A scripted reply with optional delay and log lines emitted first.
#[derive(Debug, Clone)]
pub struct ScriptedReply {
    pub kind: ReplyKind,
    pub delay: Duration,
    pub logs: Vec<(String, String)>,
}

impl ScriptedReply {
    pub fn ok(body: &[u8]) -> Self {
        Self::status(200, body)
    }

    pub fn status(status: u16, body: &[u8]) -> Self {
        Self {
            kind: ReplyKind::Respond { status, body: body.to_vec() },
            delay: Duration::ZERO,
            logs: Vec::new(),
        }
    }

    pub fn fail(message: &str, code: Option<&str>) -> Self {
        Self {
            kind: ReplyKind::Fail {
                message: message.to_string(),
                code: code.map(|c| c.to_string()),
            },
            delay: Duration::ZERO,
            logs: Vec::new(),
        }
    }

    pub fn hang() -> Self {
        Self { kind: ReplyKind::Hang, delay: Duration::ZERO, logs: Vec::new() }
    }

    pub fn close() -> Self {
        Self { kind: ReplyKind::Close, delay: Duration::ZERO, logs: Vec::new() }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_log(mut self, level: &str, message: &str) -> Self {
        self.logs.push((level.to_string(), message.to_string()));
        self
    }
}

/// Launcher whose "children" are in-process tasks driven by a script.
pub struct ScriptedLauncher {
    script: Arc<ScriptFn>,
    emit_ready: bool,
    ready_delay: Duration,
    launches: AtomicUsize,
}

impl ScriptedLauncher {
    pub fn new(script: impl Fn(InvokeBody) -> ScriptedReply + Send + Sync + 'static) -> Self {
        Self {
            script: Arc::new(script),
            emit_ready: true,
            ready_delay: Duration::ZERO,
            launches: AtomicUsize::new(0),
        }
    }

    /// Echo a fixed body with status 200 for every invoke.
    pub fn echo(body: &'static [u8]) -> Self {
        Self::new(move |_| ScriptedReply::ok(body))
    }

    /// Never emit the ready line, for spawn-timeout tests.
    pub fn mute(mut self) -> Self {
        self.emit_ready = false;
        self
    }

    pub fn with_ready_delay(mut self, delay: Duration) -> Self {
        self.ready_delay = delay;
        self
    }

    /// How many workers this launcher has started.
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl WorkerLauncher for ScriptedLauncher {
    async fn launch(&self, spec: &WorkerSpec) -> Result<WorkerConnection, WorkerError> {
        self.launches.fetch_add(1, Ordering::Relaxed);

        let (stdin_ours, stdin_child) = tokio::io::duplex(64 * 1024);
        let (stdout_child, stdout_ours) = tokio::io::duplex(64 * 1024);

        let cancel = CancellationToken::new();
        let alive = Arc::new(AtomicBool::new(true));
        let task = ScriptedChild {
            script: Arc::clone(&self.script),
            emit_ready: self.emit_ready,
            ready_delay: self.ready_delay,
            worker_id: spec.worker_id.to_string(),
            cancel: cancel.clone(),
            alive: Arc::clone(&alive),
        };
        tokio::spawn(task.run(stdin_child, stdout_child));

        Ok(WorkerConnection {
            stdin: Box::new(stdin_ours),
            stdout: Box::new(stdout_ours),
            guard: Arc::new(ScriptedGuard { alive, cancel }),
        })
    }
}

struct ScriptedChild {
    script: Arc<ScriptFn>,
    emit_ready: bool,
    ready_delay: Duration,
    worker_id: String,
    cancel: CancellationToken,
    alive: Arc<AtomicBool>,
}

impl ScriptedChild {
    async fn run(self, stdin: DuplexStream, mut stdout: DuplexStream) {
        if self.emit_ready {
            if self.ready_delay > Duration::ZERO {
                tokio::select! {
                    _ = self.cancel.cancelled() => {
                        self.alive.store(false, Ordering::Relaxed);
                        return;
                    }
                    _ = tokio::time::sleep(self.ready_delay) => {}
                }
            }
            let ready = WorkerMessage {
                id: self.worker_id.clone(),
                kind: MessageKind::Ready,
                payload: serde_json::json!({}),
            };
            if write_line(&mut stdout, &ready).await.is_err() {
                self.alive.store(false, Ordering::Relaxed);
                return;
            }
        }

        let mut lines = BufReader::new(stdin).lines();
        loop {
            let line = tokio::select! {
                _ = self.cancel.cancelled() => break,
                line = lines.next_line() => line,
            };
            let Ok(Some(line)) = line else { break };
            let Ok(msg) = WorkerMessage::parse(&line) else { break };
            if msg.kind != MessageKind::Invoke {
                continue;
            }
            let Ok(body) = msg.invoke_body() else { break };
            let reply = (self.script)(body);

            for (level, message) in &reply.logs {
                let log = LogBody { level: level.clone(), message: message.clone(), metadata: None };
                let Ok(log_msg) = WorkerMessage::log(&msg.id, log) else { break };
                if write_line(&mut stdout, &log_msg).await.is_err() {
                    break;
                }
            }

            if reply.delay > Duration::ZERO {
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    _ = tokio::time::sleep(reply.delay) => {}
                }
            }

            match reply.kind {
                ReplyKind::Respond { status, body } => {
                    let response = ResponseBody {
                        status,
                        headers: HashMap::new(),
                        body: B64.encode(&body),
                    };
                    let Ok(out) = WorkerMessage::response(&msg.id, response) else { break };
                    if write_line(&mut stdout, &out).await.is_err() {
                        break;
                    }
                }
                ReplyKind::Fail { message, code } => {
                    let error = ErrorBody { message, stack: None, code };
                    let Ok(out) = WorkerMessage::error(&msg.id, error) else { break };
                    if write_line(&mut stdout, &out).await.is_err() {
                        break;
                    }
                }
                ReplyKind::Hang => continue,
                ReplyKind::Close => break,
            }
        }
        self.alive.store(false, Ordering::Relaxed);
    }
}

async fn write_line(stdout: &mut DuplexStream, msg: &WorkerMessage) -> std::io::Result<()> {
    let line = msg
        .to_line()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    stdout.write_all(line.as_bytes()).await
}

struct ScriptedGuard {
    alive: Arc<AtomicBool>,
    cancel: CancellationToken,
}

#[async_trait]
impl ProcessGuard for ScriptedGuard {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    fn signal_term(&self) {
        self.cancel.cancel();
    }

    fn force_kill(&self) {
        self.cancel.cancel();
    }

    async fn wait_exit(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if !self.is_alive() {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}
