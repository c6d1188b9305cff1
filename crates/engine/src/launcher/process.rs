// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Production launcher: spawns a runtime binary with the worker script.

use super::{ProcessGuard, WorkerConnection, WorkerLauncher, WorkerSpec};
use crate::error::WorkerError;
use async_trait::async_trait;
use fp_core::RuntimeTag;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

/// Environment names the platform owns; user env cannot override them.
const RESERVED_ENV: &[&str] = &["BUNDLE_PATH", "WORKER_ID"];
const RESERVED_PREFIX: &str = "FP_";

/// Paths to the runtime executables and the platform's worker scripts.
#[derive(Debug, Clone)]
pub struct RuntimeCommands {
    pub bun_program: PathBuf,
    pub node_program: PathBuf,
    /// Entry script that speaks the NDJSON protocol and loads the bundle.
    pub worker_script: PathBuf,
    /// Sandbox preload that locks down filesystem and subprocess access
    /// for user code before the bundle is imported.
    pub sandbox_script: PathBuf,
}

/// Spawns real worker processes with captured stdio.
pub struct ProcessLauncher {
    commands: RuntimeCommands,
}

impl ProcessLauncher {
    pub fn new(commands: RuntimeCommands) -> Self {
        Self { commands }
    }

    fn command_for(&self, spec: &WorkerSpec) -> Command {
        let mut cmd = match spec.runtime {
            RuntimeTag::Bun => {
                let mut c = Command::new(&self.commands.bun_program);
                c.arg("--preload").arg(&self.commands.sandbox_script);
                c.arg(&self.commands.worker_script);
                c
            }
            RuntimeTag::Node => {
                let mut c = Command::new(&self.commands.node_program);
                c.arg("--require").arg(&self.commands.sandbox_script);
                c.arg(&self.commands.worker_script);
                c
            }
        };

        let bundle = std::path::absolute(&spec.bundle_path)
            .unwrap_or_else(|_| spec.bundle_path.clone());
        cmd.env("BUNDLE_PATH", bundle);
        cmd.env("WORKER_ID", spec.worker_id.to_string());
        for (key, value) in &spec.env {
            if RESERVED_ENV.contains(&key.as_str()) || key.starts_with(RESERVED_PREFIX) {
                tracing::warn!(worker_id = %spec.worker_id, key = %key, "skipping reserved env name");
                continue;
            }
            cmd.env(key, value);
        }

        cmd.stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl WorkerLauncher for ProcessLauncher {
    async fn launch(&self, spec: &WorkerSpec) -> Result<WorkerConnection, WorkerError> {
        let mut child = self
            .command_for(spec)
            .spawn()
            .map_err(|e| WorkerError::SpawnFailure(format!("failed to exec runtime: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| WorkerError::SpawnFailure("child stdin not captured".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| WorkerError::SpawnFailure("child stdout not captured".into()))?;
        if let Some(stderr) = child.stderr.take() {
            drain_stderr(spec, stderr);
        }

        let pid = child.id().map(|id| id as i32);
        tracing::info!(
            worker_id = %spec.worker_id,
            function = %spec.function,
            version = %spec.version,
            runtime = %spec.runtime,
            pid,
            "worker process spawned"
        );

        Ok(WorkerConnection {
            stdin: Box::new(stdin),
            stdout: Box::new(stdout),
            guard: Arc::new(ChildGuard { pid, child: Mutex::new(child) }),
        })
    }
}

/// Forward child stderr into tracing so handler crashes are diagnosable.
fn drain_stderr(spec: &WorkerSpec, stderr: tokio::process::ChildStderr) {
    let worker_id = spec.worker_id.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::warn!(worker_id = %worker_id, "worker stderr: {}", line);
        }
    });
}

struct ChildGuard {
    pid: Option<i32>,
    child: Mutex<Child>,
}

#[async_trait]
impl ProcessGuard for ChildGuard {
    fn is_alive(&self) -> bool {
        matches!(self.child.lock().try_wait(), Ok(None))
    }

    fn signal_term(&self) {
        if let Some(pid) = self.pid {
            let _ = kill(Pid::from_raw(pid), Signal::SIGTERM);
        }
    }

    fn force_kill(&self) {
        let _ = self.child.lock().start_kill();
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
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}
