// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use crate::lifecycle::LifecycleError;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Daemon version reported over ping and written to the version file.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Resolve state directory: FP_STATE_DIR > XDG_STATE_HOME/firepool >
/// ~/.local/state/firepool
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("FP_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("firepool"));
    }
    match dirs::home_dir() {
        Some(home) => Ok(home.join(".local/state/firepool")),
        None => Err(LifecycleError::NoStateDir),
    }
}

/// Address for the HTTP edge (default loopback).
pub fn http_addr() -> Result<SocketAddr, LifecycleError> {
    let raw = std::env::var("FP_HTTP_ADDR").unwrap_or_else(|_| "127.0.0.1:8199".to_string());
    raw.parse()
        .map_err(|_| LifecycleError::InvalidConfig(format!("bad FP_HTTP_ADDR: {}", raw)))
}

fn duration_ms(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

fn number<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

/// Idle timeout before a silent IPC connection is dropped.
pub fn ipc_idle_timeout() -> Duration {
    duration_ms("FP_IPC_TIMEOUT_MS", Duration::from_secs(600))
}

/// Timeout for writing one IPC response frame.
pub fn ipc_write_timeout() -> Duration {
    duration_ms("FP_IPC_WRITE_TIMEOUT_MS", Duration::from_secs(5))
}

/// Default invocation deadline when the caller does not set one.
pub fn default_deadline_ms() -> u64 {
    number("FP_DEADLINE_MS", 30_000)
}

pub fn max_workers() -> usize {
    number("FP_MAX_WORKERS", 4)
}

pub fn warm_workers() -> usize {
    number("FP_WARM_WORKERS", 1)
}

pub fn idle_ttl() -> Duration {
    duration_ms("FP_IDLE_TTL_MS", Duration::from_secs(300))
}

pub fn queue_cap() -> usize {
    number("FP_QUEUE_CAP", 256)
}

pub fn port_base() -> u16 {
    number("FP_PORT_BASE", 42000)
}

pub fn port_count() -> usize {
    number("FP_PORT_COUNT", 64)
}

/// Program serving per-project KV instances.
pub fn kv_program() -> PathBuf {
    PathBuf::from(std::env::var("FP_KV_PROGRAM").unwrap_or_else(|_| "fp-kv".to_string()))
}

pub fn bun_program() -> PathBuf {
    PathBuf::from(std::env::var("FP_BUN_PROGRAM").unwrap_or_else(|_| "bun".to_string()))
}

pub fn node_program() -> PathBuf {
    PathBuf::from(std::env::var("FP_NODE_PROGRAM").unwrap_or_else(|_| "node".to_string()))
}

/// Worker entry script; defaults to the scripts shipped in `runtime/`.
pub fn worker_script() -> PathBuf {
    PathBuf::from(std::env::var("FP_WORKER_SCRIPT").unwrap_or_else(|_| "runtime/worker.js".to_string()))
}

pub fn sandbox_script() -> PathBuf {
    PathBuf::from(
        std::env::var("FP_SANDBOX_SCRIPT").unwrap_or_else(|_| "runtime/sandbox.js".to_string()),
    )
}

/// In-memory buffer size between workers and the invocation log sink.
pub fn log_buffer() -> usize {
    number("FP_LOG_BUFFER", 1024)
}
