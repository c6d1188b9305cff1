// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: configuration, startup, and shutdown.

mod startup;

pub use startup::startup;

use crate::env;
use crate::ipc::IpcServer;
use crate::state::AppState;
use axum::Router;
use fp_engine::{PoolConfig, RuntimeCommands, SchedulerConfig};
use fp_instance::InstanceConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("cannot determine a state directory (set FP_STATE_DIR)")]
    NoStateDir,

    #[error("another daemon owns the state directory: {0}")]
    LockFailed(std::io::Error),

    #[error("failed to bind socket {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("failed to bind HTTP listener {0}: {1}")]
    HttpBindFailed(SocketAddr, std::io::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Registry(#[from] fp_registry::RegistryError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// All paths and knobs the daemon runs with.
#[derive(Debug, Clone)]
pub struct Config {
    pub state_dir: PathBuf,
    pub socket_path: PathBuf,
    pub lock_path: PathBuf,
    pub version_path: PathBuf,
    pub registry_path: PathBuf,
    pub bundle_root: PathBuf,
    pub data_root: PathBuf,
    pub logs_dir: PathBuf,
    pub http_addr: SocketAddr,
    pub pool: PoolConfig,
    pub scheduler: SchedulerConfig,
    pub instances: InstanceConfig,
    pub runtimes: RuntimeCommands,
    pub default_deadline_ms: u64,
    pub log_buffer: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, LifecycleError> {
        let state_dir = env::state_dir()?;
        let http_addr = env::http_addr()?;
        Ok(Self::for_state_dir(state_dir, http_addr))
    }

    /// Derive every path from one state directory; env vars fill the
    /// knobs.
    pub fn for_state_dir(state_dir: PathBuf, http_addr: SocketAddr) -> Self {
        let data_root = state_dir.join("data/projects");
        Self {
            socket_path: state_dir.join("fpd.sock"),
            lock_path: state_dir.join("fpd.lock"),
            version_path: state_dir.join("fpd.version"),
            registry_path: state_dir.join("registry.json"),
            bundle_root: state_dir.join("bundles"),
            logs_dir: state_dir.join("logs"),
            http_addr,
            pool: PoolConfig {
                max_workers: env::max_workers(),
                warm_workers: env::warm_workers(),
                idle_ttl: env::idle_ttl(),
                ..PoolConfig::default()
            },
            scheduler: SchedulerConfig { queue_cap: env::queue_cap() },
            instances: InstanceConfig {
                program: env::kv_program(),
                data_root: data_root.clone(),
                port_base: env::port_base(),
                port_count: env::port_count(),
                ..InstanceConfig::default()
            },
            runtimes: RuntimeCommands {
                bun_program: env::bun_program(),
                node_program: env::node_program(),
                worker_script: env::worker_script(),
                sandbox_script: env::sandbox_script(),
            },
            default_deadline_ms: env::default_deadline_ms(),
            log_buffer: env::log_buffer(),
            data_root,
            state_dir,
        }
    }
}

/// Everything a running daemon owns.
pub struct DaemonState {
    pub config: Config,
    /// Held for the daemon's lifetime; releasing it frees the state dir.
    pub lock_file: std::fs::File,
    pub state: AppState,
    pub router: Router,
    pub ipc: IpcServer,
    pub http_task: JoinHandle<()>,
}

impl std::fmt::Debug for DaemonState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DaemonState").finish_non_exhaustive()
    }
}

/// Graceful teardown: stop surfaces first, then the engine, then the
/// instances, then clean the state directory markers.
pub async fn shutdown(daemon: DaemonState) {
    tracing::info!("daemon shutting down");
    daemon.ipc.stop().await;
    daemon.http_task.abort();
    daemon.state.scheduler.stop().await;
    daemon.state.instances.close().await;
    if let Some(logs) = &daemon.state.logs {
        logs.shutdown();
    }
    let _ = std::fs::remove_file(&daemon.config.version_path);
    let _ = std::fs::remove_file(&daemon.config.socket_path);
    drop(daemon.lock_file);
    let _ = std::fs::remove_file(&daemon.config.lock_path);
    tracing::info!("daemon stopped");
}
