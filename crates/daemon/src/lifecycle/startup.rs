// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup and initialization logic.

use super::{Config, DaemonState, LifecycleError};
use crate::http;
use crate::ipc::IpcServer;
use crate::state::AppState;
use fp_core::SystemClock;
use fp_engine::{JsonlSink, LogStore, ProcessLauncher, Scheduler};
use fp_instance::InstanceManager;
use fp_registry::{BundleStore, FunctionStore};
use fs2::FileExt;
use std::io::Write;
use std::sync::Arc;
use tokio::net::UnixListener;
use tracing::info;

/// Start the daemon.
pub async fn startup(config: Config) -> Result<DaemonState, LifecycleError> {
    match startup_inner(config).await {
        Ok(daemon) => Ok(daemon),
        Err((config, e)) => {
            // Don't clean up after a lock failure; those files belong to
            // the daemon that holds the lock.
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(&config);
            }
            Err(e)
        }
    }
}

async fn startup_inner(config: Config) -> Result<DaemonState, (Config, LifecycleError)> {
    match build(&config).await {
        Ok(daemon) => Ok(daemon),
        Err(e) => Err((config, e)),
    }
}

async fn build(config: &Config) -> Result<DaemonState, LifecycleError> {
    // 1. State directories
    std::fs::create_dir_all(&config.state_dir)?;
    std::fs::create_dir_all(&config.bundle_root)?;
    std::fs::create_dir_all(&config.data_root)?;
    std::fs::create_dir_all(&config.logs_dir)?;

    // 2. Acquire the lock file first to rule out a second daemon. Avoid
    // truncating before the lock is held, which would wipe the running
    // daemon's PID.
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;
    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    // 3. Version marker
    std::fs::write(&config.version_path, crate::env::VERSION)?;

    // 4. Stores
    let registry = Arc::new(FunctionStore::open(config.registry_path.clone())?);
    let bundles = Arc::new(BundleStore::new(config.bundle_root.clone())?);
    let logs = LogStore::spawn(
        config.log_buffer,
        Arc::new(JsonlSink::open(&config.logs_dir.join("invocations.jsonl"))?),
    );

    // 5. Engine and instances
    let launcher = Arc::new(ProcessLauncher::new(config.runtimes.clone()));
    let scheduler = Scheduler::new(config.scheduler.clone());
    let instances = InstanceManager::new(config.instances.clone(), SystemClock);
    instances.start_sweeper();

    let state = AppState {
        scheduler,
        instances,
        registry: Arc::clone(&registry),
        bundles,
        launcher,
        logs: Some(logs),
        pool_cfg: config.pool.clone(),
        default_deadline_ms: config.default_deadline_ms,
        http_client: reqwest::Client::new(),
    };

    // 6. Recreate pools for every function with an active version so a
    // restart does not lose deployments.
    let mut restored = 0usize;
    for record in registry.functions() {
        if let Some((record, Some(version))) = registry.lookup(&record.id) {
            state.register_pool_for(&record, &version);
            restored += 1;
        }
    }
    if restored > 0 {
        info!(restored, "restored function pools from the registry");
    }

    let router = http::router(state.clone());

    // 7. Remove a stale socket and bind, last, after validation passed.
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let unix_listener = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;

    let http_listener = tokio::net::TcpListener::bind(config.http_addr)
        .await
        .map_err(|e| LifecycleError::HttpBindFailed(config.http_addr, e))?;
    let bound_addr = http_listener.local_addr().map_err(LifecycleError::Io)?;

    let serve_router = router.clone();
    let http_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(http_listener, serve_router).await {
            tracing::error!(error = %e, "HTTP listener failed");
        }
    });

    let ipc = IpcServer::spawn(
        unix_listener,
        config.socket_path.clone(),
        state.clone(),
        router.clone(),
    );

    info!(
        socket = %config.socket_path.display(),
        http = %bound_addr,
        "daemon started"
    );

    Ok(DaemonState { config: config.clone(), lock_file, state, router, ipc, http_task })
}

/// Clean up resources on startup failure.
fn cleanup_on_failure(config: &Config) {
    if config.socket_path.exists() {
        let _ = std::fs::remove_file(&config.socket_path);
    }
    if config.version_path.exists() {
        let _ = std::fs::remove_file(&config.version_path);
    }
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
