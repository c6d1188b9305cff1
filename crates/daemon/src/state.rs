// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared daemon state handed to both the HTTP edge and the IPC server.

use fp_core::{FunctionRecord, FunctionVersion, SystemClock};
use fp_engine::{LogStore, Pool, PoolConfig, PoolSpec, Scheduler, WorkerLauncher};
use fp_instance::InstanceManager;
use fp_registry::{BundleStore, FunctionStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub scheduler: Scheduler<SystemClock>,
    pub instances: InstanceManager<SystemClock>,
    pub registry: Arc<FunctionStore>,
    pub bundles: Arc<BundleStore>,
    pub launcher: Arc<dyn WorkerLauncher>,
    pub logs: Option<Arc<LogStore>>,
    pub pool_cfg: PoolConfig,
    pub default_deadline_ms: u64,
    pub http_client: reqwest::Client,
}

impl AppState {
    /// Build (or rebuild) the pool serving a function's active version and
    /// hand it to the scheduler. An existing pool for the function is
    /// stopped in the background.
    pub fn register_pool_for(&self, record: &FunctionRecord, version: &FunctionVersion) {
        let pool = Pool::new(
            PoolSpec {
                function: record.id.clone(),
                version: version.version.clone(),
                runtime: record.runtime,
                bundle_path: version.bundle_path.clone(),
                env: record.env.clone(),
            },
            Arc::clone(&self.launcher),
            self.pool_cfg.clone(),
            SystemClock,
            self.logs.clone(),
        );
        Arc::clone(&pool).start_sweeper();

        if let Some(old) = self.scheduler.unregister_pool(&record.id) {
            tracing::info!(function = %record.id, "replacing pool for redeployed function");
            tokio::spawn(async move { old.stop().await });
        }
        self.scheduler.register_pool(pool);
    }
}
