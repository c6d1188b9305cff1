// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for HTTP and IPC tests: a full plane wired to the
//! scripted launcher instead of real runtime processes.

use crate::http;
use crate::state::AppState;
use axum::Router;
use fp_core::{Clock, FunctionId, FunctionVersion, RuntimeTag, SystemClock};
use fp_engine::{
    InvokeBody, PoolConfig, Scheduler, SchedulerConfig, ScriptedLauncher, ScriptedReply,
};
use fp_instance::{InstanceConfig, InstanceManager};
use fp_registry::{BundleStore, FunctionStore};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub(crate) struct TestPlane {
    pub state: AppState,
    pub router: Router,
    pub launcher: Arc<ScriptedLauncher>,
    // Held so the on-disk fixtures outlive the test.
    pub _dir: TempDir,
}

pub(crate) fn plane_with(
    script: impl Fn(InvokeBody) -> ScriptedReply + Send + Sync + 'static,
) -> TestPlane {
    let dir = TempDir::new().expect("temp dir");
    let launcher = Arc::new(ScriptedLauncher::new(script));
    let registry =
        Arc::new(FunctionStore::open(dir.path().join("registry.json")).expect("registry"));
    let bundles = Arc::new(BundleStore::new(dir.path().join("bundles")).expect("bundles"));
    // Zero ports: proxy requests fail fast instead of spawning children.
    let instances = InstanceManager::new(
        InstanceConfig {
            data_root: dir.path().join("data"),
            port_count: 0,
            ..InstanceConfig::default()
        },
        SystemClock,
    );
    let state = AppState {
        scheduler: Scheduler::new(SchedulerConfig::default()),
        instances,
        registry,
        bundles,
        launcher: launcher.clone(),
        logs: None,
        pool_cfg: PoolConfig {
            max_workers: 2,
            spawn_timeout: Duration::from_secs(2),
            ..PoolConfig::default()
        },
        default_deadline_ms: 5_000,
        http_client: reqwest::Client::new(),
    };
    let router = http::router(state.clone());
    TestPlane { state, router, launcher, _dir: dir }
}

/// Register and deploy a function directly against the stores, returning
/// its id ready for invocation.
pub(crate) fn deploy_function(plane: &TestPlane, name: &str) -> FunctionId {
    let record = plane
        .state
        .registry
        .register(name, RuntimeTag::Bun, "default")
        .expect("register");
    let (bundle_path, checksum) = plane
        .state
        .bundles
        .store(&record.id, "v1", b"export default () => {}")
        .expect("bundle");
    let version = FunctionVersion {
        function: record.id.clone(),
        version: "v1".to_string(),
        bundle_path,
        checksum,
        created_at_ms: SystemClock.epoch_ms(),
    };
    let record = plane
        .state
        .registry
        .deploy(&record.id, version.clone(), Vec::new())
        .expect("deploy");
    plane.state.register_pool_for(&record, &version);
    record.id
}
