// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The instance manager: `project → running child` with lazy spawn,
//! refcounted leases, idle eviction, and port recycling.
//!
//! Locking protocol: the fast path increments an instance's refcount while
//! holding the map's read guard, so the evictor, which inspects counts
//! under the write guard, always observes settled values. An instance is
//! only ever removed from the map with `ref_count == 0`.

use crate::error::InstanceError;
use crate::ports::PortPool;
use fp_core::{Clock, ProjectId, SystemClock};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

/// Grace window between SIGTERM and the force-kill.
const TERMINATE_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct InstanceConfig {
    /// Executable serving one project's stateful backend.
    pub program: PathBuf,
    /// Arguments placed before the standard `-http`/`-data` flags.
    pub args: Vec<String>,
    /// Root under which each project gets its data directory.
    pub data_root: PathBuf,
    pub idle_ttl: Duration,
    /// Wait after spawn so the child's HTTP listener is bound.
    pub bind_delay: Duration,
    pub sweep_interval: Duration,
    pub port_base: u16,
    pub port_count: usize,
    /// Offset of the instance's wire-protocol port from its HTTP port.
    pub wire_port_offset: u16,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("fp-kv"),
            args: Vec::new(),
            data_root: PathBuf::from("data/projects"),
            idle_ttl: Duration::from_secs(300),
            bind_delay: Duration::from_millis(100),
            sweep_interval: Duration::from_secs(30),
            port_base: 42000,
            port_count: 64,
            wire_port_offset: 1000,
        }
    }
}

struct Instance {
    project: ProjectId,
    port: u16,
    wire_port: u16,
    base_url: String,
    ref_count: AtomicI64,
    last_access_ms: AtomicU64,
    created_at_ms: u64,
    pid: Option<i32>,
    child: Mutex<Child>,
}

impl Instance {
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

    async fn terminate(&self) {
        self.signal_term();
        if !self.wait_exit(TERMINATE_GRACE).await {
            tracing::warn!(project = %self.project, "instance ignored SIGTERM, force killing");
            self.force_kill();
            let _ = self.wait_exit(Duration::from_secs(1)).await;
        }
    }
}

/// A refcounted handle on a running instance. Dropping it releases the
/// reference; explicit `release` is equivalent. Double release through the
/// same lease is a no-op.
pub struct InstanceLease {
    instance: Arc<Instance>,
    released: AtomicBool,
}

impl std::fmt::Debug for InstanceLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceLease").finish_non_exhaustive()
    }
}

impl InstanceLease {
    fn new(instance: Arc<Instance>) -> Self {
        Self { instance, released: AtomicBool::new(false) }
    }

    pub fn project(&self) -> &ProjectId {
        &self.instance.project
    }

    pub fn base_url(&self) -> &str {
        &self.instance.base_url
    }

    pub fn port(&self) -> u16 {
        self.instance.port
    }

    pub fn wire_port(&self) -> u16 {
        self.instance.wire_port
    }

    pub fn created_at_ms(&self) -> u64 {
        self.instance.created_at_ms
    }

    /// Current reference count, for tests and status reporting.
    pub fn ref_count(&self) -> i64 {
        self.instance.ref_count.load(Ordering::SeqCst)
    }

    pub fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.instance.ref_count.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for InstanceLease {
    fn drop(&mut self) {
        self.release();
    }
}

/// Cheap cloneable handle; state lives behind the shared inner.
pub struct InstanceManager<C: Clock = SystemClock> {
    shared: Arc<Shared<C>>,
}

impl<C: Clock> Clone for InstanceManager<C> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

struct Shared<C: Clock> {
    cfg: InstanceConfig,
    ports: PortPool,
    map: RwLock<HashMap<ProjectId, Arc<Instance>>>,
    clock: C,
    closed: AtomicBool,
    sweeper: Mutex<Option<CancellationToken>>,
}

impl<C: Clock> InstanceManager<C> {
    pub fn new(cfg: InstanceConfig, clock: C) -> Self {
        let ports = PortPool::new(cfg.port_base, cfg.port_count);
        Self {
            shared: Arc::new(Shared {
                cfg,
                ports,
                map: RwLock::new(HashMap::new()),
                clock,
                closed: AtomicBool::new(false),
                sweeper: Mutex::new(None),
            }),
        }
    }

    /// Hot instances currently in the map.
    pub fn hot_count(&self) -> usize {
        self.shared.map.read().len()
    }

    pub fn available_ports(&self) -> usize {
        self.shared.ports.available()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Get a lease on the project's instance, spawning it if cold.
    pub async fn acquire(&self, project: &ProjectId) -> Result<InstanceLease, InstanceError> {
        let shared = &self.shared;
        if self.is_closed() {
            return Err(InstanceError::Closed);
        }

        // Fast path: refcount bumped under the read guard (see module doc).
        {
            let map = shared.map.read();
            if let Some(instance) = map.get(project) {
                instance.ref_count.fetch_add(1, Ordering::SeqCst);
                instance.last_access_ms.store(shared.clock.epoch_ms(), Ordering::Relaxed);
                return Ok(InstanceLease::new(Arc::clone(instance)));
            }
        }

        // Cold path: take a port, spawn, then race to insert.
        let port = shared.ports.acquire()?;
        let data_dir = shared.cfg.data_root.join(project.as_str());
        if let Err(e) = std::fs::create_dir_all(&data_dir) {
            shared.ports.release(port);
            return Err(InstanceError::DataDir(e));
        }
        let instance = match shared.launch(project, port, &data_dir) {
            Ok(instance) => instance,
            Err(e) => {
                shared.ports.release(port);
                return Err(e);
            }
        };

        let winner = {
            let mut map = shared.map.write();
            // A close that ran since the entry check must not gain a new
            // instance behind its back.
            if shared.closed.load(Ordering::Acquire) {
                drop(map);
                let shared = Arc::clone(shared);
                tokio::spawn(async move {
                    instance.terminate().await;
                    shared.ports.release(instance.port);
                });
                return Err(InstanceError::Closed);
            }
            match map.get(project) {
                Some(existing) => {
                    // Lost the insert race: adopt the winner.
                    existing.ref_count.fetch_add(1, Ordering::SeqCst);
                    existing.last_access_ms.store(shared.clock.epoch_ms(), Ordering::Relaxed);
                    Some(Arc::clone(existing))
                }
                None => {
                    map.insert(project.clone(), Arc::clone(&instance));
                    None
                }
            }
        };

        if let Some(winner) = winner {
            let loser = instance;
            let shared = Arc::clone(shared);
            tokio::spawn(async move {
                loser.terminate().await;
                shared.ports.release(loser.port);
            });
            return Ok(InstanceLease::new(winner));
        }

        // Give the child's listener time to bind before handing it out.
        tokio::time::sleep(shared.cfg.bind_delay).await;
        Ok(InstanceLease::new(instance))
    }

    /// Evict instances with no references that idled past the TTL.
    pub fn evict_idle(&self) {
        let shared = &self.shared;
        let ttl_ms = shared.cfg.idle_ttl.as_millis() as u64;
        let now = shared.clock.epoch_ms();

        let candidates: Vec<ProjectId> = {
            let map = shared.map.read();
            map.iter()
                .filter(|(_, i)| {
                    i.ref_count.load(Ordering::SeqCst) == 0
                        && now.saturating_sub(i.last_access_ms.load(Ordering::Relaxed)) > ttl_ms
                })
                .map(|(p, _)| p.clone())
                .collect()
        };

        for project in candidates {
            let removed = {
                let mut map = shared.map.write();
                // Re-check under the write guard; a racing acquire holds
                // the read guard while it bumps the count.
                let evictable = map.get(&project).is_some_and(|i| {
                    i.ref_count.load(Ordering::SeqCst) == 0
                        && now.saturating_sub(i.last_access_ms.load(Ordering::Relaxed)) > ttl_ms
                });
                if evictable {
                    map.remove(&project)
                } else {
                    None
                }
            };
            if let Some(instance) = removed {
                tracing::info!(project = %project, port = instance.port, "evicting idle instance");
                let shared = Arc::clone(shared);
                tokio::spawn(async move {
                    instance.terminate().await;
                    shared.ports.release(instance.port);
                });
            }
        }
    }

    /// Start the periodic idle sweep. No-op if already running.
    pub fn start_sweeper(&self) {
        let cancel = {
            let mut sweeper = self.shared.sweeper.lock();
            if sweeper.is_some() {
                return;
            }
            let cancel = CancellationToken::new();
            *sweeper = Some(cancel.clone());
            cancel
        };
        let manager = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(manager.shared.cfg.sweep_interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = interval.tick() => manager.evict_idle(),
                }
            }
        });
    }

    /// Close the manager: no further acquires, every instance terminated
    /// concurrently and every port returned.
    pub async fn close(&self) {
        let shared = &self.shared;
        if shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(cancel) = shared.sweeper.lock().take() {
            cancel.cancel();
        }
        let instances: Vec<Arc<Instance>> =
            shared.map.write().drain().map(|(_, i)| i).collect();
        let terminations = instances.iter().map(|instance| async {
            instance.terminate().await;
            shared.ports.release(instance.port);
        });
        futures_util::future::join_all(terminations).await;
    }
}

impl<C: Clock> Shared<C> {
    fn launch(
        &self,
        project: &ProjectId,
        port: u16,
        data_dir: &std::path::Path,
    ) -> Result<Arc<Instance>, InstanceError> {
        let mut cmd = Command::new(&self.cfg.program);
        cmd.args(&self.cfg.args)
            .arg("-http")
            .arg(format!(":{}", port))
            .arg("-data")
            .arg(data_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| InstanceError::Spawn(e.to_string()))?;
        if let Some(stderr) = child.stderr.take() {
            let project = project.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::warn!(project = %project, "instance stderr: {}", line);
                }
            });
        }
        let pid = child.id().map(|id| id as i32);
        let now = self.clock.epoch_ms();
        tracing::info!(project = %project, port, pid, "instance spawned");
        Ok(Arc::new(Instance {
            project: project.clone(),
            port,
            wire_port: port + self.cfg.wire_port_offset,
            base_url: format!("http://127.0.0.1:{}", port),
            ref_count: AtomicI64::new(1),
            last_access_ms: AtomicU64::new(now),
            created_at_ms: now,
            pid,
            child: Mutex::new(child),
        }))
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
