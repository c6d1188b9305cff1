// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Function registration and version records.

use fp_core::{FunctionId, FunctionRecord, FunctionVersion, RuntimeTag};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("function not found: {0}")]
    NotFound(FunctionId),

    #[error("version {version} not found for {function}")]
    VersionNotFound { function: FunctionId, version: String },

    #[error("version {version} already exists for {function}")]
    DuplicateVersion { function: FunctionId, version: String },

    #[error("registry I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("registry corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryState {
    functions: HashMap<FunctionId, FunctionRecord>,
    versions: HashMap<FunctionId, Vec<FunctionVersion>>,
}

impl RegistryState {
    fn version(&self, function: &FunctionId, version: &str) -> Option<&FunctionVersion> {
        self.versions.get(function)?.iter().find(|v| v.version == version)
    }
}

/// Durable function metadata: records, versions, active pointers.
///
/// All mutations happen under one mutex and are flushed with an
/// atomic-rename write before the lock is dropped, so a crash never
/// leaves a half-applied register or deploy on disk.
pub struct FunctionStore {
    state: Mutex<RegistryState>,
    path: PathBuf,
}

impl FunctionStore {
    /// Open the store, loading the snapshot when one exists.
    pub fn open(path: PathBuf) -> Result<Self, RegistryError> {
        let state = if path.exists() {
            let bytes = std::fs::read(&path)?;
            serde_json::from_slice(&bytes)?
        } else {
            RegistryState::default()
        };
        Ok(Self { state: Mutex::new(state), path })
    }

    /// Register a new function and persist it.
    pub fn register(
        &self,
        name: &str,
        runtime: RuntimeTag,
        handler: &str,
    ) -> Result<FunctionRecord, RegistryError> {
        let record = FunctionRecord {
            id: FunctionId::generate(),
            name: name.to_string(),
            runtime,
            handler: handler.to_string(),
            active_version: None,
            env: Vec::new(),
        };
        let mut state = self.state.lock();
        state.functions.insert(record.id.clone(), record.clone());
        self.persist(&state)?;
        tracing::info!(function = %record.id, name, runtime = %runtime, "function registered");
        Ok(record)
    }

    /// Record a new immutable version without flipping the active pointer.
    pub fn create_version(
        &self,
        function: &FunctionId,
        version: FunctionVersion,
    ) -> Result<(), RegistryError> {
        let mut state = self.state.lock();
        if !state.functions.contains_key(function) {
            return Err(RegistryError::NotFound(function.clone()));
        }
        if state.version(function, &version.version).is_some() {
            return Err(RegistryError::DuplicateVersion {
                function: function.clone(),
                version: version.version,
            });
        }
        state.versions.entry(function.clone()).or_default().push(version);
        self.persist(&state)
    }

    /// Flip the function's active pointer to an existing version.
    pub fn set_active(&self, function: &FunctionId, version: &str) -> Result<(), RegistryError> {
        let mut state = self.state.lock();
        if state.version(function, version).is_none() {
            return Err(RegistryError::VersionNotFound {
                function: function.clone(),
                version: version.to_string(),
            });
        }
        let record = state
            .functions
            .get_mut(function)
            .ok_or_else(|| RegistryError::NotFound(function.clone()))?;
        record.active_version = Some(version.to_string());
        self.persist(&state)
    }

    /// Deploy: create the version, set the worker env, and flip the active
    /// pointer in one atomic write.
    pub fn deploy(
        &self,
        function: &FunctionId,
        version: FunctionVersion,
        env: Vec<(String, String)>,
    ) -> Result<FunctionRecord, RegistryError> {
        let mut state = self.state.lock();
        if !state.functions.contains_key(function) {
            return Err(RegistryError::NotFound(function.clone()));
        }
        if state.version(function, &version.version).is_some() {
            return Err(RegistryError::DuplicateVersion {
                function: function.clone(),
                version: version.version,
            });
        }
        let tag = version.version.clone();
        state.versions.entry(function.clone()).or_default().push(version);
        let record = match state.functions.get_mut(function) {
            Some(record) => {
                record.active_version = Some(tag.clone());
                record.env = env;
                record.clone()
            }
            None => return Err(RegistryError::NotFound(function.clone())),
        };
        self.persist(&state)?;
        tracing::info!(function = %function, version = %tag, "function deployed");
        Ok(record)
    }

    /// The function record plus its active version, if deployed.
    pub fn lookup(
        &self,
        function: &FunctionId,
    ) -> Option<(FunctionRecord, Option<FunctionVersion>)> {
        let state = self.state.lock();
        let record = state.functions.get(function)?.clone();
        let active = record
            .active_version
            .as_deref()
            .and_then(|tag| state.version(function, tag).cloned());
        Some((record, active))
    }

    pub fn functions(&self) -> Vec<FunctionRecord> {
        self.state.lock().functions.values().cloned().collect()
    }

    fn persist(&self, state: &RegistryState) -> Result<(), RegistryError> {
        let bytes = serde_json::to_vec_pretty(state)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
