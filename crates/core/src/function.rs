// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Function and version records.
//!
//! A `FunctionRecord` is the durable identity of a deployed function; a
//! `FunctionVersion` is one immutable code artifact. Deploys create a new
//! version and flip the record's active pointer; nothing else mutates them.

use crate::FunctionId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which runtime executes the function's bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeTag {
    Bun,
    Node,
}

impl RuntimeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeTag::Bun => "bun",
            RuntimeTag::Node => "node",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bun" => Some(RuntimeTag::Bun),
            "node" => Some(RuntimeTag::Node),
            _ => None,
        }
    }
}

impl std::fmt::Display for RuntimeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Durable record of a registered function.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionRecord {
    pub id: FunctionId,
    pub name: String,
    pub runtime: RuntimeTag,
    /// Exported symbol the worker script calls into.
    pub handler: String,
    /// Version tag currently served by invokes. `None` until first deploy.
    pub active_version: Option<String>,
    /// Environment handed to workers, declared at deploy time.
    #[serde(default)]
    pub env: Vec<(String, String)>,
}

/// One immutable deployed artifact of a function.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionVersion {
    pub function: FunctionId,
    pub version: String,
    pub bundle_path: PathBuf,
    /// SHA-256 of the bundle bytes, hex-encoded.
    pub checksum: String,
    pub created_at_ms: u64,
}

#[cfg(test)]
#[path = "function_tests.rs"]
mod tests;
