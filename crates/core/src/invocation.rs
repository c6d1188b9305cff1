// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Invocation request and outcome shapes.
//!
//! An invocation lives only for the duration of one request and is never
//! persisted. Bodies are raw bytes here; base64 happens at the wire and
//! stdio boundaries.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// HTTP-shaped request tunnelled to a function handler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvocationRequest {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub query: HashMap<String, String>,
    #[serde(default)]
    pub body: Vec<u8>,
    /// Time budget for the handler, enforced by the child and defensively by
    /// the controller.
    pub deadline_ms: u64,
}

impl InvocationRequest {
    /// Minimal GET-shaped request, mostly for tests and probes.
    pub fn get(path: impl Into<String>, deadline_ms: u64) -> Self {
        Self {
            method: "GET".to_string(),
            path: path.into(),
            headers: HashMap::new(),
            query: HashMap::new(),
            body: Vec::new(),
            deadline_ms,
        }
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

/// Successful handler response plus execution metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationOutcome {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub execution_time: Duration,
    /// True when this invocation paid the worker spawn cost.
    pub cold_start: bool,
}

#[cfg(test)]
#[path = "invocation_tests.rs"]
mod tests;
