// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker stdio protocol.
//!
//! Each line on the child's stdio is one JSON object
//! `{id, type, payload}`. The controller writes `invoke` lines; the child
//! answers with exactly one `response` or `error` per invoke, with `log`
//! lines interleaved out-of-band. Bodies are base64 on the wire.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use fp_core::{InvocationId, InvocationRequest, WorkerId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Error codes the child may set on an `error` line.
pub mod codes {
    pub const DEADLINE_EXCEEDED: &str = "DEADLINE_EXCEEDED";
    pub const BUNDLE_LOAD_ERROR: &str = "BUNDLE_LOAD_ERROR";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Ready,
    Invoke,
    Response,
    Log,
    Error,
}

/// One NDJSON line on a worker's stdio.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerMessage {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Payload of an `invoke` line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvokeBody {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub query: HashMap<String, String>,
    /// Base64 request body.
    #[serde(default)]
    pub body: String,
    pub deadline_ms: u64,
}

/// Payload of a `response` line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseBody {
    pub status: u16,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Base64 response body.
    #[serde(default)]
    pub body: String,
}

impl ResponseBody {
    pub fn decode_body(&self) -> Result<Vec<u8>, base64::DecodeError> {
        B64.decode(&self.body)
    }
}

/// Payload of an `error` line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Payload of a `log` line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogBody {
    pub level: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl WorkerMessage {
    /// The ready line a child must emit first.
    pub fn ready(worker_id: &WorkerId) -> Self {
        Self {
            id: worker_id.to_string(),
            kind: MessageKind::Ready,
            payload: serde_json::json!({}),
        }
    }

    /// Build an `invoke` line from an invocation request.
    pub fn invoke(
        invocation: &InvocationId,
        request: &InvocationRequest,
    ) -> Result<Self, serde_json::Error> {
        let body = InvokeBody {
            method: request.method.clone(),
            path: request.path.clone(),
            headers: request.headers.clone(),
            query: request.query.clone(),
            body: B64.encode(&request.body),
            deadline_ms: request.deadline_ms,
        };
        Ok(Self {
            id: invocation.to_string(),
            kind: MessageKind::Invoke,
            payload: serde_json::to_value(body)?,
        })
    }

    pub fn response(id: &str, body: ResponseBody) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: id.to_string(),
            kind: MessageKind::Response,
            payload: serde_json::to_value(body)?,
        })
    }

    pub fn error(id: &str, body: ErrorBody) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: id.to_string(),
            kind: MessageKind::Error,
            payload: serde_json::to_value(body)?,
        })
    }

    pub fn log(id: &str, body: LogBody) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: id.to_string(),
            kind: MessageKind::Log,
            payload: serde_json::to_value(body)?,
        })
    }

    /// Serialize to one newline-terminated wire line.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    pub fn response_body(&self) -> Result<ResponseBody, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }

    pub fn error_body(&self) -> Result<ErrorBody, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }

    pub fn log_body(&self) -> Result<LogBody, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }

    pub fn invoke_body(&self) -> Result<InvokeBody, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
