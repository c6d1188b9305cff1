// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON payload shapes carried inside frames.

use crate::frame::ProtocolError;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use fp_core::{ErrorKind, FunctionId, ProjectId, RuntimeTag};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Serialize a payload struct to frame bytes.
pub fn encode_payload<T: Serialize>(payload: &T) -> Result<Vec<u8>, ProtocolError> {
    serde_json::to_vec(payload).map_err(|e| ProtocolError::Invalid(e.to_string()))
}

/// Deserialize a payload struct from frame bytes.
pub fn decode_payload<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    serde_json::from_slice(bytes).map_err(|e| ProtocolError::Invalid(e.to_string()))
}

pub fn to_b64(bytes: &[u8]) -> String {
    B64.encode(bytes)
}

pub fn from_b64(s: &str) -> Result<Vec<u8>, ProtocolError> {
    B64.decode(s).map_err(|e| ProtocolError::Invalid(format!("bad base64 body: {}", e)))
}

/// `CmdInvoke` request payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvokePayload {
    pub function_id: FunctionId,
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub query: HashMap<String, String>,
    #[serde(default)]
    pub body_b64: String,
    pub deadline_ms: u64,
}

/// `CmdInvoke` response payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvokeReply {
    pub success: bool,
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body_b64: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    pub execution_ms: u64,
    pub cold_start: bool,
}

/// `CmdRegisterFunction` request payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegisterPayload {
    pub name: String,
    pub runtime: RuntimeTag,
    pub handler: String,
}

/// `CmdRegisterFunction` response payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegisterReply {
    pub function_id: FunctionId,
}

/// `CmdDeployFunction` request payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeployPayload {
    pub function_id: FunctionId,
    pub version: String,
    pub bundle_b64: String,
    /// Worker environment declared with this deployment.
    #[serde(default)]
    pub env: Vec<(String, String)>,
}

/// `CmdDeployFunction` response payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeployReply {
    pub function_id: FunctionId,
    pub version: String,
    pub checksum: String,
}

/// `CmdProxyKv` request payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProxyPayload {
    pub method: String,
    pub project_id: ProjectId,
    pub path: String,
    #[serde(default)]
    pub body_b64: String,
}

/// `CmdProxyKv` response payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProxyReply {
    pub status: u16,
    #[serde(default)]
    pub body_b64: String,
}

/// `CmdPing` response payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PingReply {
    pub version: String,
}

/// Error payload for any failed command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorReply {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

impl ErrorReply {
    pub fn new(error: impl Into<String>, kind: Option<ErrorKind>) -> Self {
        Self { error: error.into(), kind }
    }
}

#[cfg(test)]
#[path = "payload_tests.rs"]
mod tests;
