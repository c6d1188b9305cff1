// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP edge: a thin surface over the scheduler and instance manager.
//!
//! The router built here is also the mux the IPC server dispatches proxy
//! commands through, so `/kv/...` routing exists exactly once.

mod functions;
mod proxy;

use crate::env;
use crate::state::AppState;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, post};
use axum::{Json, Router};
use fp_core::ErrorKind;
use fp_engine::ScheduleError;
use fp_instance::InstanceError;
use serde_json::json;
use tower_http::trace::TraceLayer;

/// Build the shared router for both the HTTP listener and IPC dispatch.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/functions", post(functions::register))
        .route("/v1/functions/{id}/deploy", post(functions::deploy))
        .route("/v1/functions/{id}/invoke", post(functions::invoke))
        .route("/kv/{project}", any(proxy::proxy_root))
        .route("/kv/{project}/{*rest}", any(proxy::proxy))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": env::VERSION }))
}

/// Error shape returned by every edge handler.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: String,
    pub kind: Option<ErrorKind>,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self { status, error: error.into(), kind: None }
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    pub fn not_found(error: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, error)
    }

    pub fn conflict(error: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, error)
    }

    pub fn internal(error: impl std::fmt::Display) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
    }

    fn with_kind(mut self, kind: Option<ErrorKind>) -> Self {
        self.kind = kind;
        self
    }

    pub fn from_schedule(e: ScheduleError) -> Self {
        let kind = e.kind();
        let status = match kind {
            Some(ErrorKind::NoPool) => StatusCode::NOT_FOUND,
            Some(ErrorKind::QueueOverflow) => StatusCode::TOO_MANY_REQUESTS,
            Some(ErrorKind::SchedulerStopped) | Some(ErrorKind::PoolStopped) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Some(ErrorKind::DeadlineExceeded) => StatusCode::GATEWAY_TIMEOUT,
            Some(_) => StatusCode::BAD_GATEWAY,
            None => StatusCode::SERVICE_UNAVAILABLE,
        };
        Self::new(status, e.to_string()).with_kind(kind)
    }

    pub fn from_instance(e: InstanceError) -> Self {
        let kind = e.kind();
        let status = match kind {
            Some(ErrorKind::PortPoolExhausted) | Some(ErrorKind::InstanceManagerClosed) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, e.to_string()).with_kind(kind)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.kind {
            Some(kind) => json!({ "error": self.error, "kind": kind }),
            None => json!({ "error": self.error }),
        };
        (self.status, Json(body)).into_response()
    }
}

/// Split a raw query string into a flat map. Duplicate keys keep the last
/// value; handlers see query exactly as the child does.
pub(crate) fn parse_query(raw: &str) -> std::collections::HashMap<String, String> {
    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

/// Hop-by-hop and envelope headers never tunnelled to handlers or
/// instances.
pub(crate) const SKIP_HEADERS: &[&str] =
    &["host", "content-length", "connection", "transfer-encoding", "x-fp-deadline-ms"];

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
