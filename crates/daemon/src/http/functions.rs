// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Function registration, deploy, and synchronous invoke handlers.

use super::{parse_query, ApiError, SKIP_HEADERS};
use crate::state::AppState;
use axum::extract::{Path, Query, RawQuery, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use fp_core::{Clock, FunctionId, FunctionVersion, InvocationRequest, RuntimeTag, SystemClock};
use fp_registry::RegistryError;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
    pub name: String,
    pub runtime: String,
    pub handler: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let runtime = RuntimeTag::parse(&body.runtime)
        .ok_or_else(|| ApiError::bad_request(format!("unknown runtime: {}", body.runtime)))?;
    let record = state
        .registry
        .register(&body.name, runtime, &body.handler)
        .map_err(ApiError::internal)?;
    Ok(Json(json!({ "function_id": record.id, "name": record.name })))
}

#[derive(Debug, Deserialize)]
pub struct DeployQuery {
    pub version: String,
}

pub async fn deploy(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DeployQuery>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let function = FunctionId::from(id.as_str());
    if state.registry.lookup(&function).is_none() {
        return Err(ApiError::not_found(format!("function not found: {}", function)));
    }
    if body.is_empty() {
        return Err(ApiError::bad_request("empty bundle"));
    }

    let (bundle_path, checksum) = state
        .bundles
        .store(&function, &query.version, &body)
        .map_err(ApiError::internal)?;
    let version = FunctionVersion {
        function: function.clone(),
        version: query.version.clone(),
        bundle_path,
        checksum: checksum.clone(),
        created_at_ms: SystemClock.epoch_ms(),
    };
    let record = state
        .registry
        .deploy(&function, version.clone(), Vec::new())
        .map_err(|e| match e {
            RegistryError::NotFound(_) => ApiError::not_found(e.to_string()),
            RegistryError::DuplicateVersion { .. } => ApiError::conflict(e.to_string()),
            other => ApiError::internal(other),
        })?;
    state.register_pool_for(&record, &version);

    Ok(Json(json!({
        "function_id": function,
        "version": query.version,
        "checksum": checksum,
    })))
}

pub async fn invoke(
    State(state): State<AppState>,
    Path(id): Path<String>,
    RawQuery(raw_query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let function = FunctionId::from(id.as_str());
    let deadline_ms = headers
        .get("x-fp-deadline-ms")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(state.default_deadline_ms);

    let mut tunnelled = HashMap::new();
    for (name, value) in headers.iter() {
        if SKIP_HEADERS.contains(&name.as_str()) {
            continue;
        }
        if let Ok(value) = value.to_str() {
            tunnelled.insert(name.as_str().to_string(), value.to_string());
        }
    }

    let request = InvocationRequest {
        method: "POST".to_string(),
        path: "/".to_string(),
        headers: tunnelled,
        query: parse_query(raw_query.as_deref().unwrap_or("")),
        body: body.to_vec(),
        deadline_ms,
    };

    // Run on a detached task so a client disconnect cannot drop the
    // in-flight invocation mid-worker; the worker is always released.
    let scheduler = state.scheduler.clone();
    let joined = tokio::spawn(async move {
        scheduler.schedule(&function, request, CancellationToken::new()).await
    })
    .await;

    match joined {
        Ok(Ok(outcome)) => {
            let status = StatusCode::from_u16(outcome.status).unwrap_or(StatusCode::BAD_GATEWAY);
            let mut response_headers = HeaderMap::new();
            for (name, value) in &outcome.headers {
                let Ok(name) = HeaderName::try_from(name.as_str()) else { continue };
                let Ok(value) = HeaderValue::try_from(value.as_str()) else { continue };
                response_headers.insert(name, value);
            }
            if let Ok(value) = HeaderValue::try_from(outcome.cold_start.to_string()) {
                response_headers.insert(HeaderName::from_static("x-fp-cold-start"), value);
            }
            if let Ok(value) =
                HeaderValue::try_from(outcome.execution_time.as_millis().to_string())
            {
                response_headers.insert(HeaderName::from_static("x-fp-execution-ms"), value);
            }
            (status, response_headers, Bytes::from(outcome.body)).into_response()
        }
        Ok(Err(e)) => ApiError::from_schedule(e).into_response(),
        Err(e) => ApiError::internal(format!("invocation task failed: {}", e)).into_response(),
    }
}
