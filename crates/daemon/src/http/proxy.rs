// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stateful proxy: `/kv/{project}/...` forwarded to the project's
//! instance over loopback HTTP.

use super::{ApiError, SKIP_HEADERS};
use crate::state::AppState;
use axum::extract::{Path, RawQuery, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use fp_core::ProjectId;

pub async fn proxy(
    State(state): State<AppState>,
    Path((project, rest)): Path<(String, String)>,
    method: Method,
    RawQuery(raw_query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    forward(&state, project, format!("/{}", rest), method, raw_query, headers, body).await
}

pub async fn proxy_root(
    State(state): State<AppState>,
    Path(project): Path<String>,
    method: Method,
    RawQuery(raw_query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    forward(&state, project, "/".to_string(), method, raw_query, headers, body).await
}

async fn forward(
    state: &AppState,
    project: String,
    path: String,
    method: Method,
    raw_query: Option<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let project = ProjectId::from(project.as_str());
    let lease = match state.instances.acquire(&project).await {
        Ok(lease) => lease,
        Err(e) => return ApiError::from_instance(e).into_response(),
    };

    let mut url = format!("{}{}", lease.base_url(), path);
    if let Some(query) = raw_query {
        url.push('?');
        url.push_str(&query);
    }

    let method = reqwest::Method::from_bytes(method.as_str().as_bytes())
        .unwrap_or(reqwest::Method::GET);
    let mut request = state.http_client.request(method, &url);
    for (name, value) in headers.iter() {
        if SKIP_HEADERS.contains(&name.as_str()) {
            continue;
        }
        if let Ok(value) = value.to_str() {
            request = request.header(name.as_str(), value);
        }
    }
    if !body.is_empty() {
        request = request.body(body.to_vec());
    }

    let result = request.send().await;
    // The lease pins the instance until the response is fully read.
    let response = match result {
        Ok(upstream) => {
            let status =
                StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
            let mut response_headers = HeaderMap::new();
            for (name, value) in upstream.headers() {
                let Ok(name) = HeaderName::try_from(name.as_str()) else { continue };
                let Ok(value) = HeaderValue::try_from(value.as_bytes()) else { continue };
                response_headers.insert(name, value);
            }
            let bytes = upstream.bytes().await.unwrap_or_default();
            (status, response_headers, bytes).into_response()
        }
        Err(e) => {
            tracing::warn!(project = %project, url = %url, error = %e, "instance proxy failed");
            ApiError::new(StatusCode::BAD_GATEWAY, format!("instance unreachable: {}", e))
                .into_response()
        }
    };
    drop(lease);
    response
}
