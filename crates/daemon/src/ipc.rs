// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC server: length-prefixed RPC over the daemon's unix socket.
//!
//! Each connection is serial: one request, one response, repeat. Framing
//! violations abort the connection; unknown commands get an error response
//! on it. Proxy commands are dispatched through the same router the HTTP
//! listener uses, so `/kv` routing logic exists once.

use crate::env;
use crate::state::AppState;
use axum::Router;
use fp_core::{ErrorKind, FunctionVersion, InvocationRequest, SystemClock};
use fp_core::Clock as _;
use fp_wire::{
    decode_payload, encode_payload, from_b64, read_request, to_b64, write_response, Command,
    DeployPayload, DeployReply, ErrorReply, InvokePayload, InvokeReply, PingReply, ProtocolError,
    ProxyPayload, ProxyReply, RegisterPayload, RegisterReply, RequestFrame, ResponseFrame, Status,
    MAX_FRAME_SIZE,
};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::net::{unix::OwnedWriteHalf, UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower::util::ServiceExt;

/// Running IPC server; `stop` closes the listener and drains handlers.
pub struct IpcServer {
    cancel: CancellationToken,
    tracker: TaskTracker,
    socket_path: PathBuf,
}

impl IpcServer {
    /// Begin accepting connections on an already-bound listener.
    pub fn spawn(
        listener: UnixListener,
        socket_path: PathBuf,
        state: AppState,
        router: Router,
    ) -> Self {
        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();
        tracker.spawn(accept_loop(listener, state, router, cancel.clone(), tracker.clone()));
        Self { cancel, tracker, socket_path }
    }

    /// Stop accepting, close every connection, and wait for handlers.
    pub async fn stop(self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

async fn accept_loop(
    listener: UnixListener,
    state: AppState,
    router: Router,
    cancel: CancellationToken,
    tracker: TaskTracker,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    tracker.spawn(handle_connection(
                        stream,
                        state.clone(),
                        router.clone(),
                        cancel.clone(),
                    ));
                }
                Err(e) => tracing::error!(error = %e, "IPC accept error"),
            }
        }
    }
}

async fn handle_connection(
    stream: UnixStream,
    state: AppState,
    router: Router,
    cancel: CancellationToken,
) {
    let (mut reader, mut writer) = stream.into_split();
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => return,
            frame = read_request(&mut reader, env::ipc_idle_timeout()) => frame,
        };
        match frame {
            Ok(frame) => {
                let response = handle_frame(&state, &router, frame).await;
                if write_frame(&mut writer, &response).await.is_err() {
                    return;
                }
            }
            Err(ProtocolError::ConnectionClosed) => return,
            Err(e @ ProtocolError::FrameTooLarge { .. }) | Err(e @ ProtocolError::Invalid(_)) => {
                // Framing violation: the stream position is unknowable,
                // abort the connection.
                tracing::warn!(error = %e, "aborting IPC connection on framing violation");
                return;
            }
            Err(e) => {
                tracing::debug!(error = %e, "IPC connection closed");
                return;
            }
        }
    }
}

async fn write_frame(writer: &mut OwnedWriteHalf, frame: &ResponseFrame) -> Result<(), ()> {
    match write_response(writer, frame, env::ipc_write_timeout()).await {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::debug!(error = %e, "IPC response write failed");
            Err(())
        }
    }
}

async fn handle_frame(state: &AppState, router: &Router, frame: RequestFrame) -> ResponseFrame {
    let id = frame.request_id;
    match Command::from_u8(frame.command) {
        None => error_frame(
            id,
            format!("unknown command {}", frame.command),
            Some(ErrorKind::UnknownCommand),
        ),

        Some(Command::Ping) => {
            ok_frame(id, &PingReply { version: env::VERSION.to_string() })
        }

        Some(Command::Invoke) => match decode_payload::<InvokePayload>(&frame.payload) {
            Ok(payload) => ok_frame(id, &handle_invoke(state, payload).await),
            Err(e) => error_frame(id, e.to_string(), Some(e.kind())),
        },

        Some(Command::RegisterFunction) => {
            match decode_payload::<RegisterPayload>(&frame.payload) {
                Ok(payload) => {
                    match state.registry.register(&payload.name, payload.runtime, &payload.handler)
                    {
                        Ok(record) => ok_frame(id, &RegisterReply { function_id: record.id }),
                        Err(e) => error_frame(id, e.to_string(), None),
                    }
                }
                Err(e) => error_frame(id, e.to_string(), Some(e.kind())),
            }
        }

        Some(Command::DeployFunction) => match decode_payload::<DeployPayload>(&frame.payload) {
            Ok(payload) => match handle_deploy(state, payload) {
                Ok(reply) => ok_frame(id, &reply),
                Err((message, kind)) => error_frame(id, message, kind),
            },
            Err(e) => error_frame(id, e.to_string(), Some(e.kind())),
        },

        Some(Command::ProxyKv) => match decode_payload::<ProxyPayload>(&frame.payload) {
            Ok(payload) => match handle_proxy(router, payload).await {
                Ok(reply) => ok_frame(id, &reply),
                Err(message) => error_frame(id, message, None),
            },
            Err(e) => error_frame(id, e.to_string(), Some(e.kind())),
        },
    }
}

async fn handle_invoke(state: &AppState, payload: InvokePayload) -> InvokeReply {
    let body = match from_b64(&payload.body_b64) {
        Ok(body) => body,
        Err(e) => return invoke_failure(e.to_string(), Some(ErrorKind::InvalidFrame)),
    };
    let request = InvocationRequest {
        method: payload.method,
        path: payload.path,
        headers: payload.headers,
        query: payload.query,
        body,
        deadline_ms: payload.deadline_ms,
    };
    match state
        .scheduler
        .schedule(&payload.function_id, request, CancellationToken::new())
        .await
    {
        Ok(outcome) => InvokeReply {
            success: true,
            status: outcome.status,
            headers: outcome.headers,
            body_b64: to_b64(&outcome.body),
            error: None,
            kind: None,
            execution_ms: outcome.execution_time.as_millis() as u64,
            cold_start: outcome.cold_start,
        },
        Err(e) => invoke_failure(e.to_string(), e.kind()),
    }
}

fn invoke_failure(error: String, kind: Option<ErrorKind>) -> InvokeReply {
    InvokeReply {
        success: false,
        status: 0,
        headers: HashMap::new(),
        body_b64: String::new(),
        error: Some(error),
        kind,
        execution_ms: 0,
        cold_start: false,
    }
}

fn handle_deploy(
    state: &AppState,
    payload: DeployPayload,
) -> Result<DeployReply, (String, Option<ErrorKind>)> {
    let bundle = from_b64(&payload.bundle_b64)
        .map_err(|e| (e.to_string(), Some(ErrorKind::InvalidFrame)))?;
    if state.registry.lookup(&payload.function_id).is_none() {
        return Err((format!("function not found: {}", payload.function_id), None));
    }
    let (bundle_path, checksum) = state
        .bundles
        .store(&payload.function_id, &payload.version, &bundle)
        .map_err(|e| (e.to_string(), None))?;
    let version = FunctionVersion {
        function: payload.function_id.clone(),
        version: payload.version.clone(),
        bundle_path,
        checksum: checksum.clone(),
        created_at_ms: SystemClock.epoch_ms(),
    };
    let record = state
        .registry
        .deploy(&payload.function_id, version.clone(), payload.env)
        .map_err(|e| (e.to_string(), None))?;
    state.register_pool_for(&record, &version);
    Ok(DeployReply { function_id: payload.function_id, version: payload.version, checksum })
}

/// Dispatch a proxy command through the shared HTTP mux.
async fn handle_proxy(router: &Router, payload: ProxyPayload) -> Result<ProxyReply, String> {
    let body = from_b64(&payload.body_b64).map_err(|e| e.to_string())?;
    let path = if payload.path.starts_with('/') {
        payload.path.clone()
    } else {
        format!("/{}", payload.path)
    };
    let uri = format!("/kv/{}{}", payload.project_id, path);
    let request = axum::http::Request::builder()
        .method(payload.method.as_str())
        .uri(&uri)
        .body(axum::body::Body::from(body))
        .map_err(|e| e.to_string())?;

    let response = match router.clone().oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    let status = response.status().as_u16();
    let bytes = axum::body::to_bytes(response.into_body(), MAX_FRAME_SIZE)
        .await
        .map_err(|e| e.to_string())?;
    Ok(ProxyReply { status, body_b64: to_b64(&bytes) })
}

fn ok_frame<T: Serialize>(id: u64, payload: &T) -> ResponseFrame {
    match encode_payload(payload) {
        Ok(bytes) => ResponseFrame::new(id, Status::Ok, bytes),
        Err(e) => error_frame(id, format!("response encoding failed: {}", e), None),
    }
}

fn error_frame(id: u64, error: String, kind: Option<ErrorKind>) -> ResponseFrame {
    let payload = encode_payload(&ErrorReply::new(error, kind)).unwrap_or_default();
    ResponseFrame::new(id, Status::Error, payload)
}

#[cfg(test)]
#[path = "ipc_tests.rs"]
mod tests;
