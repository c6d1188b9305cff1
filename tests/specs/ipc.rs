// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC socket specs against a running daemon.

use crate::harness::spawn_daemon;
use fp_wire::{
    decode_payload, encode_payload, from_b64, read_response, to_b64, write_request, Command,
    DeployPayload, DeployReply, ErrorReply, InvokePayload, InvokeReply, PingReply, RegisterPayload,
    RegisterReply, RequestFrame,
};
use std::collections::HashMap;
use std::time::Duration;
use tokio::net::UnixStream;

const TIMEOUT: Duration = Duration::from_secs(5);

async fn roundtrip(stream: &mut UnixStream, frame: RequestFrame) -> fp_wire::ResponseFrame {
    let (mut reader, mut writer) = stream.split();
    write_request(&mut writer, &frame, TIMEOUT).await.unwrap();
    read_response(&mut reader, TIMEOUT).await.unwrap()
}

#[tokio::test]
async fn ping_over_the_socket() {
    let daemon = spawn_daemon().await;
    let mut stream = UnixStream::connect(daemon.socket_path()).await.unwrap();

    let response = roundtrip(&mut stream, RequestFrame::new(1, Command::Ping, Vec::new())).await;
    assert!(response.is_ok());
    let reply: PingReply = decode_payload(&response.payload).unwrap();
    assert!(!reply.version.is_empty());
}

#[tokio::test]
async fn unknown_commands_answer_with_an_error() {
    let daemon = spawn_daemon().await;
    let mut stream = UnixStream::connect(daemon.socket_path()).await.unwrap();

    let response = roundtrip(
        &mut stream,
        RequestFrame { request_id: 2, command: 200, payload: Vec::new() },
    )
    .await;
    assert!(!response.is_ok());
    let reply: ErrorReply = decode_payload(&response.payload).unwrap();
    assert_eq!(reply.error, "unknown command 200");
}

#[tokio::test]
async fn full_function_lifecycle_over_the_socket() {
    let daemon = spawn_daemon().await;
    let mut stream = UnixStream::connect(daemon.socket_path()).await.unwrap();

    let payload = encode_payload(&RegisterPayload {
        name: "hello".to_string(),
        runtime: fp_core::RuntimeTag::Bun,
        handler: "default".to_string(),
    })
    .unwrap();
    let response =
        roundtrip(&mut stream, RequestFrame::new(1, Command::RegisterFunction, payload)).await;
    assert!(response.is_ok());
    let registered: RegisterReply = decode_payload(&response.payload).unwrap();

    let payload = encode_payload(&DeployPayload {
        function_id: registered.function_id.clone(),
        version: "v1".to_string(),
        bundle_b64: to_b64(b"export default () => {}"),
        env: Vec::new(),
    })
    .unwrap();
    let response =
        roundtrip(&mut stream, RequestFrame::new(2, Command::DeployFunction, payload)).await;
    assert!(response.is_ok());
    let deployed: DeployReply = decode_payload(&response.payload).unwrap();
    assert_eq!(deployed.version, "v1");

    let payload = encode_payload(&InvokePayload {
        function_id: registered.function_id,
        method: "GET".to_string(),
        path: "/".to_string(),
        headers: HashMap::new(),
        query: HashMap::new(),
        body_b64: String::new(),
        deadline_ms: 10_000,
    })
    .unwrap();
    let response = roundtrip(&mut stream, RequestFrame::new(3, Command::Invoke, payload)).await;
    assert!(response.is_ok());
    let reply: InvokeReply = decode_payload(&response.payload).unwrap();
    assert!(reply.success, "invoke failed: {:?}", reply.error);
    assert_eq!(from_b64(&reply.body_b64).unwrap(), b"hello");
    assert!(reply.cold_start);
}
