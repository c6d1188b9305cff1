// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP edge specs against a running daemon.

use crate::harness::spawn_daemon;
use serde_json::json;

#[tokio::test]
async fn health_answers_while_running() {
    let daemon = spawn_daemon().await;
    let body: serde_json::Value = reqwest::Client::new()
        .get(format!("{}/v1/health", daemon.http_base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn register_deploy_invoke_roundtrip() {
    let daemon = spawn_daemon().await;
    let client = reqwest::Client::new();

    // Register
    let registered: serde_json::Value = client
        .post(format!("{}/v1/functions", daemon.http_base))
        .json(&json!({ "name": "hello", "runtime": "bun", "handler": "default" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let function_id = registered["function_id"].as_str().unwrap().to_string();

    // Deploy a bundle (the stub worker ignores its contents)
    let deploy = client
        .post(format!("{}/v1/functions/{}/deploy?version=v1", daemon.http_base, function_id))
        .body("export default () => new Response('hello')")
        .send()
        .await
        .unwrap();
    assert!(deploy.status().is_success(), "deploy failed: {}", deploy.status());

    // Cold invoke
    let response = client
        .post(format!("{}/v1/functions/{}/invoke", daemon.http_base, function_id))
        .body("ping")
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    assert_eq!(response.headers()["x-fp-cold-start"], "true");
    assert_eq!(response.text().await.unwrap(), "hello");

    // Warm invoke reuses the worker
    let response = client
        .post(format!("{}/v1/functions/{}/invoke", daemon.http_base, function_id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.headers()["x-fp-cold-start"], "false");
    assert_eq!(response.text().await.unwrap(), "hello");
}

#[tokio::test]
async fn concurrent_clients_share_the_pool_without_errors() {
    let daemon = spawn_daemon().await;
    let client = reqwest::Client::new();

    let registered: serde_json::Value = client
        .post(format!("{}/v1/functions", daemon.http_base))
        .json(&json!({ "name": "mixed", "runtime": "bun", "handler": "default" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let function_id = registered["function_id"].as_str().unwrap().to_string();
    client
        .post(format!("{}/v1/functions/{}/deploy?version=v1", daemon.http_base, function_id))
        .body("export default () => new Response('hello')")
        .send()
        .await
        .unwrap();

    let mut clients = Vec::new();
    for _ in 0..5 {
        let client = client.clone();
        let url = format!("{}/v1/functions/{}/invoke", daemon.http_base, function_id);
        clients.push(tokio::spawn(async move {
            let mut ok = 0usize;
            for _ in 0..4 {
                let response = client.post(&url).body("op").send().await.unwrap();
                assert!(response.status().is_success(), "invoke failed: {}", response.status());
                assert_eq!(response.text().await.unwrap(), "hello");
                ok += 1;
            }
            ok
        }));
    }

    let mut total_ops = 0;
    for handle in clients {
        total_ops += handle.await.unwrap();
    }
    assert_eq!(total_ops, 20);
}

#[tokio::test]
async fn invoking_an_unknown_function_is_not_found() {
    let daemon = spawn_daemon().await;
    let response = reqwest::Client::new()
        .post(format!("{}/v1/functions/fn-ghost/invoke", daemon.http_base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "NO_POOL");
}

#[tokio::test]
async fn sigterm_shuts_down_cleanly() {
    let mut daemon = spawn_daemon().await;
    let socket = daemon.socket_path();
    assert!(socket.exists());

    daemon.terminate();
    assert!(daemon.wait_exit(), "daemon did not exit on SIGTERM");
    assert!(!socket.exists(), "socket not cleaned up");
}

#[test]
fn bad_state_dir_exits_with_code_one() {
    assert_cmd::Command::cargo_bin("fpd")
        .unwrap()
        .env("FP_STATE_DIR", "/dev/null/not-a-dir")
        .assert()
        .failure()
        .code(1);
}
