// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Edge tests driven through the router with tower's oneshot, no TCP.

use super::*;
use crate::test_support::{deploy_function, plane_with};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use fp_engine::ScriptedReply;
use tower::util::ServiceExt;

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let plane = plane_with(|_| ScriptedReply::ok(b""));
    let response = plane
        .router
        .clone()
        .oneshot(Request::builder().uri("/v1/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn register_validates_the_runtime() {
    let plane = plane_with(|_| ScriptedReply::ok(b""));
    let request = Request::builder()
        .method("POST")
        .uri("/v1/functions")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"name":"x","runtime":"cobol","handler":"default"}"#))
        .unwrap();
    let response = plane.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn register_returns_a_function_id() {
    let plane = plane_with(|_| ScriptedReply::ok(b""));
    let request = Request::builder()
        .method("POST")
        .uri("/v1/functions")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"name":"hello","runtime":"bun","handler":"default"}"#))
        .unwrap();
    let response = plane.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["function_id"].as_str().unwrap().starts_with("fn-"));
}

#[tokio::test]
async fn deploy_requires_a_registered_function() {
    let plane = plane_with(|_| ScriptedReply::ok(b""));
    let request = Request::builder()
        .method("POST")
        .uri("/v1/functions/fn-ghost/deploy?version=v1")
        .body(Body::from("bundle"))
        .unwrap();
    let response = plane.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn register_deploy_invoke_through_the_edge() {
    let plane = plane_with(|body| {
        assert_eq!(body.method, "POST");
        ScriptedReply::ok(b"hello from the handler")
    });

    // Register
    let request = Request::builder()
        .method("POST")
        .uri("/v1/functions")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"name":"hello","runtime":"bun","handler":"default"}"#))
        .unwrap();
    let response = plane.router.clone().oneshot(request).await.unwrap();
    let function_id = body_json(response).await["function_id"].as_str().unwrap().to_string();

    // Deploy
    let request = Request::builder()
        .method("POST")
        .uri(format!("/v1/functions/{}/deploy?version=v1", function_id))
        .body(Body::from("export default () => {}"))
        .unwrap();
    let response = plane.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let deploy = body_json(response).await;
    assert_eq!(deploy["version"], "v1");
    assert_eq!(deploy["checksum"].as_str().unwrap().len(), 64);

    // Invoke: cold start first
    let request = Request::builder()
        .method("POST")
        .uri(format!("/v1/functions/{}/invoke", function_id))
        .body(Body::from("payload"))
        .unwrap();
    let response = plane.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-fp-cold-start"], "true");
    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20).await.unwrap();
    assert_eq!(&bytes[..], b"hello from the handler");

    // Invoke again: warm
    let request = Request::builder()
        .method("POST")
        .uri(format!("/v1/functions/{}/invoke", function_id))
        .body(Body::empty())
        .unwrap();
    let response = plane.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-fp-cold-start"], "false");
    assert_eq!(plane.launcher.launches(), 1);
}

#[tokio::test]
async fn invoking_an_undeployed_function_is_not_found() {
    let plane = plane_with(|_| ScriptedReply::ok(b""));
    let request = Request::builder()
        .method("POST")
        .uri("/v1/functions/fn-ghost/invoke")
        .body(Body::empty())
        .unwrap();
    let response = plane.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["kind"], "NO_POOL");
}

#[tokio::test]
async fn handler_failures_map_to_bad_gateway() {
    let plane = plane_with(|_| ScriptedReply::fail("boom", None));
    let function = deploy_function(&plane, "exploder");

    let request = Request::builder()
        .method("POST")
        .uri(format!("/v1/functions/{}/invoke", function))
        .body(Body::empty())
        .unwrap();
    let response = plane.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["kind"], "HANDLER_ERROR");
}

#[tokio::test]
async fn proxy_surfaces_port_exhaustion_as_unavailable() {
    // The fixture's instance manager has a zero-port pool.
    let plane = plane_with(|_| ScriptedReply::ok(b""));
    let request = Request::builder()
        .method("GET")
        .uri("/kv/prj-a/buckets/main")
        .body(Body::empty())
        .unwrap();
    let response = plane.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["kind"], "PORT_POOL_EXHAUSTED");
}

#[tokio::test]
async fn query_strings_parse_into_flat_maps() {
    let parsed = parse_query("a=1&b=two&flag");
    assert_eq!(parsed["a"], "1");
    assert_eq!(parsed["b"], "two");
    assert_eq!(parsed["flag"], "");
    assert!(parse_query("").is_empty());
}
