// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker lifecycle tests against the scripted launcher.

use super::*;
use crate::launcher::{ScriptedLauncher, ScriptedReply, WorkerSpec};
use crate::logstore::{LogStore, MemorySink};
use fp_core::{FunctionId, InvocationId, InvocationRequest, RuntimeTag, WorkerId};
use std::path::PathBuf;
use std::time::Duration;

fn spec() -> WorkerSpec {
    WorkerSpec {
        worker_id: WorkerId::generate(),
        function: FunctionId::from("fn-test"),
        version: "v1".to_string(),
        runtime: RuntimeTag::Bun,
        bundle_path: PathBuf::from("/tmp/bundle.js"),
        env: Vec::new(),
    }
}

const SPAWN_TIMEOUT: Duration = Duration::from_secs(2);
const GRACE: Duration = Duration::from_secs(2);

async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn spawn_blocks_until_ready() {
    let launcher = ScriptedLauncher::echo(b"ok").with_ready_delay(Duration::from_millis(50));
    let worker = Worker::spawn(&launcher, spec(), SPAWN_TIMEOUT, None).await.unwrap();
    assert_eq!(worker.state(), WorkerState::Ready);
    assert!(worker.health_check());
    worker.terminate().await;
}

#[tokio::test]
async fn spawn_fails_without_ready_message() {
    let launcher = ScriptedLauncher::echo(b"ok").mute();
    let err = Worker::spawn(&launcher, spec(), Duration::from_millis(100), None)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::SpawnFailure(_)));
}

#[tokio::test]
async fn invoke_round_trips_a_response() {
    let launcher = ScriptedLauncher::new(|body| {
        assert_eq!(body.method, "GET");
        ScriptedReply::status(201, b"made")
    });
    let worker = Worker::spawn(&launcher, spec(), SPAWN_TIMEOUT, None).await.unwrap();

    let request = InvocationRequest::get("/make", 1_000);
    let body = worker
        .invoke(&InvocationId::generate(), &request, &Default::default(), GRACE)
        .await
        .unwrap();
    assert_eq!(body.status, 201);
    assert_eq!(body.decode_body().unwrap(), b"made");
    assert_eq!(worker.state(), WorkerState::Ready);
    worker.terminate().await;
}

#[tokio::test]
async fn handler_error_leaves_the_worker_usable() {
    let launcher = ScriptedLauncher::new(|_| ScriptedReply::fail("boom", None));
    let worker = Worker::spawn(&launcher, spec(), SPAWN_TIMEOUT, None).await.unwrap();

    let request = InvocationRequest::get("/", 1_000);
    let err = worker
        .invoke(&InvocationId::generate(), &request, &Default::default(), GRACE)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::Handler { ref message } if message == "boom"));
    assert_eq!(worker.state(), WorkerState::Ready);
    assert!(worker.health_check());
    worker.terminate().await;
}

#[tokio::test]
async fn child_reported_deadline_keeps_the_worker() {
    let launcher =
        ScriptedLauncher::new(|_| ScriptedReply::fail("too slow", Some(codes::DEADLINE_EXCEEDED)));
    let worker = Worker::spawn(&launcher, spec(), SPAWN_TIMEOUT, None).await.unwrap();

    let request = InvocationRequest::get("/", 1_000);
    let err = worker
        .invoke(&InvocationId::generate(), &request, &Default::default(), GRACE)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::DeadlineExceeded { controller_side: false }));
    assert_eq!(worker.state(), WorkerState::Ready);
    worker.terminate().await;
}

#[tokio::test]
async fn controller_deadline_marks_the_worker_dead() {
    let launcher = ScriptedLauncher::new(|_| ScriptedReply::hang());
    let worker = Worker::spawn(&launcher, spec(), SPAWN_TIMEOUT, None).await.unwrap();

    let request = InvocationRequest::get("/", 50);
    let err = worker
        .invoke(
            &InvocationId::generate(),
            &request,
            &Default::default(),
            Duration::from_millis(50),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::DeadlineExceeded { controller_side: true }));
    assert_eq!(worker.state(), WorkerState::Dead);
    assert!(!worker.health_check());
}

#[tokio::test]
async fn bundle_load_error_kills_the_worker() {
    let launcher =
        ScriptedLauncher::new(|_| ScriptedReply::fail("no bundle", Some(codes::BUNDLE_LOAD_ERROR)));
    let worker = Worker::spawn(&launcher, spec(), SPAWN_TIMEOUT, None).await.unwrap();

    let request = InvocationRequest::get("/", 1_000);
    let err = worker
        .invoke(&InvocationId::generate(), &request, &Default::default(), GRACE)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::BundleLoad(_)));
    assert_eq!(worker.state(), WorkerState::Dead);
}

#[tokio::test]
async fn stdio_closure_is_a_transport_failure() {
    let launcher = ScriptedLauncher::new(|_| ScriptedReply::close());
    let worker = Worker::spawn(&launcher, spec(), SPAWN_TIMEOUT, None).await.unwrap();

    let request = InvocationRequest::get("/", 1_000);
    let err = worker
        .invoke(&InvocationId::generate(), &request, &Default::default(), GRACE)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::Transport(_)));
    wait_until(|| worker.state() == WorkerState::Dead).await;
}

#[tokio::test]
async fn cancellation_poisons_the_worker() {
    let launcher = ScriptedLauncher::new(|_| ScriptedReply::hang());
    let worker = Worker::spawn(&launcher, spec(), SPAWN_TIMEOUT, None).await.unwrap();

    let cancel = tokio_util::sync::CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let request = InvocationRequest::get("/", 10_000);
    let err = worker
        .invoke(&InvocationId::generate(), &request, &cancel, GRACE)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::Cancelled));
    assert_eq!(worker.state(), WorkerState::Dead);
}

#[tokio::test]
async fn log_lines_reach_the_store_without_blocking() {
    let sink = std::sync::Arc::new(MemorySink::new());
    let store = LogStore::spawn(16, sink.clone());
    let launcher = ScriptedLauncher::new(|_| {
        ScriptedReply::ok(b"done").with_log("info", "step one").with_log("warn", "step two")
    });
    let worker = Worker::spawn(&launcher, spec(), SPAWN_TIMEOUT, Some(store)).await.unwrap();

    let invocation = InvocationId::generate();
    let request = InvocationRequest::get("/", 1_000);
    worker.invoke(&invocation, &request, &Default::default(), GRACE).await.unwrap();

    wait_until(|| sink.len() == 2).await;
    let entries = sink.entries();
    assert_eq!(entries[0].message, "step one");
    assert_eq!(entries[0].invocation, invocation);
    assert_eq!(entries[1].level, fp_core::LogLevel::Warn);
    worker.terminate().await;
}

#[tokio::test]
async fn terminate_is_idempotent() {
    let launcher = ScriptedLauncher::echo(b"ok");
    let worker = Worker::spawn(&launcher, spec(), SPAWN_TIMEOUT, None).await.unwrap();
    worker.terminate().await;
    assert_eq!(worker.state(), WorkerState::Dead);
    worker.terminate().await;
    assert_eq!(worker.state(), WorkerState::Dead);
}
