// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fp_core::InvocationRequest;

#[test]
fn invoke_line_has_the_wire_shape() {
    let invocation = InvocationId::from("inv-1");
    let mut request = InvocationRequest::get("/greet", 5_000);
    request.method = "POST".to_string();
    request.body = b"hi".to_vec();

    let msg = WorkerMessage::invoke(&invocation, &request).unwrap();
    let line = msg.to_line().unwrap();
    assert!(line.ends_with('\n'));

    let value: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(value["id"], "inv-1");
    assert_eq!(value["type"], "invoke");
    assert_eq!(value["payload"]["method"], "POST");
    assert_eq!(value["payload"]["path"], "/greet");
    assert_eq!(value["payload"]["deadline_ms"], 5_000);
    // Body is base64 on the wire
    assert_eq!(value["payload"]["body"], "aGk=");
}

#[test]
fn ready_line_round_trips() {
    let worker = WorkerId::from("w-1");
    let line = WorkerMessage::ready(&worker).to_line().unwrap();
    let back = WorkerMessage::parse(line.trim_end()).unwrap();
    assert_eq!(back.kind, MessageKind::Ready);
    assert_eq!(back.id, "w-1");
}

#[test]
fn error_body_optional_fields_may_be_absent() {
    let msg = WorkerMessage::parse(
        r#"{"id":"inv-2","type":"error","payload":{"message":"boom"}}"#,
    )
    .unwrap();
    let body = msg.error_body().unwrap();
    assert_eq!(body.message, "boom");
    assert!(body.stack.is_none());
    assert!(body.code.is_none());
}

#[test]
fn error_body_carries_code() {
    let msg = WorkerMessage::parse(
        r#"{"id":"inv-3","type":"error","payload":{"message":"late","code":"DEADLINE_EXCEEDED"}}"#,
    )
    .unwrap();
    assert_eq!(msg.error_body().unwrap().code.as_deref(), Some(codes::DEADLINE_EXCEEDED));
}

#[test]
fn response_body_decodes_base64() {
    let body = ResponseBody {
        status: 200,
        headers: HashMap::new(),
        body: "aGVsbG8=".to_string(),
    };
    assert_eq!(body.decode_body().unwrap(), b"hello");
}

#[test]
fn log_line_parses() {
    let msg = WorkerMessage::parse(
        r#"{"id":"inv-4","type":"log","payload":{"level":"warn","message":"slow query","metadata":{"ms":91}}}"#,
    )
    .unwrap();
    let body = msg.log_body().unwrap();
    assert_eq!(body.level, "warn");
    assert_eq!(body.metadata.unwrap()["ms"], 91);
}

#[test]
fn unknown_type_fails_to_parse() {
    assert!(WorkerMessage::parse(r#"{"id":"x","type":"telemetry","payload":{}}"#).is_err());
}
