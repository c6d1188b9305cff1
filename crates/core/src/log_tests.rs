// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn levels_serialize_lowercase() {
    assert_eq!(serde_json::to_string(&LogLevel::Warn).unwrap(), "\"warn\"");
    assert_eq!(LogLevel::parse("error"), Some(LogLevel::Error));
    assert_eq!(LogLevel::parse("trace"), None);
}

#[test]
fn levels_order_by_severity() {
    assert!(LogLevel::Debug < LogLevel::Info);
    assert!(LogLevel::Info < LogLevel::Warn);
    assert!(LogLevel::Warn < LogLevel::Error);
}

#[test]
fn entry_omits_absent_metadata() {
    let entry = LogEntry {
        function: FunctionId::from("fn-x"),
        invocation: InvocationId::from("inv-1"),
        level: LogLevel::Info,
        message: "hello".to_string(),
        timestamp_ms: 42,
        metadata: None,
    };
    let json = serde_json::to_string(&entry).unwrap();
    assert!(!json.contains("metadata"));

    let back: LogEntry = serde_json::from_str(&json).unwrap();
    assert_eq!(back, entry);
}

#[test]
fn entry_keeps_structured_metadata() {
    let entry = LogEntry {
        function: FunctionId::from("fn-x"),
        invocation: InvocationId::from("inv-1"),
        level: LogLevel::Debug,
        message: "lookup".to_string(),
        timestamp_ms: 42,
        metadata: Some(serde_json::json!({"key": "user:7"})),
    };
    let json = serde_json::to_string(&entry).unwrap();
    let back: LogEntry = serde_json::from_str(&json).unwrap();
    assert_eq!(back.metadata, entry.metadata);
}
