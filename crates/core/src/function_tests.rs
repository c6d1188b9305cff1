// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    bun = { "bun", RuntimeTag::Bun },
    node = { "node", RuntimeTag::Node },
)]
fn runtime_tag_parses_known_names(input: &str, expected: RuntimeTag) {
    assert_eq!(RuntimeTag::parse(input), Some(expected));
    assert_eq!(expected.as_str(), input);
}

#[test]
fn runtime_tag_rejects_unknown_names() {
    assert_eq!(RuntimeTag::parse("deno"), None);
    assert_eq!(RuntimeTag::parse(""), None);
}

#[test]
fn runtime_tag_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&RuntimeTag::Bun).unwrap(), "\"bun\"");
    let back: RuntimeTag = serde_json::from_str("\"node\"").unwrap();
    assert_eq!(back, RuntimeTag::Node);
}

#[test]
fn function_record_round_trips() {
    let record = FunctionRecord {
        id: FunctionId::from("fn-hello"),
        name: "hello".to_string(),
        runtime: RuntimeTag::Bun,
        handler: "default".to_string(),
        active_version: Some("v2".to_string()),
        env: vec![("GREETING".to_string(), "hi".to_string())],
    };
    let json = serde_json::to_string(&record).unwrap();
    let back: FunctionRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(back, record);
}

#[test]
fn function_record_env_defaults_to_empty() {
    let json = r#"{"id":"fn-x","name":"x","runtime":"node","handler":"default","active_version":null}"#;
    let record: FunctionRecord = serde_json::from_str(json).unwrap();
    assert!(record.env.is_empty());
    assert!(record.active_version.is_none());
}
