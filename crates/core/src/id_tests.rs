// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn durable_ids_carry_their_prefix() {
    assert!(FunctionId::generate().as_str().starts_with("fn-"));
    assert!(ProjectId::generate().as_str().starts_with("prj-"));
}

#[test]
fn generated_ids_are_unique() {
    let a = FunctionId::generate();
    let b = FunctionId::generate();
    assert_ne!(a, b);

    let w = WorkerId::generate();
    let x = WorkerId::generate();
    assert_ne!(w, x);
}

#[test]
fn ids_round_trip_through_serde_as_plain_strings() {
    let id = FunctionId::from("fn-abc123");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"fn-abc123\"");
    let back: FunctionId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}

#[test]
fn ids_compare_against_str() {
    let id = ProjectId::from("prj-demo");
    assert_eq!(id, "prj-demo");
    assert_eq!(id.as_str(), "prj-demo");
}

#[test]
fn hashmap_lookup_by_str_via_borrow() {
    let mut map = std::collections::HashMap::new();
    map.insert(FunctionId::from("fn-hello"), 1u32);
    assert_eq!(map.get("fn-hello"), Some(&1));
}
