// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC protocol for the execution-plane socket.
//!
//! Wire format: 4-byte little-endian length prefix, then a frame body of
//! `request_id:u64 LE ‖ command_or_status:u8 ‖ payload_len:u32 LE ‖ payload`.
//! Payloads are JSON; binary bodies inside payloads are base64.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod command;
mod frame;
mod payload;

pub use command::{Command, Status};
pub use frame::{
    decode_request, decode_response, encode_request, encode_response, read_request, read_response,
    write_request, write_response, ProtocolError, RequestFrame, ResponseFrame, FRAME_HEADER_LEN,
    MAX_FRAME_SIZE,
};
pub use payload::{
    decode_payload, encode_payload, from_b64, to_b64, DeployPayload, DeployReply, ErrorReply,
    InvokePayload, InvokeReply, PingReply, ProxyPayload, ProxyReply, RegisterPayload,
    RegisterReply,
};

#[cfg(test)]
mod property_tests;
