// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Property tests for the frame codec.

use crate::frame::{
    decode_request, decode_response, encode_request, encode_response, RequestFrame, ResponseFrame,
};
use proptest::prelude::*;

proptest! {
    #[test]
    fn request_frames_round_trip(
        request_id in any::<u64>(),
        command in any::<u8>(),
        payload in proptest::collection::vec(any::<u8>(), 0..4096),
    ) {
        let frame = RequestFrame { request_id, command, payload };
        let body = encode_request(&frame)?;
        prop_assert_eq!(decode_request(&body)?, frame);
    }

    #[test]
    fn response_frames_round_trip(
        request_id in any::<u64>(),
        status in any::<u8>(),
        payload in proptest::collection::vec(any::<u8>(), 0..4096),
    ) {
        let frame = ResponseFrame { request_id, status, payload };
        let body = encode_response(&frame)?;
        prop_assert_eq!(decode_response(&body)?, frame);
    }

    #[test]
    fn corrupting_the_length_field_never_decodes_to_a_different_frame(
        request_id in any::<u64>(),
        payload in proptest::collection::vec(any::<u8>(), 1..256),
        delta in 1u32..1024,
    ) {
        let frame = RequestFrame { request_id, command: 1, payload };
        let mut body = encode_request(&frame)?;
        let claimed = u32::from_le_bytes([body[9], body[10], body[11], body[12]]);
        let corrupted = claimed.wrapping_add(delta).to_le_bytes();
        body[9..13].copy_from_slice(&corrupted);
        prop_assert!(decode_request(&body).is_err());
    }
}
