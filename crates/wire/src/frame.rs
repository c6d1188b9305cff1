// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Length-prefixed frame codec.
//!
//! `encode_*` and `decode_*` operate on frame bodies (no outer length
//! prefix); `read_*` and `write_*` add the prefix and enforce
//! [`MAX_FRAME_SIZE`] before any allocation happens.

use crate::command::{Command, Status};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on a frame body. Anything larger aborts the connection.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Fixed bytes before the payload: request_id (8) + command/status (1) +
/// payload_len (4).
pub const FRAME_HEADER_LEN: usize = 13;

/// Errors from framing and socket I/O.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("connection closed")]
    ConnectionClosed,

    #[error("timed out waiting for peer")]
    Timeout,

    #[error("frame of {len} bytes exceeds maximum of {MAX_FRAME_SIZE}")]
    FrameTooLarge { len: usize },

    #[error("invalid frame: {0}")]
    Invalid(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    pub fn kind(&self) -> fp_core::ErrorKind {
        match self {
            ProtocolError::FrameTooLarge { .. } => fp_core::ErrorKind::FrameTooLarge,
            _ => fp_core::ErrorKind::InvalidFrame,
        }
    }
}

/// One request frame, command kept as a raw byte so unknown commands reach
/// the dispatcher instead of failing the decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFrame {
    pub request_id: u64,
    pub command: u8,
    pub payload: Vec<u8>,
}

impl RequestFrame {
    pub fn new(request_id: u64, command: Command, payload: Vec<u8>) -> Self {
        Self { request_id, command: command as u8, payload }
    }
}

/// One response frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    pub request_id: u64,
    pub status: u8,
    pub payload: Vec<u8>,
}

impl ResponseFrame {
    pub fn new(request_id: u64, status: Status, payload: Vec<u8>) -> Self {
        Self { request_id, status: status as u8, payload }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok as u8
    }
}

fn encode_body(request_id: u64, tag: u8, payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let len = FRAME_HEADER_LEN + payload.len();
    if len > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge { len });
    }
    let mut body = Vec::with_capacity(len);
    body.extend_from_slice(&request_id.to_le_bytes());
    body.push(tag);
    body.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    body.extend_from_slice(payload);
    Ok(body)
}

fn decode_body(body: &[u8]) -> Result<(u64, u8, Vec<u8>), ProtocolError> {
    if body.len() < FRAME_HEADER_LEN {
        return Err(ProtocolError::Invalid(format!("frame body of {} bytes is truncated", body.len())));
    }
    let mut id_bytes = [0u8; 8];
    id_bytes.copy_from_slice(&body[..8]);
    let request_id = u64::from_le_bytes(id_bytes);
    let tag = body[8];
    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&body[9..13]);
    let payload_len = u32::from_le_bytes(len_bytes) as usize;
    if payload_len != body.len() - FRAME_HEADER_LEN {
        return Err(ProtocolError::Invalid(format!(
            "payload length {} does not match frame body of {} bytes",
            payload_len,
            body.len()
        )));
    }
    Ok((request_id, tag, body[FRAME_HEADER_LEN..].to_vec()))
}

/// Encode a request frame body (no outer length prefix).
pub fn encode_request(frame: &RequestFrame) -> Result<Vec<u8>, ProtocolError> {
    encode_body(frame.request_id, frame.command, &frame.payload)
}

/// Decode a request frame body.
pub fn decode_request(body: &[u8]) -> Result<RequestFrame, ProtocolError> {
    let (request_id, command, payload) = decode_body(body)?;
    Ok(RequestFrame { request_id, command, payload })
}

/// Encode a response frame body (no outer length prefix).
pub fn encode_response(frame: &ResponseFrame) -> Result<Vec<u8>, ProtocolError> {
    encode_body(frame.request_id, frame.status, &frame.payload)
}

/// Decode a response frame body.
pub fn decode_response(body: &[u8]) -> Result<ResponseFrame, ProtocolError> {
    let (request_id, status, payload) = decode_body(body)?;
    Ok(ResponseFrame { request_id, status, payload })
}

/// Read one length-prefixed frame body.
///
/// The size check runs on the prefix alone, before the body buffer is
/// allocated, so an oversized claim cannot balloon memory.
async fn read_body<R>(reader: &mut R) -> Result<Vec<u8>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; 4];
    match reader.read_exact(&mut prefix).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::ConnectionClosed)
        }
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_le_bytes(prefix) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge { len });
    }
    let mut body = vec![0u8; len];
    match reader.read_exact(&mut body).await {
        Ok(_) => Ok(body),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(ProtocolError::ConnectionClosed)
        }
        Err(e) => Err(e.into()),
    }
}

async fn write_body<W>(writer: &mut W, body: &[u8]) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&(body.len() as u32).to_le_bytes()).await?;
    writer.write_all(body).await?;
    writer.flush().await?;
    Ok(())
}

/// Read a request frame with a timeout.
pub async fn read_request<R>(reader: &mut R, timeout: Duration) -> Result<RequestFrame, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    match tokio::time::timeout(timeout, read_body(reader)).await {
        Ok(result) => decode_request(&result?),
        Err(_) => Err(ProtocolError::Timeout),
    }
}

/// Write a request frame with a timeout.
pub async fn write_request<W>(
    writer: &mut W,
    frame: &RequestFrame,
    timeout: Duration,
) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let body = encode_request(frame)?;
    match tokio::time::timeout(timeout, write_body(writer, &body)).await {
        Ok(result) => result,
        Err(_) => Err(ProtocolError::Timeout),
    }
}

/// Read a response frame with a timeout.
pub async fn read_response<R>(
    reader: &mut R,
    timeout: Duration,
) -> Result<ResponseFrame, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    match tokio::time::timeout(timeout, read_body(reader)).await {
        Ok(result) => decode_response(&result?),
        Err(_) => Err(ProtocolError::Timeout),
    }
}

/// Write a response frame with a timeout.
pub async fn write_response<W>(
    writer: &mut W,
    frame: &ResponseFrame,
    timeout: Duration,
) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let body = encode_response(frame)?;
    match tokio::time::timeout(timeout, write_body(writer, &body)).await {
        Ok(result) => result,
        Err(_) => Err(ProtocolError::Timeout),
    }
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
