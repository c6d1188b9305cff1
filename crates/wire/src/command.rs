// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command and status bytes.
//!
//! Frames carry raw `u8` values so unknown commands can be answered with an
//! error response instead of failing the decode; these enums are the set the
//! dispatcher understands.

/// Request commands understood by the IPC server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    /// Health probe; replies with the daemon version.
    Ping = 0,
    /// Invoke a function through the scheduler.
    Invoke = 1,
    /// Register a new function.
    RegisterFunction = 2,
    /// Deploy a bundle as a new active version.
    DeployFunction = 3,
    /// Proxy an HTTP-shaped request to a per-project KV instance.
    ProxyKv = 4,
}

impl Command {
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Command::Ping),
            1 => Some(Command::Invoke),
            2 => Some(Command::RegisterFunction),
            3 => Some(Command::DeployFunction),
            4 => Some(Command::ProxyKv),
            _ => None,
        }
    }
}

/// Response status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0,
    Error = 1,
}

impl Status {
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Status::Ok),
            1 => Some(Status::Error),
            _ => None,
        }
    }
}
