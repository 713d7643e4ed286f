/*
 * This file is part of Prinbee, a distributed database system.
 *
 * Copyright (c) 2026, The Prinbee Authors
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! Error kinds shared by the journal, protocol, bigint and context modules.
//!
//! Protocol, Validation, Resource, Consistency and Logic errors are each
//! their own variant family so callers can match on the *kind* of failure,
//! not just a message.

use std::{fmt, io};

pub type PrinbeeResult<T> = Result<T, PrinbeeError>;

#[derive(Debug)]
pub enum PrinbeeError {
    Io(io::Error),
    IoContext(io::Error, String),
    /// bad magic, bad CRC, unsupported protocol version, unknown peer, ...
    Protocol(ProtocolError),
    /// invalid parameter, out-of-range, conversion-unavailable
    Validation(String),
    /// file-not-found, file-still-in-use, full, permission-denied
    Resource(String),
    /// duplicate id, regressive status transition, and other consistency
    /// violations that don't carry structured fields
    Consistency(String),
    /// `SET_CONTEXT` requested a `schema_version` that isn't `current + 1`
    UnexpectedVersion { expected: u32, got: u32 },
    /// unreachable/impossible state - fatal
    Logic(String),
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ProtocolError {
    BadMagic,
    BadCrc,
    UnsupportedVersion { expected: u16, got: u16 },
    TimeDifferenceTooLarge { skew_ms: i64 },
    UnknownPeer,
    Truncated,
}

impl fmt::Display for PrinbeeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::IoContext(e, ctx) => write!(f, "I/O error while {ctx}: {e}"),
            Self::Protocol(p) => write!(f, "protocol error: {p}"),
            Self::Validation(m) => write!(f, "validation error: {m}"),
            Self::Resource(m) => write!(f, "resource error: {m}"),
            Self::Consistency(m) => write!(f, "consistency error: {m}"),
            Self::UnexpectedVersion { expected, got } => {
                write!(f, "unexpected schema version (expected {expected}, got {got})")
            }
            Self::Logic(m) => write!(f, "logic error (this is a bug): {m}"),
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadMagic => write!(f, "bad frame magic"),
            Self::BadCrc => write!(f, "CRC mismatch"),
            Self::UnsupportedVersion { expected, got } => {
                write!(f, "unsupported protocol version (expected {expected}, got {got})")
            }
            Self::TimeDifferenceTooLarge { skew_ms } => {
                write!(f, "clock skew too large ({skew_ms} ms)")
            }
            Self::UnknownPeer => write!(f, "unknown peer"),
            Self::Truncated => write!(f, "frame truncated"),
        }
    }
}

impl std::error::Error for PrinbeeError {}

impl From<io::Error> for PrinbeeError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<ProtocolError> for PrinbeeError {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

impl PrinbeeError {
    pub fn io_context(e: io::Error, ctx: impl ToString) -> Self {
        Self::IoContext(e, ctx.to_string())
    }
}
