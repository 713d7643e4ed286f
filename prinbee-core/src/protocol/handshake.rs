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

//! REG handshake validation: major protocol version must match
//! exactly, and clock skew must be within [`super::HANDSHAKE_CLOCK_SKEW_MS`].

use super::{HANDSHAKE_CLOCK_SKEW_MS, PROTOCOL_VERSION_MAJOR};
use crate::error::ProtocolError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegRequest {
    pub name: u32,
    pub protocol_version: u16,
    /// milliseconds since the Unix epoch, as the peer sees it
    pub now_ms: i64,
}

pub const REG_BODY_LEN: usize = 4 + 2 + 8;

impl RegRequest {
    pub fn to_bytes(&self) -> [u8; REG_BODY_LEN] {
        let mut buf = [0u8; REG_BODY_LEN];
        buf[0..4].copy_from_slice(&self.name.to_le_bytes());
        buf[4..6].copy_from_slice(&self.protocol_version.to_le_bytes());
        buf[6..14].copy_from_slice(&self.now_ms.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() != REG_BODY_LEN {
            return None;
        }
        Some(Self {
            name: u32::from_le_bytes(buf[0..4].try_into().unwrap()),
            protocol_version: u16::from_le_bytes(buf[4..6].try_into().unwrap()),
            now_ms: i64::from_le_bytes(buf[6..14].try_into().unwrap()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeError {
    UnsupportedVersion { expected: u16, got: u16 },
    TimeDifferenceTooLarge { skew_ms: i64 },
}

impl fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedVersion { expected, got } => {
                write!(f, "unsupported protocol version: expected {expected}, got {got}")
            }
            Self::TimeDifferenceTooLarge { skew_ms } => {
                write!(f, "time difference too large: {skew_ms}ms")
            }
        }
    }
}

impl From<HandshakeError> for ProtocolError {
    fn from(e: HandshakeError) -> Self {
        match e {
            HandshakeError::UnsupportedVersion { expected, got } => {
                ProtocolError::UnsupportedVersion { expected, got }
            }
            HandshakeError::TimeDifferenceTooLarge { skew_ms } => {
                ProtocolError::TimeDifferenceTooLarge { skew_ms }
            }
        }
    }
}

/// Validate an incoming REG against our own protocol version and clock.
pub fn validate_handshake(req: &RegRequest, local_now_ms: i64) -> Result<(), HandshakeError> {
    if req.protocol_version != PROTOCOL_VERSION_MAJOR {
        return Err(HandshakeError::UnsupportedVersion {
            expected: PROTOCOL_VERSION_MAJOR,
            got: req.protocol_version,
        });
    }
    let skew = (local_now_ms - req.now_ms).abs();
    if skew > HANDSHAKE_CLOCK_SKEW_MS {
        return Err(HandshakeError::TimeDifferenceTooLarge { skew_ms: skew });
    }
    Ok(())
}

/// What the accepting side should send back: `ACK(phase=0)` on success, or
/// `ERR(code, message)` on failure, both correlated to the REG's serial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeReply {
    Ack { serial: u32 },
    Err { serial: u32, error: HandshakeError },
}

pub fn handshake_reply(serial: u32, result: Result<(), HandshakeError>) -> HandshakeReply {
    match result {
        Ok(()) => HandshakeReply::Ack { serial },
        Err(error) => HandshakeReply::Err { serial, error },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_mismatch_rejected() {
        let req = RegRequest {
            name: 1,
            protocol_version: PROTOCOL_VERSION_MAJOR + 1,
            now_ms: 0,
        };
        assert!(matches!(
            validate_handshake(&req, 0),
            Err(HandshakeError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn clock_skew_within_tolerance_accepted() {
        let req = RegRequest {
            name: 1,
            protocol_version: PROTOCOL_VERSION_MAJOR,
            now_ms: 1000,
        };
        assert!(validate_handshake(&req, 1000 + HANDSHAKE_CLOCK_SKEW_MS).is_ok());
    }

    #[test]
    fn clock_skew_beyond_tolerance_rejected() {
        let req = RegRequest {
            name: 1,
            protocol_version: PROTOCOL_VERSION_MAJOR,
            now_ms: 1000,
        };
        // 50ms skew, spec scenario 4 uses this exact figure
        let err = validate_handshake(&req, 1050).unwrap_err();
        assert!(matches!(err, HandshakeError::TimeDifferenceTooLarge { .. }));
    }
}
