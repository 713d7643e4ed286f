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

//! The binary wire protocol shared by client<->proxy<->daemon<->daemon
//! connections.

pub mod framing;
pub mod handshake;
pub mod header;
pub mod message;

#[cfg(test)]
mod tests;

pub use framing::{encode_frame, FrameReader, FrameReaderState};
pub use handshake::{handshake_reply, validate_handshake, HandshakeError, HandshakeReply, RegRequest, REG_BODY_LEN};
pub use header::{MessageHeader, HEADER_LEN, MAGIC, TRAILER, TRAILER_LEN};
pub use message::{MessageName, ReplyState};

/// The major protocol version this build speaks. REG handshakes must match
/// this exactly ("major protocol version must match exactly").
pub const PROTOCOL_VERSION_MAJOR: u16 = 1;
/// Maximum allowed clock skew between peers at handshake time.
pub const HANDSHAKE_CLOCK_SKEW_MS: i64 = 10;
/// Default handshake timeout; connections without a completed REG older
/// than this must be dropped.
pub const HANDSHAKE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(1);
/// Default PING interval, clamped to [1s, 1h].
pub const DEFAULT_PING_INTERVAL: std::time::Duration = std::time::Duration::from_secs(5);
pub const MIN_PING_INTERVAL: std::time::Duration = std::time::Duration::from_secs(1);
pub const MAX_PING_INTERVAL: std::time::Duration = std::time::Duration::from_secs(3600);
/// A connection is declared dead after this many consecutive unanswered
/// PINGs. Left hard-coded rather than made configurable.
pub const MAX_PING_PONG_FAILURES: u32 = 5;
