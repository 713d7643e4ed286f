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

//! Incremental, resumable frame reader over a growing [`BytesMut`] buffer,
//! implementing this state machine:
//!
//! ```text
//! WAIT_MAGIC -> READ_HEADER -> VALIDATE_CRC -> READ_BODY -> VALIDATE_END_MARKER -> DISPATCH
//!                                          (mismatch) -> RESYNC (scan for next magic)
//! ```
//!
//! The reader never blocks: [`FrameReader::poll`] is fed whatever bytes the
//! transport has available and reports [`FrameReaderState::NeedMore`] until
//! a full, validated frame (or a resync) is possible.

use super::header::{MessageHeader, HEADER_LEN, MAGIC, TRAILER, TRAILER_LEN};
use bytes::{Buf, BytesMut};

#[derive(Debug, PartialEq, Eq)]
pub enum FrameReaderState {
    /// not enough bytes buffered yet for the next step
    NeedMore,
    /// a complete, validated frame was decoded and consumed from the buffer
    Frame(MessageHeader, Vec<u8>),
    /// the header failed to parse, CRC validation failed, or the trailer
    /// didn't match; the reader already resynchronized past the bad magic
    /// and the caller may call `poll` again
    Resynced { skipped: usize },
}

#[derive(Debug, Default)]
pub struct FrameReader {
    buf: BytesMut,
}

impl FrameReader {
    pub fn new() -> Self {
        Self { buf: BytesMut::new() }
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Drive the state machine as far as the currently buffered bytes allow.
    pub fn poll(&mut self) -> FrameReaderState {
        // WAIT_MAGIC: scan for the two magic bytes at the front of the buffer
        match self.find_magic() {
            None => {
                // keep at most one short of the magic length so a split
                // magic across feeds is still found next time
                let keep = MAGIC.len().saturating_sub(1);
                if self.buf.len() > keep {
                    let skip = self.buf.len() - keep;
                    self.buf.advance(skip);
                    return FrameReaderState::Resynced { skipped: skip };
                }
                return FrameReaderState::NeedMore;
            }
            Some(0) => {}
            Some(skip) => {
                self.buf.advance(skip);
                return FrameReaderState::Resynced { skipped: skip };
            }
        }

        // READ_HEADER
        if self.buf.len() < HEADER_LEN {
            return FrameReaderState::NeedMore;
        }
        let mut header_bytes = [0u8; HEADER_LEN];
        header_bytes.copy_from_slice(&self.buf[..HEADER_LEN]);
        let header = match MessageHeader::from_bytes(&header_bytes) {
            Ok(h) => h,
            Err(_) => {
                // shouldn't happen since find_magic already checked, but
                // resync defensively
                self.buf.advance(1);
                return FrameReaderState::Resynced { skipped: 1 };
            }
        };

        // READ_BODY
        let total = HEADER_LEN + header.length as usize + TRAILER_LEN;
        if self.buf.len() < total {
            return FrameReaderState::NeedMore;
        }
        let body = self.buf[HEADER_LEN..HEADER_LEN + header.length as usize].to_vec();
        let trailer = &self.buf[HEADER_LEN + header.length as usize..total];

        // VALIDATE_CRC + VALIDATE_END_MARKER
        let crc_ok = header.verify(&body);
        let trailer_ok = trailer == TRAILER;
        if !crc_ok || !trailer_ok {
            self.buf.advance(1);
            return FrameReaderState::Resynced { skipped: 1 };
        }

        // DISPATCH
        self.buf.advance(total);
        FrameReaderState::Frame(header, body)
    }

    fn find_magic(&self) -> Option<usize> {
        if self.buf.len() < MAGIC.len() {
            return None;
        }
        self.buf
            .windows(MAGIC.len())
            .position(|w| w == MAGIC)
    }
}

/// Encode a complete frame: header (with CRC sealed) + body + trailer.
pub fn encode_frame(mut header: MessageHeader, body: &[u8]) -> Vec<u8> {
    header.seal(body);
    let mut out = Vec::with_capacity(HEADER_LEN + body.len() + TRAILER_LEN);
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(body);
    out.extend_from_slice(&TRAILER);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::message::MessageName;

    #[test]
    fn decodes_single_frame() {
        let header = MessageHeader::new(MessageName::Ping.as_u32(), 7, 0, 5);
        let bytes = encode_frame(header, b"hello");
        let mut reader = FrameReader::new();
        reader.feed(&bytes);
        match reader.poll() {
            FrameReaderState::Frame(h, body) => {
                assert_eq!(h.serial, 7);
                assert_eq!(body, b"hello");
            }
            other => panic!("expected Frame, got {other:?}"),
        }
    }

    #[test]
    fn decodes_incrementally_fed_bytes() {
        let header = MessageHeader::new(MessageName::Ping.as_u32(), 7, 0, 5);
        let bytes = encode_frame(header, b"hello");
        let mut reader = FrameReader::new();
        for chunk in bytes.chunks(3) {
            reader.feed(chunk);
            match reader.poll() {
                FrameReaderState::NeedMore => continue,
                FrameReaderState::Frame(_, body) => {
                    assert_eq!(body, b"hello");
                    return;
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        panic!("frame never completed");
    }

    #[test]
    fn resyncs_past_garbage() {
        let header = MessageHeader::new(MessageName::Ping.as_u32(), 7, 0, 5);
        let good = encode_frame(header, b"hello");
        let mut bytes = vec![0xffu8; 10];
        bytes.extend_from_slice(&good);
        let mut reader = FrameReader::new();
        reader.feed(&bytes);
        // first poll should resync past the garbage
        let mut resynced_any = false;
        loop {
            match reader.poll() {
                FrameReaderState::Resynced { .. } => {
                    resynced_any = true;
                    continue;
                }
                FrameReaderState::Frame(_, body) => {
                    assert_eq!(body, b"hello");
                    break;
                }
                FrameReaderState::NeedMore => panic!("ran out of bytes unexpectedly"),
            }
        }
        assert!(resynced_any);
    }

    #[test]
    fn corrupted_crc_triggers_resync() {
        let header = MessageHeader::new(MessageName::Ping.as_u32(), 7, 0, 5);
        let mut bytes = encode_frame(header, b"hello");
        // flip a body byte after sealing so CRC no longer matches
        let body_start = HEADER_LEN;
        bytes[body_start] ^= 0xff;
        let mut reader = FrameReader::new();
        reader.feed(&bytes);
        assert!(matches!(reader.poll(), FrameReaderState::Resynced { .. }));
    }
}
