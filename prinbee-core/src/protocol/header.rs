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

//! The bit-exact 24-byte binary message header and the CRC-16
//! residue check over header+body+trailer.

use crate::error::{PrinbeeError, PrinbeeResult, ProtocolError};
use crc::{Algorithm, Crc};

/// Two-byte magic that opens every frame header.
pub const MAGIC: [u8; 2] = *b"PB";
/// Two-byte end-marker that closes every frame (also reused,
/// as the journal event-record magic).
pub const TRAILER: [u8; 2] = *b"ev";
pub const TRAILER_LEN: usize = 2;
pub const HEADER_LEN: usize = 24;

/// CRC-16/ARC: polynomial 0x8005 normal / 0xA001 reflected, init 0, no
/// reflect-complement, no xorout. Chosen (over `crc`'s built-in preset of
/// the same name) so appending the stored checksum and recomputing yields
/// a residue of zero.
const CRC16_IBM: Algorithm<u16> = Algorithm {
    width: 16,
    poly: 0x8005,
    init: 0x0000,
    refin: true,
    refout: true,
    xorout: 0x0000,
    check: 0xBB3D,
    residue: 0x0000,
};

fn crc16(data: &[u8]) -> u16 {
    let crc = Crc::<u16>::new(&CRC16_IBM);
    crc.checksum(data)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub name: u32,
    pub serial: u32,
    pub flags: u16,
    pub length: u32,
    pub crc16: u16,
}

impl MessageHeader {
    pub fn new(name: u32, serial: u32, flags: u16, length: u32) -> Self {
        Self {
            name,
            serial,
            flags,
            length,
            crc16: 0,
        }
    }

    /// Serialize with `crc16` written verbatim (0 if not yet computed).
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..2].copy_from_slice(&MAGIC);
        buf[2..6].copy_from_slice(&self.name.to_le_bytes());
        buf[6..10].copy_from_slice(&self.serial.to_le_bytes());
        buf[10..12].copy_from_slice(&self.flags.to_le_bytes());
        buf[12..16].copy_from_slice(&self.length.to_le_bytes());
        buf[16..18].copy_from_slice(&self.crc16.to_le_bytes());
        // buf[18..24] reserved, left zeroed
        buf
    }

    pub fn from_bytes(buf: &[u8; HEADER_LEN]) -> PrinbeeResult<Self> {
        if buf[0..2] != MAGIC {
            return Err(ProtocolError::BadMagic.into());
        }
        Ok(Self {
            name: u32::from_le_bytes(buf[2..6].try_into().unwrap()),
            serial: u32::from_le_bytes(buf[6..10].try_into().unwrap()),
            flags: u16::from_le_bytes(buf[10..12].try_into().unwrap()),
            length: u32::from_le_bytes(buf[12..16].try_into().unwrap()),
            crc16: u16::from_le_bytes(buf[16..18].try_into().unwrap()),
        })
    }

    /// Compute the CRC over `header(crc zeroed) ++ body ++ trailer` and
    /// store it into `self.crc16`.
    pub fn seal(&mut self, body: &[u8]) {
        self.crc16 = 0;
        let header_bytes = self.to_bytes();
        let mut data = Vec::with_capacity(HEADER_LEN + body.len() + TRAILER_LEN);
        data.extend_from_slice(&header_bytes);
        data.extend_from_slice(body);
        data.extend_from_slice(&TRAILER);
        self.crc16 = crc16(&data);
    }

    /// Verify the residue property: CRC over
    /// `header(crc zeroed) ++ body ++ trailer ++ crc16` is zero.
    pub fn verify(&self, body: &[u8]) -> bool {
        let mut zeroed = *self;
        zeroed.crc16 = 0;
        let header_bytes = zeroed.to_bytes();
        let mut data = Vec::with_capacity(HEADER_LEN + body.len() + TRAILER_LEN + 2);
        data.extend_from_slice(&header_bytes);
        data.extend_from_slice(body);
        data.extend_from_slice(&TRAILER);
        data.extend_from_slice(&self.crc16.to_le_bytes());
        crc16(&data) == 0
    }
}

/// Interns a 4-ASCII-char message tag (e.g. `"REG\0"`) into the `u32` the
/// header's `name` field carries, so the wire format's 4-byte `name[4]`
/// and the in-memory `u32` interned identifier are the same bits.
pub const fn tag(bytes: &[u8; 4]) -> u32 {
    u32::from_le_bytes(*bytes)
}

pub fn assert_body_len(header: &MessageHeader, body: &[u8]) -> PrinbeeResult<()> {
    if body.len() != header.length as usize {
        return Err(PrinbeeError::Protocol(ProtocolError::Truncated));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_then_verify_roundtrip() {
        let body = b"hello prinbee";
        let mut h = MessageHeader::new(tag(b"PING"), 42, 0, body.len() as u32);
        h.seal(body);
        assert!(h.verify(body));
    }

    #[test]
    fn tampered_body_fails_verification() {
        let body = b"hello prinbee";
        let mut h = MessageHeader::new(tag(b"PING"), 42, 0, body.len() as u32);
        h.seal(body);
        assert!(!h.verify(b"hello PRINBEE"));
    }

    #[test]
    fn bad_magic_rejected() {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..2].copy_from_slice(b"XX");
        assert!(matches!(
            MessageHeader::from_bytes(&buf),
            Err(PrinbeeError::Protocol(ProtocolError::BadMagic))
        ));
    }
}
