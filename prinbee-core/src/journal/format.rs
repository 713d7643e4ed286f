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

//! Bit-exact journal file/event-record layout.
//!
//! ```text
//! file header (8B):   "EVTJ" | ver_major(1) | ver_minor(1) | reserved(2)
//! event header (32B): "ev" | status(1) | id_len(1) | total_size(4 LE)
//!                     | time_sec(8 LE, signed) | time_ns(8 LE, signed)
//!                     | attach_count(1) | pad(7)
//! offsets:            attach_count * u32 LE byte offsets into the record
//! request-id:         id_len bytes
//! inline attachments: back to back
//! ```

use crate::error::{PrinbeeError, PrinbeeResult, ProtocolError};

pub const FILE_MAGIC: [u8; 4] = *b"EVTJ";
pub const FILE_HEADER_LEN: usize = 8;
pub const FORMAT_VERSION_MAJOR: u8 = 1;
pub const FORMAT_VERSION_MINOR: u8 = 0;

pub const EVENT_MAGIC: [u8; 2] = *b"ev";
pub const EVENT_HEADER_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum EventStatus {
    Ready = 0,
    Forwarded = 1,
    Acknowledged = 2,
    Completed = 3,
    Failed = 4,
}

impl EventStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// `true` if advancing from `self` to `next` is a legal (non-regressive)
    /// transition along the `READY -> FORWARDED -> ACKNOWLEDGED ->
    /// {COMPLETED|FAILED}` chain, with optional-but-ordered intermediates.
    pub const fn can_advance_to(self, next: Self) -> bool {
        use EventStatus::*;
        match (self, next) {
            (Ready, Forwarded | Acknowledged | Completed | Failed) => true,
            (Forwarded, Acknowledged | Completed | Failed) => true,
            (Acknowledged, Completed | Failed) => true,
            _ => false,
        }
    }

    pub fn from_byte(b: u8) -> PrinbeeResult<Self> {
        match b {
            0 => Ok(Self::Ready),
            1 => Ok(Self::Forwarded),
            2 => Ok(Self::Acknowledged),
            3 => Ok(Self::Completed),
            4 => Ok(Self::Failed),
            _ => Err(PrinbeeError::Validation(format!("invalid event status byte {b}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventTime {
    pub sec: i64,
    pub nanos: i64,
}

impl EventTime {
    pub const ZERO: Self = Self { sec: 0, nanos: 0 };

    /// Wall-clock "now", used only to bound how far into the future a
    /// caller-supplied `add_event` timestamp may claim to be.
    pub fn now() -> Self {
        let dur = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            sec: dur.as_secs() as i64,
            nanos: dur.subsec_nanos() as i64,
        }
    }

    pub fn plus_nanos(self, n: i64) -> Self {
        let total = self.sec as i128 * 1_000_000_000 + self.nanos as i128 + n as i128;
        Self {
            sec: (total.div_euclid(1_000_000_000)) as i64,
            nanos: (total.rem_euclid(1_000_000_000)) as i64,
        }
    }
}

/// Fixed portion of an event record header, not counting the variable-length
/// offsets/id/attachments that follow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventHeader {
    pub status: EventStatus,
    pub id_len: u8,
    pub total_size: u32,
    pub time: EventTime,
    pub attach_count: u8,
}

impl EventHeader {
    pub fn to_bytes(&self) -> [u8; EVENT_HEADER_LEN] {
        let mut buf = [0u8; EVENT_HEADER_LEN];
        buf[0..2].copy_from_slice(&EVENT_MAGIC);
        buf[2] = self.status as u8;
        buf[3] = self.id_len;
        buf[4..8].copy_from_slice(&self.total_size.to_le_bytes());
        buf[8..16].copy_from_slice(&self.time.sec.to_le_bytes());
        buf[16..24].copy_from_slice(&self.time.nanos.to_le_bytes());
        buf[24] = self.attach_count;
        // buf[25..32] pad, left zeroed
        buf
    }

    pub fn from_bytes(buf: &[u8; EVENT_HEADER_LEN]) -> PrinbeeResult<Self> {
        if buf[0..2] != EVENT_MAGIC {
            return Err(ProtocolError::BadMagic.into());
        }
        Ok(Self {
            status: EventStatus::from_byte(buf[2])?,
            id_len: buf[3],
            total_size: u32::from_le_bytes(buf[4..8].try_into().unwrap()),
            time: EventTime {
                sec: i64::from_le_bytes(buf[8..16].try_into().unwrap()),
                nanos: i64::from_le_bytes(buf[16..24].try_into().unwrap()),
            },
            attach_count: buf[24],
        })
    }

    /// Offset, relative to the start of this record, of the status byte —
    /// used by status-transition in-place rewrites.
    pub const STATUS_OFFSET_IN_RECORD: u64 = 2;
}

pub fn file_header_bytes() -> [u8; FILE_HEADER_LEN] {
    let mut buf = [0u8; FILE_HEADER_LEN];
    buf[0..4].copy_from_slice(&FILE_MAGIC);
    buf[4] = FORMAT_VERSION_MAJOR;
    buf[5] = FORMAT_VERSION_MINOR;
    buf
}

pub fn validate_file_header(buf: &[u8; FILE_HEADER_LEN]) -> PrinbeeResult<()> {
    if buf[0..4] != FILE_MAGIC {
        return Err(ProtocolError::BadMagic.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_header_round_trips() {
        let h = EventHeader {
            status: EventStatus::Forwarded,
            id_len: 5,
            total_size: 128,
            time: EventTime { sec: 1_700_000_000, nanos: 123 },
            attach_count: 2,
        };
        let bytes = h.to_bytes();
        assert_eq!(EventHeader::from_bytes(&bytes).unwrap(), h);
    }

    #[test]
    fn status_cannot_regress() {
        assert!(!EventStatus::Completed.can_advance_to(EventStatus::Forwarded));
        assert!(!EventStatus::Acknowledged.can_advance_to(EventStatus::Ready));
        assert!(EventStatus::Ready.can_advance_to(EventStatus::Completed));
    }

    #[test]
    fn time_nanosecond_carry() {
        let t = EventTime { sec: 10, nanos: 999_999_999 };
        let bumped = t.plus_nanos(1);
        assert_eq!(bumped, EventTime { sec: 11, nanos: 0 });
    }
}
