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

//! Encode/decode for a single journal event record.
//!
//! Layout decision: `total_size` covers exactly
//! `header + offsets + request_id + inline attachment bytes`. External
//! attachments get a directory entry (`u16 filename_len` + filename)
//! appended immediately *after* that region, in the same record's on-disk
//! span; their offset table entry is `total_size + <running offset into the
//! directory>`, which is always `>= total_size`, marking it external. See
//! DESIGN.md for the rationale.

use super::format::{EventHeader, EventStatus, EventTime, EVENT_HEADER_LEN};
use crate::error::{PrinbeeError, PrinbeeResult};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentLoc {
    Inline { offset: u32, len: u32 },
    External { filename: String },
}

#[derive(Debug, Clone)]
pub struct DecodedRecord {
    pub header: EventHeader,
    pub request_id: Vec<u8>,
    pub attachments: Vec<AttachmentLoc>,
    /// total bytes this record occupies on disk, including the trailing
    /// external-attachment directory (i.e. where the *next* record begins).
    pub on_disk_len: u64,
}

pub enum AttachmentBody {
    Inline(Vec<u8>),
    ExternalFile { filename: String },
}

/// Encode a full record (header + offsets + id + inline bytes + external
/// directory) given the already-resolved attachment bodies.
pub fn encode_record(
    status: EventStatus,
    time: EventTime,
    request_id: &[u8],
    attachments: &[AttachmentBody],
) -> PrinbeeResult<Vec<u8>> {
    if request_id.is_empty() || request_id.len() > 255 {
        return Err(PrinbeeError::Validation(
            "request-id must be 1..=255 bytes".into(),
        ));
    }
    if attachments.is_empty() || attachments.len() > 255 {
        return Err(PrinbeeError::Validation(
            "an event must carry 1..=255 attachments".into(),
        ));
    }

    let attach_count = attachments.len();
    let offsets_len = attach_count * 4;
    let core_prefix = EVENT_HEADER_LEN + offsets_len + request_id.len();

    // lay out inline bytes first, recording each one's offset within the core
    let mut inline_bytes = Vec::new();
    let mut offsets = vec![0u32; attach_count];
    for (i, a) in attachments.iter().enumerate() {
        if let AttachmentBody::Inline(bytes) = a {
            offsets[i] = (core_prefix + inline_bytes.len()) as u32;
            inline_bytes.extend_from_slice(bytes);
        }
    }
    let total_size = (core_prefix + inline_bytes.len()) as u32;

    // external directory follows, offsets are total_size + running position
    let mut ext_dir = Vec::new();
    for (i, a) in attachments.iter().enumerate() {
        if let AttachmentBody::ExternalFile { filename } = a {
            offsets[i] = total_size + ext_dir.len() as u32;
            let name_bytes = filename.as_bytes();
            ext_dir.extend_from_slice(&(name_bytes.len() as u16).to_le_bytes());
            ext_dir.extend_from_slice(name_bytes);
        }
    }

    let header = EventHeader {
        status,
        id_len: request_id.len() as u8,
        total_size,
        time,
        attach_count: attach_count as u8,
    };

    let mut out = Vec::with_capacity(total_size as usize + ext_dir.len());
    out.extend_from_slice(&header.to_bytes());
    for off in &offsets {
        out.extend_from_slice(&off.to_le_bytes());
    }
    out.extend_from_slice(request_id);
    out.extend_from_slice(&inline_bytes);
    out.extend_from_slice(&ext_dir);
    Ok(out)
}

/// Decode a record starting at `buf[0]` (which must begin with the 32-byte
/// event header). `buf` must contain at least the whole record including
/// its external directory, which is not known in advance: callers should
/// pass a generously-sized window and rely on `on_disk_len` in the result
/// to know how much was actually consumed.
pub fn decode_record(buf: &[u8]) -> PrinbeeResult<DecodedRecord> {
    if buf.len() < EVENT_HEADER_LEN {
        return Err(PrinbeeError::Protocol(crate::error::ProtocolError::Truncated));
    }
    let mut header_bytes = [0u8; EVENT_HEADER_LEN];
    header_bytes.copy_from_slice(&buf[..EVENT_HEADER_LEN]);
    let header = EventHeader::from_bytes(&header_bytes)?;

    let offsets_start = EVENT_HEADER_LEN;
    let offsets_len = header.attach_count as usize * 4;
    let id_start = offsets_start + offsets_len;
    let id_end = id_start + header.id_len as usize;
    if buf.len() < id_end {
        return Err(PrinbeeError::Protocol(crate::error::ProtocolError::Truncated));
    }
    let request_id = buf[id_start..id_end].to_vec();

    let mut offsets = Vec::with_capacity(header.attach_count as usize);
    for i in 0..header.attach_count as usize {
        let o = offsets_start + i * 4;
        offsets.push(u32::from_le_bytes(buf[o..o + 4].try_into().unwrap()));
    }

    // inline attachments: sort by offset ascending, difference to next
    // boundary (or total_size for the last one) gives the length.
    let mut inline_positions: Vec<(usize, u32)> = offsets
        .iter()
        .enumerate()
        .filter(|(_, &o)| o < header.total_size)
        .map(|(i, &o)| (i, o))
        .collect();
    inline_positions.sort_by_key(|(_, o)| *o);

    let mut attachments: Vec<Option<AttachmentLoc>> = vec![None; header.attach_count as usize];
    for (idx_in_sorted, &(orig_index, offset)) in inline_positions.iter().enumerate() {
        let end = inline_positions
            .get(idx_in_sorted + 1)
            .map(|(_, o)| *o)
            .unwrap_or(header.total_size);
        attachments[orig_index] = Some(AttachmentLoc::Inline {
            offset,
            len: end.saturating_sub(offset),
        });
    }

    let mut max_end = header.total_size as usize;
    for (i, &offset) in offsets.iter().enumerate() {
        if offset >= header.total_size {
            let pos = offset as usize;
            if buf.len() < pos + 2 {
                return Err(PrinbeeError::Protocol(crate::error::ProtocolError::Truncated));
            }
            let name_len = u16::from_le_bytes(buf[pos..pos + 2].try_into().unwrap()) as usize;
            let name_start = pos + 2;
            let name_end = name_start + name_len;
            if buf.len() < name_end {
                return Err(PrinbeeError::Protocol(crate::error::ProtocolError::Truncated));
            }
            let filename = String::from_utf8(buf[name_start..name_end].to_vec())
                .map_err(|_| PrinbeeError::Validation("non-utf8 attachment filename".into()))?;
            max_end = max_end.max(name_end);
            attachments[i] = Some(AttachmentLoc::External { filename });
        }
    }

    let attachments: Vec<AttachmentLoc> = attachments.into_iter().map(|a| a.unwrap()).collect();

    Ok(DecodedRecord {
        header,
        request_id,
        attachments,
        on_disk_len: max_end as u64,
    })
}

pub fn external_attachment_path(journal_dir: &Path, filename: &str) -> PathBuf {
    journal_dir.join(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_inline_only() {
        let bytes = encode_record(
            EventStatus::Ready,
            EventTime { sec: 1, nanos: 2 },
            b"req-1",
            &[
                AttachmentBody::Inline(b"hello".to_vec()),
                AttachmentBody::Inline(b"world!".to_vec()),
            ],
        )
        .unwrap();
        let decoded = decode_record(&bytes).unwrap();
        assert_eq!(decoded.request_id, b"req-1");
        assert_eq!(decoded.attachments.len(), 2);
        assert_eq!(decoded.on_disk_len, bytes.len() as u64);
        match &decoded.attachments[0] {
            AttachmentLoc::Inline { offset, len } => {
                assert_eq!(&bytes[*offset as usize..(*offset + *len) as usize], b"hello");
            }
            _ => panic!("expected inline"),
        }
    }

    #[test]
    fn encode_decode_mixed_inline_external() {
        let bytes = encode_record(
            EventStatus::Ready,
            EventTime { sec: 1, nanos: 0 },
            b"req-2",
            &[
                AttachmentBody::Inline(b"small".to_vec()),
                AttachmentBody::ExternalFile {
                    filename: "7.bin".into(),
                },
            ],
        )
        .unwrap();
        let decoded = decode_record(&bytes).unwrap();
        assert!(matches!(decoded.attachments[0], AttachmentLoc::Inline { .. }));
        match &decoded.attachments[1] {
            AttachmentLoc::External { filename } => assert_eq!(filename, "7.bin"),
            _ => panic!("expected external"),
        }
        assert_eq!(decoded.on_disk_len, bytes.len() as u64);
    }

    #[test]
    fn rejects_oversize_request_id() {
        let big_id = vec![b'x'; 256];
        let err = encode_record(
            EventStatus::Ready,
            EventTime::ZERO,
            &big_id,
            &[AttachmentBody::Inline(vec![1])],
        )
        .unwrap_err();
        assert!(matches!(err, PrinbeeError::Validation(_)));
    }
}
