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

//! The durable event journal: an append-only, rotating
//! log of events, each tracked through a non-regressive status chain, with
//! inline or externally-attached payload bytes.

pub mod config;
pub mod fs;
pub mod format;
pub mod record;

pub use self::config::JournalConfig;
pub use self::fs::AttachmentCopyHandling;
pub use self::format::{EventStatus, EventTime};

use self::fs::{JournalFs, LocalFs};
use self::format::{file_header_bytes, validate_file_header, EventHeader, EVENT_HEADER_LEN, FILE_HEADER_LEN};
use self::record::{decode_record, encode_record, AttachmentBody, AttachmentLoc};
use crate::error::{PrinbeeError, PrinbeeResult};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// How far into the future a caller-supplied `add_event` timestamp may claim
/// to be before it's refused outright (spec.md §4.1's
/// "caller-time-too-far-future" failure). One second is generous enough to
/// absorb ordinary clock drift between a writer and the journal's host
/// without masking a genuinely broken caller clock; see DESIGN.md.
pub const MAX_CLOCK_SKEW_SECS: i64 = 1;

/// One attachment as handed to `add_event` by the caller, before it has been
/// resolved to an inline-or-external storage decision.
#[derive(Debug, Clone)]
pub enum AttachmentInput {
    /// raw bytes, no backing file on disk
    Bytes(Vec<u8>),
    /// a source file to be inlined or placed alongside the journal,
    /// depending on its size relative to `inline_attachment_size_threshold`
    Path(PathBuf),
}

#[derive(Debug, Clone)]
pub struct InEvent {
    pub request_id: Vec<u8>,
    pub attachments: Vec<AttachmentInput>,
}

/// A materialized attachment, as handed back by `next_event`.
#[derive(Debug, Clone)]
pub enum Attachment {
    Inline(Vec<u8>),
    External(PathBuf),
}

#[derive(Debug, Clone)]
pub struct Event {
    pub request_id: Vec<u8>,
    pub event_time: EventTime,
    pub status: EventStatus,
    pub attachments: Vec<Attachment>,
}

type EventKey = u64;

#[derive(Debug, Clone)]
struct EventRecord {
    request_id: Vec<u8>,
    time: EventTime,
    status: EventStatus,
    file_index: usize,
    header_offset: u64,
    on_disk_len: u64,
    attachments: Vec<AttachmentLoc>,
}

#[derive(Debug, Clone, Default)]
struct FileSlot {
    path: PathBuf,
    created: bool,
    write_offset: u64,
    /// set when a crash-recovery scan stopped short of the file's real
    /// length; the stale tail is truncated lazily, on the next write.
    needs_truncate: bool,
}

/// The durable event journal. Generic over the filesystem seam so tests can
/// run against [`fs::MemFs`] instead of real disk.
pub struct Journal<F: JournalFs = LocalFs> {
    dir: PathBuf,
    config: JournalConfig,
    fs: F,
    files: Vec<FileSlot>,
    events: HashMap<EventKey, EventRecord>,
    next_key: EventKey,
    index: HashMap<Vec<u8>, EventKey>,
    live: HashSet<Vec<u8>>,
    last_time: EventTime,
    current_file: usize,
    ext_counter: u64,
    iter_order: Vec<EventKey>,
    iter_cursor: usize,
}

impl Journal<LocalFs> {
    pub fn open(dir: impl Into<PathBuf>, config: JournalConfig) -> PrinbeeResult<Self> {
        Self::open_with_fs(dir, config, LocalFs)
    }
}

impl<F: JournalFs> Journal<F> {
    /// Open (or initialize) a journal directory, recovering from any
    /// partially-written record left by a crash: stop at the first record
    /// whose header is missing or malformed, and treat everything before
    /// that point as the durable log.
    pub fn open_with_fs(dir: impl Into<PathBuf>, config: JournalConfig, fs: F) -> PrinbeeResult<Self> {
        config.validate()?;
        let dir = dir.into();
        fs.create_dir_all(&dir).map_err(|e| fs::map_io(e, "creating journal directory"))?;

        let mut journal = Journal {
            dir: dir.clone(),
            config,
            fs,
            files: Vec::new(),
            events: HashMap::new(),
            next_key: 0,
            index: HashMap::new(),
            live: HashSet::new(),
            last_time: EventTime::ZERO,
            current_file: 0,
            ext_counter: 0,
            iter_order: Vec::new(),
            iter_cursor: 0,
        };

        for idx in 0..journal.config.maximum_number_of_files as usize {
            let path = journal.file_path(idx);
            let mut slot = FileSlot { path: path.clone(), created: false, write_offset: 0, needs_truncate: false };
            if journal.fs.exists(&path) {
                journal.recover_file(idx, &mut slot)?;
            }
            journal.files.push(slot);
        }
        Ok(journal)
    }

    fn file_path(&self, idx: usize) -> PathBuf {
        self.dir.join(format!("journal-{idx}.events"))
    }

    fn recover_file(&mut self, idx: usize, slot: &mut FileSlot) -> PrinbeeResult<()> {
        let bytes = self.fs.read(&slot.path).map_err(|e| fs::map_io(e, "reading journal file"))?;
        if bytes.len() < FILE_HEADER_LEN {
            // too short to even carry a file header; treat as empty/unusable
            slot.created = false;
            return Ok(());
        }
        let mut header = [0u8; FILE_HEADER_LEN];
        header.copy_from_slice(&bytes[..FILE_HEADER_LEN]);
        if validate_file_header(&header).is_err() {
            slot.created = false;
            return Ok(());
        }
        slot.created = true;

        let mut cursor = FILE_HEADER_LEN;
        loop {
            if cursor + EVENT_HEADER_LEN > bytes.len() {
                break;
            }
            match decode_record(&bytes[cursor..]) {
                Ok(decoded) => {
                    let key = self.next_key;
                    self.next_key += 1;
                    if decoded.header.time > self.last_time {
                        self.last_time = decoded.header.time;
                    }
                    if !decoded.header.status.is_terminal() {
                        self.live.insert(decoded.request_id.clone());
                    }
                    self.index.insert(decoded.request_id.clone(), key);
                    self.events.insert(
                        key,
                        EventRecord {
                            request_id: decoded.request_id,
                            time: decoded.header.time,
                            status: decoded.header.status,
                            file_index: idx,
                            header_offset: cursor as u64,
                            on_disk_len: decoded.on_disk_len,
                            attachments: decoded.attachments,
                        },
                    );
                    cursor += decoded.on_disk_len as usize;
                }
                Err(_) => break,
            }
        }
        slot.write_offset = cursor as u64;
        slot.needs_truncate = cursor < bytes.len();
        Ok(())
    }

    pub fn size(&self) -> usize {
        self.events.len()
    }

    pub fn empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Append a new event to the journal. Returns `Ok(None)` for any soft
    /// failure condition (duplicate id, oversize id, caller time more than
    /// [`MAX_CLOCK_SKEW_SECS`] ahead of wall-clock now, missing attachment
    /// source, destination collision, no file has room and compaction
    /// didn't help); a hard I/O failure surfaces as `Err`.
    pub fn add_event(&mut self, event: InEvent, caller_time: EventTime) -> PrinbeeResult<Option<EventTime>> {
        if event.request_id.is_empty() || event.request_id.len() > 255 {
            return Ok(None);
        }
        if event.attachments.is_empty() || event.attachments.len() > 255 {
            return Ok(None);
        }
        if self.live.contains(&event.request_id) || self.index.contains_key(&event.request_id) {
            return Ok(None);
        }

        let skew_bound = EventTime::now().plus_nanos(MAX_CLOCK_SKEW_SECS * 1_000_000_000);
        if caller_time > skew_bound {
            return Ok(None);
        }

        let effective_time = if caller_time > self.last_time {
            caller_time
        } else {
            self.last_time.plus_nanos(1)
        };

        let mut bodies = Vec::with_capacity(event.attachments.len());
        for input in &event.attachments {
            match self.resolve_attachment(input)? {
                Some(body) => bodies.push(body),
                None => return Ok(None),
            }
        }

        let record_bytes = encode_record(EventStatus::Ready, effective_time, &event.request_id, &bodies)?;
        let record_len = record_bytes.len() as u64;

        let placement = self.place_record(record_len)?;
        let (file_index, offset) = match placement {
            Some(p) => p,
            None => return Ok(None),
        };

        if !self.files[file_index].created {
            let path = self.files[file_index].path.clone();
            self.fs.write_new(&path).map_err(|e| fs::map_io(e, "creating journal file"))?;
            self.fs
                .write_at(&path, 0, &file_header_bytes())
                .map_err(|e| fs::map_io(e, "writing journal file header"))?;
            self.files[file_index].created = true;
        }
        if self.files[file_index].needs_truncate {
            let path = self.files[file_index].path.clone();
            let trunc_at = self.files[file_index].write_offset;
            self.fs.truncate(&path, trunc_at).map_err(|e| fs::map_io(e, "truncating stale journal tail"))?;
            self.files[file_index].needs_truncate = false;
        }

        let path = self.files[file_index].path.clone();
        self.fs
            .write_at(&path, offset, &record_bytes)
            .map_err(|e| fs::map_io(e, "writing journal record"))?;
        self.files[file_index].write_offset = offset + record_len;
        if self.config.sync == config::SyncMode::Full {
            self.fs.sync(&path).map_err(|e| fs::map_io(e, "syncing journal file"))?;
        }

        let decoded = decode_record(&record_bytes)?;
        let key = self.next_key;
        self.next_key += 1;
        self.index.insert(event.request_id.clone(), key);
        self.live.insert(event.request_id.clone());
        self.events.insert(
            key,
            EventRecord {
                request_id: event.request_id,
                time: effective_time,
                status: EventStatus::Ready,
                file_index,
                header_offset: offset,
                on_disk_len: decoded.on_disk_len,
                attachments: decoded.attachments,
            },
        );
        self.last_time = effective_time;
        self.current_file = file_index;
        Ok(Some(effective_time))
    }

    fn resolve_attachment(&mut self, input: &AttachmentInput) -> PrinbeeResult<Option<AttachmentBody>> {
        match input {
            AttachmentInput::Bytes(bytes) => {
                if bytes.len() <= self.config.inline_attachment_size_threshold {
                    Ok(Some(AttachmentBody::Inline(bytes.clone())))
                } else {
                    let filename = self.next_external_filename();
                    let dest = record::external_attachment_path(&self.dir, &filename);
                    if self.fs.exists(&dest) {
                        return Ok(None);
                    }
                    self.fs.write_new(&dest).map_err(|e| fs::map_io(e, "creating attachment file"))?;
                    self.fs
                        .write_at(&dest, 0, bytes)
                        .map_err(|e| fs::map_io(e, "writing attachment bytes"))?;
                    Ok(Some(AttachmentBody::ExternalFile { filename }))
                }
            }
            AttachmentInput::Path(source) => {
                if !self.fs.exists(source) || !self.fs.is_regular_file(source) {
                    return Ok(None);
                }
                let len = self.fs.len(source).map_err(|e| fs::map_io(e, "statting attachment source"))?;
                if len <= self.config.inline_attachment_size_threshold as u64 {
                    let bytes = self.fs.read(source).map_err(|e| fs::map_io(e, "reading attachment source"))?;
                    Ok(Some(AttachmentBody::Inline(bytes)))
                } else {
                    let filename = self.next_external_filename();
                    let dest = record::external_attachment_path(&self.dir, &filename);
                    if self.fs.exists(&dest) {
                        return Ok(None);
                    }
                    self.fs
                        .place_attachment(source, &dest, self.config.attachment_copy_handling)
                        .map_err(|e| fs::map_io(e, "placing attachment"))?;
                    Ok(Some(AttachmentBody::ExternalFile { filename }))
                }
            }
        }
    }

    fn next_external_filename(&mut self) -> String {
        let n = self.ext_counter;
        self.ext_counter += 1;
        format!("{n}.bin")
    }

    /// Find a file and offset with room for `record_len` bytes, rotating
    /// through files and reclaiming fully-terminal ones per
    /// `file_management`, then falling back to compaction if
    /// `compress_when_full` is set. `Ok(None)` means no file can ever take
    /// this record right now.
    fn place_record(&mut self, record_len: u64) -> PrinbeeResult<Option<(usize, u64)>> {
        if let Some(hit) = self.try_place_record(record_len)? {
            return Ok(Some(hit));
        }
        if self.config.compress_when_full {
            let mut compacted_any = false;
            for idx in 0..self.files.len() {
                if self.compress_file(idx)? {
                    compacted_any = true;
                }
            }
            if compacted_any {
                return self.try_place_record(record_len);
            }
        }
        Ok(None)
    }

    fn try_place_record(&mut self, record_len: u64) -> PrinbeeResult<Option<(usize, u64)>> {
        let n = self.files.len();
        for attempt in 0..n {
            let idx = (self.current_file + attempt) % n;
            if !self.files[idx].created {
                if FILE_HEADER_LEN as u64 + record_len <= self.config.maximum_file_size {
                    return Ok(Some((idx, FILE_HEADER_LEN as u64)));
                }
                continue;
            }
            let fits_size = self.files[idx].write_offset + record_len <= self.config.maximum_file_size;
            let fits_count = self.file_event_count(idx) < self.config.maximum_events as usize;
            if fits_size && fits_count {
                return Ok(Some((idx, self.files[idx].write_offset)));
            }
            if self.file_is_fully_terminal(idx) {
                self.reclaim_file(idx)?;
                if self.files[idx].created {
                    if self.files[idx].write_offset + record_len <= self.config.maximum_file_size {
                        return Ok(Some((idx, self.files[idx].write_offset)));
                    }
                } else if FILE_HEADER_LEN as u64 + record_len <= self.config.maximum_file_size {
                    return Ok(Some((idx, FILE_HEADER_LEN as u64)));
                }
            }
        }
        Ok(None)
    }

    /// Number of events (live or not yet reclaimed) currently placed in
    /// file `idx`. Used to cap events per file at `maximum_events`, the
    /// same way `maximum_file_size` caps bytes per file — once a file is
    /// full by either measure, placement rolls over to the next file.
    fn file_event_count(&self, idx: usize) -> usize {
        self.events.values().filter(|rec| rec.file_index == idx).count()
    }

    fn file_is_fully_terminal(&self, idx: usize) -> bool {
        let mut any = false;
        for rec in self.events.values() {
            if rec.file_index == idx {
                any = true;
                if !rec.status.is_terminal() {
                    return false;
                }
            }
        }
        any
    }

    /// Drop a file's events from the journal and reset it for reuse,
    /// applying the configured `file_management` policy.
    fn reclaim_file(&mut self, idx: usize) -> PrinbeeResult<()> {
        self.purge_file_events(idx);
        let path = self.files[idx].path.clone();
        match self.config.file_management {
            config::FileManagement::Keep => {
                self.files[idx].write_offset = FILE_HEADER_LEN as u64;
            }
            config::FileManagement::Truncate => {
                self.fs
                    .truncate(&path, FILE_HEADER_LEN as u64)
                    .map_err(|e| fs::map_io(e, "truncating reclaimed journal file"))?;
                self.files[idx].write_offset = FILE_HEADER_LEN as u64;
            }
            config::FileManagement::Delete => {
                self.fs.remove_file(&path).map_err(|e| fs::map_io(e, "deleting reclaimed journal file"))?;
                self.files[idx] = FileSlot { path, created: false, write_offset: 0, needs_truncate: false };
            }
        }
        Ok(())
    }

    fn purge_file_events(&mut self, idx: usize) {
        let dead: Vec<EventKey> = self
            .events
            .iter()
            .filter(|(_, rec)| rec.file_index == idx)
            .map(|(k, _)| *k)
            .collect();
        for key in dead {
            if let Some(rec) = self.events.remove(&key) {
                self.index.remove(&rec.request_id);
                self.live.remove(&rec.request_id);
            }
        }
    }

    /// Compact terminal events out of file `idx`, rewriting the remaining
    /// live events contiguously from the file header and truncating the
    /// freed tail. Returns `true` if anything was freed. This is the
    /// mechanism behind `compress_when_full`; see DESIGN.md for the choice
    /// of algorithm.
    fn compress_file(&mut self, idx: usize) -> PrinbeeResult<bool> {
        if !self.files[idx].created {
            return Ok(false);
        }
        let mut keep: Vec<EventKey> = self
            .events
            .iter()
            .filter(|(_, rec)| rec.file_index == idx)
            .map(|(k, _)| *k)
            .collect();
        keep.sort_by_key(|k| self.events[k].header_offset);
        let drop_count = keep.iter().filter(|k| self.events[*k].status.is_terminal()).count();
        if drop_count == 0 {
            return Ok(false);
        }
        let keep: Vec<EventKey> = keep.into_iter().filter(|k| !self.events[k].status.is_terminal()).collect();

        let path = self.files[idx].path.clone();
        let bytes = self.fs.read(&path).map_err(|e| fs::map_io(e, "reading journal file for compaction"))?;
        let mut cursor = FILE_HEADER_LEN as u64;
        for key in &keep {
            let rec = self.events.get(key).unwrap();
            let len = rec.on_disk_len;
            let slice = &bytes[rec.header_offset as usize..(rec.header_offset + len) as usize];
            if rec.header_offset != cursor {
                self.fs
                    .write_at(&path, cursor, slice)
                    .map_err(|e| fs::map_io(e, "rewriting compacted journal record"))?;
            }
            self.events.get_mut(key).unwrap().header_offset = cursor;
            cursor += len;
        }
        self.fs.truncate(&path, cursor).map_err(|e| fs::map_io(e, "truncating compacted journal file"))?;
        self.files[idx].write_offset = cursor;

        let dead: Vec<EventKey> = self
            .events
            .iter()
            .filter(|(k, rec)| rec.file_index == idx && !keep.contains(k))
            .map(|(k, _)| *k)
            .collect();
        for key in dead {
            if let Some(rec) = self.events.remove(&key) {
                self.index.remove(&rec.request_id);
            }
        }
        Ok(true)
    }

    /// Advance `request_id`'s status. Returns `Ok(false)` if the id is
    /// unknown or the transition would regress the non-regressive chain.
    pub fn transition(&mut self, request_id: &[u8], new_status: EventStatus) -> PrinbeeResult<bool> {
        let key = match self.index.get(request_id) {
            Some(k) => *k,
            None => return Ok(false),
        };
        let (file_index, header_offset, old_status) = {
            let rec = self.events.get(&key).unwrap();
            (rec.file_index, rec.header_offset, rec.status)
        };
        if !old_status.can_advance_to(new_status) {
            return Ok(false);
        }
        let path = self.files[file_index].path.clone();
        self.fs
            .write_at(&path, header_offset + EventHeader::STATUS_OFFSET_IN_RECORD, &[new_status as u8])
            .map_err(|e| fs::map_io(e, "updating event status"))?;
        self.events.get_mut(&key).unwrap().status = new_status;

        if new_status.is_terminal() {
            self.live.remove(request_id);
            if self.config.file_management != config::FileManagement::Keep
                && self.file_is_fully_terminal(file_index)
            {
                self.reclaim_file(file_index)?;
            }
        }
        Ok(true)
    }

    pub fn event_forwarded(&mut self, request_id: &[u8]) -> PrinbeeResult<bool> {
        self.transition(request_id, EventStatus::Forwarded)
    }

    pub fn event_acknowledged(&mut self, request_id: &[u8]) -> PrinbeeResult<bool> {
        self.transition(request_id, EventStatus::Acknowledged)
    }

    pub fn event_completed(&mut self, request_id: &[u8]) -> PrinbeeResult<bool> {
        self.transition(request_id, EventStatus::Completed)
    }

    pub fn event_failed(&mut self, request_id: &[u8]) -> PrinbeeResult<bool> {
        self.transition(request_id, EventStatus::Failed)
    }

    /// Reset iteration to the start, in either chronological order
    /// (`by_time`) or on-disk file/offset order.
    pub fn rewind(&mut self, by_time: bool) {
        let mut keys: Vec<EventKey> = self.events.keys().copied().collect();
        if by_time {
            keys.sort_by_key(|k| (self.events[k].time, self.events[k].file_index, self.events[k].header_offset));
        } else {
            keys.sort_by_key(|k| (self.events[k].file_index, self.events[k].header_offset));
        }
        self.iter_order = keys;
        self.iter_cursor = 0;
    }

    /// Yield the next event since the last `rewind`, or `None` once
    /// exhausted. `debug`, when set, additionally returns the file name and
    /// byte offset backing the event.
    pub fn next_event(&mut self, debug: bool) -> PrinbeeResult<Option<(Event, Option<(String, u64)>)>> {
        while self.iter_cursor < self.iter_order.len() {
            let key = self.iter_order[self.iter_cursor];
            self.iter_cursor += 1;
            let rec = match self.events.get(&key) {
                Some(r) => r.clone(),
                None => continue, // purged since rewind; skip
            };
            let event = self.materialize(&rec)?;
            let loc = if debug {
                Some((self.files[rec.file_index].path.display().to_string(), rec.header_offset))
            } else {
                None
            };
            return Ok(Some((event, loc)));
        }
        Ok(None)
    }

    fn materialize(&self, rec: &EventRecord) -> PrinbeeResult<Event> {
        let path = &self.files[rec.file_index].path;
        let bytes = self.fs.read(path).map_err(|e| fs::map_io(e, "reading journal record"))?;
        let end = (rec.header_offset + rec.on_disk_len) as usize;
        let window = &bytes[rec.header_offset as usize..end.min(bytes.len())];
        let decoded = decode_record(window)?;
        let mut attachments = Vec::with_capacity(decoded.attachments.len());
        for loc in decoded.attachments {
            match loc {
                AttachmentLoc::Inline { offset, len } => {
                    attachments.push(Attachment::Inline(window[offset as usize..(offset + len) as usize].to_vec()));
                }
                AttachmentLoc::External { filename } => {
                    attachments.push(Attachment::External(record::external_attachment_path(&self.dir, &filename)));
                }
            }
        }
        Ok(Event {
            request_id: rec.request_id.clone(),
            event_time: rec.time,
            status: rec.status,
            attachments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use self::fs::MemFs;

    fn journal(cfg: JournalConfig) -> Journal<MemFs> {
        Journal::open_with_fs("/journal", cfg, MemFs::new()).unwrap()
    }

    fn one_event(id: &[u8]) -> InEvent {
        InEvent {
            request_id: id.to_vec(),
            attachments: vec![AttachmentInput::Bytes(b"payload".to_vec())],
        }
    }

    #[test]
    fn add_then_read_back() {
        let mut j = journal(JournalConfig::default());
        let t = j.add_event(one_event(b"req-1"), EventTime { sec: 1, nanos: 0 }).unwrap();
        assert!(t.is_some());
        assert_eq!(j.size(), 1);
        j.rewind(true);
        let (ev, _) = j.next_event(false).unwrap().unwrap();
        assert_eq!(ev.request_id, b"req-1");
        assert_eq!(ev.status, EventStatus::Ready);
    }

    #[test]
    fn duplicate_id_rejected() {
        let mut j = journal(JournalConfig::default());
        j.add_event(one_event(b"dup"), EventTime::ZERO).unwrap();
        let second = j.add_event(one_event(b"dup"), EventTime::ZERO).unwrap();
        assert!(second.is_none());
    }

    #[test]
    fn colliding_timestamps_bump_by_one_nanosecond() {
        let mut j = journal(JournalConfig::default());
        let t0 = EventTime { sec: 100, nanos: 0 };
        let mut last = j.add_event(one_event(b"a"), t0).unwrap().unwrap();
        for (i, id) in [b"b", b"c", b"d"].iter().enumerate() {
            let got = j.add_event(one_event(*id), t0).unwrap().unwrap();
            assert_eq!(got, last.plus_nanos(1), "event {i}");
            last = got;
        }
    }

    #[test]
    fn caller_time_too_far_future_rejected() {
        let mut j = journal(JournalConfig::default());
        // year 3000, far beyond any plausible clock skew
        let far_future = EventTime { sec: 32_503_680_000, nanos: 0 };
        let result = j.add_event(one_event(b"req"), far_future).unwrap();
        assert!(result.is_none());
        assert!(j.empty());
    }

    #[test]
    fn status_chain_is_non_regressive() {
        let mut j = journal(JournalConfig::default());
        j.add_event(one_event(b"req"), EventTime::ZERO).unwrap();
        assert!(j.event_acknowledged(b"req").unwrap());
        assert!(!j.event_forwarded(b"req").unwrap());
        assert!(j.event_completed(b"req").unwrap());
        assert!(!j.event_failed(b"req").unwrap());
    }

    #[test]
    fn unfit_record_fails_then_compression_frees_room() {
        let mut cfg = JournalConfig::default();
        cfg.maximum_number_of_files = 2;
        cfg.maximum_file_size = 64 * 1024;
        cfg.compress_when_full = true;
        let mut j = journal(cfg);

        let big_attachment = || InEvent {
            request_id: Vec::new(),
            attachments: vec![AttachmentInput::Bytes(vec![7u8; 10 * 1024])],
        };
        let mut ids = Vec::new();
        let mut t = EventTime { sec: 1, nanos: 0 };
        loop {
            let mut ev = big_attachment();
            let id = format!("ev-{}", ids.len()).into_bytes();
            ev.request_id = id.clone();
            t = t.plus_nanos(1);
            match j.add_event(ev, t).unwrap() {
                Some(_) => ids.push(id),
                None => break,
            }
            if ids.len() > 100 {
                panic!("journal never filled up");
            }
        }
        assert!(!ids.is_empty());

        assert!(j.event_completed(&ids[0]).unwrap());

        let mut overflow = big_attachment();
        overflow.request_id = b"overflow-before-compress".to_vec();
        t = t.plus_nanos(1);
        // depending on how full things are this may or may not succeed
        // immediately; what matters is that *after* compression frees the
        // completed event's space, a further write succeeds.
        let _ = j.add_event(overflow, t);

        let mut after = big_attachment();
        after.request_id = b"after-compress".to_vec();
        t = t.plus_nanos(1);
        let res = j.add_event(after, t).unwrap();
        assert!(res.is_some(), "compression should have freed room for one more record");
    }

    #[test]
    fn deleting_fully_terminal_file_removes_it_from_disk() {
        let mut cfg = JournalConfig::default();
        cfg.maximum_number_of_files = 2;
        cfg.maximum_file_size = 64 * 1024;
        cfg.file_management = config::FileManagement::Delete;
        let mut j = journal(cfg);

        j.add_event(one_event(b"only"), EventTime { sec: 1, nanos: 0 }).unwrap();
        let path = j.files[0].path.clone();
        assert!(j.fs.exists(&path));
        assert!(j.event_completed(b"only").unwrap());
        assert!(!j.fs.exists(&path));
        assert_eq!(j.size(), 0);
    }

    #[test]
    fn maximum_events_caps_per_file_not_the_whole_journal() {
        // `maximum_events` bounds how many events one file may hold before
        // placement rolls over to the next file, the same way
        // `maximum_file_size` bounds bytes per file. It is not a
        // journal-wide ceiling: with enough files to rotate through, a
        // journal configured with a small per-file cap still accepts far
        // more events than that cap in total. `validate()` floors
        // `maximum_events` at 100 for production configs, so this test
        // exercises the same rotation behavior at that floor instead of
        // the smaller literal used in ad hoc manual testing.
        let mut cfg = JournalConfig::default();
        cfg.maximum_number_of_files = 3;
        cfg.maximum_events = 100;
        cfg.file_management = config::FileManagement::Delete;
        let mut j = journal(cfg);

        let mut ids = Vec::new();
        let mut t = EventTime { sec: 1, nanos: 0 };
        for i in 0..250 {
            let id = format!("ev-{i}").into_bytes();
            t = t.plus_nanos(1);
            let placed = j.add_event(one_event(&id), t).unwrap();
            assert!(placed.is_some(), "event {i} should have rotated into a file with room");
            ids.push(id);
        }
        assert!(j.files[0].created && j.files[1].created, "rotation should have touched more than one file");

        for id in &ids {
            assert!(j.event_forwarded(id).unwrap());
            assert!(j.event_acknowledged(id).unwrap());
            assert!(j.event_completed(id).unwrap());
        }
        assert_eq!(j.size(), 0);
        for f in &j.files {
            assert!(!j.fs.exists(&f.path), "completed files should be unlinked under DELETE management");
        }
    }

    #[test]
    fn oversize_attachment_externalizes() {
        let mut cfg = JournalConfig::default();
        cfg.inline_attachment_size_threshold = 8;
        let mut j = journal(cfg);
        let ev = InEvent {
            request_id: b"ext".to_vec(),
            attachments: vec![AttachmentInput::Bytes(vec![1u8; 64])],
        };
        j.add_event(ev, EventTime::ZERO).unwrap();
        j.rewind(true);
        let (decoded, _) = j.next_event(false).unwrap().unwrap();
        assert_eq!(decoded.attachments.len(), 1);
        assert!(matches!(decoded.attachments[0], Attachment::External(_)));
    }
}
