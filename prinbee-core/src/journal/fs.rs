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

//! A small filesystem seam so the journal can be driven by an in-memory
//! double in tests instead of real disk.

use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

/// How an externally-provided attachment source file is placed alongside
/// the journal (`attachment_copy_handling`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentCopyHandling {
    /// symlink to the source (fast, fragile against source deletion)
    Softlink,
    /// hardlink; requires the same filesystem
    Hardlink,
    /// copy-on-write reflink, if the filesystem supports it
    Reflink,
    /// copy the bytes
    Full,
}

pub trait JournalFs: Send + 'static {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
    fn write_new(&self, path: &Path) -> io::Result<()>;
    /// Write bytes at `offset`, extending the file if needed. Every journal
    /// write (sequential appends, in-place status rewrites, and compaction
    /// repacking) goes through this one call.
    fn write_at(&self, path: &Path, offset: u64, data: &[u8]) -> io::Result<()>;
    fn truncate(&self, path: &Path, len: u64) -> io::Result<()>;
    fn remove_file(&self, path: &Path) -> io::Result<()>;
    fn exists(&self, path: &Path) -> bool;
    fn len(&self, path: &Path) -> io::Result<u64>;
    fn is_regular_file(&self, path: &Path) -> bool;
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;
    fn sync(&self, path: &Path) -> io::Result<()>;
    fn place_attachment(
        &self,
        source: &Path,
        dest: &Path,
        handling: AttachmentCopyHandling,
    ) -> io::Result<()>;
}

/// Real-disk implementation, backed directly by `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl JournalFs for LocalFs {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write_new(&self, path: &Path) -> io::Result<()> {
        fs::write(path, [])
    }

    fn write_at(&self, path: &Path, offset: u64, data: &[u8]) -> io::Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            let f = fs::OpenOptions::new().write(true).open(path)?;
            f.write_all_at(data, offset)
        }
        #[cfg(not(unix))]
        {
            use std::io::{Seek, SeekFrom, Write};
            let mut f = fs::OpenOptions::new().write(true).open(path)?;
            f.seek(SeekFrom::Start(offset))?;
            f.write_all(data)
        }
    }

    fn truncate(&self, path: &Path, len: u64) -> io::Result<()> {
        let f = fs::OpenOptions::new().write(true).open(path)?;
        f.set_len(len)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn len(&self, path: &Path) -> io::Result<u64> {
        Ok(fs::metadata(path)?.len())
    }

    fn is_regular_file(&self, path: &Path) -> bool {
        fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn sync(&self, path: &Path) -> io::Result<()> {
        fs::OpenOptions::new().write(true).open(path)?.sync_all()
    }

    fn place_attachment(
        &self,
        source: &Path,
        dest: &Path,
        handling: AttachmentCopyHandling,
    ) -> io::Result<()> {
        match handling {
            AttachmentCopyHandling::Softlink => {
                #[cfg(unix)]
                {
                    std::os::unix::fs::symlink(source, dest)
                }
                #[cfg(not(unix))]
                {
                    fs::copy(source, dest).map(|_| ())
                }
            }
            AttachmentCopyHandling::Hardlink => fs::hard_link(source, dest),
            AttachmentCopyHandling::Reflink => {
                // no portable reflink in std; fall back to a full copy.
                // Filesystems that support copy-on-write (btrfs/xfs/apfs)
                // will still dedupe at the block layer via `fs::copy` on
                // most modern kernels, but this is not guaranteed.
                fs::copy(source, dest).map(|_| ())
            }
            AttachmentCopyHandling::Full => fs::copy(source, dest).map(|_| ()),
        }
    }
}

/// In-memory filesystem double for tests. Instance-owned rather than a
/// global singleton, so multiple journals in one test process stay
/// independent.
#[derive(Debug, Clone, Default)]
pub struct MemFs {
    files: Arc<Mutex<HashMap<PathBuf, Vec<u8>>>>,
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JournalFs for MemFs {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))
    }

    fn write_new(&self, path: &Path) -> io::Result<()> {
        self.files.lock().unwrap().insert(path.to_path_buf(), Vec::new());
        Ok(())
    }

    fn write_at(&self, path: &Path, offset: u64, data: &[u8]) -> io::Result<()> {
        let mut files = self.files.lock().unwrap();
        let buf = files
            .get_mut(path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))?;
        let end = offset as usize + data.len();
        if buf.len() < end {
            buf.resize(end, 0);
        }
        buf[offset as usize..end].copy_from_slice(data);
        Ok(())
    }

    fn truncate(&self, path: &Path, len: u64) -> io::Result<()> {
        let mut files = self.files.lock().unwrap();
        let buf = files
            .get_mut(path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))?;
        buf.resize(len as usize, 0);
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        self.files
            .lock()
            .unwrap()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    fn is_regular_file(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    fn len(&self, path: &Path) -> io::Result<u64> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .map(|v| v.len() as u64)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))
    }

    fn create_dir_all(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }

    fn sync(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }

    fn place_attachment(
        &self,
        source: &Path,
        dest: &Path,
        _handling: AttachmentCopyHandling,
    ) -> io::Result<()> {
        // tests treat `source` as a key into the same map regardless of
        // handling mode; only `Full`'s "copy the bytes" semantics matters
        // for correctness checks, so every mode behaves like a copy here.
        let bytes = self.read(source)?;
        let mut files = self.files.lock().unwrap();
        files.insert(dest.to_path_buf(), bytes);
        Ok(())
    }
}

pub(crate) fn map_io(e: io::Error, ctx: impl ToString) -> crate::error::PrinbeeError {
    crate::error::PrinbeeError::io_context(e, ctx)
}
