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

use super::fs::AttachmentCopyHandling;
use crate::error::{PrinbeeError, PrinbeeResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMode {
    None,
    Flush,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileManagement {
    Keep,
    Truncate,
    Delete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    pub maximum_number_of_files: u8,
    pub maximum_file_size: u64,
    pub maximum_events: u32,
    pub sync: SyncMode,
    pub file_management: FileManagement,
    pub compress_when_full: bool,
    pub inline_attachment_size_threshold: usize,
    pub attachment_copy_handling: AttachmentCopyHandling,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            maximum_number_of_files: 2,
            maximum_file_size: 1024 * 1024,
            maximum_events: 4096,
            sync: SyncMode::Flush,
            file_management: FileManagement::Keep,
            compress_when_full: false,
            inline_attachment_size_threshold: 64 * 1024,
            attachment_copy_handling: AttachmentCopyHandling::Softlink,
        }
    }
}

impl JournalConfig {
    pub fn validate(&self) -> PrinbeeResult<()> {
        if !(2..=255).contains(&self.maximum_number_of_files) {
            return Err(PrinbeeError::Validation(
                "maximum_number_of_files must be in 2..=255".into(),
            ));
        }
        if !(64 * 1024..=128 * 1024 * 1024).contains(&self.maximum_file_size) {
            return Err(PrinbeeError::Validation(
                "maximum_file_size must be in 64KiB..=128MiB".into(),
            ));
        }
        if !(100..=100_000).contains(&self.maximum_events) {
            return Err(PrinbeeError::Validation(
                "maximum_events must be in 100..=100000".into(),
            ));
        }
        if !(64..=128 * 1024 * 1024).contains(&self.inline_attachment_size_threshold) {
            return Err(PrinbeeError::Validation(
                "inline_attachment_size_threshold must be in 64B..=128MiB".into(),
            ));
        }
        Ok(())
    }
}

impl Default for AttachmentCopyHandling {
    fn default() -> Self {
        Self::Softlink
    }
}

// serde impls for AttachmentCopyHandling live here since the type itself is
// defined in the fs module, which stays serde-agnostic.
impl Serialize for AttachmentCopyHandling {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let s = match self {
            Self::Softlink => "softlink",
            Self::Hardlink => "hardlink",
            Self::Reflink => "reflink",
            Self::Full => "full",
        };
        serializer.serialize_str(s)
    }
}

impl<'de> Deserialize<'de> for AttachmentCopyHandling {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.to_lowercase().as_str() {
            "softlink" => Ok(Self::Softlink),
            "hardlink" => Ok(Self::Hardlink),
            "reflink" => Ok(Self::Reflink),
            "full" => Ok(Self::Full),
            other => Err(serde::de::Error::custom(format!(
                "unknown attachment_copy_handling {other:?}"
            ))),
        }
    }
}
