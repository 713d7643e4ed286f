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

//! The Prinbee client: a blocking request/response connection to a proxy
//! (`client`), CLI-surface command parsing (`commands`), and the
//! interactive CUI front-end (`repl`).

pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod help;
pub mod repl;

pub use error::{Error, ShellResult};

/// `REG.name` is an interned `u32`; the shell has no client identity of
/// its own to register beyond a readable tag derived from its configured
/// node name, truncated/padded to 4 bytes the same way message names are
/// interned (`prinbee_core::protocol::header::tag`).
pub fn node_name_tag(node_name: &str) -> u32 {
    let mut bytes = [0u8; 4];
    for (slot, b) in bytes.iter_mut().zip(node_name.as_bytes().iter()) {
        *slot = *b;
    }
    u32::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_name_tag_is_stable_for_the_same_name() {
        assert_eq!(node_name_tag("prinsh"), node_name_tag("prinsh"));
    }

    #[test]
    fn node_name_tag_truncates_past_four_bytes() {
        assert_eq!(node_name_tag("prinsh"), node_name_tag("prin"));
    }
}
