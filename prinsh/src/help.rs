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

//! `HELP [section]`: built-in summary text, or, when `--documentation`
//! names a directory, a `<section>.txt` file read from it.

use std::path::Path;

const OVERVIEW: &str = "\
Commands:
  begin-work                         start a unit of work
  commit-work                        commit the current unit of work
  rollback                           abandon the current unit of work
  list-contexts                      list known contexts
  get-context <name>                 show one context's details
  set-context <name> <owner>[:<group>] <version> [description...]
  /connect [host:port]                connect (or reconnect) to a proxy
  /disconnect                         close the current connection
  /quit                                leave the shell
  help [section]                      this text, or a named section";

pub fn topic(section: Option<&str>, documentation: Option<&Path>) -> String {
    match (section, documentation) {
        (Some(name), Some(dir)) => {
            let path = dir.join(format!("{name}.txt"));
            std::fs::read_to_string(&path)
                .unwrap_or_else(|_| format!("no documentation found for {name:?} under {}", dir.display()))
        }
        _ => OVERVIEW.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overview_is_returned_with_no_section_or_docs_root() {
        assert_eq!(topic(None, None), OVERVIEW);
    }

    #[test]
    fn missing_documentation_file_reports_rather_than_panics() {
        let dir = std::env::temp_dir();
        let msg = topic(Some("does-not-exist-xyz"), Some(&dir));
        assert!(msg.contains("no documentation found"));
    }
}
