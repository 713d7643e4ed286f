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

//! Tokenizes one line of shell input into a [`Command`] (spec.md §6.4's
//! CLI surface) and runs it against a connected [`Client`]. Shared between
//! one-shot (`--command`/`--file`) and interactive use so both modes parse
//! and execute identically.

use crate::client::Client;
use crate::error::{Error, ShellResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    BeginWork,
    CommitWork,
    Rollback,
    ListContexts,
    GetContext { name: String },
    SetContext { name: String, owner: String, group: Option<String>, description: String, version: u32 },
    Help { section: Option<String> },
    /// CUI-local; handled by the REPL itself, never reaches a [`Client`]
    Connect { endpoint: Option<String> },
    Disconnect,
    Quit,
}

/// Parse one line of input. Blank lines and `#`-prefixed comments parse to
/// `None` rather than an error, matching a typical shell's treatment.
pub fn parse(line: &str) -> ShellResult<Option<Command>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let mut words = line.split_whitespace();
    let head = words.next().unwrap();
    let rest: Vec<&str> = words.collect();

    let cmd = match head.to_ascii_lowercase().as_str() {
        "begin-work" => Command::BeginWork,
        "commit-work" => Command::CommitWork,
        "rollback" => Command::Rollback,
        "list-contexts" => Command::ListContexts,
        "get-context" => {
            let name = rest.first().ok_or_else(|| Error::Config("get-context requires <name>".into()))?;
            Command::GetContext { name: name.to_string() }
        }
        "set-context" => parse_set_context(&rest)?,
        "help" => Command::Help { section: rest.first().map(|s| s.to_string()) },
        "/connect" => Command::Connect { endpoint: rest.first().map(|s| s.to_string()) },
        "/disconnect" => Command::Disconnect,
        "/quit" | "/exit" => Command::Quit,
        other => return Err(Error::Config(format!("unknown command {other:?}"))),
    };
    Ok(Some(cmd))
}

/// `set-context <name> <owner>[:<group>] <version> [description...]`
fn parse_set_context(rest: &[&str]) -> ShellResult<Command> {
    if rest.len() < 3 {
        return Err(Error::Config("set-context requires <name> <owner>[:<group>] <version> [description]".into()));
    }
    let name = rest[0].to_string();
    let (owner, group) = match rest[1].split_once(':') {
        Some((o, g)) => (o.to_string(), Some(g.to_string())),
        None => (rest[1].to_string(), None),
    };
    let version: u32 = rest[2]
        .parse()
        .map_err(|_| Error::Config(format!("invalid schema version {:?}", rest[2])))?;
    let description = rest[3..].join(" ");
    Ok(Command::SetContext { name, owner, group, description, version })
}

/// Outcome of running a [`Command`] against a live connection, rendered by
/// the caller (CUI prints it to the terminal; one-shot mode prints then
/// exits).
pub enum Outcome {
    Ok,
    Text(String),
    List(Vec<String>),
}

pub fn run(client: &mut Client, cmd: &Command) -> ShellResult<Outcome> {
    match cmd {
        Command::BeginWork => {
            client.begin_work()?;
            Ok(Outcome::Ok)
        }
        Command::CommitWork => {
            client.commit_work()?;
            Ok(Outcome::Ok)
        }
        Command::Rollback => {
            client.rollback()?;
            Ok(Outcome::Ok)
        }
        Command::ListContexts => Ok(Outcome::List(client.list_contexts()?)),
        Command::GetContext { name } => Ok(Outcome::Text(client.get_context(name)?)),
        Command::SetContext { name, owner, group, description, version } => {
            client.set_context(name, owner, group.as_deref(), description, *version)?;
            Ok(Outcome::Ok)
        }
        Command::Help { .. } | Command::Connect { .. } | Command::Disconnect | Command::Quit => {
            unreachable!("CUI-local commands are handled by the REPL before reaching run()")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_and_comment_lines_parse_to_none() {
        assert!(parse("").unwrap().is_none());
        assert!(parse("   ").unwrap().is_none());
        assert!(parse("# a comment").unwrap().is_none());
    }

    #[test]
    fn parses_every_documented_command() {
        assert_eq!(parse("begin-work").unwrap(), Some(Command::BeginWork));
        assert_eq!(parse("commit-work").unwrap(), Some(Command::CommitWork));
        assert_eq!(parse("rollback").unwrap(), Some(Command::Rollback));
        assert_eq!(parse("list-contexts").unwrap(), Some(Command::ListContexts));
        assert_eq!(
            parse("get-context orders").unwrap(),
            Some(Command::GetContext { name: "orders".into() })
        );
        assert_eq!(parse("/quit").unwrap(), Some(Command::Quit));
        assert_eq!(parse("/disconnect").unwrap(), Some(Command::Disconnect));
    }

    #[test]
    fn set_context_splits_owner_and_group() {
        let cmd = parse("set-context orders alice:ops 1 customer orders").unwrap().unwrap();
        assert_eq!(
            cmd,
            Command::SetContext {
                name: "orders".into(),
                owner: "alice".into(),
                group: Some("ops".into()),
                description: "customer orders".into(),
                version: 1,
            }
        );
    }

    #[test]
    fn set_context_without_group() {
        let cmd = parse("set-context orders alice 1").unwrap().unwrap();
        assert_eq!(
            cmd,
            Command::SetContext {
                name: "orders".into(),
                owner: "alice".into(),
                group: None,
                description: String::new(),
                version: 1,
            }
        );
    }

    #[test]
    fn unknown_command_is_an_error() {
        assert!(parse("frobnicate").is_err());
    }

    #[test]
    fn get_context_without_name_is_an_error() {
        assert!(parse("get-context").is_err());
    }
}
