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

//! The interactive CUI front-end: a minimal line-at-a-time editor (no
//! readline, no ncurses panels — both are out of scope) that reads from
//! stdin, dispatches through [`commands`], and prints results to stdout.

use crate::client::Client;
use crate::commands::{self, Command, Outcome};
use crate::config::Config;
use crate::error::{Error, ShellResult};
use std::io::{self, BufRead, Write};
use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Owns the shell's one connection, if any. `/connect` and `/disconnect`
/// mutate this rather than tearing down and rebuilding the whole shell
/// object, per spec.md §9's note on keeping state in an owned field
/// instead of reaching for a global.
pub struct Shell {
    config: Config,
    client: Option<Client>,
}

impl Shell {
    pub fn new(config: Config) -> Self {
        Self { config, client: None }
    }

    fn connect(&mut self, endpoint: SocketAddr) -> ShellResult<()> {
        let node_name_tag = crate::node_name_tag(&self.config.node_name);
        self.client = Some(Client::connect(endpoint, node_name_tag, DEFAULT_TIMEOUT)?);
        Ok(())
    }

    fn ensure_connected(&mut self) -> ShellResult<&mut Client> {
        if self.client.is_none() {
            let endpoint = self.config.endpoint;
            self.connect(endpoint)?;
        }
        Ok(self.client.as_mut().unwrap())
    }

    /// Run every non-empty, non-comment line from `input` in order,
    /// printing each command's outcome. Stops at the first error.
    pub fn run_lines(&mut self, input: impl BufRead, out: &mut impl Write) -> ShellResult<()> {
        for line in input.lines() {
            let line = line?;
            self.run_one_line(&line, out)?;
        }
        Ok(())
    }

    fn run_one_line(&mut self, line: &str, out: &mut impl Write) -> ShellResult<()> {
        let cmd = match commands::parse(line) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => return Ok(()),
            Err(e) => {
                writeln!(out, "error: {e}")?;
                return Ok(());
            }
        };
        self.dispatch(cmd, out)
    }

    fn dispatch(&mut self, cmd: Command, out: &mut impl Write) -> ShellResult<()> {
        match cmd {
            Command::Help { section } => {
                writeln!(out, "{}", crate::help::topic(section.as_deref(), self.config.documentation.as_deref()))?;
                Ok(())
            }
            Command::Connect { endpoint } => {
                let target = match endpoint {
                    Some(s) => s.parse().map_err(|_| Error::Config(format!("invalid endpoint {s:?}")))?,
                    None => self.config.endpoint,
                };
                self.connect(target)?;
                writeln!(out, "connected to {target}")?;
                Ok(())
            }
            Command::Disconnect => {
                self.client = None;
                writeln!(out, "disconnected")?;
                Ok(())
            }
            Command::Quit => {
                self.client = None;
                Ok(())
            }
            other => {
                let client = self.ensure_connected()?;
                match commands::run(client, &other) {
                    Ok(Outcome::Ok) => writeln!(out, "OK")?,
                    Ok(Outcome::Text(text)) => writeln!(out, "{text}")?,
                    Ok(Outcome::List(items)) => {
                        if items.is_empty() {
                            writeln!(out, "(no contexts)")?;
                        } else {
                            for item in items {
                                writeln!(out, "{item}")?;
                            }
                        }
                    }
                    // ERR payloads print verbatim (spec.md §7's user-visible
                    // behavior for the CUI).
                    Err(Error::Remote(msg)) => writeln!(out, "{msg}")?,
                    Err(e) => return Err(e),
                }
                Ok(())
            }
        }
    }

    /// Line-at-a-time interactive loop: prompt, read, dispatch, repeat
    /// until `/quit`, EOF, or an unrecoverable error.
    pub fn interactive(&mut self) -> ShellResult<()> {
        let stdin = io::stdin();
        let mut stdout = io::stdout();
        println!("prinsh — type `help` for a command summary, `/quit` to leave");
        loop {
            print!("prinsh> ");
            stdout.flush()?;
            let mut line = String::new();
            let n = stdin.lock().read_line(&mut line)?;
            if n == 0 {
                break; // EOF
            }
            let trimmed = line.trim_end_matches(['\n', '\r']);
            if matches!(commands::parse(trimmed), Ok(Some(Command::Quit))) {
                break;
            }
            self.run_one_line(trimmed, &mut stdout)?;
        }
        println!("goodbye");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::net::{IpAddr, Ipv4Addr};

    fn test_config() -> Config {
        Config {
            cluster_name: "default".into(),
            node_name: "prinsh".into(),
            endpoint: SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 1),
            prinbee_path: None,
            owner: None,
            ping_pong_interval: Duration::from_secs(5),
            documentation: None,
            command: None,
            file: None,
            interactive: false,
            log_level: "info".into(),
        }
    }

    #[test]
    fn help_does_not_require_a_connection() {
        let mut shell = Shell::new(test_config());
        let mut out = Cursor::new(Vec::new());
        shell.run_lines(Cursor::new(b"help\n".to_vec()), &mut out).unwrap();
        let text = String::from_utf8(out.into_inner()).unwrap();
        assert!(text.contains("begin-work"));
    }

    #[test]
    fn unknown_command_reports_without_aborting_the_script() {
        let mut shell = Shell::new(test_config());
        let mut out = Cursor::new(Vec::new());
        shell.run_lines(Cursor::new(b"frobnicate\nhelp\n".to_vec()), &mut out).unwrap();
        let text = String::from_utf8(out.into_inner()).unwrap();
        assert!(text.contains("error:"));
        assert!(text.contains("begin-work"));
    }

    #[test]
    fn disconnect_without_a_connection_is_a_no_op() {
        let mut shell = Shell::new(test_config());
        let mut out = Cursor::new(Vec::new());
        shell.run_lines(Cursor::new(b"/disconnect\n".to_vec()), &mut out).unwrap();
        assert!(shell.client.is_none());
    }
}
