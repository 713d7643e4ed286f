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

//! CLI flags (`clap`) layered over an optional YAML config file
//! (`serde_yaml`), matching the CLI > file > default precedence the
//! daemon and proxy binaries use. `prinsh` connects rather than binds, so
//! `--proxy-listen` here names the proxy this shell talks to; the other
//! listener flags are accepted for CLI-surface parity across the three
//! binaries but otherwise unused by a client.

use crate::error::{Error, ShellResult};
use clap::Parser;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "prinsh", about = "The Prinbee client shell")]
pub struct Cli {
    /// path to a YAML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// run a single command non-interactively and exit
    #[arg(long)]
    pub command: Option<String>,
    /// run each line of a script file non-interactively and exit
    #[arg(long)]
    pub file: Option<PathBuf>,
    /// force the interactive REPL even when stdin is not a terminal
    #[arg(long)]
    pub interactive: bool,
    /// root directory of `HELP` topic text files
    #[arg(long)]
    pub documentation: Option<PathBuf>,
    #[arg(long, value_parser = parse_duration_secs)]
    pub ping_pong_interval: Option<Duration>,
    #[arg(long)]
    pub cluster_name: Option<String>,
    #[arg(long)]
    pub node_name: Option<String>,
    /// the proxy address this shell connects to
    #[arg(long)]
    pub proxy_listen: Option<SocketAddr>,
    #[arg(long)]
    pub node_listen: Option<SocketAddr>,
    #[arg(long)]
    pub client_listen: Option<SocketAddr>,
    #[arg(long)]
    pub prinbee_path: Option<PathBuf>,
    /// `user[:group]`, accepted for CLI-surface parity; unused by the client
    #[arg(long)]
    pub owner: Option<String>,
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

fn parse_duration_secs(s: &str) -> Result<Duration, String> {
    s.parse::<u64>().map(Duration::from_secs).map_err(|e| e.to_string())
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    cluster_name: Option<String>,
    node_name: Option<String>,
    proxy_listen: Option<SocketAddr>,
    node_listen: Option<SocketAddr>,
    client_listen: Option<SocketAddr>,
    prinbee_path: Option<PathBuf>,
    owner: Option<String>,
    ping_pong_interval_secs: Option<u64>,
    documentation: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub cluster_name: String,
    pub node_name: String,
    pub endpoint: SocketAddr,
    pub prinbee_path: Option<PathBuf>,
    pub owner: Option<String>,
    pub ping_pong_interval: Duration,
    pub documentation: Option<PathBuf>,
    pub command: Option<String>,
    pub file: Option<PathBuf>,
    pub interactive: bool,
    pub log_level: String,
}

const DEFAULT_ENDPOINT: &str = "127.0.0.1:2122";

impl Config {
    pub fn load(cli: Cli) -> ShellResult<Self> {
        let file = match &cli.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                serde_yaml::from_str::<ConfigFile>(&text)?
            }
            None => ConfigFile::default(),
        };

        let endpoint = cli
            .proxy_listen
            .or(cli.client_listen)
            .or(cli.node_listen)
            .or(file.proxy_listen)
            .or(file.client_listen)
            .or(file.node_listen)
            .unwrap_or_else(|| DEFAULT_ENDPOINT.parse().unwrap());

        let ping_pong_interval = cli
            .ping_pong_interval
            .or_else(|| file.ping_pong_interval_secs.map(Duration::from_secs))
            .unwrap_or(prinbee_core::protocol::DEFAULT_PING_INTERVAL)
            .clamp(prinbee_core::protocol::MIN_PING_INTERVAL, prinbee_core::protocol::MAX_PING_INTERVAL);

        if cli.command.is_some() && cli.file.is_some() {
            return Err(Error::Config("--command and --file are mutually exclusive".into()));
        }

        Ok(Self {
            cluster_name: cli.cluster_name.or(file.cluster_name).unwrap_or_else(|| "default".into()),
            node_name: cli.node_name.or(file.node_name).unwrap_or_else(|| "prinsh".into()),
            endpoint,
            prinbee_path: cli.prinbee_path.or(file.prinbee_path),
            owner: cli.owner.or(file.owner),
            ping_pong_interval,
            documentation: cli.documentation.or(file.documentation),
            command: cli.command,
            file: cli.file,
            interactive: cli.interactive,
            log_level: cli.log_level,
        })
    }
}
