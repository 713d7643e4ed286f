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
//! (`serde_yaml`), following the same CLI > file > default precedence
//! `prinbeed` uses.

use crate::error::{Error, ProxyResult};
use clap::Parser;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "prinbee-proxy", about = "The Prinbee proxy")]
pub struct Cli {
    /// path to a YAML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// address clients connect to
    #[arg(long)]
    pub client_listen: Option<SocketAddr>,
    /// addresses of daemons this proxy may forward to; repeatable
    #[arg(long = "daemon")]
    pub daemons: Vec<SocketAddr>,
    #[arg(long)]
    pub prinbee_path: Option<PathBuf>,
    #[arg(long)]
    pub owner: Option<String>,
    #[arg(long, value_parser = parse_duration_secs)]
    pub ping_pong_interval: Option<Duration>,
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

fn parse_duration_secs(s: &str) -> Result<Duration, String> {
    s.parse::<u64>().map(Duration::from_secs).map_err(|e| e.to_string())
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    client_listen: Option<SocketAddr>,
    daemons: Vec<SocketAddr>,
    prinbee_path: Option<PathBuf>,
    owner: Option<String>,
    ping_pong_interval_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub client_listen: SocketAddr,
    pub daemons: Vec<SocketAddr>,
    pub prinbee_path: PathBuf,
    pub owner: String,
    pub ping_pong_interval: Duration,
    pub log_level: String,
}

const DEFAULT_CLIENT_LISTEN: &str = "0.0.0.0:2122";

impl Config {
    pub fn load(cli: Cli) -> ProxyResult<Self> {
        let file = match &cli.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                serde_yaml::from_str::<ConfigFile>(&text)?
            }
            None => ConfigFile::default(),
        };

        let daemons = if cli.daemons.is_empty() { file.daemons } else { cli.daemons };
        if daemons.is_empty() {
            return Err(Error::Config("at least one --daemon address is required".into()));
        }

        let ping_pong_interval = cli
            .ping_pong_interval
            .or_else(|| file.ping_pong_interval_secs.map(Duration::from_secs))
            .unwrap_or(prinbee_core::protocol::DEFAULT_PING_INTERVAL)
            .clamp(prinbee_core::protocol::MIN_PING_INTERVAL, prinbee_core::protocol::MAX_PING_INTERVAL);

        Ok(Self {
            client_listen: cli
                .client_listen
                .or(file.client_listen)
                .unwrap_or_else(|| DEFAULT_CLIENT_LISTEN.parse().unwrap()),
            daemons,
            prinbee_path: cli.prinbee_path.or(file.prinbee_path).unwrap_or_else(|| PathBuf::from("/var/lib/prinbee-proxy")),
            owner: cli.owner.or(file.owner).unwrap_or_else(|| "prinbee".into()),
            ping_pong_interval,
            log_level: cli.log_level,
        })
    }
}
