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
//! (`serde_yaml`), following the CLI > file > default precedence order.

use crate::error::{DaemonResult, Error};
use clap::Parser;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "prinbeed", about = "The Prinbee daemon")]
pub struct Cli {
    /// path to a YAML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub cluster_name: Option<String>,
    #[arg(long)]
    pub node_name: Option<String>,
    /// address other daemons connect to
    #[arg(long)]
    pub node_listen: Option<SocketAddr>,
    /// address proxies connect to
    #[arg(long)]
    pub proxy_listen: Option<SocketAddr>,
    /// address direct (proxy-bypassing) clients connect to
    #[arg(long)]
    pub client_listen: Option<SocketAddr>,
    #[arg(long)]
    pub prinbee_path: Option<PathBuf>,
    /// `user[:group]` to own created files under `prinbee_path`
    #[arg(long)]
    pub owner: Option<String>,
    #[arg(long, value_parser = parse_duration_secs)]
    pub ping_pong_interval: Option<Duration>,
    #[arg(long, default_value = "info")]
    pub log_level: String,
    /// worker pool size; defaults to 2..=2*cpus, clamped to that range
    #[arg(long)]
    pub workers: Option<usize>,
}

fn parse_duration_secs(s: &str) -> Result<Duration, String> {
    s.parse::<u64>().map(Duration::from_secs).map_err(|e| e.to_string())
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    cluster_name: Option<String>,
    node_name: Option<String>,
    node_listen: Option<SocketAddr>,
    proxy_listen: Option<SocketAddr>,
    client_listen: Option<SocketAddr>,
    prinbee_path: Option<PathBuf>,
    owner: Option<String>,
    ping_pong_interval_secs: Option<u64>,
    workers: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub cluster_name: String,
    pub node_name: String,
    pub node_listen: SocketAddr,
    pub proxy_listen: SocketAddr,
    pub client_listen: SocketAddr,
    pub prinbee_path: PathBuf,
    pub owner: String,
    pub ping_pong_interval: Duration,
    pub workers: usize,
    pub log_level: String,
}

const DEFAULT_NODE_LISTEN: &str = "0.0.0.0:2120";
const DEFAULT_PROXY_LISTEN: &str = "0.0.0.0:2121";
const DEFAULT_CLIENT_LISTEN: &str = "0.0.0.0:2122";

impl Config {
    pub fn load(cli: Cli) -> DaemonResult<Self> {
        let file = match &cli.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                serde_yaml::from_str::<ConfigFile>(&text)?
            }
            None => ConfigFile::default(),
        };

        let node_name = cli
            .node_name
            .or(file.node_name)
            .ok_or_else(|| Error::Config("--node-name is required".into()))?;

        let ping_pong_interval = cli
            .ping_pong_interval
            .or_else(|| file.ping_pong_interval_secs.map(Duration::from_secs))
            .unwrap_or(prinbee_core::protocol::DEFAULT_PING_INTERVAL)
            .clamp(prinbee_core::protocol::MIN_PING_INTERVAL, prinbee_core::protocol::MAX_PING_INTERVAL);

        let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        let workers = cli
            .workers
            .or(file.workers)
            .unwrap_or(cpus)
            .clamp(2, 2 * cpus.max(1));

        Ok(Self {
            cluster_name: cli.cluster_name.or(file.cluster_name).unwrap_or_else(|| "default".into()),
            node_name,
            node_listen: cli
                .node_listen
                .or(file.node_listen)
                .unwrap_or_else(|| DEFAULT_NODE_LISTEN.parse().unwrap()),
            proxy_listen: cli
                .proxy_listen
                .or(file.proxy_listen)
                .unwrap_or_else(|| DEFAULT_PROXY_LISTEN.parse().unwrap()),
            client_listen: cli
                .client_listen
                .or(file.client_listen)
                .unwrap_or_else(|| DEFAULT_CLIENT_LISTEN.parse().unwrap()),
            prinbee_path: cli.prinbee_path.or(file.prinbee_path).unwrap_or_else(|| PathBuf::from("/var/lib/prinbee")),
            owner: cli.owner.or(file.owner).unwrap_or_else(|| "prinbee".into()),
            ping_pong_interval,
            workers,
            log_level: cli.log_level,
        })
    }
}
