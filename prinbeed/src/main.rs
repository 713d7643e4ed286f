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

use clap::Parser;
use prinbee_core::cluster::InMemoryBus;
use prinbee_core::context::InMemoryClusterLock;
use prinbeed::config::{Cli, Config};
use prinbeed::state::DaemonState;
use std::net::IpAddr;
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .parse_filters(&std::env::var("PRINBEE_LOG").unwrap_or_else(|_| cli.log_level.clone()))
        .init();

    let config = match Config::load(cli) {
        Ok(c) => c,
        Err(e) => {
            log::error!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let my_ip: IpAddr = config.node_listen.ip();
    // the bus and lock are external collaborators (spec.md §1); this build
    // ships only in-memory doubles since no concrete `communicator`/`cluck`
    // transport is in scope.
    let bus = Arc::new(InMemoryBus::new());
    let lock = Arc::new(InMemoryClusterLock::new());

    let state = match DaemonState::new(config, lock, bus, my_ip) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            log::error!("failed to open daemon state: {e}");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().thread_name("prinbeed").build() {
        Ok(rt) => rt,
        Err(e) => {
            log::error!("failed to start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(prinbeed::arbiter::run(state)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("fatal error: {e}");
            ExitCode::FAILURE
        }
    }
}
