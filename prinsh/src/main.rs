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
use prinsh::config::{Cli, Config};
use prinsh::repl::Shell;
use std::fs::File;
use std::io::{self, BufReader};
use std::process::ExitCode;

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

    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("prinsh: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: Config) -> prinsh::ShellResult<()> {
    let interactive = config.interactive || (config.command.is_none() && config.file.is_none());
    let mut shell = Shell::new(config.clone());

    if let Some(command) = &config.command {
        let mut stdout = io::stdout();
        return shell.run_lines(io::Cursor::new(command.clone().into_bytes()), &mut stdout);
    }
    if let Some(path) = &config.file {
        let file = File::open(path)?;
        let mut stdout = io::stdout();
        return shell.run_lines(BufReader::new(file), &mut stdout);
    }
    if interactive {
        return shell.interactive();
    }
    Ok(())
}
