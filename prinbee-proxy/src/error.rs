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

use std::fmt;
use std::io;

pub type ProxyResult<T> = Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    Config(String),
    Core(prinbee_core::PrinbeeError),
    /// an unreachable/impossible state; logged then the process exits(1)
    Logic(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Config(m) => write!(f, "configuration error: {m}"),
            Self::Core(e) => write!(f, "{e}"),
            Self::Logic(m) => write!(f, "logic error (this is a bug): {m}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<prinbee_core::PrinbeeError> for Error {
    fn from(e: prinbee_core::PrinbeeError) -> Self {
        Self::Core(e)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Config(e.to_string())
    }
}
