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

//! The Prinbee daemon: owns on-disk state, listens for node/proxy/direct
//! connections, and runs the worker pool that processes their payloads.

pub mod arbiter;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod listener;
pub mod payload;
pub mod state;
pub mod worker;

pub use error::{DaemonResult, Error};
