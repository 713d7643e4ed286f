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

//! Shared core of the Prinbee distributed database: the durable event
//! journal, the binary wire protocol and connection bookkeeping,
//! fixed-width 512-bit integers, cluster membership, and the
//! context/schema manager, used by both `prinbeed` and `prinbee-proxy`.

pub mod bigint;
pub mod cluster;
pub mod connection;
pub mod context;
pub mod error;
pub mod journal;
pub mod protocol;

pub use bigint::{Int512, Uint512};
pub use error::{PrinbeeError, PrinbeeResult};
