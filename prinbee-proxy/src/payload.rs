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

//! A cheap, cloneable handle back to one connection's outbound half. The
//! proxy has no worker pool (its per-message work is cheap enough to run
//! inline in the connection task per spec.md §5), so this exists purely to
//! let one connection task hand a reply to another — a client connection
//! handing a forwarded request to a daemon connection, or a daemon
//! connection handing a reply back to the client that's waiting on it.

use prinbee_core::protocol::MessageHeader;
use std::net::SocketAddr;
use tokio::sync::mpsc;

#[derive(Debug)]
pub enum OutboundEvent {
    Frame(MessageHeader, Vec<u8>),
    Close,
}

#[derive(Clone)]
pub struct PeerHandle {
    pub connection_id: u64,
    pub remote_addr: SocketAddr,
    outbound: mpsc::UnboundedSender<OutboundEvent>,
}

impl PeerHandle {
    pub fn new(connection_id: u64, remote_addr: SocketAddr, outbound: mpsc::UnboundedSender<OutboundEvent>) -> Self {
        Self { connection_id, remote_addr, outbound }
    }

    pub fn send(&self, header: MessageHeader, body: Vec<u8>) {
        let _ = self.outbound.send(OutboundEvent::Frame(header, body));
    }

    pub fn close(&self) {
        let _ = self.outbound.send(OutboundEvent::Close);
    }
}
