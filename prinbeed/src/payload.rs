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

//! The unit of work a connection task hands to the worker pool, and the
//! handle a worker uses to reply without ever touching the connection
//! table (only the event loop's connection tasks own sockets).

use prinbee_core::protocol::MessageHeader;
use std::net::SocketAddr;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    Node,
    Proxy,
    Direct,
}

/// Written back to a connection task's outbound channel by a worker.
#[derive(Debug)]
pub enum OutboundEvent {
    Frame(MessageHeader, Vec<u8>),
    Close,
}

/// A cheap, cloneable reference back to one connection. Workers use this
/// instead of the connection table, which only the owning connection task
/// and the event loop ever touch directly.
#[derive(Clone)]
pub struct PeerHandle {
    pub connection_id: u64,
    pub kind: ConnectionKind,
    pub remote_addr: SocketAddr,
    outbound: mpsc::UnboundedSender<OutboundEvent>,
}

impl PeerHandle {
    pub fn new(
        connection_id: u64,
        kind: ConnectionKind,
        remote_addr: SocketAddr,
        outbound: mpsc::UnboundedSender<OutboundEvent>,
    ) -> Self {
        Self { connection_id, kind, remote_addr, outbound }
    }

    pub fn send(&self, header: MessageHeader, body: Vec<u8>) {
        let _ = self.outbound.send(OutboundEvent::Frame(header, body));
    }

    pub fn close(&self) {
        let _ = self.outbound.send(OutboundEvent::Close);
    }
}

/// One unit of work pulled off the shared FIFO by a blocking worker: an
/// already-framed message plus who to reply to.
pub struct Payload {
    pub peer: PeerHandle,
    pub header: MessageHeader,
    pub body: Vec<u8>,
}

impl Payload {
    pub fn new(peer: PeerHandle, header: MessageHeader, body: Vec<u8>) -> Self {
        Self { peer, header, body }
    }
}
