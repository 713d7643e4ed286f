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

//! The connection reference: a handle pairing a transport with handshake
//! and liveness bookkeeping, plus the table that owns every connection a
//! daemon or proxy currently holds. Kept transport-agnostic (no socket
//! type here) so both `prinbeed` and `prinbee-proxy` can drive it over
//! their own `tokio::net::TcpStream` handling.

use crate::protocol::MAX_PING_PONG_FAILURES;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionType {
    Node,
    Proxy,
    Direct,
}

pub type ConnectionId = u64;

/// Bookkeeping for one connection. Doesn't own the socket: the event loop
/// keeps the transport itself, keyed by the same [`ConnectionId`].
#[derive(Debug, Clone)]
pub struct ConnectionRef {
    pub id: ConnectionId,
    pub kind: ConnectionType,
    pub remote_addr: SocketAddr,
    pub created_at: Instant,
    /// `None` until the REG handshake completes.
    pub protocol_version: Option<u16>,
    pub last_ping_serial: Option<u32>,
    pub unanswered_pings: u32,
}

impl ConnectionRef {
    pub fn new(id: ConnectionId, kind: ConnectionType, remote_addr: SocketAddr) -> Self {
        Self {
            id,
            kind,
            remote_addr,
            created_at: Instant::now(),
            protocol_version: None,
            last_ping_serial: None,
            unanswered_pings: 0,
        }
    }

    pub fn is_registered(&self) -> bool {
        self.protocol_version.is_some()
    }

    pub fn complete_handshake(&mut self, protocol_version: u16) {
        self.protocol_version = Some(protocol_version);
    }

    /// A connection without a completed REG handshake older than
    /// `handshake_timeout` must be dropped.
    pub fn is_stale_handshake(&self, handshake_timeout: Duration, now: Instant) -> bool {
        !self.is_registered() && now.duration_since(self.created_at) > handshake_timeout
    }

    pub fn record_ping_sent(&mut self, serial: u32) {
        self.last_ping_serial = Some(serial);
        self.unanswered_pings += 1;
    }

    /// Clear liveness state on a matching PONG. Returns `false` (and
    /// leaves state untouched) if the serial doesn't match the last PING
    /// sent, since stray PONGs shouldn't reset the failure counter.
    pub fn record_pong(&mut self, serial: u32) -> bool {
        if self.last_ping_serial == Some(serial) {
            self.unanswered_pings = 0;
            true
        } else {
            false
        }
    }

    pub fn is_dead(&self) -> bool {
        self.unanswered_pings >= MAX_PING_PONG_FAILURES
    }
}

/// Owns every connection the local event loop holds, indexed by id.
#[derive(Debug, Default)]
pub struct ConnectionTable {
    next_id: ConnectionId,
    connections: HashMap<ConnectionId, ConnectionRef>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: ConnectionType, remote_addr: SocketAddr) -> ConnectionId {
        let id = self.next_id;
        self.next_id += 1;
        self.connections.insert(id, ConnectionRef::new(id, kind, remote_addr));
        id
    }

    pub fn get(&self, id: ConnectionId) -> Option<&ConnectionRef> {
        self.connections.get(&id)
    }

    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut ConnectionRef> {
        self.connections.get_mut(&id)
    }

    pub fn remove(&mut self, id: ConnectionId) -> Option<ConnectionRef> {
        self.connections.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn of_kind(&self, kind: ConnectionType) -> impl Iterator<Item = &ConnectionRef> {
        self.connections.values().filter(move |c| c.kind == kind)
    }

    /// Ids of every connection that should be dropped right now: a stale,
    /// never-registered handshake, or a connection that's missed too many
    /// consecutive PONGs.
    pub fn collect_dead(&self, handshake_timeout: Duration, now: Instant) -> Vec<ConnectionId> {
        self.connections
            .values()
            .filter(|c| c.is_dead() || c.is_stale_handshake(handshake_timeout, now))
            .map(|c| c.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn addr() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 9000)
    }

    #[test]
    fn unregistered_connection_becomes_stale() {
        let mut table = ConnectionTable::new();
        let id = table.insert(ConnectionType::Direct, addr());
        let con = table.get(id).unwrap();
        assert!(!con.is_stale_handshake(Duration::from_secs(1), Instant::now()));
        assert!(con.is_stale_handshake(Duration::from_secs(1), Instant::now() + Duration::from_secs(2)));
    }

    #[test]
    fn five_missed_pongs_marks_dead() {
        let mut table = ConnectionTable::new();
        let id = table.insert(ConnectionType::Node, addr());
        let con = table.get_mut(id).unwrap();
        con.complete_handshake(1);
        for serial in 0..MAX_PING_PONG_FAILURES {
            con.record_ping_sent(serial);
        }
        assert!(con.is_dead());
    }

    #[test]
    fn matching_pong_clears_failure_count() {
        let mut table = ConnectionTable::new();
        let id = table.insert(ConnectionType::Node, addr());
        let con = table.get_mut(id).unwrap();
        con.complete_handshake(1);
        con.record_ping_sent(7);
        assert!(con.record_pong(7));
        assert_eq!(con.unanswered_pings, 0);
    }

    #[test]
    fn stray_pong_does_not_reset_counter() {
        let mut table = ConnectionTable::new();
        let id = table.insert(ConnectionType::Node, addr());
        let con = table.get_mut(id).unwrap();
        con.complete_handshake(1);
        con.record_ping_sent(7);
        assert!(!con.record_pong(99));
        assert_eq!(con.unanswered_pings, 1);
    }
}
