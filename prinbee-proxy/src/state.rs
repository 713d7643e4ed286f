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

//! Shared proxy state: the local journal, the table of daemon connections
//! to forward onto, the table of client connections (for the stale-
//! handshake scan), and the map from an in-flight daemon-bound serial back
//! to the client awaiting its reply.

use crate::config::Config;
use crate::payload::PeerHandle;
use parking_lot::Mutex;
use prinbee_core::connection::ConnectionRef;
use prinbee_core::journal::{Journal, JournalConfig};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// A client connection plus the liveness/handshake bookkeeping the
/// stale-connection timer inspects from outside the connection's own task.
pub struct ClientSlot {
    pub peer: PeerHandle,
    pub conn_ref: Arc<Mutex<ConnectionRef>>,
}

/// A client request forwarded to a daemon, waiting on that daemon's
/// ACK/ERR so it can be folded back to the originating client and the
/// journal entry closed out.
pub struct PendingRequest {
    pub client: PeerHandle,
    pub client_serial: u32,
    pub request_id: Vec<u8>,
}

pub struct ProxyState {
    pub config: Config,
    pub journal: Mutex<Journal>,
    pub daemon_peers: Mutex<HashMap<u64, PeerHandle>>,
    pub client_peers: Mutex<HashMap<u64, ClientSlot>>,
    /// keyed by the serial the proxy assigned the daemon-bound frame
    pub pending: Mutex<HashMap<u32, PendingRequest>>,
    next_daemon_serial: AtomicU32,
    next_daemon_pick: AtomicU32,
}

impl ProxyState {
    pub fn new(config: Config) -> prinbee_core::PrinbeeResult<Self> {
        let journal = Journal::open(config.prinbee_path.join("journal"), JournalConfig::default())?;
        Ok(Self {
            config,
            journal: Mutex::new(journal),
            daemon_peers: Mutex::new(HashMap::new()),
            client_peers: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            next_daemon_serial: AtomicU32::new(1),
            next_daemon_pick: AtomicU32::new(0),
        })
    }

    pub fn next_daemon_serial(&self) -> u32 {
        self.next_daemon_serial.fetch_add(1, Ordering::Relaxed)
    }

    /// Any available daemon (spec.md §4.4: routing by key/replication is
    /// out of scope). Rotates so repeated calls spread load across every
    /// daemon this proxy currently holds a connection to.
    pub fn pick_daemon(&self) -> Option<PeerHandle> {
        let daemons = self.daemon_peers.lock();
        if daemons.is_empty() {
            return None;
        }
        let mut ids: Vec<&u64> = daemons.keys().collect();
        ids.sort_unstable();
        let pick = self.next_daemon_pick.fetch_add(1, Ordering::Relaxed) as usize % ids.len();
        daemons.get(ids[pick]).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn test_config(tag: &str) -> Config {
        let mut dir = std::env::temp_dir();
        dir.push(format!("prinbee-proxy-test-{tag}-{:?}", std::thread::current().id()));
        Config {
            client_listen: SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 0),
            daemons: vec![SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 1)],
            prinbee_path: dir,
            owner: "prinbee".into(),
            ping_pong_interval: Duration::from_secs(5),
            log_level: "info".into(),
        }
    }

    fn fake_peer(id: u64) -> PeerHandle {
        let (tx, _rx) = mpsc::unbounded_channel();
        PeerHandle::new(id, SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 2000 + id as u16), tx)
    }

    #[test]
    fn pick_daemon_returns_none_with_no_connections() {
        let state = ProxyState::new(test_config("empty")).unwrap();
        assert!(state.pick_daemon().is_none());
    }

    #[test]
    fn pick_daemon_rotates_across_known_daemons() {
        let state = ProxyState::new(test_config("rotate")).unwrap();
        state.daemon_peers.lock().insert(1, fake_peer(1));
        state.daemon_peers.lock().insert(2, fake_peer(2));

        let first = state.pick_daemon().unwrap().connection_id;
        let second = state.pick_daemon().unwrap().connection_id;
        assert_ne!(first, second);
        let third = state.pick_daemon().unwrap().connection_id;
        assert_eq!(first, third);
    }

    #[test]
    fn daemon_serials_are_unique_and_increasing() {
        let state = ProxyState::new(test_config("serials")).unwrap();
        let a = state.next_daemon_serial();
        let b = state.next_daemon_serial();
        assert!(b > a);
    }
}
