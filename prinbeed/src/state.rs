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

//! Everything the worker pool shares across invocations: the context
//! manager, the cluster lock and bus handles, known node peers, and any
//! `SET_CONTEXT` sessions currently broadcasting to peers. Connections
//! themselves are deliberately absent here; only the event loop's
//! connection tasks own sockets.

use crate::config::Config;
use crate::payload::PeerHandle;
use parking_lot::Mutex;
use prinbee_core::cluster::{Bus, ClusterMembership, ReadinessGate};
use prinbee_core::context::{ClusterLock, ContextManager};
use prinbee_core::journal::{Journal, JournalConfig};
use std::collections::HashMap;
use std::sync::Arc;

pub struct DaemonState {
    pub config: Config,
    pub contexts: Mutex<ContextManager>,
    pub lock: Arc<dyn ClusterLock>,
    pub bus: Arc<dyn Bus>,
    pub readiness: Mutex<ReadinessGate>,
    pub membership: Mutex<ClusterMembership>,
    /// live NODE-kind peers, keyed by connection id, for `SET_CONTEXT`
    /// fan-out
    pub node_peers: Mutex<HashMap<u64, PeerHandle>>,
    /// in-flight `SET_CONTEXT` sessions, keyed by the request's frame
    /// serial so a later peer `ACK` can find the one it belongs to
    pub set_context_sessions: Mutex<HashMap<u32, Arc<Mutex<prinbee_core::context::SetContextSession>>>>,
    /// the daemon's own durable journal: writes land here before the local
    /// storage write and the replication fan-out to peers (spec.md §2's
    /// data-flow diagram)
    pub journal: Mutex<Journal>,
}

impl DaemonState {
    pub fn new(
        config: Config,
        lock: Arc<dyn ClusterLock>,
        bus: Arc<dyn Bus>,
        my_ip: std::net::IpAddr,
    ) -> prinbee_core::PrinbeeResult<Self> {
        let journal = Journal::open(config.prinbee_path.join("journal"), JournalConfig::default())?;
        Ok(Self {
            config,
            contexts: Mutex::new(ContextManager::new()),
            lock,
            bus,
            readiness: Mutex::new(ReadinessGate::new()),
            membership: Mutex::new(ClusterMembership::new(my_ip)),
            node_peers: Mutex::new(HashMap::new()),
            set_context_sessions: Mutex::new(HashMap::new()),
            journal: Mutex::new(journal),
        })
    }
}
