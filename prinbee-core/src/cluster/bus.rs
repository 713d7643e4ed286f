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

//! The `communicator` pub/sub bus contract: a closed vocabulary of named
//! messages carrying case-sensitive string key/value parameters, used for
//! discovery/gossip of node addresses and cluster-wide signals. No concrete
//! transport ships here, only the trait and an in-memory double for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusMessageName {
    Ready,
    Stop,
    Quitting,
    ClockStable,
    ClockUnstable,
    IpwallCurrentStatus,
    PrinbeeCurrentStatus,
    PrinbeeGetStatus,
    PrinbeeProxyCurrentStatus,
}

impl BusMessageName {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Stop => "STOP",
            Self::Quitting => "QUITTING",
            Self::ClockStable => "CLOCK_STABLE",
            Self::ClockUnstable => "CLOCK_UNSTABLE",
            Self::IpwallCurrentStatus => "IPWALL_CURRENT_STATUS",
            Self::PrinbeeCurrentStatus => "PRINBEE_CURRENT_STATUS",
            Self::PrinbeeGetStatus => "PRINBEE_GET_STATUS",
            Self::PrinbeeProxyCurrentStatus => "PRINBEE_PROXY_CURRENT_STATUS",
        }
    }
}

/// A bus message: a name plus opaque string key/value parameters (e.g.
/// `status`, `cluster_name`, `node_name`, `node_ip`, `proxy_ip`,
/// `direct_ip`, `cache`). Keys and values are case-sensitive.
#[derive(Debug, Clone, Default)]
pub struct BusMessage {
    pub name: Option<BusMessageName>,
    pub params: HashMap<String, String>,
}

impl BusMessage {
    pub fn new(name: BusMessageName) -> Self {
        Self { name: Some(name), params: HashMap::new() }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

pub trait Bus: Send {
    fn publish(&self, message: BusMessage);
    /// Pop the next undelivered message, if any. Single-consumer.
    fn poll(&self) -> Option<BusMessage>;
}

/// In-memory bus double for tests: a shared FIFO, no real transport.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBus {
    inbox: Arc<Mutex<VecDeque<BusMessage>>>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Bus for InMemoryBus {
    fn publish(&self, message: BusMessage) {
        self.inbox.lock().unwrap().push_back(message);
    }

    fn poll(&self) -> Option<BusMessage> {
        self.inbox.lock().unwrap().pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_then_poll_preserves_order() {
        let bus = InMemoryBus::new();
        bus.publish(BusMessage::new(BusMessageName::ClockStable));
        bus.publish(BusMessage::new(BusMessageName::Ready));
        assert_eq!(bus.poll().unwrap().name, Some(BusMessageName::ClockStable));
        assert_eq!(bus.poll().unwrap().name, Some(BusMessageName::Ready));
        assert!(bus.poll().is_none());
    }

    #[test]
    fn params_are_case_sensitive() {
        let msg = BusMessage::new(BusMessageName::PrinbeeCurrentStatus)
            .with("status", "up")
            .with("node_ip", "10.0.0.1");
        assert_eq!(msg.param("status"), Some("up"));
        assert_eq!(msg.param("Status"), None);
    }
}
