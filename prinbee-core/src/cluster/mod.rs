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

//! Cluster membership and the readiness gate that decides when a node's
//! binary listeners may open.

pub mod bus;

pub use bus::{Bus, BusMessage, BusMessageName, InMemoryBus};

use std::collections::HashMap;
use std::net::IpAddr;

/// The five conditions that must all hold before listeners open. Modeled
/// as independent flags rather than a single bool so each upstream signal
/// (fluid-settings, ipwall, clock, lock, address) can be updated as it
/// arrives, in any order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadinessGate {
    pub fluid_settings_ready: bool,
    pub ipwall_up: bool,
    pub clock_stable: bool,
    pub lock_ready: bool,
    pub address_valid: bool,
    opened: bool,
}

impl ReadinessGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_satisfied(&self) -> bool {
        self.fluid_settings_ready
            && self.ipwall_up
            && self.clock_stable
            && self.lock_ready
            && self.address_valid
    }

    /// Once open, transient loss of any individual gate does not close the
    /// listeners again; `is_open` stays true for the rest of this gate's
    /// lifetime.
    pub fn is_open(&self) -> bool {
        self.opened
    }

    /// Re-check the gates. Returns `true` exactly once: on the call where
    /// the gate transitions from closed to open.
    pub fn poll_opened(&mut self) -> bool {
        if self.opened {
            return false;
        }
        if self.is_satisfied() {
            self.opened = true;
            return true;
        }
        false
    }
}

#[derive(Debug, Clone)]
pub struct PeerInfo {
    pub node_name: String,
    pub up: bool,
}

/// What a node should do on learning of a peer's status, per the
/// IP-comparison full-mesh rule: the lower-IP side always initiates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipAction {
    Connect(IpAddr),
    AwaitIncoming,
}

/// Tracks known peers and decides connection direction for full-mesh
/// membership: on `PRINBEE_CURRENT_STATUS(status=UP, node_ip, node_name)`,
/// if `node_ip < my_ip` we dial out, otherwise we wait for them to dial us.
#[derive(Debug)]
pub struct ClusterMembership {
    my_ip: IpAddr,
    peers: HashMap<IpAddr, PeerInfo>,
}

impl ClusterMembership {
    pub fn new(my_ip: IpAddr) -> Self {
        Self { my_ip, peers: HashMap::new() }
    }

    pub fn my_ip(&self) -> IpAddr {
        self.my_ip
    }

    pub fn on_peer_up(&mut self, peer_ip: IpAddr, node_name: impl Into<String>) -> MembershipAction {
        self.peers.insert(peer_ip, PeerInfo { node_name: node_name.into(), up: true });
        if peer_ip < self.my_ip {
            MembershipAction::Connect(peer_ip)
        } else {
            MembershipAction::AwaitIncoming
        }
    }

    pub fn on_peer_down(&mut self, peer_ip: IpAddr) {
        if let Some(peer) = self.peers.get_mut(&peer_ip) {
            peer.up = false;
        }
    }

    pub fn peer(&self, peer_ip: IpAddr) -> Option<&PeerInfo> {
        self.peers.get(&peer_ip)
    }

    pub fn up_peers(&self) -> impl Iterator<Item = (&IpAddr, &PeerInfo)> {
        self.peers.iter().filter(|(_, p)| p.up)
    }

    /// Build the `PRINBEE_CURRENT_STATUS` message to broadcast on our own
    /// readiness change.
    pub fn status_broadcast(&self, node_name: &str, up: bool) -> BusMessage {
        BusMessage::new(BusMessageName::PrinbeeCurrentStatus)
            .with("status", if up { "up" } else { "down" })
            .with("node_ip", self.my_ip.to_string())
            .with("node_name", node_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readiness_opens_only_when_all_gates_hold() {
        let mut gate = ReadinessGate::new();
        gate.fluid_settings_ready = true;
        gate.ipwall_up = true;
        gate.clock_stable = true;
        gate.lock_ready = true;
        assert!(!gate.poll_opened());
        gate.address_valid = true;
        assert!(gate.poll_opened());
        assert!(gate.is_open());
    }

    #[test]
    fn readiness_stays_open_through_transient_gate_loss() {
        let mut gate = ReadinessGate {
            fluid_settings_ready: true,
            ipwall_up: true,
            clock_stable: true,
            lock_ready: true,
            address_valid: true,
            ..ReadinessGate::new()
        };
        assert!(gate.poll_opened());
        gate.clock_stable = false;
        assert!(gate.is_open(), "losing a gate after opening must not re-close it");
    }

    #[test]
    fn lower_ip_initiates_the_connection() {
        let mut membership = ClusterMembership::new("10.0.0.5".parse().unwrap());
        let action = membership.on_peer_up("10.0.0.2".parse().unwrap(), "node-a");
        assert_eq!(action, MembershipAction::Connect("10.0.0.2".parse().unwrap()));

        let action = membership.on_peer_up("10.0.0.9".parse().unwrap(), "node-b");
        assert_eq!(action, MembershipAction::AwaitIncoming);
    }

    #[test]
    fn full_mesh_rule_is_never_symmetric() {
        let a_ip: IpAddr = "10.0.0.2".parse().unwrap();
        let b_ip: IpAddr = "10.0.0.9".parse().unwrap();
        let mut a = ClusterMembership::new(a_ip);
        let mut b = ClusterMembership::new(b_ip);
        let a_action = a.on_peer_up(b_ip, "b");
        let b_action = b.on_peer_up(a_ip, "a");
        // exactly one side initiates
        let a_connects = matches!(a_action, MembershipAction::Connect(_));
        let b_connects = matches!(b_action, MembershipAction::Connect(_));
        assert!(a_connects ^ b_connects);
    }
}
