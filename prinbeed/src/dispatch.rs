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

//! Worker-side message routing: `REG -> register_client`, `ACK ->
//! acknowledge`, `LIST_CONTEXTS`, `GET_CONTEXT`, `SET_CONTEXT`, with the
//! four-phase `SET_CONTEXT` session threaded through the shared
//! [`DaemonState`]. A handler returns whether its payload should be
//! requeued onto the FIFO for a later stage, matching the payload/stage
//! model of spec.md's worker-pool design.

use crate::payload::{ConnectionKind, Payload};
use crate::state::DaemonState;
use parking_lot::Mutex;
use prinbee_core::context::{context_lock_name, SetContextSession};
use prinbee_core::protocol::{
    encode_frame, MessageHeader, MessageName,
};
use std::sync::Arc;

/// Entry point called by a worker thread for one dequeued payload.
pub fn handle(state: &Arc<DaemonState>, payload: Payload) {
    let name = MessageName::from_u32(payload.header.name);
    match name {
        MessageName::Err => log::debug!("received ERR from {:?}", payload.peer.remote_addr),
        MessageName::Ping => reply_pong(&payload),
        MessageName::Pong => {
            // liveness bookkeeping lives in the connection task, which owns
            // the `ConnectionTable`; workers only see the payload, so
            // nothing further to do here beyond having drained the PONG.
        }
        MessageName::Reg => register_client(state, &payload),
        MessageName::Ack => acknowledge(state, payload),
        MessageName::ListContexts => list_contexts(state, &payload),
        MessageName::GetContext => get_context(state, &payload),
        MessageName::SetContext => set_context(state, payload),
        MessageName::Unknown(n) => log::warn!("unknown message name {n:#x}"),
        MessageName::Sync => {
            // SYNC is part of the closed vocabulary but carries no
            // payload-layer semantics in this spec; acknowledge it so
            // callers don't stall waiting on a reply.
            ack(&payload, 0);
        }
    }
}

fn reply_pong(payload: &Payload) {
    let header = MessageHeader::new(MessageName::Pong.as_u32(), payload.header.serial, 0, 0);
    payload.peer.send(header, Vec::new());
}

fn ack(payload: &Payload, phase: u16) {
    let header = MessageHeader::new(MessageName::Ack.as_u32(), payload.header.serial, phase, 0);
    payload.peer.send(header, Vec::new());
}

fn err(payload: &Payload, message: &str) {
    let header = MessageHeader::new(MessageName::Err.as_u32(), payload.header.serial, 0, message.len() as u32);
    payload.peer.send(header, message.as_bytes().to_vec());
}

/// `REG` from an already-accepted connection: the event loop validated the
/// handshake before ever handing this to a worker (the handshake runs
/// inline in the connection task, not on the worker FIFO, so a slow
/// worker can never stall a brand-new connection's liveness timer). By
/// the time a `REG` reaches here it's a late/duplicate REG; ACK it
/// idempotently.
fn register_client(_state: &Arc<DaemonState>, payload: &Payload) {
    ack(payload, 0);
}

fn acknowledge(state: &Arc<DaemonState>, payload: Payload) {
    // an ACK from a NODE peer during a SET_CONTEXT broadcast; find the
    // session by the serial the broadcast used and record it.
    let session = state.set_context_sessions.lock().get(&payload.header.serial).cloned();
    if let Some(session) = session {
        let done = session.lock().record_peer_ack();
        if done {
            let name = session.lock().context_name.clone();
            state.lock.release(&context_lock_name(&name));
            state.set_context_sessions.lock().remove(&payload.header.serial);
        }
    }
}

fn list_contexts(state: &Arc<DaemonState>, payload: &Payload) {
    let names: Vec<String> = state.contexts.lock().list().map(|c| c.name.clone()).collect();
    let body = names.join("\n").into_bytes();
    let header = MessageHeader::new(MessageName::Ack.as_u32(), payload.header.serial, 0, body.len() as u32);
    payload.peer.send(header, body);
}

fn get_context(state: &Arc<DaemonState>, payload: &Payload) {
    let name = String::from_utf8_lossy(&payload.body).trim().to_string();
    match state.contexts.lock().get(&name) {
        Some(ctx) => {
            let body = format!(
                "{}\t{}\t{}\t{}",
                ctx.name,
                ctx.path.display(),
                ctx.owner,
                ctx.schema_version
            )
            .into_bytes();
            let header = MessageHeader::new(MessageName::Ack.as_u32(), payload.header.serial, 0, body.len() as u32);
            payload.peer.send(header, body);
        }
        None => err(payload, &format!("no such context {name:?}")),
    }
}

/// Parsed `SET_CONTEXT` request body: `name\0owner\0group\0description\0version`
/// (tab-separated in practice; the PBQL layer that produces these fields is
/// out of scope, see spec.md §1).
struct SetContextRequest {
    name: String,
    owner: String,
    group: Option<String>,
    description: String,
    schema_version: u32,
}

fn parse_set_context(body: &[u8]) -> Option<SetContextRequest> {
    let text = std::str::from_utf8(body).ok()?;
    let mut fields = text.splitn(5, '\t');
    let name = fields.next()?.to_string();
    let owner = fields.next()?.to_string();
    let group = fields.next().filter(|s| !s.is_empty()).map(str::to_string);
    let description = fields.next()?.to_string();
    let schema_version: u32 = fields.next()?.parse().ok()?;
    Some(SetContextRequest { name, owner, group, description, schema_version })
}

/// Phase 1+2 of `SET_CONTEXT` (spec.md §4.3): reply `ACK(CONTEXT_RECEIVED)`,
/// acquire the cluster lock, then apply the schema change and reply
/// `ACK(CONTEXT_SAVED)`. Phase 3 (broadcast) is driven by the caller that
/// owns the node-peer table, since workers don't hold it directly.
fn set_context(state: &Arc<DaemonState>, payload: Payload) {
    const PHASE_CONTEXT_RECEIVED: u16 = 1;
    const PHASE_CONTEXT_SAVED: u16 = 2;

    let request = match parse_set_context(&payload.body) {
        Some(r) => r,
        None => return err(&payload, "malformed SET_CONTEXT body"),
    };
    ack(&payload, PHASE_CONTEXT_RECEIVED);

    let lock_name = context_lock_name(&request.name);
    if !state.lock.acquire(&lock_name) {
        return err(&payload, "context lock unavailable");
    }

    let mut session = SetContextSession::new(request.name.clone(), request.schema_version);
    let apply_result = {
        let mut contexts = state.contexts.lock();
        session.apply(&mut contexts, || {
            (
                state.config.prinbee_path.join(&request.name),
                request.owner.clone(),
                request.group.clone(),
                request.description.clone(),
            )
        })
    };
    if let Err(e) = apply_result {
        // spec.md §8 scenario 6: the ERR must go out before the lock is
        // released, so a racing SET_CONTEXT for the same name can't acquire
        // the lock while this rejection is still in flight.
        err(&payload, &e.to_string());
        state.lock.release(&lock_name);
        return;
    }
    ack(&payload, PHASE_CONTEXT_SAVED);

    let peers = state.node_peers.lock();
    if peers.is_empty() {
        // no peers to fan out to; release the lock now rather than wait
        // forever for zero acks.
        state.lock.release(&lock_name);
        return;
    }
    session.begin_broadcast(peers.len());
    let session = Arc::new(Mutex::new(session));

    let broadcast_header =
        MessageHeader::new(MessageName::SetContext.as_u32(), payload.header.serial, 0, payload.body.len() as u32);
    for peer in peers.values() {
        if matches!(peer.kind, ConnectionKind::Node) {
            peer.send(broadcast_header, payload.body.clone());
        }
    }
    drop(peers);
    state.set_context_sessions.lock().insert(payload.header.serial, session);
}

/// Kept for tests that want to encode a frame the way a connection task
/// would before handing bytes to the socket.
#[allow(dead_code)]
fn encode_for_test(header: MessageHeader, body: &[u8]) -> Vec<u8> {
    encode_frame(header, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::payload::{OutboundEvent, PeerHandle};
    use prinbee_core::cluster::InMemoryBus;
    use prinbee_core::context::ClusterLock;
    use std::collections::HashSet;
    use std::net::{IpAddr, Ipv4Addr};
    use std::path::PathBuf;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[test]
    fn parses_tab_separated_set_context_body() {
        let body = b"orders\talice\t\tcustomer orders\t1";
        let req = parse_set_context(body).unwrap();
        assert_eq!(req.name, "orders");
        assert_eq!(req.owner, "alice");
        assert_eq!(req.group, None);
        assert_eq!(req.schema_version, 1);
    }

    #[test]
    fn rejects_malformed_set_context_body() {
        assert!(parse_set_context(b"not-enough-fields").is_none());
    }

    fn test_config(tag: &str) -> Config {
        let mut dir = std::env::temp_dir();
        dir.push(format!("prinbeed-dispatch-test-{tag}-{:?}", std::thread::current().id()));
        Config {
            cluster_name: "test".into(),
            node_name: "node-a".into(),
            node_listen: "127.0.0.1:0".parse().unwrap(),
            proxy_listen: "127.0.0.1:0".parse().unwrap(),
            client_listen: "127.0.0.1:0".parse().unwrap(),
            prinbee_path: dir,
            owner: "prinbee".into(),
            ping_pong_interval: Duration::from_secs(5),
            workers: 2,
            log_level: "info".into(),
        }
    }

    /// A `ClusterLock` double that, on every `release`, drains whatever the
    /// peer's outbound channel has accumulated so far and records whether an
    /// `ERR` frame is already among them. Used to pin down the ordering bug
    /// spec.md §8 scenario 6 calls out: the reply must be enqueued *before*
    /// the lock is released, never after.
    struct OrderCheckingLock {
        held: StdMutex<HashSet<String>>,
        rx: StdMutex<mpsc::UnboundedReceiver<OutboundEvent>>,
        err_seen_by_release: StdMutex<Option<bool>>,
    }

    impl ClusterLock for OrderCheckingLock {
        fn is_lock_ready(&self) -> bool {
            true
        }

        fn acquire(&self, name: &str) -> bool {
            self.held.lock().unwrap().insert(name.to_string())
        }

        fn release(&self, name: &str) {
            let mut saw_err = false;
            while let Ok(event) = self.rx.lock().unwrap().try_recv() {
                if let OutboundEvent::Frame(header, _) = event {
                    saw_err |= MessageName::from_u32(header.name) == MessageName::Err;
                }
            }
            *self.err_seen_by_release.lock().unwrap() = Some(saw_err);
            self.held.lock().unwrap().remove(name);
        }
    }

    #[test]
    fn set_context_version_gap_replies_before_releasing_the_lock() {
        let config = test_config("version-gap");
        let (peer_tx, peer_rx) = mpsc::unbounded_channel();
        let peer = PeerHandle::new(1, ConnectionKind::Node, "127.0.0.1:4001".parse().unwrap(), peer_tx);

        let lock = Arc::new(OrderCheckingLock {
            held: StdMutex::new(HashSet::new()),
            rx: StdMutex::new(peer_rx),
            err_seen_by_release: StdMutex::new(None),
        });
        let bus = Arc::new(InMemoryBus::new());
        let state = Arc::new(
            DaemonState::new(config, lock.clone(), bus, IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))).unwrap(),
        );

        {
            let mut contexts = state.contexts.lock();
            contexts.create("orders", PathBuf::from("/data/orders"), "alice", None, "").unwrap();
            contexts.update("orders", 1).unwrap();
            contexts.update("orders", 2).unwrap();
            contexts.update("orders", 3).unwrap();
        }

        // current schema_version is 3 (expects 4 next); request version 5
        // is a gap, spec.md §8 scenario 6.
        let body = b"orders\talice\t\tcustomer orders\t5".to_vec();
        let header = MessageHeader::new(MessageName::SetContext.as_u32(), 10, 0, body.len() as u32);
        set_context(&state, Payload::new(peer, header, body));

        assert!(
            lock.err_seen_by_release.lock().unwrap().unwrap(),
            "the ERR reply must already be enqueued by the time the lock is released"
        );
    }
}
