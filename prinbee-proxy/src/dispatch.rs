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

//! Client-request routing (spec.md §4.4): anything besides `REG`/`PING` is
//! journaled in the proxy's own durable log, forwarded to an available
//! daemon under a proxy-assigned serial, and folded back to the client
//! once that daemon's `ACK`/`ERR` arrives.

use crate::payload::PeerHandle;
use crate::state::{PendingRequest, ProxyState};
use prinbee_core::journal::{AttachmentInput, EventTime, InEvent};
use prinbee_core::protocol::{MessageHeader, MessageName};
use std::sync::Arc;

fn now_event_time() -> EventTime {
    let now = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default();
    EventTime { sec: now.as_secs() as i64, nanos: now.subsec_nanos() as i64 }
}

fn err(peer: &PeerHandle, serial: u32, message: &str) {
    let header = MessageHeader::new(MessageName::Err.as_u32(), serial, 0, message.len() as u32);
    peer.send(header, message.as_bytes().to_vec());
}

/// Journal a client request, then hand it off to whichever daemon
/// [`ProxyState::pick_daemon`] selects. Replies asynchronously through
/// [`handle_daemon_reply`] once that daemon answers.
pub fn forward_to_daemon(state: &Arc<ProxyState>, client: &PeerHandle, header: MessageHeader, body: Vec<u8>) {
    let daemon = match state.pick_daemon() {
        Some(d) => d,
        None => return err(client, header.serial, "no daemon connection available"),
    };

    let request_id = format!("c{}-s{}", client.connection_id, header.serial).into_bytes();
    let event = InEvent { request_id: request_id.clone(), attachments: vec![AttachmentInput::Bytes(body.clone())] };
    if let Err(e) = state.journal.lock().add_event(event, now_event_time()) {
        return err(client, header.serial, &e.to_string());
    }

    let daemon_serial = state.next_daemon_serial();
    state.pending.lock().insert(
        daemon_serial,
        PendingRequest { client: client.clone(), client_serial: header.serial, request_id: request_id.clone() },
    );
    // best-effort: a journal write failure here is surfaced to the next
    // caller that inspects the entry's status, not to this client, since
    // the event itself is already durable.
    let _ = state.journal.lock().event_forwarded(&request_id);

    let forward_header = MessageHeader::new(header.name, daemon_serial, header.flags, body.len() as u32);
    daemon.send(forward_header, body);
}

/// A reply from a daemon connection task: look up the pending request by
/// the serial the proxy assigned it, close out the journal entry, and
/// forward the reply to the waiting client under its own original serial.
pub fn handle_daemon_reply(state: &Arc<ProxyState>, header: MessageHeader, body: Vec<u8>) {
    let name = MessageName::from_u32(header.name);
    let Some(pending) = state.pending.lock().remove(&header.serial) else {
        log::debug!("reply for unknown or already-completed request (serial {})", header.serial);
        return;
    };

    let mut journal = state.journal.lock();
    match name {
        MessageName::Ack => {
            let _ = journal.event_acknowledged(&pending.request_id);
            let _ = journal.event_completed(&pending.request_id);
        }
        MessageName::Err => {
            let _ = journal.event_failed(&pending.request_id);
        }
        _ => {}
    }
    drop(journal);

    let reply_header = MessageHeader::new(header.name, pending.client_serial, header.flags, body.len() as u32);
    pending.client.send(reply_header, body);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::payload::OutboundEvent;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[test]
    fn event_time_moves_forward() {
        let a = now_event_time();
        let b = now_event_time();
        assert!(b.sec > a.sec || (b.sec == a.sec && b.nanos >= a.nanos));
    }

    fn test_state(tag: &str) -> Arc<ProxyState> {
        let mut dir = std::env::temp_dir();
        dir.push(format!("prinbee-proxy-dispatch-test-{tag}-{:?}", std::thread::current().id()));
        let config = Config {
            client_listen: SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 0),
            daemons: vec![SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 1)],
            prinbee_path: dir,
            owner: "prinbee".into(),
            ping_pong_interval: Duration::from_secs(5),
            log_level: "info".into(),
        };
        Arc::new(ProxyState::new(config).unwrap())
    }

    #[test]
    fn forwarded_request_round_trips_to_the_waiting_client() {
        let state = test_state("roundtrip");

        let (client_tx, mut client_rx) = mpsc::unbounded_channel();
        let client = PeerHandle::new(1, SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 3001), client_tx);

        let (daemon_tx, mut daemon_rx) = mpsc::unbounded_channel();
        let daemon = PeerHandle::new(9, SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 4001), daemon_tx);
        state.daemon_peers.lock().insert(9, daemon);

        let client_header = MessageHeader::new(MessageName::Sync.as_u32(), 42, 0, 3);
        forward_to_daemon(&state, &client, client_header, b"abc".to_vec());

        let forwarded = daemon_rx.try_recv().expect("request forwarded to the daemon");
        let OutboundEvent::Frame(forwarded_header, forwarded_body) = forwarded else {
            panic!("expected a forwarded frame");
        };
        assert_eq!(forwarded_body, b"abc");
        assert_ne!(forwarded_header.serial, client_header.serial);
        assert_eq!(state.pending.lock().len(), 1);

        let ack_header = MessageHeader::new(MessageName::Ack.as_u32(), forwarded_header.serial, 0, 0);
        handle_daemon_reply(&state, ack_header, Vec::new());

        assert!(state.pending.lock().is_empty());
        let reply = client_rx.try_recv().expect("client receives the folded-back reply");
        let OutboundEvent::Frame(reply_header, _) = reply else {
            panic!("expected a reply frame");
        };
        assert_eq!(reply_header.serial, client_header.serial);
    }

    #[test]
    fn unavailable_daemon_replies_err_without_journaling() {
        let state = test_state("no-daemon");
        let (client_tx, mut client_rx) = mpsc::unbounded_channel();
        let client = PeerHandle::new(1, SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 3002), client_tx);

        let header = MessageHeader::new(MessageName::Sync.as_u32(), 7, 0, 0);
        forward_to_daemon(&state, &client, header, Vec::new());

        let reply = client_rx.try_recv().expect("client receives an ERR");
        let OutboundEvent::Frame(reply_header, _) = reply else {
            panic!("expected an ERR frame");
        };
        assert_eq!(MessageName::from_u32(reply_header.name), MessageName::Err);
    }
}
