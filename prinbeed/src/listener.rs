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

//! The three listener kinds (node/proxy/direct) and the per-connection
//! task each accepted (or initiated) socket runs under. Each connection
//! task owns its socket exclusively; it drives the REG handshake inline,
//! replies to `PING`/`PONG` without leaving the event loop, and hands
//! every other message to the worker pool's FIFO as a [`Payload`].
//!
//! Modeled on the accept-loop/per-connection-task split of
//! `server/src/dbnet.rs`, generalized to three listener kinds and to the
//! REG/PING liveness machinery spec.md §4.2/§4.3 describe.

use crate::payload::{ConnectionKind, OutboundEvent, Payload, PeerHandle};
use crate::state::DaemonState;
use prinbee_core::connection::{ConnectionRef, ConnectionType};
use prinbee_core::protocol::{
    encode_frame, handshake_reply, validate_handshake, FrameReader, FrameReaderState, MessageHeader, MessageName,
    RegRequest, HANDSHAKE_TIMEOUT, PROTOCOL_VERSION_MAJOR, REG_BODY_LEN,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

fn next_connection_id() -> u64 {
    NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed)
}

fn connection_type(kind: ConnectionKind) -> ConnectionType {
    match kind {
        ConnectionKind::Node => ConnectionType::Node,
        ConnectionKind::Proxy => ConnectionType::Proxy,
        ConnectionKind::Direct => ConnectionType::Direct,
    }
}

/// Run one listener (node, proxy, or direct) until the provided
/// cancellation signal fires. Each accepted connection gets its own task;
/// the listener itself never touches the worker FIFO.
pub async fn run_listener(
    kind: ConnectionKind,
    addr: SocketAddr,
    state: Arc<DaemonState>,
    payload_tx: mpsc::Sender<Payload>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    log::info!("{kind:?} listener bound on {addr}");
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, remote) = accepted?;
                let state = state.clone();
                let payload_tx = payload_tx.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(kind, stream, remote, state, payload_tx, true).await {
                        log::debug!("{kind:?} connection {remote} ended: {e}");
                    }
                });
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    log::info!("{kind:?} listener on {addr} stopping");
                    return Ok(());
                }
            }
        }
    }
}

/// Dial out to a peer node (the full-mesh rule's "lower IP initiates" side)
/// and run it through the same connection machinery as an accepted socket.
pub async fn connect_to_peer(
    addr: SocketAddr,
    state: Arc<DaemonState>,
    payload_tx: mpsc::Sender<Payload>,
) -> std::io::Result<()> {
    let stream = TcpStream::connect(addr).await?;
    handle_connection(ConnectionKind::Node, stream, addr, state, payload_tx, false).await
}

async fn handle_connection(
    kind: ConnectionKind,
    mut stream: TcpStream,
    remote: SocketAddr,
    state: Arc<DaemonState>,
    payload_tx: mpsc::Sender<Payload>,
    inbound: bool,
) -> std::io::Result<()> {
    let connection_id = next_connection_id();
    let mut conn_ref = ConnectionRef::new(connection_id, connection_type(kind), remote);

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<OutboundEvent>();
    let peer = PeerHandle::new(connection_id, kind, remote, outbound_tx.clone());

    if inbound {
        // accepting side: wait (bounded by the handshake timeout) for the
        // initiator's REG, validate it, and reply ACK/ERR.
        if let Err(e) = run_inbound_handshake(&mut stream, &mut conn_ref).await {
            log::debug!("handshake with {remote} failed: {e}");
            return Ok(());
        }
    } else {
        // initiating side: send our own REG and wait for the ACK/ERR.
        if let Err(e) = run_outbound_handshake(&mut stream, &mut conn_ref).await {
            log::debug!("handshake to {remote} failed: {e}");
            return Ok(());
        }
    }
    if matches!(kind, ConnectionKind::Node) {
        state.node_peers.lock().insert(connection_id, peer.clone());
    }

    let mut frame_reader = FrameReader::new();
    let mut read_buf = [0u8; 8192];
    let ping_interval = state.config.ping_pong_interval;
    let mut ping_timer = tokio::time::interval(ping_interval);
    let mut ping_serial: u32 = 0;

    let result = loop {
        tokio::select! {
            read = stream.read(&mut read_buf) => {
                let n = match read {
                    Ok(0) => break Ok(()),
                    Ok(n) => n,
                    Err(e) => break Err(e),
                };
                frame_reader.feed(&read_buf[..n]);
                loop {
                    match frame_reader.poll() {
                        FrameReaderState::NeedMore => break,
                        FrameReaderState::Resynced { skipped } => {
                            log::warn!("resynchronized past {skipped} garbage bytes from {remote}");
                            continue;
                        }
                        FrameReaderState::Frame(header, body) => {
                            let name = MessageName::from_u32(header.name);
                            match name {
                                MessageName::Pong => { conn_ref.record_pong(header.serial); }
                                _ => {
                                    let payload = Payload::new(peer.clone(), header, body);
                                    if payload_tx.send(payload).await.is_err() {
                                        break;
                                    }
                                }
                            }
                        }
                    }
                }
            }
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(OutboundEvent::Frame(header, body)) => {
                        let bytes = encode_frame(header, &body);
                        if let Err(e) = stream.write_all(&bytes).await {
                            break Err(e);
                        }
                    }
                    Some(OutboundEvent::Close) | None => break Ok(()),
                }
            }
            _ = ping_timer.tick() => {
                ping_serial = ping_serial.wrapping_add(1);
                conn_ref.record_ping_sent(ping_serial);
                let header = MessageHeader::new(MessageName::Ping.as_u32(), ping_serial, 0, 0);
                let bytes = encode_frame(header, &[]);
                if let Err(e) = stream.write_all(&bytes).await {
                    break Err(e);
                }
                if conn_ref.is_dead() {
                    log::warn!("connection {remote} missed {} consecutive PONGs, dropping", prinbee_core::protocol::MAX_PING_PONG_FAILURES);
                    break Ok(());
                }
            }
        }
    };

    state.node_peers.lock().remove(&connection_id);
    result
}

async fn run_inbound_handshake(stream: &mut TcpStream, conn_ref: &mut ConnectionRef) -> std::io::Result<()> {
    let deadline = tokio::time::Instant::now() + HANDSHAKE_TIMEOUT;
    let mut frame_reader = FrameReader::new();
    let mut buf = [0u8; 512];
    let (header, body) = loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            return Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "handshake timeout"));
        }
        let n = match tokio::time::timeout(remaining, stream.read(&mut buf)).await {
            Ok(result) => result?,
            Err(_) => return Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "handshake timeout")),
        };
        if n == 0 {
            return Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "peer closed before REG"));
        }
        frame_reader.feed(&buf[..n]);
        match frame_reader.poll() {
            FrameReaderState::Frame(h, b) if MessageName::from_u32(h.name) == MessageName::Reg => break (h, b),
            FrameReaderState::Frame(..) => {
                return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "expected REG first"));
            }
            _ => continue,
        }
    };

    let req = RegRequest::from_bytes(&body)
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidData, "malformed REG body"))?;
    let local_now_ms = now_ms();
    let result = validate_handshake(&req, local_now_ms);
    let reply = handshake_reply(header.serial, result);
    match reply {
        prinbee_core::protocol::HandshakeReply::Ack { serial } => {
            let reply_header = MessageHeader::new(MessageName::Ack.as_u32(), serial, 0, 0);
            stream.write_all(&encode_frame(reply_header, &[])).await?;
            conn_ref.complete_handshake(req.protocol_version);
            Ok(())
        }
        prinbee_core::protocol::HandshakeReply::Err { serial, error } => {
            let msg = error.to_string();
            let reply_header = MessageHeader::new(MessageName::Err.as_u32(), serial, 0, msg.len() as u32);
            let _ = stream.write_all(&encode_frame(reply_header, msg.as_bytes())).await;
            Err(std::io::Error::new(std::io::ErrorKind::InvalidData, msg))
        }
    }
}

async fn run_outbound_handshake(stream: &mut TcpStream, conn_ref: &mut ConnectionRef) -> std::io::Result<()> {
    let req = RegRequest { name: 0, protocol_version: PROTOCOL_VERSION_MAJOR, now_ms: now_ms() };
    let body = req.to_bytes();
    debug_assert_eq!(body.len(), REG_BODY_LEN);
    let header = MessageHeader::new(MessageName::Reg.as_u32(), 0, 0, body.len() as u32);
    stream.write_all(&encode_frame(header, &body)).await?;

    let deadline = tokio::time::Instant::now() + HANDSHAKE_TIMEOUT;
    let mut frame_reader = FrameReader::new();
    let mut buf = [0u8; 512];
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            return Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "handshake timeout"));
        }
        let n = match tokio::time::timeout(remaining, stream.read(&mut buf)).await {
            Ok(result) => result?,
            Err(_) => return Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "handshake timeout")),
        };
        if n == 0 {
            return Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "peer closed before handshake reply"));
        }
        frame_reader.feed(&buf[..n]);
        match frame_reader.poll() {
            FrameReaderState::Frame(h, _) if MessageName::from_u32(h.name) == MessageName::Ack => {
                conn_ref.complete_handshake(PROTOCOL_VERSION_MAJOR);
                return Ok(());
            }
            FrameReaderState::Frame(h, b) if MessageName::from_u32(h.name) == MessageName::Err => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    String::from_utf8_lossy(&b).to_string(),
                ));
            }
            FrameReaderState::Frame(..) => continue,
            _ => continue,
        }
    }
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
