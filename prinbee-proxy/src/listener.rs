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

//! The client-facing listener and the outbound daemon connections, modeled
//! on `prinbeed`'s connection-task split but specialized to spec.md
//! §4.4: no worker pool, `REG`/`PING` handled inline, and anything else
//! journaled and handed off to [`crate::dispatch`].

use crate::dispatch;
use crate::payload::{OutboundEvent, PeerHandle};
use crate::state::{ClientSlot, ProxyState};
use parking_lot::Mutex;
use prinbee_core::connection::{ConnectionRef, ConnectionType};
use prinbee_core::protocol::{
    encode_frame, handshake_reply, validate_handshake, FrameReader, FrameReaderState, MessageHeader, MessageName,
    RegRequest, HandshakeReply, HANDSHAKE_TIMEOUT, PROTOCOL_VERSION_MAJOR, REG_BODY_LEN,
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

pub async fn run_client_listener(
    addr: SocketAddr,
    state: Arc<ProxyState>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    log::info!("client listener bound on {addr}");
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, remote) = accepted?;
                let state = state.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_client_connection(stream, remote, state).await {
                        log::debug!("client connection {remote} ended: {e}");
                    }
                });
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    log::info!("client listener on {addr} stopping");
                    return Ok(());
                }
            }
        }
    }
}

/// Dial out to one configured daemon and keep reconnecting (with a fixed
/// backoff) for the lifetime of the process, so the daemon-connection map
/// spec.md §4.4 describes stays populated across transient daemon
/// restarts.
pub async fn maintain_daemon_connection(
    addr: SocketAddr,
    state: Arc<ProxyState>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                if let Err(e) = handle_daemon_connection(stream, addr, state.clone()).await {
                    log::warn!("daemon connection {addr} ended: {e}");
                }
            }
            Err(e) => log::warn!("failed to connect to daemon {addr}: {e}"),
        }
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(2)) => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
        }
    }
}

async fn handle_client_connection(mut stream: TcpStream, remote: SocketAddr, state: Arc<ProxyState>) -> std::io::Result<()> {
    let connection_id = next_connection_id();
    let conn_ref = Arc::new(Mutex::new(ConnectionRef::new(connection_id, ConnectionType::Direct, remote)));

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<OutboundEvent>();
    let peer = PeerHandle::new(connection_id, remote, outbound_tx);

    state.client_peers.lock().insert(connection_id, ClientSlot { peer: peer.clone(), conn_ref: conn_ref.clone() });

    let result = run_client_frame_loop(&mut stream, remote, &state, &peer, &conn_ref, &mut outbound_rx).await;

    state.client_peers.lock().remove(&connection_id);
    result
}

async fn run_client_frame_loop(
    stream: &mut TcpStream,
    remote: SocketAddr,
    state: &Arc<ProxyState>,
    peer: &PeerHandle,
    conn_ref: &Arc<Mutex<ConnectionRef>>,
    outbound_rx: &mut mpsc::UnboundedReceiver<OutboundEvent>,
) -> std::io::Result<()> {
    let mut frame_reader = FrameReader::new();
    let mut read_buf = [0u8; 8192];

    loop {
        tokio::select! {
            read = stream.read(&mut read_buf) => {
                let n = match read {
                    Ok(0) => return Ok(()),
                    Ok(n) => n,
                    Err(e) => return Err(e),
                };
                frame_reader.feed(&read_buf[..n]);
                loop {
                    match frame_reader.poll() {
                        FrameReaderState::NeedMore => break,
                        FrameReaderState::Resynced { skipped } => {
                            log::warn!("resynchronized past {skipped} garbage bytes from client {remote}");
                            continue;
                        }
                        FrameReaderState::Frame(header, body) => {
                            handle_client_frame(state, peer, conn_ref, stream, header, body).await?;
                        }
                    }
                }
            }
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(OutboundEvent::Frame(header, body)) => {
                        stream.write_all(&encode_frame(header, &body)).await?;
                    }
                    Some(OutboundEvent::Close) | None => return Ok(()),
                }
            }
        }
    }
}

async fn handle_client_frame(
    state: &Arc<ProxyState>,
    peer: &PeerHandle,
    conn_ref: &Arc<Mutex<ConnectionRef>>,
    stream: &mut TcpStream,
    header: MessageHeader,
    body: Vec<u8>,
) -> std::io::Result<()> {
    match MessageName::from_u32(header.name) {
        MessageName::Reg => {
            let req = match RegRequest::from_bytes(&body) {
                Some(r) => r,
                None => {
                    let reply = MessageHeader::new(MessageName::Err.as_u32(), header.serial, 0, 0);
                    stream.write_all(&encode_frame(reply, &[])).await?;
                    return Ok(());
                }
            };
            let local_now_ms = now_ms();
            let result = validate_handshake(&req, local_now_ms);
            match handshake_reply(header.serial, result) {
                HandshakeReply::Ack { serial } => {
                    conn_ref.lock().complete_handshake(req.protocol_version);
                    let reply = MessageHeader::new(MessageName::Ack.as_u32(), serial, 0, 0);
                    stream.write_all(&encode_frame(reply, &[])).await?;
                }
                HandshakeReply::Err { serial, error } => {
                    let msg = error.to_string();
                    let reply = MessageHeader::new(MessageName::Err.as_u32(), serial, 0, msg.len() as u32);
                    stream.write_all(&encode_frame(reply, msg.as_bytes())).await?;
                }
            }
        }
        MessageName::Ping => {
            let reply = MessageHeader::new(MessageName::Pong.as_u32(), header.serial, 0, 0);
            stream.write_all(&encode_frame(reply, &[])).await?;
        }
        _ => dispatch::forward_to_daemon(state, peer, header, body),
    }
    Ok(())
}

async fn handle_daemon_connection(mut stream: TcpStream, remote: SocketAddr, state: Arc<ProxyState>) -> std::io::Result<()> {
    let connection_id = next_connection_id();
    let mut conn_ref = ConnectionRef::new(connection_id, ConnectionType::Node, remote);

    let req = RegRequest { name: 0, protocol_version: PROTOCOL_VERSION_MAJOR, now_ms: now_ms() };
    let body = req.to_bytes();
    debug_assert_eq!(body.len(), REG_BODY_LEN);
    let header = MessageHeader::new(MessageName::Reg.as_u32(), 0, 0, body.len() as u32);
    stream.write_all(&encode_frame(header, &body)).await?;
    await_handshake_ack(&mut stream, &mut conn_ref).await?;

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<OutboundEvent>();
    let peer = PeerHandle::new(connection_id, remote, outbound_tx);
    state.daemon_peers.lock().insert(connection_id, peer);

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
                            log::warn!("resynchronized past {skipped} garbage bytes from daemon {remote}");
                            continue;
                        }
                        FrameReaderState::Frame(header, body) => {
                            match MessageName::from_u32(header.name) {
                                MessageName::Pong => { conn_ref.record_pong(header.serial); }
                                MessageName::Ack | MessageName::Err => dispatch::handle_daemon_reply(&state, header, body),
                                _ => log::debug!("unexpected message {} from daemon {remote}", header.name),
                            }
                        }
                    }
                }
            }
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(OutboundEvent::Frame(header, body)) => {
                        if let Err(e) = stream.write_all(&encode_frame(header, &body)).await {
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
                if let Err(e) = stream.write_all(&encode_frame(header, &[])).await {
                    break Err(e);
                }
                if conn_ref.is_dead() {
                    log::warn!("daemon connection {remote} missed {} consecutive PONGs, dropping", prinbee_core::protocol::MAX_PING_PONG_FAILURES);
                    break Ok(());
                }
            }
        }
    };

    state.daemon_peers.lock().remove(&connection_id);
    result
}

async fn await_handshake_ack(stream: &mut TcpStream, conn_ref: &mut ConnectionRef) -> std::io::Result<()> {
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
            return Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "daemon closed before handshake reply"));
        }
        frame_reader.feed(&buf[..n]);
        match frame_reader.poll() {
            FrameReaderState::Frame(h, _) if MessageName::from_u32(h.name) == MessageName::Ack => {
                conn_ref.complete_handshake(PROTOCOL_VERSION_MAJOR);
                return Ok(());
            }
            FrameReaderState::Frame(h, b) if MessageName::from_u32(h.name) == MessageName::Err => {
                return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, String::from_utf8_lossy(&b).to_string()));
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
