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

//! A single blocking, request/response connection to a proxy (or, for
//! testing/direct use, a daemon's direct listener). `prinsh` issues one
//! command at a time and waits for its correlated reply, so unlike the
//! daemon/proxy's event-loop-plus-worker-pool model this client needs
//! nothing fancier than a socket and a serial counter.

use crate::error::{Error, ShellResult};
use prinbee_core::protocol::{
    encode_frame, FrameReader, FrameReaderState, MessageHeader, MessageName, RegRequest,
    HANDSHAKE_CLOCK_SKEW_MS, PROTOCOL_VERSION_MAJOR, REG_BODY_LEN,
};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn now_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as i64
}

/// One correlated reply: either the server's `ACK` body, or its `ERR`
/// message surfaced as [`Error::Remote`].
pub struct Reply {
    pub header: MessageHeader,
    pub body: Vec<u8>,
}

pub struct Client {
    stream: TcpStream,
    reader: FrameReader,
    next_serial: u32,
}

impl Client {
    /// Connect and perform the `REG` handshake (spec.md §4.2): send our own
    /// `REG`, then require an `ACK` echoing its serial before this client is
    /// usable for anything else.
    pub fn connect(endpoint: SocketAddr, node_name_tag: u32, timeout: Duration) -> ShellResult<Self> {
        let stream = TcpStream::connect(endpoint)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;
        let mut client = Self { stream, reader: FrameReader::new(), next_serial: 1 };

        let reg = RegRequest { name: node_name_tag, protocol_version: PROTOCOL_VERSION_MAJOR, now_ms: now_ms() };
        let serial = client.take_serial();
        let header = MessageHeader::new(MessageName::Reg.as_u32(), serial, 0, REG_BODY_LEN as u32);
        client.write_frame(header, &reg.to_bytes())?;

        let reply = client.read_frame()?;
        match MessageName::from_u32(reply.header.name) {
            MessageName::Ack => Ok(client),
            MessageName::Err => Err(Error::Remote(String::from_utf8_lossy(&reply.body).into_owned())),
            other => Err(Error::Protocol(format!("unexpected reply to REG: {other:?}"))),
        }
    }

    fn take_serial(&mut self) -> u32 {
        let s = self.next_serial;
        self.next_serial = self.next_serial.wrapping_add(1).max(1);
        s
    }

    fn write_frame(&mut self, header: MessageHeader, body: &[u8]) -> ShellResult<()> {
        let bytes = encode_frame(header, body);
        self.stream.write_all(&bytes)?;
        Ok(())
    }

    fn read_frame(&mut self) -> ShellResult<Reply> {
        let mut buf = [0u8; 4096];
        loop {
            match self.reader.poll() {
                FrameReaderState::Frame(header, body) => return Ok(Reply { header, body }),
                FrameReaderState::Resynced { .. } => continue,
                FrameReaderState::NeedMore => {
                    let n = self.stream.read(&mut buf)?;
                    if n == 0 {
                        return Err(Error::Protocol("connection closed by peer".into()));
                    }
                    self.reader.feed(&buf[..n]);
                }
            }
        }
    }

    /// Send `name` with `body` under a fresh serial and return once the
    /// correlated reply (`ACK` or `ERR`) arrives. `ERR` surfaces as
    /// [`Error::Remote`] carrying the server's message verbatim.
    pub fn request(&mut self, name: MessageName, body: Vec<u8>) -> ShellResult<Vec<u8>> {
        let serial = self.take_serial();
        let header = MessageHeader::new(name.as_u32(), serial, 0, body.len() as u32);
        self.write_frame(header, &body)?;
        loop {
            let reply = self.read_frame()?;
            if reply.header.serial != serial {
                // a liveness PING from the peer, or a stale reply; ignore
                // and keep waiting for ours.
                if MessageName::from_u32(reply.header.name) == MessageName::Ping {
                    let pong = MessageHeader::new(MessageName::Pong.as_u32(), reply.header.serial, 0, 0);
                    self.write_frame(pong, &[])?;
                }
                continue;
            }
            return match MessageName::from_u32(reply.header.name) {
                MessageName::Ack => Ok(reply.body),
                MessageName::Err => Err(Error::Remote(String::from_utf8_lossy(&reply.body).into_owned())),
                other => Err(Error::Protocol(format!("unexpected reply: {other:?}"))),
            };
        }
    }

    pub fn list_contexts(&mut self) -> ShellResult<Vec<String>> {
        let body = self.request(MessageName::ListContexts, Vec::new())?;
        if body.is_empty() {
            return Ok(Vec::new());
        }
        Ok(String::from_utf8_lossy(&body).split('\n').map(str::to_string).collect())
    }

    pub fn get_context(&mut self, name: &str) -> ShellResult<String> {
        let body = self.request(MessageName::GetContext, name.as_bytes().to_vec())?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set_context(
        &mut self,
        name: &str,
        owner: &str,
        group: Option<&str>,
        description: &str,
        schema_version: u32,
    ) -> ShellResult<()> {
        let body = format!("{name}\t{owner}\t{}\t{description}\t{schema_version}", group.unwrap_or(""));
        self.request(MessageName::SetContext, body.into_bytes())?;
        Ok(())
    }

    fn sync_tagged(&mut self, tag: &str) -> ShellResult<()> {
        self.request(MessageName::Sync, tag.as_bytes().to_vec())?;
        Ok(())
    }

    /// `begin-work`/`commit-work`/`rollback` have no dedicated entry in the
    /// closed message-name vocabulary (spec.md §4.2 lists only
    /// `REG, ACK, ERR, PING, PONG, LIST_CONTEXTS, GET_CONTEXT, SET_CONTEXT,
    /// SYNC`); they are carried as tagged `SYNC` bodies, the vocabulary's
    /// catch-all for "any other message" (§4.4).
    pub fn begin_work(&mut self) -> ShellResult<()> {
        self.sync_tagged("BEGIN-WORK")
    }

    pub fn commit_work(&mut self) -> ShellResult<()> {
        self.sync_tagged("COMMIT-WORK")
    }

    pub fn rollback(&mut self) -> ShellResult<()> {
        self.sync_tagged("ROLLBACK")
    }

    pub fn ping(&mut self) -> ShellResult<()> {
        let serial = self.take_serial();
        let header = MessageHeader::new(MessageName::Ping.as_u32(), serial, 0, 0);
        self.write_frame(header, &[])?;
        loop {
            let reply = self.read_frame()?;
            if reply.header.serial == serial && MessageName::from_u32(reply.header.name) == MessageName::Pong {
                return Ok(());
            }
        }
    }
}

/// Exposed for tests and for `HandshakeError`-adjacent validation the
/// shell does client-side before ever dialing out (catching an obviously
/// skewed local clock early rather than waiting on a round trip).
pub fn local_clock_within_tolerance(local_now_ms: i64, reference_now_ms: i64) -> bool {
    (local_now_ms - reference_now_ms).abs() <= HANDSHAKE_CLOCK_SKEW_MS
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read as _;
    use std::net::TcpListener;
    use std::thread;

    fn spawn_echo_server(listener: TcpListener, reply_name: MessageName, reply_body: &'static [u8]) {
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = FrameReader::new();
            let mut buf = [0u8; 4096];
            // REG handshake
            loop {
                let n = stream.read(&mut buf).unwrap();
                reader.feed(&buf[..n]);
                if let FrameReaderState::Frame(header, _) = reader.poll() {
                    let ack = MessageHeader::new(MessageName::Ack.as_u32(), header.serial, 0, 0);
                    stream.write_all(&encode_frame(ack, &[])).unwrap();
                    break;
                }
            }
            // one request/response
            loop {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    return;
                }
                reader.feed(&buf[..n]);
                if let FrameReaderState::Frame(header, _) = reader.poll() {
                    let reply = MessageHeader::new(reply_name.as_u32(), header.serial, 0, reply_body.len() as u32);
                    stream.write_all(&encode_frame(reply, reply_body)).unwrap();
                    return;
                }
            }
        });
    }

    #[test]
    fn handshake_then_list_contexts_round_trips() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        spawn_echo_server(listener, MessageName::Ack, b"orders\ncustomers");

        let mut client = Client::connect(addr, 0, Duration::from_secs(2)).unwrap();
        let contexts = client.list_contexts().unwrap();
        assert_eq!(contexts, vec!["orders".to_string(), "customers".to_string()]);
    }

    #[test]
    fn err_reply_surfaces_as_remote_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        spawn_echo_server(listener, MessageName::Err, b"no such context");

        let mut client = Client::connect(addr, 0, Duration::from_secs(2)).unwrap();
        let err = client.get_context("missing").unwrap_err();
        assert!(matches!(err, Error::Remote(msg) if msg == "no such context"));
    }

    #[test]
    fn clock_tolerance_helper_matches_handshake_constant() {
        assert!(local_clock_within_tolerance(1000, 1000 + HANDSHAKE_CLOCK_SKEW_MS));
        assert!(!local_clock_within_tolerance(1000, 1000 + HANDSHAKE_CLOCK_SKEW_MS + 1));
    }
}
