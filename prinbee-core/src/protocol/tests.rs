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

//! Cross-module protocol property tests (CRC self-consistency).

use super::*;
use rand::Rng;

#[test]
fn crc_residue_holds_for_random_frames() {
    let mut rng = rand::thread_rng();
    for _ in 0..64 {
        let len: usize = rng.gen_range(0..256);
        let body: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
        let mut header = MessageHeader::new(MessageName::Sync.as_u32(), rng.gen(), 0, len as u32);
        header.seal(&body);
        assert!(header.verify(&body));
    }
}

#[test]
fn full_encode_decode_round_trip() {
    let body = b"SET_CONTEXT payload goes here".to_vec();
    let header = MessageHeader::new(MessageName::SetContext.as_u32(), 99, 0, body.len() as u32);
    let bytes = framing::encode_frame(header, &body);
    let mut reader = FrameReader::new();
    reader.feed(&bytes);
    match reader.poll() {
        FrameReaderState::Frame(h, decoded_body) => {
            assert_eq!(h.serial, 99);
            assert_eq!(MessageName::from_u32(h.name), MessageName::SetContext);
            assert_eq!(decoded_body, body);
        }
        other => panic!("unexpected {other:?}"),
    }
}
