/*
 * Created on Thu Apr 06 2023
 *
 * This file is a part of Bramble
 * Bramble is a free and open-source in-memory cache server written by
 * Sayan Nandan ("the Author") that keeps keys in a prefix tree so that
 * entire families of keys can be read, rewritten and expired together.
 *
 * Copyright (c) 2023, Sayan Nandan <ohsayan@outlook.com>
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

use super::responses::{Encoding, KvPair, Response, ResponseTooLarge, replcode};
use super::{encode_query, opcode, ParseError, Parser};
use bytes::Bytes;

fn body_of(frame: &[u8]) -> Bytes {
    // strip the size prefix; the connection layer has already consumed it
    // by the time the parser runs
    Bytes::copy_from_slice(&frame[4..])
}

#[test]
fn test_parse_no_args() {
    let frame = encode_query(opcode::PING, &[]);
    let query = Parser::parse(body_of(&frame)).unwrap();
    assert_eq!(query.opcode(), opcode::PING);
    assert_eq!(query.arg_count(), 0);
}

#[test]
fn test_parse_args() {
    let frame = encode_query(opcode::SET, &[b"user:1", b"alice"]);
    let query = Parser::parse(body_of(&frame)).unwrap();
    assert_eq!(query.opcode(), opcode::SET);
    let args = query.into_args();
    assert_eq!(&args[0][..], b"user:1");
    assert_eq!(&args[1][..], b"alice");
}

#[test]
fn test_parse_empty_arg_is_legal() {
    let frame = encode_query(opcode::SET, &[b"k", b""]);
    let query = Parser::parse(body_of(&frame)).unwrap();
    let args = query.into_args();
    assert_eq!(args.len(), 2);
    assert!(args[1].is_empty());
}

#[test]
fn test_parse_truncated_argument() {
    let mut frame = encode_query(opcode::GET, &[b"user:1"]);
    // claim six bytes of key but only ship three
    frame.truncate(frame.len() - 3);
    assert_eq!(
        Parser::parse(body_of(&frame)).unwrap_err(),
        ParseError::NotEnough
    );
}

#[test]
fn test_parse_trailing_garbage() {
    let mut frame = encode_query(opcode::GET, &[b"user:1"]);
    frame.extend_from_slice(&[0xca, 0xfe]);
    assert_eq!(
        Parser::parse(body_of(&frame)).unwrap_err(),
        ParseError::TrailingBytes
    );
}

#[test]
fn test_parse_opcode_only_body_too_short() {
    assert_eq!(
        Parser::parse(Bytes::from_static(&[0x01])).unwrap_err(),
        ParseError::NotEnough
    );
}

#[test]
fn test_roundtrip_encode_parse_encode() {
    // encode(decode(bytes)) == bytes for any valid frame
    let cases: Vec<(u16, Vec<Vec<u8>>)> = vec![
        (opcode::PING, vec![]),
        (opcode::SET, vec![b"a:1".to_vec(), b"v".to_vec()]),
        (
            opcode::SET,
            vec![b"a:1".to_vec(), b"v".to_vec(), b"30".to_vec()],
        ),
        (opcode::MGET, vec![b"a:".to_vec()]),
        (opcode::META, vec![b"k".to_vec(), b"size".to_vec()]),
    ];
    for (opc, args) in cases {
        let arg_refs: Vec<&[u8]> = args.iter().map(|a| &a[..]).collect();
        let frame = encode_query(opc, &arg_refs);
        let query = Parser::parse(body_of(&frame)).unwrap();
        let parsed_args = query.into_args();
        let parsed_refs: Vec<&[u8]> = parsed_args.iter().map(|a| &a[..]).collect();
        assert_eq!(encode_query(opc, &parsed_refs), frame);
    }
}

#[test]
fn test_serialize_ok() {
    let frame = Response::Okay.serialize(1024).unwrap();
    assert_eq!(&frame[..], &[1, 0, 0, 0, replcode::OK]);
}

#[test]
fn test_serialize_error_codes_have_no_payload() {
    for (resp, code) in [
        (Response::Err, replcode::ERR),
        (Response::NotFound, replcode::ERR_NOT_FOUND),
        (Response::NotANumber, replcode::ERR_NAN),
        (Response::OutOfMemory, replcode::ERR_MEM),
        (Response::Locked, replcode::ERR_LOCKED),
    ] {
        let frame = resp.serialize(1024).unwrap();
        assert_eq!(&frame[..], &[1, 0, 0, 0, code]);
    }
}

#[test]
fn test_serialize_val() {
    let frame = Response::Val(Encoding::Plain, Bytes::from_static(b"alice"))
        .serialize(1024)
        .unwrap();
    let mut expected = vec![11, 0, 0, 0, replcode::VAL, 0x00, 5, 0, 0, 0];
    expected.extend_from_slice(b"alice");
    assert_eq!(&frame[..], &expected[..]);
}

#[test]
fn test_serialize_kval() {
    let frame = Response::KVal(vec![KvPair {
        key: Bytes::from_static(b"a:1"),
        encoding: Encoding::Number,
        value: Bytes::from_static(b"11"),
    }])
    .serialize(1024)
    .unwrap();
    let mut expected = vec![19, 0, 0, 0, replcode::KVAL, 1, 0, 0, 0];
    expected.extend_from_slice(&[3, 0, 0, 0]);
    expected.extend_from_slice(b"a:1");
    expected.push(0x02);
    expected.extend_from_slice(&[2, 0, 0, 0]);
    expected.extend_from_slice(b"11");
    assert_eq!(&frame[..], &expected[..]);
}

#[test]
fn test_serialize_response_bound() {
    let resp = Response::Val(Encoding::Plain, Bytes::from(vec![b'x'; 64]));
    assert_eq!(resp.serialize(16), Err(ResponseTooLarge(1 + 1 + 4 + 64)));
    assert!(resp.serialize(128).is_ok());
}

#[test]
fn test_number_response() {
    let frame = Response::number(-42).serialize(64).unwrap();
    assert_eq!(frame[4], replcode::VAL);
    assert_eq!(frame[5], Encoding::Number.to_wire());
    assert_eq!(&frame[10..], b"-42");
}
