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

//! # The wire protocol
//!
//! Everything on the wire is little-endian. A request frame is a `u32` size
//! followed by that many bytes of body; the body is a `u16` opcode followed
//! by zero or more `(u32 length, bytes)` arguments. How many arguments an
//! opcode takes is the dispatcher's business -- the parser only splits the
//! body. A reply frame is a `u32` size, a `u8` reply code and a
//! code-dependent payload (see [`responses`])

pub mod responses;
#[cfg(test)]
mod tests;

use bytes::Bytes;

/// Request frames below this are impossible: the opcode alone is two bytes
pub const MIN_REQUEST_SIZE: usize = 2;
/// The size prefix on every frame, request and reply alike
pub const SIZE_PREFIX_LEN: usize = 4;

/// The opcodes of the wire protocol. The multi-key ops mirror their
/// single-key counterparts, addressing every key under a prefix
pub mod opcode {
    pub const SET: u16 = 0x01;
    pub const TTL: u16 = 0x02;
    pub const GET: u16 = 0x03;
    pub const DEL: u16 = 0x04;
    pub const INC: u16 = 0x05;
    pub const DEC: u16 = 0x06;
    pub const LOCK: u16 = 0x07;
    pub const UNLOCK: u16 = 0x08;
    pub const MSET: u16 = 0x09;
    pub const MTTL: u16 = 0x0a;
    pub const MGET: u16 = 0x0b;
    pub const MDEL: u16 = 0x0c;
    pub const MINC: u16 = 0x0d;
    pub const MDEC: u16 = 0x0e;
    pub const MLOCK: u16 = 0x0f;
    pub const MUNLOCK: u16 = 0x10;
    pub const COUNT: u16 = 0x11;
    pub const STATS: u16 = 0x12;
    pub const PING: u16 = 0x13;
    pub const META: u16 = 0x14;
    pub const KEYS: u16 = 0x15;
    pub const TIME: u16 = 0x16;
    pub const END: u16 = 0xff;
}

#[derive(Debug, PartialEq, Eq)]
/// Parsing failures. Every variant is fatal to the connection: the frame
/// size already told us exactly how many bytes the body has, so there is
/// no "wait for more data" case
pub enum ParseError {
    /// An argument length field ran past the end of the body
    NotEnough,
    /// The body carried bytes that no argument accounted for
    TrailingBytes,
}

pub type ParseResult<T> = Result<T, ParseError>;

#[derive(Debug, PartialEq)]
/// A parsed request: the opcode and its raw argument blobs. Arguments are
/// zero-copy slices into the request body
pub struct Query {
    opcode: u16,
    args: Vec<Bytes>,
}

impl Query {
    pub const fn opcode(&self) -> u16 {
        self.opcode
    }
    pub fn arg_count(&self) -> usize {
        self.args.len()
    }
    pub fn into_args(self) -> Vec<Bytes> {
        self.args
    }
}

/// A cursor over a request body. The cursor is always at the next byte to
/// be read
pub struct Parser {
    body: Bytes,
    cursor: usize,
}

impl Parser {
    /// Split a complete request body into a [`Query`]
    pub fn parse(body: Bytes) -> ParseResult<Query> {
        let mut slf = Parser { body, cursor: 0 };
        let opcode = slf.read_u16()?;
        let mut args = Vec::new();
        while !slf.exhausted() {
            let len = slf.read_u32()? as usize;
            args.push(slf.read_blob(len)?);
        }
        Ok(Query { opcode, args })
    }
    fn remaining(&self) -> usize {
        self.body.len() - self.cursor
    }
    fn exhausted(&self) -> bool {
        self.cursor >= self.body.len()
    }
    fn read_u16(&mut self) -> ParseResult<u16> {
        if self.remaining() < 2 {
            return Err(ParseError::NotEnough);
        }
        let raw = [self.body[self.cursor], self.body[self.cursor + 1]];
        self.cursor += 2;
        Ok(u16::from_le_bytes(raw))
    }
    fn read_u32(&mut self) -> ParseResult<u32> {
        if self.remaining() < 4 {
            // a partial length field is a frame that lied about its size
            return Err(ParseError::TrailingBytes);
        }
        let raw = [
            self.body[self.cursor],
            self.body[self.cursor + 1],
            self.body[self.cursor + 2],
            self.body[self.cursor + 3],
        ];
        self.cursor += 4;
        Ok(u32::from_le_bytes(raw))
    }
    fn read_blob(&mut self, len: usize) -> ParseResult<Bytes> {
        if self.remaining() < len {
            return Err(ParseError::NotEnough);
        }
        let blob = self.body.slice(self.cursor..self.cursor + len);
        self.cursor += len;
        Ok(blob)
    }
}

#[cfg(test)]
/// Assemble a complete request frame (size prefix included). The inverse of
/// [`Parser::parse`]; test clients speak through this
pub fn encode_query(opcode: u16, args: &[&[u8]]) -> Vec<u8> {
    let body_len = 2 + args.iter().map(|a| 4 + a.len()).sum::<usize>();
    let mut frame = Vec::with_capacity(SIZE_PREFIX_LEN + body_len);
    frame.extend_from_slice(&(body_len as u32).to_le_bytes());
    frame.extend_from_slice(&opcode.to_le_bytes());
    for arg in args {
        frame.extend_from_slice(&(arg.len() as u32).to_le_bytes());
        frame.extend_from_slice(arg);
    }
    frame
}
