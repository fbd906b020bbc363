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

//! Primitives for assembling reply frames
//!
//! A reply is `u32 size | u8 code | payload` where `size` counts the code
//! byte and the payload. Error replies carry no payload: the code *is* the
//! error

use bytes::{BufMut, Bytes, BytesMut};

/// Reply codes
pub mod replcode {
    /// Generic failure (bad argument, bounds violation, internal trouble)
    pub const ERR: u8 = 0x00;
    /// The key was not found
    pub const ERR_NOT_FOUND: u8 = 0x01;
    /// The value is not a number
    pub const ERR_NAN: u8 = 0x02;
    /// The memory budget is exhausted
    pub const ERR_MEM: u8 = 0x03;
    /// The key is locked against writes
    pub const ERR_LOCKED: u8 = 0x04;
    /// Done, nothing to return
    pub const OK: u8 = 0x05;
    /// A single value follows
    pub const VAL: u8 = 0x06;
    /// A list of key/value pairs follows
    pub const KVAL: u8 = 0x07;
}

/// A pre-serialized generic error frame for when even reply assembly has
/// failed us: size=1, code=ERR
pub const RAW_ERR_FRAME: [u8; 5] = [1, 0, 0, 0, replcode::ERR];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// How a value's bytes are to be interpreted. `Lzf` never appears on the
/// wire in replies -- compressed items are materialized before shipping
pub enum Encoding {
    Plain,
    Lzf,
    Number,
}

impl Encoding {
    pub const fn to_wire(self) -> u8 {
        match self {
            Encoding::Plain => 0x00,
            Encoding::Lzf => 0x01,
            Encoding::Number => 0x02,
        }
    }
}

#[derive(Debug, PartialEq)]
/// One key/value pair of a [`Response::KVal`] reply
pub struct KvPair {
    pub key: Bytes,
    pub encoding: Encoding,
    pub value: Bytes,
}

#[derive(Debug, PartialEq)]
/// Everything the server can say back
pub enum Response {
    Okay,
    Err,
    NotFound,
    NotANumber,
    OutOfMemory,
    Locked,
    Val(Encoding, Bytes),
    KVal(Vec<KvPair>),
}

/// The serialized form would have exceeded `max_response_size`; carries the
/// offending size
#[derive(Debug, PartialEq)]
pub struct ResponseTooLarge(pub usize);

impl Response {
    /// Shorthand for the numeric replies (counts, increments, timestamps)
    pub fn number(n: i64) -> Response {
        Response::Val(Encoding::Number, Bytes::from(n.to_string()))
    }
    pub const fn code(&self) -> u8 {
        match self {
            Response::Okay => replcode::OK,
            Response::Err => replcode::ERR,
            Response::NotFound => replcode::ERR_NOT_FOUND,
            Response::NotANumber => replcode::ERR_NAN,
            Response::OutOfMemory => replcode::ERR_MEM,
            Response::Locked => replcode::ERR_LOCKED,
            Response::Val(_, _) => replcode::VAL,
            Response::KVal(_) => replcode::KVAL,
        }
    }
    fn payload_len(&self) -> usize {
        match self {
            Response::Val(_, data) => 1 + 4 + data.len(),
            Response::KVal(pairs) => {
                4 + pairs
                    .iter()
                    .map(|p| 4 + p.key.len() + 1 + 4 + p.value.len())
                    .sum::<usize>()
            }
            _ => 0,
        }
    }
    /// Assemble the complete reply frame, size prefix included
    pub fn serialize(&self, max_response_size: usize) -> Result<Bytes, ResponseTooLarge> {
        let size = 1 + self.payload_len();
        if size > max_response_size {
            return Err(ResponseTooLarge(size));
        }
        let mut frame = BytesMut::with_capacity(4 + size);
        frame.put_u32_le(size as u32);
        frame.put_u8(self.code());
        match self {
            Response::Val(encoding, data) => {
                frame.put_u8(encoding.to_wire());
                frame.put_u32_le(data.len() as u32);
                frame.put_slice(data);
            }
            Response::KVal(pairs) => {
                frame.put_u32_le(pairs.len() as u32);
                for pair in pairs {
                    frame.put_u32_le(pair.key.len() as u32);
                    frame.put_slice(&pair.key);
                    frame.put_u8(pair.encoding.to_wire());
                    frame.put_u32_le(pair.value.len() as u32);
                    frame.put_slice(&pair.value);
                }
            }
            _ => (),
        }
        Ok(frame.freeze())
    }
}
