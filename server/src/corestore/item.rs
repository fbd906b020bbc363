/*
 * Created on Sat Apr 08 2023
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

use crate::protocol::responses::Encoding;
use bytes::Bytes;

/// Fixed accounting surcharge per stored item: the item struct itself plus
/// an estimate for the index path that carries it
pub const ITEM_OVERHEAD: usize = core::mem::size_of::<Item>() + 64;

#[derive(Debug, Clone)]
/// A stored value together with its lifecycle state. Payload bytes are
/// refcounted so that replies never copy them
pub struct Item {
    encoding: Encoding,
    data: Bytes,
    /// uncompressed length; equals `data.len()` unless LZF-encoded
    plain_len: usize,
    /// TTL baseline (unix seconds)
    created: u64,
    last_access: u64,
    /// 0 disables expiry
    ttl: u64,
    /// 0 = unlocked, `u64::MAX` = locked indefinitely
    locked_until: u64,
}

impl Item {
    /// Store a payload, compressing it when it meets `compression_threshold`
    /// and the codec actually wins. A threshold of 0 disables compression
    pub fn new(payload: Bytes, compression_threshold: usize, now: u64) -> Item {
        let plain_len = payload.len();
        if compression_threshold > 0 && plain_len >= compression_threshold {
            if let Ok(packed) = lzf::compress(&payload) {
                if packed.len() < plain_len {
                    return Item {
                        encoding: Encoding::Lzf,
                        data: Bytes::from(packed),
                        plain_len,
                        created: now,
                        last_access: now,
                        ttl: 0,
                        locked_until: 0,
                    };
                }
            }
        }
        Item {
            encoding: Encoding::Plain,
            data: payload,
            plain_len,
            created: now,
            last_access: now,
            ttl: 0,
            locked_until: 0,
        }
    }

    /// The accounted footprint of an item with the given key and stored
    /// payload lengths
    pub const fn cost_of(key_len: usize, data_len: usize) -> usize {
        ITEM_OVERHEAD + key_len + data_len
    }
    pub fn cost(&self, key_len: usize) -> usize {
        Self::cost_of(key_len, self.data.len())
    }

    pub const fn encoding(&self) -> Encoding {
        self.encoding
    }
    /// The encoding a reply should report: compressed values go out plain
    pub const fn wire_encoding(&self) -> Encoding {
        match self.encoding {
            Encoding::Lzf => Encoding::Plain,
            enc => enc,
        }
    }
    pub const fn is_compressed(&self) -> bool {
        matches!(self.encoding, Encoding::Lzf)
    }
    pub fn data_len(&self) -> usize {
        self.data.len()
    }
    pub const fn plain_len(&self) -> usize {
        self.plain_len
    }
    pub const fn created(&self) -> u64 {
        self.created
    }
    pub const fn last_access(&self) -> u64 {
        self.last_access
    }
    pub const fn ttl(&self) -> u64 {
        self.ttl
    }
    pub const fn locked_until(&self) -> u64 {
        self.locked_until
    }

    /// The plain payload, decompressing on demand. The stored item is never
    /// mutated by a read
    pub fn materialize(&self) -> Result<Bytes, lzf::LzfError> {
        match self.encoding {
            Encoding::Lzf => lzf::decompress(&self.data, self.plain_len).map(Bytes::from),
            _ => Ok(self.data.clone()),
        }
    }

    /// The payload as an integer, if it parses as one
    pub fn parse_number(&self) -> Option<i64> {
        let plain = self.materialize().ok()?;
        core::str::from_utf8(&plain).ok()?.trim().parse().ok()
    }

    /// Swap the payload for a number, entering the numeric encoding domain.
    /// TTL baseline and lock state survive; this is a write, so the access
    /// stamp is refreshed
    pub fn store_number(&mut self, value: i64, now: u64) {
        let text = Bytes::from(value.to_string());
        self.plain_len = text.len();
        self.data = text;
        self.encoding = Encoding::Number;
        self.last_access = now;
    }

    pub fn is_expired(&self, now: u64) -> bool {
        self.ttl > 0 && now.saturating_sub(self.created) >= self.ttl
    }
    pub fn is_locked(&self, now: u64) -> bool {
        match self.locked_until {
            0 => false,
            u64::MAX => true,
            until => now < until,
        }
    }

    pub fn touch(&mut self, now: u64) {
        self.last_access = now;
    }
    /// Reset the TTL baseline to `now` and record the window
    pub fn set_ttl(&mut self, now: u64, seconds: u64) {
        self.created = now;
        self.ttl = seconds;
        self.last_access = now;
    }
    /// Suppress writes until `now + seconds`, or indefinitely for 0
    pub fn lock(&mut self, now: u64, seconds: u64) {
        self.locked_until = if seconds == 0 {
            u64::MAX
        } else {
            now.saturating_add(seconds)
        };
        self.last_access = now;
    }
    pub fn unlock(&mut self, now: u64) {
        self.locked_until = 0;
        self.last_access = now;
    }
}
