/*
 * Created on Wed Apr 12 2023
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

use super::{ensure_length, ActionIter, ActionResult};
use crate::corestore::Corestore;
use crate::protocol::responses::{Encoding, KvPair, Response};
use bytes::Bytes;

fn text(key: &'static str, value: String) -> KvPair {
    KvPair {
        key: Bytes::from_static(key.as_bytes()),
        encoding: Encoding::Plain,
        value: Bytes::from(value),
    }
}

fn num(key: &'static str, value: u64) -> KvPair {
    KvPair {
        key: Bytes::from_static(key.as_bytes()),
        encoding: Encoding::Number,
        value: Bytes::from(value.to_string()),
    }
}

/// Run a `STATS` query: a KVAL dump of the server counters
pub fn stats(store: &mut Corestore, act: ActionIter) -> ActionResult<Response> {
    ensure_length(act.len(), |len| len == 0)?;
    let s = &store.stats;
    let pairs = vec![
        text("server_version", libbramble::VERSION.to_owned()),
        num("server_started", s.started),
        num("server_time", s.time),
        num("server_uptime", s.time.saturating_sub(s.started)),
        num("memory_used", s.mem_used as u64),
        num("memory_peak", s.mem_peak as u64),
        num("memory_limit", store.limits.max_memory as u64),
        num("memory_available", s.mem_available as u64),
        num("item_count", s.item_count as u64),
        num("compressed_count", s.compressed_count as u64),
        num(
            "item_size_avg",
            (s.mem_used / s.item_count.max(1)) as u64,
        ),
        num("client_count", s.client_count as u64),
        num("cron_runs", s.cron_runs),
        num("first_query_at", s.first_query_at),
        num("last_query_at", s.last_query_at),
    ];
    Ok(Response::KVal(pairs))
}
