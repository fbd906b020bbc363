/*
 * Created on Tue Apr 11 2023
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

/// Run a `KEYS` query: enumerate the key names under a prefix. The reply
/// pairs each key name with its ordinal in traversal order
pub fn keys(store: &mut Corestore, mut act: ActionIter) -> ActionResult<Response> {
    ensure_length(act.len(), |len| len == 1)?;
    let prefix = act.next_arg()?;
    let mut found: Vec<Bytes> = Vec::new();
    store.visit_prefix_mut(&prefix, |key, _| {
        found.push(Bytes::copy_from_slice(key));
        false
    });
    let pairs = found
        .into_iter()
        .enumerate()
        .map(|(ordinal, key)| KvPair {
            key: Bytes::from(ordinal.to_string()),
            encoding: Encoding::Plain,
            value: key,
        })
        .collect();
    Ok(Response::KVal(pairs))
}
