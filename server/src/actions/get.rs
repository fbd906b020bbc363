/*
 * Created on Mon Apr 10 2023
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

//! # `GET` and `MGET`

use super::{ensure_length, ActionIter, ActionError, ActionResult};
use crate::corestore::Corestore;
use crate::protocol::responses::{KvPair, Response};
use bytes::Bytes;

/// Run a `GET` query
pub fn get(store: &mut Corestore, mut act: ActionIter) -> ActionResult<Response> {
    ensure_length(act.len(), |len| len == 1)?;
    let key = act.next_arg()?;
    let now = store.now();
    let Some(item) = store.lookup(&key) else {
        return Err(ActionError::NotFound);
    };
    let data = item.materialize().map_err(|e| {
        log::error!("Failed to materialize stored value: {:?}", e);
        ActionError::Invalid
    })?;
    let encoding = item.wire_encoding();
    item.touch(now);
    Ok(Response::Val(encoding, data))
}

/// Run an `MGET` query: every live (key, value) pair under the prefix
pub fn mget(store: &mut Corestore, mut act: ActionIter) -> ActionResult<Response> {
    ensure_length(act.len(), |len| len == 1)?;
    let prefix = act.next_arg()?;
    let now = store.now();
    let mut pairs = Vec::new();
    let mut corrupted = false;
    store.visit_prefix_mut(&prefix, |key, item| {
        match item.materialize() {
            Ok(value) => {
                pairs.push(KvPair {
                    key: Bytes::copy_from_slice(key),
                    encoding: item.wire_encoding(),
                    value,
                });
                item.touch(now);
            }
            Err(e) => {
                log::error!("Failed to materialize stored value: {:?}", e);
                corrupted = true;
            }
        }
        false
    });
    if corrupted {
        return Err(ActionError::Invalid);
    }
    Ok(Response::KVal(pairs))
}
