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

//! # `SET` and `MSET`

use super::{ensure_length, parse_seconds, ActionIter, ActionError, ActionResult};
use crate::corestore::{Corestore, Item};
use crate::protocol::responses::{Encoding, Response};

/// Run a `SET` query: create or replace a key, with an optional TTL. The
/// reply echoes the stored value
pub fn set(store: &mut Corestore, mut act: ActionIter) -> ActionResult<Response> {
    ensure_length(act.len(), |len| len == 2 || len == 3)?;
    let key = act.next_arg()?;
    let value = act.next_arg()?;
    let ttl = match act.next() {
        Some(raw) => store.clamp_ttl(parse_seconds(&raw)?),
        None => 0,
    };
    if !store.key_ok(&key) || value.len() > store.limits.max_value_size {
        return Err(ActionError::Invalid);
    }
    let now = store.now();
    if store.lookup(&key).is_some_and(|it| it.is_locked(now)) {
        return Err(ActionError::Locked);
    }
    let mut item = Item::new(value.clone(), store.compression, now);
    if ttl > 0 {
        item.set_ttl(now, ttl);
    }
    store.insert(&key, item)?;
    Ok(Response::Val(Encoding::Plain, value))
}

/// Run an `MSET` query: give every existing unlocked key under the prefix
/// the same value. Never creates a key; replies with the number of keys
/// rewritten
pub fn mset(store: &mut Corestore, mut act: ActionIter) -> ActionResult<Response> {
    ensure_length(act.len(), |len| len == 2)?;
    let prefix = act.next_arg()?;
    let value = act.next_arg()?;
    if value.len() > store.limits.max_value_size {
        return Err(ActionError::Invalid);
    }
    let now = store.now();
    let mut targets: Vec<Vec<u8>> = Vec::new();
    store.visit_prefix_mut(&prefix, |key, item| {
        if !item.is_locked(now) {
            targets.push(key.to_vec());
        }
        false
    });
    let mut modified = 0i64;
    for key in targets {
        let item = Item::new(value.clone(), store.compression, now);
        if store.insert(&key, item).is_ok() {
            modified += 1;
        }
    }
    Ok(Response::number(modified))
}
