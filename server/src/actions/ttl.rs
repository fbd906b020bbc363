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

//! # `TTL` and `MTTL`
//!
//! Setting a TTL rebases the expiry window on *now*, not on the item's
//! original creation time

use super::{ensure_length, parse_seconds, ActionIter, ActionError, ActionResult};
use crate::corestore::Corestore;
use crate::protocol::responses::Response;

/// Run a `TTL` query
pub fn ttl(store: &mut Corestore, mut act: ActionIter) -> ActionResult<Response> {
    ensure_length(act.len(), |len| len == 2)?;
    let key = act.next_arg()?;
    let seconds = store.clamp_ttl(parse_seconds(&act.next_arg()?)?);
    let now = store.now();
    match store.lookup(&key) {
        None => Err(ActionError::NotFound),
        Some(item) if item.is_locked(now) => Err(ActionError::Locked),
        Some(item) => {
            item.set_ttl(now, seconds);
            Ok(Response::Okay)
        }
    }
}

/// Run an `MTTL` query: rebase the TTL of every unlocked key under the
/// prefix, replying with how many were touched
pub fn mttl(store: &mut Corestore, mut act: ActionIter) -> ActionResult<Response> {
    ensure_length(act.len(), |len| len == 2)?;
    let prefix = act.next_arg()?;
    let seconds = store.clamp_ttl(parse_seconds(&act.next_arg()?)?);
    let now = store.now();
    let modified = store.visit_prefix_mut(&prefix, |_, item| {
        if item.is_locked(now) {
            false
        } else {
            item.set_ttl(now, seconds);
            true
        }
    });
    Ok(Response::number(modified as i64))
}
