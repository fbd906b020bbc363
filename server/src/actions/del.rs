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

//! # `DEL` and `MDEL`

use super::{ensure_length, ActionIter, ActionError, ActionResult};
use crate::corestore::Corestore;
use crate::protocol::responses::Response;

/// Run a `DEL` query
pub fn del(store: &mut Corestore, mut act: ActionIter) -> ActionResult<Response> {
    ensure_length(act.len(), |len| len == 1)?;
    let key = act.next_arg()?;
    let now = store.now();
    let locked = match store.lookup(&key) {
        None => return Err(ActionError::NotFound),
        Some(item) => item.is_locked(now),
    };
    if locked {
        return Err(ActionError::Locked);
    }
    store.remove(&key);
    Ok(Response::Okay)
}

/// Run an `MDEL` query: drop every unlocked key under the prefix, replying
/// with how many went
pub fn mdel(store: &mut Corestore, mut act: ActionIter) -> ActionResult<Response> {
    ensure_length(act.len(), |len| len == 1)?;
    let prefix = act.next_arg()?;
    let deleted = store.delete_prefix(&prefix);
    Ok(Response::number(deleted as i64))
}
