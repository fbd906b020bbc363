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

//! # `META`: introspect a single item
//!
//! Fields: `size` (stored bytes), `encoding` (wire code of the storage
//! encoding), `access`/`created` (timestamps), `ttl` (window), `left`
//! (seconds to expiry, -1 when unbounded), `lock` (seconds of lock left,
//! -1 when indefinite)

use super::{ensure_length, ActionIter, ActionError, ActionResult};
use crate::corestore::Corestore;
use crate::protocol::responses::Response;

pub fn meta(store: &mut Corestore, mut act: ActionIter) -> ActionResult<Response> {
    ensure_length(act.len(), |len| len == 2)?;
    let key = act.next_arg()?;
    let field = act.next_arg()?;
    let now = store.now();
    let Some(item) = store.lookup(&key) else {
        return Err(ActionError::NotFound);
    };
    let value: i64 = match &field[..] {
        b"size" => item.data_len() as i64,
        b"encoding" => item.encoding().to_wire() as i64,
        b"access" => item.last_access() as i64,
        b"created" => item.created() as i64,
        b"ttl" => item.ttl() as i64,
        b"left" => {
            if item.ttl() > 0 {
                item.created().saturating_add(item.ttl()).saturating_sub(now) as i64
            } else {
                -1
            }
        }
        b"lock" => match item.locked_until() {
            0 => 0,
            u64::MAX => -1,
            until => until.saturating_sub(now) as i64,
        },
        _ => return Err(ActionError::Invalid),
    };
    item.touch(now);
    Ok(Response::number(value))
}
